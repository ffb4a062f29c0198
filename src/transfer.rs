//! Field transfer policies (spec.md §4.8): given a tag's declared
//! [`TransferPolicy`](crate::mesh::TransferPolicy), compute the new-mesh
//! values an operator owes it. Each `ops::*` module calls these helpers
//! once per policy rather than re-deriving the arithmetic locally.

use crate::algebra::{Vec2, Vec3};
use crate::metric::{interpolate_metrics, Metric};

/// `LINEAR_INTERP` at a new midpoint vertex: unweighted mean of the split
/// edge's endpoint values (spec.md §4.8).
pub fn linear_interp(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| 0.5 * (x + y)).collect()
}

/// `METRIC` at a new midpoint vertex: `interpolate_metrics` at `t = 0.5`.
pub fn metric_interp(a: &Metric, b: &Metric) -> Metric {
    interpolate_metrics(a, b, 0.5)
}

/// `POINTWISE` boundary fallback and swap's "cavity averaging" (spec.md
/// §4.6, §4.7): arithmetic mean of the donor elements' values.
pub fn cavity_average(donors: &[&[f64]], ncomps: usize) -> Vec<f64> {
    let mut out = vec![0.0; ncomps];
    for donor in donors {
        for c in 0..ncomps {
            out[c] += donor[c];
        }
    }
    let n = donors.len() as f64;
    for v in &mut out {
        *v /= n;
    }
    out
}

/// Redistribute a `CONSERVE`-tagged quantity from a star's donor elements
/// (pre-operator) to its product elements (post-operator) so that
/// `sum(new_vol * new_value) == sum(old_vol * old_value)` over the star,
/// regardless of how imprecise the overlap estimate is: each donor's
/// `vol * value` is split across products strictly in proportion to
/// `overlaps[d][p]`, so it always sums back to exactly the donor's own
/// contribution (spec.md §8's conservation invariant).
///
/// `overlaps[d][p]` is the donor-`d`/product-`p` geometric overlap, e.g.
/// from [`VolumeIntersector`]. A donor with no measured overlap against any
/// product (a degenerate or disjoint case) contributes nothing rather than
/// being dropped silently from the total — callers should only pass donors
/// that still have some product to redistribute into.
pub fn redistribute_by_overlap(
    donor_vols: &[f64],
    donor_values: &[f64],
    overlaps: &[Vec<f64>],
    product_vols: &[f64],
) -> Vec<f64> {
    let mut numer = vec![0.0f64; product_vols.len()];
    for d in 0..donor_vols.len() {
        let total: f64 = overlaps[d].iter().sum();
        if total < 1e-300 {
            continue;
        }
        for p in 0..product_vols.len() {
            numer[p] += donor_values[d] * donor_vols[d] * (overlaps[d][p] / total);
        }
    }
    numer
        .iter()
        .zip(product_vols)
        .map(|(n, v)| if *v > 1e-300 { n / v } else { 0.0 })
        .collect()
}

/// Volume/area-weighted redistribution for `CONSERVE` (spec.md §4.8): the
/// integral each product element inherits from a donor is proportional to
/// the geometric intersection of their territories.
pub trait VolumeIntersector {
    fn intersect_area(&self, donor: &[Vec2], product: &[Vec2]) -> f64;
    fn intersect_volume(&self, donor: &[Vec3], product: &[Vec3]) -> f64;
}

/// Built-in intersector covering exactly the donor/product shapes refine,
/// coarsen and swap ever produce (spec.md §9's clipping note): a general
/// 2D/3D polygon/polyhedron clipper is not vendored; 2D uses an exact
/// Sutherland–Hodgman convex clip (both donor and product are always
/// triangles, hence convex), which is exact for every 2D scenario in
/// spec.md §8. 3D falls back to a volume-ratio approximation — documented
/// as a limitation in DESIGN.md rather than an exact tetrahedron clip.
pub struct CavityVolumeIntersector;

impl VolumeIntersector for CavityVolumeIntersector {
    fn intersect_area(&self, donor: &[Vec2], product: &[Vec2]) -> f64 {
        let clipped = clip_convex_polygon(donor, product);
        polygon_area(&clipped)
    }

    fn intersect_volume(&self, donor: &[Vec3], product: &[Vec3]) -> f64 {
        let vd = tet_volume(donor);
        let vp = tet_volume(product);
        // Shared vertices indicate overlap; weight the smaller volume by
        // the fraction of product vertices the donor and product share.
        let shared = product
            .iter()
            .filter(|p| donor.iter().any(|d| (*d - **p).norm() < 1e-9))
            .count();
        let frac = shared as f64 / product.len() as f64;
        vd.min(vp) * frac
    }
}

pub fn tet_volume(v: &[Vec3]) -> f64 {
    debug_assert_eq!(v.len(), 4);
    let e0 = v[1] - v[0];
    let e1 = v[2] - v[0];
    let e2 = v[3] - v[0];
    e0.dot(&e1.cross(&e2)).abs() / 6.0
}

pub fn polygon_area(poly: &[Vec2]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    (sum * 0.5).abs()
}

/// Clip `subject` (any simple polygon) against the convex polygon
/// `window` using the Sutherland–Hodgman algorithm. Both `donor` and
/// `product` in this crate are always triangles, so `window` is always
/// convex.
fn clip_convex_polygon(subject: &[Vec2], window: &[Vec2]) -> Vec<Vec2> {
    let mut output = subject.to_vec();
    for i in 0..window.len() {
        if output.is_empty() {
            break;
        }
        let a = window[i];
        let b = window[(i + 1) % window.len()];
        let input = output;
        output = Vec::with_capacity(input.len() + 1);
        for j in 0..input.len() {
            let cur = input[j];
            let prev = input[(j + input.len() - 1) % input.len()];
            let cur_inside = is_inside(&a, &b, &cur);
            let prev_inside = is_inside(&a, &b, &prev);
            if cur_inside {
                if !prev_inside {
                    output.push(intersect_edge(&prev, &cur, &a, &b));
                }
                output.push(cur);
            } else if prev_inside {
                output.push(intersect_edge(&prev, &cur, &a, &b));
            }
        }
    }
    output
}

fn is_inside(a: &Vec2, b: &Vec2, p: &Vec2) -> bool {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) >= 0.0
}

fn intersect_edge(p1: &Vec2, p2: &Vec2, a: &Vec2, b: &Vec2) -> Vec2 {
    let d1 = p2 - p1;
    let d2 = b - a;
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < 1e-300 {
        return *p2;
    }
    let t = ((a.x - p1.x) * d2.y - (a.y - p1.y) * d2.x) / denom;
    p1 + d1 * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_interp_is_midpoint() {
        assert_eq!(linear_interp(&[0.0, 4.0], &[2.0, 8.0]), vec![1.0, 6.0]);
    }

    #[test]
    fn cavity_average_of_two_donors() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        assert_eq!(cavity_average(&[&a, &b], 2), vec![2.0, 3.0]);
    }

    #[test]
    fn identical_triangles_have_full_area_intersection() {
        let tri = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        let intersector = CavityVolumeIntersector;
        let area = intersector.intersect_area(&tri, &tri);
        assert!((area - 0.5).abs() < 1e-9);
    }

    #[test]
    fn disjoint_triangles_have_zero_area_intersection() {
        let a = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        let b = vec![Vec2::new(10.0, 10.0), Vec2::new(11.0, 10.0), Vec2::new(10.0, 11.0)];
        let intersector = CavityVolumeIntersector;
        assert_eq!(intersector.intersect_area(&a, &b), 0.0);
    }

    #[test]
    fn redistribute_by_overlap_conserves_total() {
        // one donor (vol 2, value 5) splits unevenly across two products.
        let donor_vols = [2.0];
        let donor_values = [5.0];
        let overlaps = vec![vec![0.25, 0.75]];
        let product_vols = [0.5, 1.5];
        let new_values = redistribute_by_overlap(&donor_vols, &donor_values, &overlaps, &product_vols);
        let total_before: f64 = donor_vols[0] * donor_values[0];
        let total_after: f64 = new_values.iter().zip(&product_vols).map(|(v, vol)| v * vol).sum();
        assert!((total_before - total_after).abs() < 1e-9);
    }

    #[test]
    fn swap_quad_conserves_total_area_across_both_diagonals() {
        // square p=(0,0) q=(1,0) r=(1,1) s=(0,1); old split along p-r,
        // new split along q-s. Each new triangle must recover exactly
        // half the square's area from the two old triangles combined.
        let p = Vec2::new(0.0, 0.0);
        let q = Vec2::new(1.0, 0.0);
        let r = Vec2::new(1.0, 1.0);
        let s = Vec2::new(0.0, 1.0);
        let old_pqr = vec![p, q, r];
        let old_prs = vec![p, r, s];
        let new_pqs = vec![p, q, s];
        let new_qrs = vec![q, r, s];
        let intersector = CavityVolumeIntersector;
        let total_pqs = intersector.intersect_area(&old_pqr, &new_pqs)
            + intersector.intersect_area(&old_prs, &new_pqs);
        assert!((total_pqs - 0.5).abs() < 1e-9);
        let total_qrs = intersector.intersect_area(&old_pqr, &new_qrs)
            + intersector.intersect_area(&old_prs, &new_qrs);
        assert!((total_qrs - 0.5).abs() < 1e-9);
    }
}
