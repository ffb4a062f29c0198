//! Element shape quality and metric edge length (spec.md §4.3).
//!
//! spec.md §9 leaves the exact quality formula as an open question
//! ("implementers should pick one published definition and document it").
//! This picks the mean-ratio shape metric (Knupp's normalized mean-ratio
//! family, value 1 for an equilateral/regular simplex, 0 in the
//! degenerate limit), made metric-aware by mapping each element's
//! vertices through the square root of the element's averaged metric
//! before measuring it — the standard way to assess anisotropic quality
//! in a Riemannian metric (map to a locally near-Euclidean space, then
//! measure there).

use crate::algebra::eigen;
use crate::algebra::{Mat2, Mat3, Vec2, Vec3};
use crate::mesh::{Dimension, Mesh};
use crate::metric::Metric;

/// `M^(1/2)`, reconstructed from `M`'s eigenbasis (`h_i = 1/sqrt(lambda_i)`
/// per [`crate::metric::decompose_metric`], so `sqrt(lambda_i) = 1/h_i`).
fn metric_sqrt(m: &Metric) -> Metric {
    match m {
        Metric::D2(mat) => match eigen::decompose_eigen2(mat) {
            eigen::Eigen2::Converged { q, l } => {
                Metric::D2(eigen::compose_eigen2(&q, &Vec2::new(l.x.sqrt(), l.y.sqrt())))
            }
            eigen::Eigen2::NonConverged { diag_avg } => {
                Metric::D2(Mat2::identity() * diag_avg.sqrt())
            }
        },
        Metric::D3(mat) => match eigen::decompose_eigen3(mat) {
            eigen::Eigen3::Converged { q, l } => Metric::D3(eigen::compose_eigen3(
                &q,
                &Vec3::new(l.x.sqrt(), l.y.sqrt(), l.z.sqrt()),
            )),
            eigen::Eigen3::NonConverged { diag_avg } => {
                Metric::D3(Mat3::identity() * diag_avg.sqrt())
            }
        },
    }
}

/// Shape quality of a single triangle, already mapped into (approximately
/// Euclidean) metric space: `4 sqrt(3) A / (l0^2+l1^2+l2^2)`.
fn quality_tri2(p: &[Vec2; 3]) -> f64 {
    let e0 = p[1] - p[0];
    let e1 = p[2] - p[0];
    let area = 0.5 * (e0.x * e1.y - e0.y * e1.x).abs();
    let l2 = (p[1] - p[0]).norm_squared() + (p[2] - p[1]).norm_squared() + (p[0] - p[2]).norm_squared();
    if l2 < 1e-300 {
        return 0.0;
    }
    (4.0 * 3.0_f64.sqrt() * area / l2).clamp(0.0, 1.0)
}

/// Shape quality of a single tetrahedron in metric space:
/// `12 (3V)^(2/3) / sum(l_i^2)`.
fn quality_tet3(p: &[Vec3; 4]) -> f64 {
    let e0 = p[1] - p[0];
    let e1 = p[2] - p[0];
    let e2 = p[3] - p[0];
    let vol = e0.dot(&e1.cross(&e2)).abs() / 6.0;
    let edges = [
        p[1] - p[0],
        p[2] - p[0],
        p[3] - p[0],
        p[2] - p[1],
        p[3] - p[1],
        p[3] - p[2],
    ];
    let l2: f64 = edges.iter().map(|e| e.norm_squared()).sum();
    if l2 < 1e-300 {
        return 0.0;
    }
    (12.0 * (3.0 * vol).powf(2.0 / 3.0) / l2).clamp(0.0, 1.0)
}

/// Shape quality of triangle `tri` in `mesh`, in `[0, 1]`, under the
/// metric averaged over its three vertices. Falls back to plain Euclidean
/// quality if the mesh has no metric tag (useful in tests that don't
/// exercise sizing).
pub fn element_quality(mesh: &Mesh, dim: Dimension, entity: usize) -> f64 {
    quality_of_verts(mesh, dim, mesh.ask_down(dim, entity))
}

/// Shape quality of `entity` as if vertex `from` were replaced by `to`
/// everywhere it appears (coarsen's collapse simulation, spec.md §4.6).
/// Returns `None` if the substitution collapses the element onto itself
/// (it already had both `from` and `to` as corners, so it disappears
/// rather than degrading).
pub fn element_quality_substituting(
    mesh: &Mesh,
    dim: Dimension,
    entity: usize,
    from: usize,
    to: usize,
) -> Option<f64> {
    let verts: Vec<usize> = mesh
        .ask_down(dim, entity)
        .iter()
        .map(|&v| if v == from { to } else { v })
        .collect();
    let mut sorted = verts.clone();
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return None;
    }
    Some(quality_of_verts(mesh, dim, &verts))
}

/// Shape quality of an element given explicitly as a vertex list, rather
/// than an existing entity index (swap's candidate re-triangulations
/// build tets that don't exist in the mesh yet).
pub fn element_quality_of_verts(mesh: &Mesh, dim: Dimension, verts: &[usize]) -> f64 {
    quality_of_verts(mesh, dim, verts)
}

fn quality_of_verts(mesh: &Mesh, dim: Dimension, verts: &[usize]) -> f64 {
    match dim {
        Dimension::Tri => {
            let coords: [Vec2; 3] = std::array::from_fn(|i| mesh.coords2(verts[i]));
            if mesh.has_metric() {
                let m = crate::metric::average_metrics(
                    &verts.iter().map(|&v| mesh.metric_at(v)).collect::<Vec<_>>(),
                );
                let sqrt_m = match metric_sqrt(&m) {
                    Metric::D2(s) => s,
                    Metric::D3(_) => unreachable!("2D mesh yields a 2D metric"),
                };
                let mapped: [Vec2; 3] = std::array::from_fn(|i| sqrt_m * coords[i]);
                quality_tri2(&mapped)
            } else {
                quality_tri2(&coords)
            }
        }
        Dimension::Tet => {
            let coords: [Vec3; 4] = std::array::from_fn(|i| mesh.coords3(verts[i]));
            if mesh.has_metric() {
                let m = crate::metric::average_metrics(
                    &verts.iter().map(|&v| mesh.metric_at(v)).collect::<Vec<_>>(),
                );
                let sqrt_m = match metric_sqrt(&m) {
                    Metric::D3(s) => s,
                    Metric::D2(_) => unreachable!("3D mesh yields a 3D metric"),
                };
                let mapped: [Vec3; 4] = std::array::from_fn(|i| sqrt_m * coords[i]);
                quality_tet3(&mapped)
            } else {
                quality_tet3(&coords)
            }
        }
        _ => panic!("quality_of_verts is only defined for Tri or Tet entities"),
    }
}

/// Length of edge `edge` under the metric averaged over its two endpoints
/// (spec.md §4.3's "averaged-metric approximation").
pub fn metric_edge_length(mesh: &Mesh, edge: usize) -> f64 {
    let verts = mesh.ask_down(Dimension::Edge, edge);
    metric_length_between(mesh, verts[0], verts[1])
}

/// Metric-edge-length between two vertices that are not necessarily joined
/// by an existing edge entity (coarsen's length constraint checks the
/// length a surviving edge *would* have after a collapse, before any new
/// topology is built).
pub fn metric_length_between(mesh: &Mesh, a: usize, b: usize) -> f64 {
    let m = crate::metric::average_metrics(&[mesh.metric_at(a), mesh.metric_at(b)]);
    match (mesh.dim(), m) {
        (Dimension::Tri, Metric::D2(mat)) => {
            let d = mesh.coords2(b) - mesh.coords2(a);
            (d.dot(&(mat * d))).sqrt()
        }
        (Dimension::Tet, Metric::D3(mat)) => {
            let d = mesh.coords3(b) - mesh.coords3(a);
            (d.dot(&(mat * d))).sqrt()
        }
        _ => unreachable!("mesh dimension always matches its metric dimension"),
    }
}

/// Entities of `dim` whose quality is below `floor`.
pub fn slivers(mesh: &Mesh, dim: Dimension, floor: f64) -> Vec<usize> {
    (0..mesh.nents(dim))
        .filter(|&e| element_quality(mesh, dim, e) < floor)
        .collect()
}

/// Expand the sliver set by `nlayers` of adjacency dilation through shared
/// vertices (spec.md §4.3): each round adds every element touching a
/// vertex of an already-marked element.
pub fn mark_sliver_layers(mesh: &Mesh, dim: Dimension, floor: f64, nlayers: usize) -> Vec<bool> {
    let mut marked = vec![false; mesh.nents(dim)];
    for e in slivers(mesh, dim, floor) {
        marked[e] = true;
    }
    let vert_up = mesh.ask_up(Dimension::Vert, dim);
    for _ in 0..nlayers {
        let mut next = marked.clone();
        for (e, &is_marked) in marked.iter().enumerate() {
            if !is_marked {
                continue;
            }
            for &v in mesh.ask_down(dim, e) {
                for &nbr in vert_up.adjacent(v) {
                    next[nbr] = true;
                }
            }
        }
        marked = next;
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square_two_tris() -> Mesh {
        let coords = vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        Mesh::new(Dimension::Tri, 2, coords, vec![0, 1, 2, 0, 2, 3]).unwrap()
    }

    #[test]
    fn right_isoceles_triangle_quality_is_below_one() {
        let m = unit_square_two_tris();
        let q = element_quality(&m, Dimension::Tri, 0);
        assert!(q > 0.0 && q < 1.0);
    }

    #[test]
    fn equilateral_triangle_has_quality_near_one() {
        let s = 1.0;
        let coords = vec![0.0, 0.0, s, 0.0, s / 2.0, s * 3.0_f64.sqrt() / 2.0];
        let m = Mesh::new(Dimension::Tri, 2, coords, vec![0, 1, 2]).unwrap();
        let q = element_quality(&m, Dimension::Tri, 0);
        assert!((q - 1.0).abs() < 1e-9);
    }

    #[test]
    fn regular_tet_has_quality_near_one() {
        // regular tetrahedron with unit edge length
        let coords = vec![
            1.0, 1.0, 1.0, //
            1.0, -1.0, -1.0, //
            -1.0, 1.0, -1.0, //
            -1.0, -1.0, 1.0,
        ];
        let m = Mesh::new(Dimension::Tet, 3, coords, vec![0, 1, 2, 3]).unwrap();
        let q = element_quality(&m, Dimension::Tet, 0);
        assert!((q - 1.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_triangle_has_zero_quality() {
        let coords = vec![0.0, 0.0, 1.0, 0.0, 2.0, 0.0];
        let m = Mesh::new(Dimension::Tri, 2, coords, vec![0, 1, 2]).unwrap();
        assert_eq!(element_quality(&m, Dimension::Tri, 0), 0.0);
    }

    #[test]
    fn mark_sliver_layers_dilates_through_shared_vertices() {
        let m = unit_square_two_tris();
        let marked = mark_sliver_layers(&m, Dimension::Tri, 1.1, 1);
        assert!(marked.iter().all(|&b| b));
    }
}
