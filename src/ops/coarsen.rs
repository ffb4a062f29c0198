//! Vertex collapse (spec.md §4.6).

use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;

use crate::algebra::{Vec2, Vec3};
use crate::cavity::select_independent_set;
use crate::config::AdaptConfig;
use crate::mesh::{Dimension, Mesh, Tag, TagData, TransferPolicy, CLASS_DIM_TAG, CLASS_ID_TAG};
use crate::quality::{element_quality, element_quality_substituting, metric_edge_length, metric_length_between};
use crate::transfer::{
    cavity_average, polygon_area, redistribute_by_overlap, tet_volume, CavityVolumeIntersector, VolumeIntersector,
};

fn class_dim_of(mesh: &Mesh, v: usize) -> i8 {
    match mesh.get_tag(Dimension::Vert, CLASS_DIM_TAG) {
        Some(tag) => match &tag.data {
            TagData::I8(data) => data[v],
            _ => unreachable!("class_dim tag is always I8"),
        },
        // A mesh with no vertex classification is treated as having no
        // boundary: every vertex sits on the model's full-dimensional
        // interior.
        None => u8::from(mesh.dim()) as i8,
    }
}

fn class_id_of(mesh: &Mesh, v: usize) -> i32 {
    match mesh.get_tag(Dimension::Vert, CLASS_ID_TAG) {
        Some(tag) => match &tag.data {
            TagData::I32(data) => data[v],
            _ => unreachable!("class_id tag is always I32"),
        },
        None => 0,
    }
}

/// Geometric classification constraint (spec.md §4.6): `v` may only
/// collapse onto `w` if `w`'s model entity has dimension at least `v`'s,
/// and the same model entity when the dimensions are equal.
fn classification_allows(mesh: &Mesh, v: usize, w: usize) -> bool {
    let (dv, dw) = (class_dim_of(mesh, v), class_dim_of(mesh, w));
    if dw < dv {
        return false;
    }
    if dw == dv {
        return class_id_of(mesh, v) == class_id_of(mesh, w);
    }
    true
}

fn effective_target(remap: &FxHashMap<usize, usize>, v: usize) -> usize {
    let mut cur = v;
    while let Some(&next) = remap.get(&cur) {
        if next == cur {
            break;
        }
        cur = next;
    }
    cur
}

/// Collapse every vertex whose shortest incident edge is below
/// `cfg.coarsen_below` onto a neighbor, where classification, quality and
/// length constraints allow it, one pass. Returns the candidate (possibly
/// unchanged) mesh and whether anything changed.
pub fn coarsen_by_size(mesh: &Mesh, cfg: &AdaptConfig) -> (Mesh, bool) {
    let dim = mesh.dim();
    let vert_up_elem = mesh.ask_up(Dimension::Vert, dim);
    let vert_up_edge = mesh.ask_up(Dimension::Vert, Dimension::Edge);

    let mut raw_candidates: Vec<(usize, usize)> = Vec::new();
    for e in 0..mesh.nents(Dimension::Edge) {
        if metric_edge_length(mesh, e) < cfg.coarsen_below {
            let verts = mesh.ask_down(Dimension::Edge, e);
            raw_candidates.push((verts[0], verts[1]));
            raw_candidates.push((verts[1], verts[0]));
        }
    }

    let mut new_min_of: FxHashMap<(usize, usize), f64> = FxHashMap::default();
    let mut valid: Vec<(usize, usize)> = Vec::new();
    for &(v, w) in &raw_candidates {
        if !classification_allows(mesh, v, w) {
            continue;
        }
        if !length_constraint_holds(mesh, &vert_up_edge, v, w, cfg) {
            continue;
        }
        let touched = combined_star(&vert_up_elem, v, w);
        let old_min = touched
            .iter()
            .map(|&e| element_quality(mesh, dim, e))
            .fold(f64::INFINITY, f64::min);
        let new_min = touched
            .iter()
            .filter_map(|&e| element_quality_substituting(mesh, dim, e, v, w))
            .fold(f64::INFINITY, f64::min);
        if new_min.is_finite() && new_min > old_min {
            new_min_of.insert((v, w), new_min);
            valid.push((v, w));
        }
    }

    if valid.is_empty() {
        return (mesh.clone(), false);
    }

    let domain_of = |&(v, _): &(usize, usize)| vert_up_elem.adjacent(v).to_vec();
    let priority = |key: &(usize, usize)| new_min_of[key];
    let accepted = select_independent_set(&valid, priority, domain_of);
    if accepted.is_empty() {
        return (mesh.clone(), false);
    }

    let remap: FxHashMap<usize, usize> = accepted.iter().copied().collect();
    let old_to_new_vertex = |v: usize| effective_target(&remap, v);

    let space_dim = mesh.space_dim();
    let mut survivors: Vec<usize> = Vec::new();
    let mut new_vertex_index: FxHashMap<usize, usize> = FxHashMap::default();
    let mut new_coords: Vec<f64> = Vec::new();
    for v in 0..mesh.nents(Dimension::Vert) {
        if remap.contains_key(&v) {
            continue;
        }
        new_vertex_index.insert(v, survivors.len());
        new_coords.extend_from_slice(mesh.coords(v));
        survivors.push(v);
    }

    let top_n = dim.nverts();
    let mut new_top_verts: Vec<usize> = Vec::new();
    let mut parents: Vec<usize> = Vec::new();
    for e in 0..mesh.nents(dim) {
        let verts = mesh.ask_down(dim, e);
        let mapped: Vec<usize> = verts
            .iter()
            .map(|&v| new_vertex_index[&old_to_new_vertex(v)])
            .collect();
        let mut sorted = mapped.clone();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            continue;
        }
        new_top_verts.extend(mapped);
        parents.push(e);
    }
    debug_assert_eq!(new_top_verts.len() / top_n, parents.len());

    let mut new_mesh = Mesh::new(dim, space_dim, new_coords, new_top_verts)
        .expect("coarsen_by_size: rebuilt mesh must be internally consistent");

    transfer_vertex_tags(mesh, &mut new_mesh, &survivors);
    transfer_element_tags(mesh, &mut new_mesh, dim, &parents, &accepted);

    (new_mesh, true)
}

fn combined_star(vert_up: &crate::mesh::Csr, v: usize, w: usize) -> Vec<usize> {
    let mut touched: Vec<usize> = vert_up.adjacent(v).to_vec();
    touched.extend_from_slice(vert_up.adjacent(w));
    touched.sort_unstable();
    touched.dedup();
    touched
}

fn poly2(mesh: &Mesh, verts: &[usize]) -> Vec<Vec2> {
    verts.iter().map(|&v| mesh.coords2(v)).collect()
}

fn poly3(mesh: &Mesh, verts: &[usize]) -> Vec<Vec3> {
    verts.iter().map(|&v| mesh.coords3(v)).collect()
}

fn element_volume(mesh: &Mesh, dim: Dimension, verts: &[usize]) -> f64 {
    match dim {
        Dimension::Tri => polygon_area(&poly2(mesh, verts)),
        Dimension::Tet => tet_volume(&poly3(mesh, verts)),
        _ => unreachable!("coarsen only operates on a Tri or Tet mesh"),
    }
}

fn overlap(mesh: &Mesh, dim: Dimension, donor_verts: &[usize], product_verts: &[usize]) -> f64 {
    let intersector = CavityVolumeIntersector;
    match dim {
        Dimension::Tri => intersector.intersect_area(&poly2(mesh, donor_verts), &poly2(mesh, product_verts)),
        Dimension::Tet => intersector.intersect_volume(&poly3(mesh, donor_verts), &poly3(mesh, product_verts)),
        _ => unreachable!("coarsen only operates on a Tri or Tet mesh"),
    }
}

/// `CONSERVE` transfer after collapse (spec.md §4.8): a vertex collapse
/// removes the elements that had both `v` and `w` as corners and reshapes
/// every other star element by sliding `v` to `w`. Redistribute each
/// donor's `vol * value` (removed or reshaped alike) across the surviving
/// product elements by [`VolumeIntersector`] overlap, so the star's total
/// integral is unchanged even though its total volume is not.
fn conserve_transfer(mesh: &Mesh, dim: Dimension, tag: &Tag, parents: &[usize], accepted: &[(usize, usize)]) -> Vec<f64> {
    let ncomps = tag.ncomps;
    let mut data = vec![0.0f64; parents.len() * ncomps];
    for (slot, &p) in parents.iter().enumerate() {
        for c in 0..ncomps {
            data[slot * ncomps + c] = tag.component(p, c);
        }
    }

    let vert_up_elem = mesh.ask_up(Dimension::Vert, dim);
    let elem_to_slot: FxHashMap<usize, usize> = parents.iter().enumerate().map(|(slot, &p)| (p, slot)).collect();

    for &(v, w) in accepted {
        let donors = combined_star(&vert_up_elem, v, w);
        let donor_verts: Vec<Vec<usize>> = donors.iter().map(|&d| mesh.ask_down(dim, d).to_vec()).collect();
        let donor_vols: Vec<f64> = donor_verts.iter().map(|verts| element_volume(mesh, dim, verts)).collect();

        let mut products: Vec<(usize, Vec<usize>)> = Vec::new();
        for &e in &donors {
            let verts: Vec<usize> = mesh.ask_down(dim, e).iter().map(|&x| if x == v { w } else { x }).collect();
            let mut sorted = verts.clone();
            sorted.sort_unstable();
            if sorted.windows(2).any(|s| s[0] == s[1]) {
                continue; // collapses onto itself, removed rather than surviving
            }
            products.push((e, verts));
        }
        if products.is_empty() {
            continue;
        }
        let product_vols: Vec<f64> = products.iter().map(|(_, verts)| element_volume(mesh, dim, verts)).collect();
        let overlaps: Vec<Vec<f64>> = donor_verts
            .iter()
            .map(|dv| products.iter().map(|(_, pv)| overlap(mesh, dim, dv, pv)).collect())
            .collect();

        for c in 0..ncomps {
            let donor_values: Vec<f64> = donors.iter().map(|&d| tag.component(d, c)).collect();
            let new_values = redistribute_by_overlap(&donor_vols, &donor_values, &overlaps, &product_vols);
            for (i, (e, _)) in products.iter().enumerate() {
                if let Some(&slot) = elem_to_slot.get(e) {
                    data[slot * ncomps + c] = new_values[i];
                }
            }
        }
    }
    data
}

fn length_constraint_holds(
    mesh: &Mesh,
    vert_up_edge: &crate::mesh::Csr,
    v: usize,
    w: usize,
    cfg: &AdaptConfig,
) -> bool {
    for &e in vert_up_edge.adjacent(v) {
        let verts = mesh.ask_down(Dimension::Edge, e);
        let other = if verts[0] == v { verts[1] } else { verts[0] };
        if other == w {
            continue;
        }
        if metric_length_between(mesh, w, other) > cfg.refine_above {
            return false;
        }
    }
    true
}

fn transfer_vertex_tags(old: &Mesh, new: &mut Mesh, survivors: &[usize]) {
    for name in old.tag_names(Dimension::Vert).map(str::to_string).collect::<Vec<_>>() {
        let tag = old.get_tag(Dimension::Vert, &name).unwrap().clone();
        if tag.policy == TransferPolicy::DontTransfer {
            continue;
        }
        match &tag.data {
            TagData::F64(_) => {
                let ncomps = tag.ncomps;
                let mut data = Vec::with_capacity(survivors.len() * ncomps);
                for &v in survivors {
                    data.extend_from_slice(tag.row(v));
                }
                let new_tag = Tag::new(TagData::F64(data), ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(Dimension::Vert, &name, new_tag).unwrap();
            }
            TagData::I8(v) => {
                let data: Vec<i8> = survivors.iter().map(|&s| v[s]).collect();
                let new_tag = Tag::new(TagData::I8(data), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(Dimension::Vert, &name, new_tag).unwrap();
            }
            TagData::I32(v) => {
                let data: Vec<i32> = survivors.iter().map(|&s| v[s]).collect();
                let new_tag = Tag::new(TagData::I32(data), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(Dimension::Vert, &name, new_tag).unwrap();
            }
            TagData::I64(v) => {
                let data: Vec<i64> = survivors.iter().map(|&s| v[s]).collect();
                let new_tag = Tag::new(TagData::I64(data), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(Dimension::Vert, &name, new_tag).unwrap();
            }
        }
    }
}

fn transfer_element_tags(
    old: &Mesh,
    new: &mut Mesh,
    dim: Dimension,
    parents: &[usize],
    accepted: &[(usize, usize)],
) {
    for name in [CLASS_DIM_TAG, CLASS_ID_TAG] {
        let tag = old.get_tag(dim, name).unwrap();
        match &tag.data {
            TagData::I8(v) => {
                let data: Vec<i8> = parents.iter().map(|&p| v[p]).collect();
                let new_tag = Tag::new(TagData::I8(data), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(dim, name, new_tag).unwrap();
            }
            TagData::I32(v) => {
                let data: Vec<i32> = parents.iter().map(|&p| v[p]).collect();
                let new_tag = Tag::new(TagData::I32(data), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(dim, name, new_tag).unwrap();
            }
            _ => {}
        }
    }

    let other_names: Vec<String> = old
        .tag_names(dim)
        .filter(|n| *n != CLASS_DIM_TAG && *n != CLASS_ID_TAG)
        .map(str::to_string)
        .collect();

    for name in other_names {
        let tag = old.get_tag(dim, &name).unwrap().clone();
        match tag.policy {
            TransferPolicy::DontTransfer => {}
            TransferPolicy::Quality => {
                let data: Vec<f64> = (0..new.nents(dim)).map(|e| element_quality(new, dim, e)).collect();
                let new_tag = Tag::new(TagData::F64(data), 1, tag.policy, tag.output).unwrap();
                new.add_tag(dim, &name, new_tag).unwrap();
            }
            // Every surviving product element maps to exactly one parent
            // (collapse only removes elements, it never splits or merges
            // two into one), so the conserved quantity passes through
            // unscaled.
            TransferPolicy::Inherit => {
                let ncomps = tag.ncomps;
                let mut data = Vec::with_capacity(parents.len() * ncomps);
                for &p in parents {
                    for c in 0..ncomps {
                        data.push(tag.component(p, c));
                    }
                }
                let new_tag = Tag::new(TagData::F64(data), ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(dim, &name, new_tag).unwrap();
            }
            TransferPolicy::Conserve => {
                let data = conserve_transfer(old, dim, &tag, parents, accepted);
                let new_tag = Tag::new(TagData::F64(data), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(dim, &name, new_tag).unwrap();
            }
            TransferPolicy::Pointwise => {
                let data = pointwise_transfer(old, new, dim, &tag, parents, accepted);
                let new_tag = Tag::new(TagData::F64(data), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(dim, &name, new_tag).unwrap();
            }
            _ => {}
        }
    }
}

/// POINTWISE transfer after collapse (spec.md §4.6): around an interior
/// key vertex, fit a degree-1 polynomial to the cavity's donor values via
/// a QR-factored Vandermonde system and evaluate it at each product
/// element's centroid; around a boundary key vertex (too few donors to
/// fit reliably), fall back to the arithmetic mean of the donor values.
fn pointwise_transfer(
    old: &Mesh,
    new: &Mesh,
    dim: Dimension,
    tag: &Tag,
    parents: &[usize],
    accepted: &[(usize, usize)],
) -> Vec<f64> {
    let ncomps = tag.ncomps;
    // Default: every untouched survivor keeps its own parent value.
    let mut data = vec![0.0f64; parents.len() * ncomps];
    for (slot, &p) in parents.iter().enumerate() {
        for c in 0..ncomps {
            data[slot * ncomps + c] = tag.component(p, c);
        }
    }

    let vert_up_elem = old.ask_up(Dimension::Vert, dim);
    for &(v, w) in accepted {
        let interior = class_dim_of(old, w) == u8::from(old.dim()) as i8;
        let donors = combined_star(&vert_up_elem, v, w);
        let fitted = if interior {
            fit_linear(old, dim, tag, &donors)
        } else {
            None
        };

        for (slot, &p) in parents.iter().enumerate() {
            if !donors.contains(&p) {
                continue;
            }
            let values = match &fitted {
                Some(coeffs) => evaluate_at_centroid(new, dim, slot, coeffs),
                None => {
                    let rows: Vec<Vec<f64>> = donors.iter().map(|&d| tag.row(d).to_vec()).collect();
                    let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
                    cavity_average(&refs, ncomps)
                }
            };
            data[slot * ncomps..(slot + 1) * ncomps].copy_from_slice(&values);
        }
    }
    data
}

fn centroid_of(mesh: &Mesh, dim: Dimension, verts: &[usize]) -> Vec<f64> {
    let space_dim = mesh.space_dim();
    let mut c = vec![0.0f64; space_dim];
    for &v in verts {
        let coords = mesh.coords(v);
        for i in 0..space_dim {
            c[i] += coords[i];
        }
    }
    let n = dim.nverts() as f64;
    for x in &mut c {
        *x /= n;
    }
    c
}

/// Fit one linear polynomial per component: `f(x) = coeffs[c][0] + coeffs[c][1..] . x`.
/// Returns `None` if there are fewer donors than unknowns (space_dim + 1).
fn fit_linear(mesh: &Mesh, dim: Dimension, tag: &Tag, donors: &[usize]) -> Option<Vec<Vec<f64>>> {
    let space_dim = mesh.space_dim();
    let ncols = space_dim + 1;
    if donors.len() < ncols {
        return None;
    }
    let mut a = DMatrix::<f64>::zeros(donors.len(), ncols);
    for (row, &d) in donors.iter().enumerate() {
        let centroid = centroid_of(mesh, dim, mesh.ask_down(dim, d));
        a[(row, 0)] = 1.0;
        for col in 0..space_dim {
            a[(row, col + 1)] = centroid[col];
        }
    }
    let qr = a.clone().qr();
    let mut out = Vec::with_capacity(tag.ncomps);
    for c in 0..tag.ncomps {
        let b = DVector::from_iterator(donors.len(), donors.iter().map(|&d| tag.component(d, c)));
        match qr.solve(&b) {
            Some(x) => out.push(x.iter().copied().collect()),
            None => return None,
        }
    }
    Some(out)
}

fn evaluate_at_centroid(new: &Mesh, dim: Dimension, new_entity: usize, coeffs: &[Vec<f64>]) -> Vec<f64> {
    let centroid = centroid_of(new, dim, new.ask_down(dim, new_entity));
    coeffs
        .iter()
        .map(|c| c[0] + c[1..].iter().zip(&centroid).map(|(a, b)| a * b).sum::<f64>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_examples::grid_isotropic;

    #[test]
    fn collapses_a_short_edge() {
        let mesh = grid_isotropic(4, 0.1);
        let cfg = AdaptConfig { coarsen_below: 100.0, ..Default::default() };
        let (coarsened, changed) = coarsen_by_size(&mesh, &cfg);
        assert!(changed);
        assert!(coarsened.nents(Dimension::Vert) < mesh.nents(Dimension::Vert));
    }

    #[test]
    fn no_candidates_leaves_mesh_unchanged() {
        let mesh = grid_isotropic(4, 1.0);
        let cfg = AdaptConfig { coarsen_below: 0.01, ..Default::default() };
        let (_, changed) = coarsen_by_size(&mesh, &cfg);
        assert!(!changed);
    }

    #[test]
    fn conserve_tag_keeps_total_value_times_volume() {
        let mut mesh = grid_isotropic(4, 0.1);
        let data = vec![3.0; mesh.nents(Dimension::Tri)];
        let tag = Tag::new(TagData::F64(data), 1, TransferPolicy::Conserve, true).unwrap();
        mesh.add_tag(Dimension::Tri, "density", tag).unwrap();

        let before: f64 = (0..mesh.nents(Dimension::Tri))
            .map(|e| element_volume(&mesh, Dimension::Tri, mesh.ask_down(Dimension::Tri, e)) * 3.0)
            .sum();

        let cfg = AdaptConfig { coarsen_below: 100.0, ..Default::default() };
        let (coarsened, changed) = coarsen_by_size(&mesh, &cfg);
        assert!(changed);

        let tag = coarsened.get_tag(Dimension::Tri, "density").unwrap();
        let after: f64 = (0..coarsened.nents(Dimension::Tri))
            .map(|e| element_volume(&coarsened, Dimension::Tri, coarsened.ask_down(Dimension::Tri, e)) * tag.component(e, 0))
            .sum();
        assert!((before - after).abs() < 1e-6 * before);
    }

    #[test]
    fn surviving_mesh_has_no_dangling_vertex_references() {
        let mesh = grid_isotropic(4, 0.1);
        let cfg = AdaptConfig { coarsen_below: 100.0, ..Default::default() };
        let (coarsened, changed) = coarsen_by_size(&mesh, &cfg);
        assert!(changed);
        for &v in coarsened.verts_of(Dimension::Tri) {
            assert!(v < coarsened.nents(Dimension::Vert));
        }
    }
}
