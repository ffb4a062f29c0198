//! Edge refinement by bisection (spec.md §4.5).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::algebra::{Vec2, Vec3};
use crate::cavity::select_independent_set;
use crate::config::AdaptConfig;
use crate::mesh::{Dimension, Mesh, Tag, TagData, TransferPolicy};
use crate::metric::Metric;
use crate::quality::{element_quality, metric_edge_length};
use crate::transfer::{linear_interp, metric_interp, polygon_area, CavityVolumeIntersector, VolumeIntersector};

/// Bisect every edge longer than `cfg.refine_above` whose cavity does not
/// conflict with a longer candidate, one pass. Returns the candidate
/// (possibly unchanged) mesh and whether anything changed.
pub fn refine_by_size(mesh: &Mesh, cfg: &AdaptConfig) -> (Mesh, bool) {
    let dim = mesh.dim();
    let edge_up = mesh.ask_up(Dimension::Edge, dim);

    let candidates: Vec<usize> = (0..mesh.nents(Dimension::Edge))
        .filter(|&e| metric_edge_length(mesh, e) > cfg.refine_above)
        .collect();
    if candidates.is_empty() {
        return (mesh.clone(), false);
    }

    let domain_of = |e: &usize| edge_up.adjacent(*e).to_vec();
    let priority = |e: &usize| metric_edge_length(mesh, *e);
    let accepted = select_independent_set(&candidates, priority, domain_of);
    if accepted.is_empty() {
        return (mesh.clone(), false);
    }

    let nverts_old = mesh.nents(Dimension::Vert);
    let space_dim = mesh.space_dim();
    let mut new_coords: Vec<f64> = (0..nverts_old).flat_map(|v| mesh.coords(v).to_vec()).collect();

    let mut edge_to_mid: FxHashMap<usize, usize> = FxHashMap::default();
    for (i, &e) in accepted.iter().enumerate() {
        let verts = mesh.ask_down(Dimension::Edge, e);
        let (a, b) = (verts[0], verts[1]);
        let mid = if space_dim == 2 {
            let ca = mesh.coords2(a);
            let cb = mesh.coords2(b);
            let m = (ca + cb) * 0.5;
            vec![m.x, m.y]
        } else {
            let ca = mesh.coords3(a);
            let cb = mesh.coords3(b);
            let m: Vec3 = (ca + cb) * 0.5;
            vec![m.x, m.y, m.z]
        };
        new_coords.extend(mid);
        edge_to_mid.insert(e, nverts_old + i);
    }

    let mut elem_to_edge: FxHashMap<usize, usize> = FxHashMap::default();
    for &e in &accepted {
        for &el in edge_up.adjacent(e) {
            elem_to_edge.insert(el, e);
        }
    }

    let top_n = dim.nverts();
    let mut new_top_verts: Vec<usize> = Vec::new();
    // For each new element: its parent old element and, for CONSERVE, its
    // fractional share of the parent's volume (1.0 for untouched, 0.5 for
    // a bisected child — refine's bisection template always halves it
    // exactly, see crate::quality tests).
    let mut parents: Vec<usize> = Vec::new();

    for elem in 0..mesh.nents(dim) {
        let verts = mesh.ask_down(dim, elem).to_vec();
        match elem_to_edge.get(&elem) {
            None => {
                new_top_verts.extend(&verts);
                parents.push(elem);
            }
            Some(&e) => {
                let edge_verts = mesh.ask_down(Dimension::Edge, e);
                let (a, b) = (edge_verts[0], edge_verts[1]);
                let m = edge_to_mid[&e];
                let ia = verts.iter().position(|&v| v == a).unwrap();
                let ib = verts.iter().position(|&v| v == b).unwrap();
                let mut child1 = verts.clone();
                child1[ib] = m;
                let mut child2 = verts;
                child2[ia] = m;
                new_top_verts.extend(&child1);
                parents.push(elem);
                new_top_verts.extend(&child2);
                parents.push(elem);
            }
        }
    }
    debug_assert_eq!(new_top_verts.len() / top_n, parents.len());

    let mut new_mesh = Mesh::new(dim, space_dim, new_coords, new_top_verts)
        .expect("refine_by_size: rebuilt mesh must be internally consistent");

    transfer_vertex_tags(mesh, &mut new_mesh, nverts_old, &accepted);
    transfer_element_tags(mesh, &mut new_mesh, dim, &parents);
    transfer_edge_tags(mesh, &mut new_mesh, &accepted, &edge_to_mid);

    (new_mesh, true)
}

fn transfer_vertex_tags(old: &Mesh, new: &mut Mesh, nverts_old: usize, accepted: &[usize]) {
    let names: Vec<String> = old
        .tag_names(Dimension::Vert)
        .filter(|n| *n != "coordinates")
        .map(str::to_string)
        .collect();
    for name in names {
        let tag = old.get_tag(Dimension::Vert, &name).unwrap().clone();
        if tag.policy == TransferPolicy::DontTransfer {
            continue;
        }
        let nverts_new = new.nents(Dimension::Vert);
        match tag.policy {
            TransferPolicy::Metric => {
                let mut compact: Vec<f64> = Vec::with_capacity(nverts_new * tag.ncomps);
                for v in 0..nverts_old {
                    compact.extend_from_slice(tag.row(v));
                }
                for &e in accepted {
                    let verts = old.ask_down(Dimension::Edge, e);
                    let ma = Metric::from_compact(tag.row(verts[0]));
                    let mb = Metric::from_compact(tag.row(verts[1]));
                    compact.extend(metric_interp(&ma, &mb).to_compact());
                }
                let new_tag = Tag::new(TagData::F64(compact), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(Dimension::Vert, &name, new_tag).unwrap();
            }
            _ => {
                // LINEAR_INTERP (and the INHERIT fallback noted in
                // DESIGN.md) both reduce to the midpoint mean here.
                let ncomps = tag.ncomps;
                let mut data: Vec<f64> = Vec::with_capacity(nverts_new * ncomps);
                for v in 0..nverts_old {
                    data.extend_from_slice(tag.row(v));
                }
                for &e in accepted {
                    let verts = old.ask_down(Dimension::Edge, e);
                    let interp = linear_interp(tag.row(verts[0]), tag.row(verts[1]));
                    data.extend(interp);
                }
                let new_tag = Tag::new(TagData::F64(data), ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(Dimension::Vert, &name, new_tag).unwrap();
            }
        }
    }
}

fn transfer_element_tags(old: &Mesh, new: &mut Mesh, dim: Dimension, parents: &[usize]) {
    for name in [crate::mesh::CLASS_DIM_TAG, crate::mesh::CLASS_ID_TAG] {
        if let Some(tag) = old.get_tag(dim, name) {
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
    }

    for name in other_tag_names(old, dim) {
        let tag = old.get_tag(dim, &name).unwrap().clone();
        match tag.policy {
            TransferPolicy::DontTransfer => {}
            TransferPolicy::Quality => {
                let data: Vec<f64> = (0..new.nents(dim)).map(|e| element_quality(new, dim, e)).collect();
                let new_tag = Tag::new(TagData::F64(data), 1, tag.policy, tag.output).unwrap();
                new.add_tag(dim, &name, new_tag).unwrap();
            }
            TransferPolicy::Inherit | TransferPolicy::Pointwise => {
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
                let ncomps = tag.ncomps;
                let mut children_of: FxHashMap<usize, usize> = FxHashMap::default();
                for &p in parents {
                    *children_of.entry(p).or_insert(0) += 1;
                }
                let mut data = Vec::with_capacity(parents.len() * ncomps);
                for (slot, &p) in parents.iter().enumerate() {
                    let ratio = conserve_ratio(old, new, dim, p, slot, children_of[&p]);
                    for c in 0..ncomps {
                        data.push(tag.component(p, c) * ratio);
                    }
                }
                let new_tag = Tag::new(TagData::F64(data), ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(dim, &name, new_tag).unwrap();
            }
            _ => {}
        }
    }
}

fn poly2(mesh: &Mesh, verts: &[usize]) -> Vec<Vec2> {
    verts.iter().map(|&v| mesh.coords2(v)).collect()
}

/// `CONSERVE`'s per-child fractional share of its parent's volume (spec.md
/// §4.8): computed from a real donor/product overlap in 2D via
/// [`CavityVolumeIntersector`] (exact here, since a bisected child is
/// always a sub-triangle of its parent). The 3D split fraction is instead
/// the analytically exact 0.5 — bisecting one edge at its midpoint always
/// halves a tet's volume exactly, since the two new apexes are equidistant
/// from the cutting plane through the midpoint — rather than the
/// intersector's shared-vertex volume estimate, which is not precise
/// enough to reproduce that exact split.
fn conserve_ratio(old: &Mesh, new: &Mesh, dim: Dimension, parent_idx: usize, slot: usize, children_of_parent: usize) -> f64 {
    match dim {
        Dimension::Tri => {
            let donor = poly2(old, old.ask_down(dim, parent_idx));
            let donor_area = polygon_area(&donor);
            if donor_area < 1e-300 {
                return 1.0;
            }
            let product = poly2(new, new.ask_down(dim, slot));
            let intersector = CavityVolumeIntersector;
            intersector.intersect_area(&donor, &product) / donor_area
        }
        Dimension::Tet => {
            if children_of_parent == 1 {
                1.0
            } else {
                0.5
            }
        }
        _ => unreachable!("refine only operates on a Tri or Tet mesh"),
    }
}

fn other_tag_names(mesh: &Mesh, dim: Dimension) -> Vec<String> {
    mesh.tag_names(dim)
        .filter(|n| *n != crate::mesh::CLASS_DIM_TAG && *n != crate::mesh::CLASS_ID_TAG)
        .map(str::to_string)
        .collect()
}

fn transfer_edge_tags(
    old: &Mesh,
    new: &mut Mesh,
    accepted: &[usize],
    edge_to_mid: &FxHashMap<usize, usize>,
) {
    let accepted_set: FxHashSet<usize> = accepted.iter().copied().collect();
    let names: Vec<String> = old.tag_names(Dimension::Edge).map(str::to_string).collect();
    let new_edge_key: FxHashMap<[usize; 2], usize> = (0..new.nents(Dimension::Edge))
        .map(|e| {
            let v = new.ask_down(Dimension::Edge, e);
            ([v[0], v[1]], e)
        })
        .collect();

    for name in names {
        let tag = old.get_tag(Dimension::Edge, &name).unwrap().clone();
        match tag.policy {
            TransferPolicy::DontTransfer => {}
            TransferPolicy::Length => {
                let data: Vec<f64> = (0..new.nents(Dimension::Edge))
                    .map(|e| crate::quality::metric_edge_length(new, e))
                    .collect();
                let new_tag = Tag::new(TagData::F64(data), 1, tag.policy, tag.output).unwrap();
                new.add_tag(Dimension::Edge, &name, new_tag).unwrap();
            }
            TransferPolicy::Inherit => {
                let mut data = vec![0.0f64; new.nents(Dimension::Edge) * tag.ncomps];
                for old_e in 0..old.nents(Dimension::Edge) {
                    if accepted_set.contains(&old_e) {
                        continue;
                    }
                    let v = old.ask_down(Dimension::Edge, old_e);
                    if let Some(&new_e) = new_edge_key.get(&[v[0], v[1]]) {
                        data[new_e * tag.ncomps..(new_e + 1) * tag.ncomps].copy_from_slice(tag.row(old_e));
                    }
                }
                for &e in accepted {
                    let m = edge_to_mid[&e];
                    let verts = old.ask_down(Dimension::Edge, e);
                    for key in [[verts[0].min(m), verts[0].max(m)], [verts[1].min(m), verts[1].max(m)]] {
                        if let Some(&new_e) = new_edge_key.get(&key) {
                            data[new_e * tag.ncomps..(new_e + 1) * tag.ncomps].copy_from_slice(tag.row(e));
                        }
                    }
                }
                let new_tag = Tag::new(TagData::F64(data), tag.ncomps, tag.policy, tag.output).unwrap();
                new.add_tag(Dimension::Edge, &name, new_tag).unwrap();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_examples::unit_square_isotropic;

    #[test]
    fn bisects_a_single_long_edge() {
        let mesh = unit_square_isotropic();
        let cfg = AdaptConfig { refine_above: 1.5, ..Default::default() };
        let (refined, changed) = refine_by_size(&mesh, &cfg);
        assert!(changed);
        assert!(refined.nents(Dimension::Vert) > mesh.nents(Dimension::Vert));
        assert!(refined.nents(Dimension::Tri) >= mesh.nents(Dimension::Tri));
    }

    #[test]
    fn no_candidates_leaves_mesh_unchanged() {
        let mesh = unit_square_isotropic();
        let cfg = AdaptConfig { refine_above: 100.0, ..Default::default() };
        let (_, changed) = refine_by_size(&mesh, &cfg);
        assert!(!changed);
    }

    #[test]
    fn new_midpoint_coordinates_are_exact_midpoints() {
        let mesh = unit_square_isotropic();
        let cfg = AdaptConfig { refine_above: 1.0, ..Default::default() };
        let (refined, changed) = refine_by_size(&mesh, &cfg);
        assert!(changed);
        assert!(refined.nents(Dimension::Vert) >= mesh.nents(Dimension::Vert) + 1);
    }
}
