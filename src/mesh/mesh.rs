//! The `Mesh` aggregate (spec.md §3): per-dimension entity counts,
//! downward connectivity, lazily-cached upward adjacency, and tags.
//! Operators never mutate a `Mesh` in place; they build and return a new
//! one (spec.md §3 "Ownership").

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::adjacency::{build_upward, down_template, Csr};
use super::classify::{classify_elements, Classifier, SelfClassifier, CLASS_DIM_TAG, CLASS_ID_TAG};
use super::dimension::Dimension;
use super::tag::{Tag, TagData, TransferPolicy};
use crate::algebra::{Vec2, Vec3};
use crate::error::{AdaptError, Result};
use crate::metric::Metric;

pub const METRIC_TAG: &str = "metric";

/// An unstructured simplex mesh of topological dimension 2 (triangles) or
/// 3 (tetrahedra), embedded in Euclidean space of the same dimension.
///
/// `verts_of[d]` for `d` below `dim` stores each entity's vertices in
/// ascending order (a canonical key for upward-adjacency hashing);
/// `verts_of[dim]`, the mesh's own elements, keeps the orientation given
/// at construction, since element quality and signed volume depend on it.
#[derive(Debug, Clone)]
pub struct Mesh {
    dim: Dimension,
    space_dim: usize,
    nents: [usize; 4],
    verts_of: [Vec<usize>; 4],
    tags: [BTreeMap<String, Tag>; 4],
    #[allow(clippy::type_complexity)]
    adjacency: RefCell<FxHashMap<(Dimension, Dimension), Rc<Csr>>>,
}

fn idx(d: Dimension) -> usize {
    u8::from(d) as usize
}

impl Mesh {
    /// Build a mesh from its top-dimension connectivity and vertex
    /// coordinates, deriving edges (and faces, in 3D) by enumerating and
    /// deduplicating subentities the way the teacher's
    /// `compute_submesh` does: a sorted-vertex-tuple hash set discovers
    /// each new subentity exactly once, in first-seen order.
    pub fn new(
        dim: Dimension,
        space_dim: usize,
        coords: Vec<f64>,
        verts_of_top: Vec<usize>,
    ) -> Result<Mesh> {
        if dim != Dimension::Tri && dim != Dimension::Tet {
            return Err(AdaptError::precondition(
                "Mesh::new",
                "top dimension must be Tri or Tet",
            ));
        }
        if space_dim != idx(dim) + 1 {
            return Err(AdaptError::precondition(
                "Mesh::new",
                format!("space_dim {space_dim} inconsistent with top dimension {dim:?}"),
            ));
        }
        if coords.len() % space_dim != 0 {
            return Err(AdaptError::precondition(
                "Mesh::new",
                "coords length is not a multiple of space_dim",
            ));
        }
        let nverts = coords.len() / space_dim;
        let top_n = dim.nverts();
        if verts_of_top.len() % top_n != 0 {
            return Err(AdaptError::precondition(
                "Mesh::new",
                "verts_of_top length is not a multiple of the top entity's vertex count",
            ));
        }
        if verts_of_top.iter().any(|&v| v >= nverts) {
            return Err(AdaptError::precondition(
                "Mesh::new",
                "verts_of_top references a vertex index out of range",
            ));
        }
        let nents_top = verts_of_top.len() / top_n;

        let mut nents = [0usize; 4];
        let mut verts_of: [Vec<usize>; 4] = Default::default();
        nents[idx(Dimension::Vert)] = nverts;
        nents[idx(dim)] = nents_top;
        verts_of[idx(dim)] = verts_of_top;

        if dim == Dimension::Tet {
            let faces = derive_entities(Dimension::Tet, Dimension::Tri, &verts_of[idx(Dimension::Tet)], nents_top);
            nents[idx(Dimension::Tri)] = faces.len() / Dimension::Tri.nverts();
            verts_of[idx(Dimension::Tri)] = faces;
        }
        let edge_source_dim = dim;
        let edges = derive_entities(
            edge_source_dim,
            Dimension::Edge,
            &verts_of[idx(edge_source_dim)],
            nents[idx(edge_source_dim)],
        );
        nents[idx(Dimension::Edge)] = edges.len() / Dimension::Edge.nverts();
        verts_of[idx(Dimension::Edge)] = edges;

        let mut tags: [BTreeMap<String, Tag>; 4] = Default::default();
        let coords_tag = Tag::new(TagData::F64(coords), space_dim, TransferPolicy::Inherit, true)?;
        tags[idx(Dimension::Vert)].insert("coordinates".to_string(), coords_tag);

        let (dim_tag, id_tag) = classify_elements(&SelfClassifier, dim, nents_top);
        tags[idx(dim)].insert(CLASS_DIM_TAG.to_string(), dim_tag);
        tags[idx(dim)].insert(CLASS_ID_TAG.to_string(), id_tag);

        Ok(Mesh {
            dim,
            space_dim,
            nents,
            verts_of,
            tags,
            adjacency: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn dim(&self) -> Dimension {
        self.dim
    }

    pub fn space_dim(&self) -> usize {
        self.space_dim
    }

    pub fn nents(&self, d: Dimension) -> usize {
        self.nents[idx(d)]
    }

    pub fn verts_of(&self, d: Dimension) -> &[usize] {
        &self.verts_of[idx(d)]
    }

    pub fn ask_down(&self, d: Dimension, entity: usize) -> &[usize] {
        let n = d.nverts();
        &self.verts_of[idx(d)][entity * n..(entity + 1) * n]
    }

    /// Upward adjacency from `low` to `high`, computed once and cached.
    /// Per spec.md §3's single-writer-gate ownership note, this panics
    /// loudly on reentrant borrow rather than racing; the driver is
    /// single-threaded, so reentrancy would mean a bug, not contention.
    pub fn ask_up(&self, low: Dimension, high: Dimension) -> Rc<Csr> {
        if let Some(csr) = self.adjacency.borrow().get(&(low, high)) {
            return csr.clone();
        }
        let csr = Rc::new(build_upward(
            high,
            low,
            self.verts_of(high),
            self.nents(high),
            self.verts_of(low),
            self.nents(low),
        ));
        self.adjacency.borrow_mut().insert((low, high), csr.clone());
        csr
    }

    pub fn coords(&self, vertex: usize) -> &[f64] {
        self.tags[idx(Dimension::Vert)]["coordinates"].row(vertex)
    }

    pub fn coords2(&self, vertex: usize) -> Vec2 {
        let c = self.coords(vertex);
        Vec2::new(c[0], c[1])
    }

    pub fn coords3(&self, vertex: usize) -> Vec3 {
        let c = self.coords(vertex);
        Vec3::new(c[0], c[1], c[2])
    }

    pub fn add_tag(&mut self, d: Dimension, name: &str, tag: Tag) -> Result<()> {
        if tag.nents() != self.nents(d) {
            return Err(AdaptError::precondition(
                "add_tag",
                format!(
                    "tag {name} has {} entities, mesh has {} at dimension {d:?}",
                    tag.nents(),
                    self.nents(d)
                ),
            ));
        }
        self.tags[idx(d)].insert(name.to_string(), tag);
        Ok(())
    }

    pub fn get_tag(&self, d: Dimension, name: &str) -> Option<&Tag> {
        self.tags[idx(d)].get(name)
    }

    pub fn set_tag(&mut self, d: Dimension, name: &str, tag: Tag) -> Result<()> {
        if !self.tags[idx(d)].contains_key(name) {
            return Err(AdaptError::precondition(
                "set_tag",
                format!("no existing tag named {name} at dimension {d:?}"),
            ));
        }
        self.add_tag(d, name, tag)
    }

    pub fn remove_tag(&mut self, d: Dimension, name: &str) -> Option<Tag> {
        self.tags[idx(d)].remove(name)
    }

    pub fn ntags(&self, d: Dimension) -> usize {
        self.tags[idx(d)].len()
    }

    pub fn tag_names(&self, d: Dimension) -> impl Iterator<Item = &str> {
        self.tags[idx(d)].keys().map(String::as_str)
    }

    /// The metric tensor at a vertex, reconstructed from the `"metric"`
    /// tag's compact storage (spec.md §3).
    pub fn metric_at(&self, vertex: usize) -> Metric {
        let tag = self.tags[idx(Dimension::Vert)]
            .get(METRIC_TAG)
            .expect("mesh has no metric tag registered");
        Metric::from_compact(tag.row(vertex))
    }

    pub fn has_metric(&self) -> bool {
        self.tags[idx(Dimension::Vert)].contains_key(METRIC_TAG)
    }

    pub fn class_dim(&self, d: Dimension, entity: usize) -> i8 {
        match &self.tags[idx(d)][CLASS_DIM_TAG].data {
            TagData::I8(v) => v[entity],
            _ => unreachable!("class_dim tag is always I8"),
        }
    }

    pub fn class_id(&self, d: Dimension, entity: usize) -> i32 {
        match &self.tags[idx(d)][CLASS_ID_TAG].data {
            TagData::I32(v) => v[entity],
            _ => unreachable!("class_id tag is always I32"),
        }
    }

    pub fn apply_classifier(&mut self, d: Dimension, classifier: &dyn Classifier) {
        let (dim_tag, id_tag) = classify_elements(classifier, d, self.nents(d));
        self.tags[idx(d)].insert(CLASS_DIM_TAG.to_string(), dim_tag);
        self.tags[idx(d)].insert(CLASS_ID_TAG.to_string(), id_tag);
    }
}

fn derive_entities(high: Dimension, low: Dimension, verts_of_high: &[usize], nents_high: usize) -> Vec<usize> {
    let high_n = high.nverts();
    let templates = down_template(high, low);
    let mut seen: FxHashSet<SmallVec<[usize; 4]>> = FxHashSet::default();
    let mut out = Vec::new();
    for h in 0..nents_high {
        let verts = &verts_of_high[h * high_n..(h + 1) * high_n];
        for template in &templates {
            let mut key: SmallVec<[usize; 4]> = template.iter().map(|&li| verts[li]).collect();
            key.sort_unstable();
            if seen.insert(key.clone()) {
                out.extend_from_slice(&key);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_triangle() -> Mesh {
        let coords = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        Mesh::new(Dimension::Tri, 2, coords, vec![0, 1, 2]).unwrap()
    }

    #[test]
    fn derives_three_edges_from_one_triangle() {
        let m = one_triangle();
        assert_eq!(m.nents(Dimension::Vert), 3);
        assert_eq!(m.nents(Dimension::Edge), 3);
        assert_eq!(m.nents(Dimension::Tri), 1);
    }

    #[test]
    fn ask_up_from_vert_to_tri_sees_all_three_vertices() {
        let m = one_triangle();
        let csr = m.ask_up(Dimension::Vert, Dimension::Tri);
        for v in 0..3 {
            assert_eq!(csr.degree(v), 1);
            assert_eq!(csr.adjacent(v), &[0]);
        }
    }

    #[test]
    fn rejects_out_of_range_vertex_reference() {
        let coords = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        assert!(Mesh::new(Dimension::Tri, 2, coords, vec![0, 1, 5]).is_err());
    }

    #[test]
    fn tag_round_trips_through_add_get() {
        let mut m = one_triangle();
        let tag = Tag::new(TagData::F64(vec![1.0]), 1, TransferPolicy::Quality, true).unwrap();
        m.add_tag(Dimension::Tri, "quality", tag).unwrap();
        assert_eq!(m.get_tag(Dimension::Tri, "quality").unwrap().row(0), &[1.0]);
    }
}
