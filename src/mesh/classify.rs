//! Geometric classification (spec.md §3, §6): which model entity a mesh
//! entity sits on. Stored as two parallel tags (`"class_dim"`, `"class_id"`)
//! so they ride the ordinary tag machinery with `TransferPolicy::Inherit`.
//!
//! `classify_by_angles` is deliberately not implemented here — spec.md §1
//! names angle-based classification an external collaborator. The
//! [`Classifier`] trait is the seam a caller would plug one into; this
//! crate ships [`classify_elements`], the one classification rule the
//! adaptation operators themselves depend on (an element's interior is
//! classified onto itself).

use super::dimension::Dimension;
use super::tag::{Tag, TagData, TransferPolicy};

pub const CLASS_DIM_TAG: &str = "class_dim";
pub const CLASS_ID_TAG: &str = "class_id";

/// A pluggable source of geometric classification, e.g. a dihedral-angle
/// classifier run once up front on an input mesh boundary.
pub trait Classifier {
    /// Returns `(class_dim, class_id)` for every entity of `dim`, or `None`
    /// if this classifier does not assign classification at that
    /// dimension.
    fn classify(&self, dim: Dimension, nents: usize) -> Option<(Vec<i8>, Vec<i32>)>;
}

/// The trivial classifier: every entity is classified onto a model entity
/// of its own dimension, numbered by its own index. Used by test meshes
/// that have no real geometric model.
pub struct SelfClassifier;

impl Classifier for SelfClassifier {
    fn classify(&self, dim: Dimension, nents: usize) -> Option<(Vec<i8>, Vec<i32>)> {
        let class_dim = vec![u8::from(dim) as i8; nents];
        let class_id: Vec<i32> = (0..nents as i32).collect();
        Some((class_dim, class_id))
    }
}

/// Build the `class_dim`/`class_id` tag pair for `nents` entities of `dim`
/// from a classifier, defaulting any dimension the classifier declines to
/// the self-classification rule above.
pub fn classify_elements(
    classifier: &dyn Classifier,
    dim: Dimension,
    nents: usize,
) -> (Tag, Tag) {
    let (class_dim, class_id) = classifier
        .classify(dim, nents)
        .unwrap_or_else(|| SelfClassifier.classify(dim, nents).unwrap());

    let dim_tag = Tag::new(
        TagData::I8(class_dim),
        1,
        TransferPolicy::Inherit,
        true,
    )
    .expect("class_dim tag length matches nents");
    let id_tag = Tag::new(TagData::I32(class_id), 1, TransferPolicy::Inherit, true)
        .expect("class_id tag length matches nents");
    (dim_tag, id_tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_classifier_numbers_entities_by_index() {
        let (dim_tag, id_tag) = classify_elements(&SelfClassifier, Dimension::Tri, 3);
        assert_eq!(dim_tag.data, TagData::I8(vec![2, 2, 2]));
        assert_eq!(id_tag.data, TagData::I32(vec![0, 1, 2]));
    }
}
