//! Per-entity field arrays and their declared transfer semantics
//! (spec.md §3, §4.8). Mirrors the teacher's `ElementBlockBase::fields:
//! BTreeMap<String, ArrayBase<...>>`, generalized from "always `f64`" to
//! the four element types a tag may carry.

use crate::error::{AdaptError, Result};

/// How an operator must populate a tag's values on the entities it
/// creates (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPolicy {
    /// Drop the tag on new entities; never copied.
    DontTransfer,
    /// Copy verbatim from the parent entity (classification, element
    /// ownership).
    Inherit,
    /// Barycentric/linear interpolation from the cavity's boundary
    /// vertices.
    LinearInterp,
    /// Like `LinearInterp`, but resolved through metric intersection
    /// rather than linear averaging (the tag holds a metric tensor).
    Metric,
    /// Recomputed from geometry after the operator commits (edge length).
    Length,
    /// Recomputed from geometry after the operator commits (element
    /// quality).
    Quality,
    /// Cavity-local polynomial fit at interior vertices, arithmetic mean
    /// at the boundary (spec.md §4.6).
    Pointwise,
    /// Volume-weighted donor/product redistribution (spec.md §4.8).
    Conserve,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagData {
    I8(Vec<i8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F64(Vec<f64>),
}

impl TagData {
    pub fn len(&self) -> usize {
        match self {
            TagData::I8(v) => v.len(),
            TagData::I32(v) => v.len(),
            TagData::I64(v) => v.len(),
            TagData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            TagData::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64_mut(&mut self) -> Option<&mut Vec<f64>> {
        match self {
            TagData::F64(v) => Some(v),
            _ => None,
        }
    }
}

/// One named, typed, per-entity array with a declared transfer policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub data: TagData,
    pub ncomps: usize,
    pub policy: TransferPolicy,
    /// Whether the driver should carry this tag into a reported result
    /// mesh, vs. an internal bookkeeping tag (e.g. quality caches).
    pub output: bool,
}

impl Tag {
    pub fn new(data: TagData, ncomps: usize, policy: TransferPolicy, output: bool) -> Result<Tag> {
        if ncomps == 0 {
            return Err(AdaptError::precondition("tag", "ncomps must be nonzero"));
        }
        if data.len() % ncomps != 0 {
            return Err(AdaptError::precondition(
                "tag",
                format!("data length {} is not a multiple of ncomps {}", data.len(), ncomps),
            ));
        }
        Ok(Tag { data, ncomps, policy, output })
    }

    pub fn nents(&self) -> usize {
        self.data.len() / self.ncomps
    }

    pub fn component(&self, entity: usize, comp: usize) -> f64 {
        let slice = self
            .data
            .as_f64()
            .expect("Tag::component is only defined for F64 tags");
        slice[entity * self.ncomps + comp]
    }

    pub fn row(&self, entity: usize) -> &[f64] {
        let slice = self.data.as_f64().expect("Tag::row is only defined for F64 tags");
        &slice[entity * self.ncomps..(entity + 1) * self.ncomps]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_not_multiple_of_ncomps() {
        let err = Tag::new(TagData::F64(vec![1.0, 2.0, 3.0]), 2, TransferPolicy::Inherit, true);
        assert!(err.is_err());
    }

    #[test]
    fn row_slices_by_ncomps() {
        let tag = Tag::new(
            TagData::F64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            3,
            TransferPolicy::Metric,
            true,
        )
        .unwrap();
        assert_eq!(tag.nents(), 2);
        assert_eq!(tag.row(1), &[4.0, 5.0, 6.0]);
    }
}
