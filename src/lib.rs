//! Anisotropic local mesh adaptation (refine / coarsen / swap) for 2D and
//! 3D unstructured simplex meshes, driven by a per-vertex metric field.
//!
//! A [`mesh::Mesh`] is built once from connectivity and coordinates, then
//! carries per-entity [`mesh::Tag`]s (including a `"metric"` tag read by
//! every operator). [`adapt::adapt`] drives [`ops::refine_by_size`],
//! [`ops::coarsen_by_size`] and [`ops::swap_edges`] to convergence; each
//! operator can also be called on its own for finer control over a single
//! pass.

pub mod adapt;
pub mod algebra;
pub mod cavity;
pub mod config;
pub mod error;
pub mod kernel;
pub mod metric;
pub mod mesh;
pub mod ops;
pub mod quality;
pub mod transfer;

/// Small regression meshes shared by this crate's own tests and by
/// `tests/adaptation.rs`. Not meant as a stable public API, but left
/// unconditionally public (rather than `#[cfg(test)]`-gated) since an
/// integration test is a separate crate and cannot see a `cfg(test)` item.
pub mod mesh_examples;

pub use adapt::{adapt, adapt_pass};
pub use config::AdaptConfig;
pub use error::{AdaptError, Result};
pub use mesh::{Dimension, Mesh};
