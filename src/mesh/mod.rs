mod adjacency;
mod classify;
mod dimension;
#[allow(clippy::module_inception)]
mod mesh;
mod tag;

pub use adjacency::{down_template, rotation, which_down, Csr};
pub use classify::{classify_elements, Classifier, SelfClassifier, CLASS_DIM_TAG, CLASS_ID_TAG};
pub use dimension::Dimension;
pub use mesh::{Mesh, METRIC_TAG};
pub use tag::{Tag, TagData, TransferPolicy};
