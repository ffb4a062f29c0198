/// Errors returned at the few entry points that validate caller input:
/// tag registration, mesh construction, and the partition-safety check a
/// distributed operator must pass before committing.
///
/// Interior kernel code never returns these: per spec.md §7, a kernel
/// callback has no channel to propagate a recoverable error, so the same
/// class of violation (non-finite input, non-positive determinant, missing
/// tag) is a `panic!` once it is found deep inside an operator rather than
/// at a boundary that already validated it.
#[derive(Debug, thiserror::Error)]
pub enum AdaptError {
    #[error("precondition violated for {what}: {detail}")]
    Precondition { what: String, detail: String },

    #[error("partition safety violated: {0}")]
    PartitionUnsafe(String),
}

impl AdaptError {
    pub fn precondition(what: impl Into<String>, detail: impl Into<String>) -> Self {
        AdaptError::Precondition {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AdaptError>;
