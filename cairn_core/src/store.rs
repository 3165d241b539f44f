use crate::node::NodeDecodeError;

/// Errors returned by [`DagService`](crate::DagService) and
/// [`Datastore`](crate::Datastore) implementations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The requested node or key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored bytes could not be decoded back into a node.
    #[error("corrupt node: {0}")]
    Decode(#[from] NodeDecodeError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;
