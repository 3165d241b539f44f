use cairn_core::{Cid, CidError, NodeDecodeError, StoreError};

use crate::header::HeaderError;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum PinError {
    #[error("invalid pin-set node: {0}")]
    Format(#[from] HeaderError),

    #[error("invalid pin root: {0}")]
    Decode(#[from] NodeDecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot pin {root} recursively: descendant {missing} is unavailable")]
    UnresolvedDescendant { root: Cid, missing: Cid },

    #[error("no link found with name {0:?}")]
    MissingLink(String),

    #[error("invalid path {0:?}")]
    InvalidPath(String),

    #[error("invalid content identifier {input:?}: {source}")]
    InvalidCid {
        input: String,
        #[source]
        source: CidError,
    },

    #[error("no link named {name} under {parent}")]
    NoSuchLink { name: String, parent: Cid },

    #[error("{0} already pinned recursively")]
    AlreadyRecursive(Cid),

    #[error("{0} is not pinned")]
    NotPinned(Cid),

    #[error("{0} is pinned recursively")]
    PinnedRecursively(Cid),

    #[error("{cid} is pinned indirectly under {ancestor}")]
    PinnedIndirectly { cid: Cid, ancestor: Cid },

    #[error("{0} is pinned indirectly under internal")]
    PinnedInternally(Cid),

    #[error("invalid type {0:?}, must be one of direct, recursive, indirect, internal, all")]
    InvalidPinType(String),

    #[error("invalid pin-set config: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to persist pin state: {0}")]
    Persistence(#[source] StoreError),

    #[error("pin-set sharding exceeded depth {0}")]
    ShardDepthExceeded(u32),
}

pub type PinResult<T> = Result<T, PinError>;
