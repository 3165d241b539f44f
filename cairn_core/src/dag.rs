//! The content-addressed node store the pin subsystem reads and writes.

use async_trait::async_trait;

use crate::{Cid, DagNode, StoreResult};

/// Stores [`DagNode`]s under the [`Cid`] of their canonical encoding.
///
/// Implementations must be safe for concurrent use; the pin-set fans out
/// sibling reads and writes freely.
#[async_trait]
pub trait DagService: std::fmt::Debug + Send + Sync {
    /// Fetches a node, failing with [`StoreError::NotFound`] when absent.
    ///
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    async fn get(&self, cid: &Cid) -> StoreResult<DagNode>;

    /// Stores a node and returns its identifier. Storing a node that is
    /// already present is a no-op.
    async fn put(&self, node: &DagNode) -> StoreResult<Cid>;

    async fn has(&self, cid: &Cid) -> StoreResult<bool>;
}

#[async_trait]
impl<T: DagService + ?Sized> DagService for std::sync::Arc<T> {
    async fn get(&self, cid: &Cid) -> StoreResult<DagNode> {
        (**self).get(cid).await
    }

    async fn put(&self, node: &DagNode) -> StoreResult<Cid> {
        (**self).put(node).await
    }

    async fn has(&self, cid: &Cid) -> StoreResult<bool> {
        (**self).has(cid).await
    }
}

#[async_trait]
impl<T: DagService + ?Sized> DagService for Box<T> {
    async fn get(&self, cid: &Cid) -> StoreResult<DagNode> {
        (**self).get(cid).await
    }

    async fn put(&self, node: &DagNode) -> StoreResult<Cid> {
        (**self).put(node).await
    }

    async fn has(&self, cid: &Cid) -> StoreResult<bool> {
        (**self).has(cid).await
    }
}
