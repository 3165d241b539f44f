//! In-memory backends, for tests and embedding.

use bytes::Bytes;
use cairn_core::{Cid, DagNode, DagService, Datastore, StoreError, StoreResult};
use dashmap::DashMap;

/// `DagService` holding canonical node encodings in a `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryDag {
    blocks: DashMap<Cid, Bytes>,
}

impl MemoryDag {
    /// Creates a new, empty `MemoryDag`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Drops a node. Returns `true` if it was present.
    pub fn remove(&self, cid: &Cid) -> bool {
        self.blocks.remove(cid).is_some()
    }
}

#[async_trait::async_trait]
impl DagService for MemoryDag {
    async fn get(&self, cid: &Cid) -> StoreResult<DagNode> {
        let block = self
            .blocks
            .get(cid)
            .ok_or_else(|| StoreError::NotFound(cid.to_string()))?;
        Ok(DagNode::decode(block.value())?)
    }

    async fn put(&self, node: &DagNode) -> StoreResult<Cid> {
        let encoded = node.encode();
        let cid = Cid::digest(&encoded);
        self.blocks.entry(cid).or_insert(encoded);
        Ok(cid)
    }

    async fn has(&self, cid: &Cid) -> StoreResult<bool> {
        Ok(self.blocks.contains_key(cid))
    }
}

/// `Datastore` backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    entries: DashMap<String, Bytes>,
}

impl MemoryDatastore {
    /// Creates a new, empty `MemoryDatastore`.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
