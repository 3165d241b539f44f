//! Contract test suites for `DagService` and `Datastore` implementations.
//!
//! # Usage
//!
//! In your backend crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! cairn_core = { workspace = true, features = ["testutil"] }
//! ```
//!
//! In your test file:
//!
//! ```ignore
//! use cairn_core::testutil::{DagServiceTests, DatastoreTests};
//!
//! #[tokio::test]
//! async fn test_my_backend() {
//!     let dag = MyDag::new(...);
//!     DagServiceTests::new(&dag).run_all().await.unwrap();
//! }
//! ```

use crate::{Cid, DagLink, DagNode, DagService, Datastore, StoreResult};
use bytes::Bytes;
use rand::Rng;

/// Checks the `DagService` contract: content addressing, idempotent puts and
/// `NotFound` for unknown identifiers.
pub struct DagServiceTests<'a, D> {
    dag: &'a D,
    /// Salt mixed into node payloads so repeated runs don't collide
    salt: u32,
}

impl<'a, D: DagService> DagServiceTests<'a, D> {
    pub fn new(dag: &'a D) -> Self {
        let salt = rand::rng().random::<u32>();
        Self { dag, salt }
    }

    fn leaf(&self, name: &str) -> DagNode {
        DagNode::new(
            Bytes::from(format!("{}:{}", self.salt, name)),
            Vec::new(),
        )
    }

    pub async fn run_all(&self) -> StoreResult<()> {
        self.test_put_returns_cid().await?;
        self.test_get_roundtrip().await?;
        self.test_put_idempotent().await?;
        self.test_missing().await?;
        self.test_empty_node().await?;
        Ok(())
    }

    pub async fn test_put_returns_cid(&self) -> StoreResult<()> {
        let node = self.leaf("cid");
        let cid = self.dag.put(&node).await?;
        assert_eq!(cid, node.cid(), "put must return the content identifier");
        assert!(self.dag.has(&cid).await?, "stored node should exist");
        Ok(())
    }

    pub async fn test_get_roundtrip(&self) -> StoreResult<()> {
        let child = self.leaf("child");
        let child_cid = self.dag.put(&child).await?;
        let parent = DagNode::new(
            Bytes::from_static(b"parent"),
            vec![DagLink::new("child", child.size(), child_cid)],
        );
        let parent_cid = self.dag.put(&parent).await?;

        let fetched = self.dag.get(&parent_cid).await?;
        assert_eq!(fetched, parent, "fetched node should match stored node");
        assert_eq!(fetched.links[0].cid, child_cid);
        Ok(())
    }

    pub async fn test_put_idempotent(&self) -> StoreResult<()> {
        let node = self.leaf("twice");
        let first = self.dag.put(&node).await?;
        let second = self.dag.put(&node).await?;
        assert_eq!(first, second, "re-storing must yield the same identifier");
        Ok(())
    }

    pub async fn test_missing(&self) -> StoreResult<()> {
        let never_stored = self.leaf("never-stored").cid();
        assert!(!self.dag.has(&never_stored).await?);
        let err = self
            .dag
            .get(&never_stored)
            .await
            .expect_err("missing node must not resolve");
        assert!(err.is_not_found(), "expected NotFound, got {err}");
        Ok(())
    }

    pub async fn test_empty_node(&self) -> StoreResult<()> {
        let cid = self.dag.put(&DagNode::empty()).await?;
        assert_eq!(cid, Cid::empty());
        assert_eq!(self.dag.get(&Cid::empty()).await?, DagNode::empty());
        Ok(())
    }
}

/// Checks the `Datastore` contract.
pub struct DatastoreTests<'a, S> {
    store: &'a S,
    /// Prefix for test keys to avoid conflicts
    prefix: String,
}

impl<'a, S: Datastore> DatastoreTests<'a, S> {
    pub fn new(store: &'a S) -> Self {
        let prefix = format!("/_test_{}/", rand::rng().random::<u32>());
        Self { store, prefix }
    }

    pub fn with_prefix(store: &'a S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub async fn run_all(&self) -> StoreResult<()> {
        self.test_put_get().await?;
        self.test_has().await?;
        self.test_overwrite().await?;
        self.test_missing().await?;
        self.test_delete().await?;
        Ok(())
    }

    pub async fn test_put_get(&self) -> StoreResult<()> {
        let key = self.key("value");
        let data = Bytes::from_static(b"root pointer");
        self.store.put(&key, data.clone()).await?;
        assert_eq!(self.store.get(&key).await?, data);
        Ok(())
    }

    pub async fn test_has(&self) -> StoreResult<()> {
        let key = self.key("has");
        assert!(!self.store.has(&key).await?, "key should not exist yet");
        self.store.put(&key, Bytes::from_static(b"x")).await?;
        assert!(self.store.has(&key).await?, "key should exist after put");
        Ok(())
    }

    pub async fn test_overwrite(&self) -> StoreResult<()> {
        let key = self.key("overwrite");
        self.store.put(&key, Bytes::from_static(b"old")).await?;
        self.store.put(&key, Bytes::from_static(b"new")).await?;
        assert_eq!(self.store.get(&key).await?, Bytes::from_static(b"new"));
        Ok(())
    }

    pub async fn test_missing(&self) -> StoreResult<()> {
        let err = self
            .store
            .get(&self.key("missing"))
            .await
            .expect_err("missing key must not resolve");
        assert!(err.is_not_found(), "expected NotFound, got {err}");
        Ok(())
    }

    pub async fn test_delete(&self) -> StoreResult<()> {
        let key = self.key("delete");
        self.store.put(&key, Bytes::from_static(b"x")).await?;
        self.store.delete(&key).await?;
        assert!(!self.store.has(&key).await?);
        // deleting again is fine
        self.store.delete(&key).await?;
        Ok(())
    }
}

/// Identifier of an arbitrary leaf, for tests that need many distinct keys.
pub fn leaf_cid(seed: u64) -> Cid {
    DagNode::new(Bytes::from(seed.to_le_bytes().to_vec()), Vec::new()).cid()
}
