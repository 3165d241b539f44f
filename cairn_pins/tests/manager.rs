use bytes::Bytes;
use cairn_core::{Cid, DagLink, DagNode, DagService, Datastore, StoreError, StoreResult};
use cairn_pins::{PIN_DATASTORE_KEY, PinEntry, PinError, PinManager, PinReason, PinSetConfig, PinType};
use cairn_store_memory::{MemoryDag, MemoryDatastore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type Manager = PinManager<Arc<FlakyDag>, Arc<FlakyDatastore>>;

/// DAG service whose writes can be switched off.
#[derive(Debug, Default)]
struct FlakyDag {
    inner: MemoryDag,
    fail_puts: AtomicBool,
}

#[async_trait::async_trait]
impl DagService for FlakyDag {
    async fn get(&self, cid: &Cid) -> StoreResult<DagNode> {
        self.inner.get(cid).await
    }

    async fn put(&self, node: &DagNode) -> StoreResult<Cid> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("disk full").into());
        }
        self.inner.put(node).await
    }

    async fn has(&self, cid: &Cid) -> StoreResult<bool> {
        self.inner.has(cid).await
    }
}

/// Datastore whose writes can be switched off.
#[derive(Debug, Default)]
struct FlakyDatastore {
    inner: MemoryDatastore,
    fail_puts: AtomicBool,
}

#[async_trait::async_trait]
impl Datastore for FlakyDatastore {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Other(anyhow::anyhow!("read-only")));
        }
        self.inner.put(key, value).await
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        self.inner.has(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }
}

struct Repo {
    dag: Arc<FlakyDag>,
    datastore: Arc<FlakyDatastore>,
}

impl Repo {
    fn new() -> Self {
        Self {
            dag: Arc::default(),
            datastore: Arc::default(),
        }
    }

    fn manager(&self, config: PinSetConfig) -> Manager {
        PinManager::new(self.dag.clone(), self.datastore.clone(), config)
    }

    async fn node(&self, data: &str, children: &[Cid]) -> Cid {
        let links = children.iter().map(|c| DagLink::new("", 1, *c)).collect();
        self.dag
            .put(&DagNode::new(Bytes::from(data.to_owned()), links))
            .await
            .unwrap()
    }
}

fn entry(cid: Cid, reason: PinReason) -> PinEntry {
    PinEntry { cid, reason }
}

#[tokio::test]
async fn end_to_end_scenario() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let b = repo.node("b", &[]).await;
    let a = repo.node("a", &[b]).await;

    pins.add(&[a], false).await.unwrap();
    assert_eq!(
        pins.list(None, PinType::All).await.unwrap(),
        vec![entry(a, PinReason::Direct)]
    );

    pins.add(&[a], true).await.unwrap();
    assert_eq!(
        pins.list(None, PinType::All).await.unwrap(),
        vec![entry(a, PinReason::Recursive), entry(b, PinReason::Indirect(a))]
    );

    let err = pins.remove(&[a], false).await.unwrap_err();
    assert!(matches!(err, PinError::PinnedRecursively(c) if c == a));

    pins.remove(&[a], true).await.unwrap();
    assert!(pins.list(None, PinType::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn persistence_scenario() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let leaf = repo.node("leaf", &[]).await;
    let tree = repo.node("tree", &[leaf]).await;
    let other = repo.node("other", &[]).await;
    pins.add(&[tree], true).await.unwrap();
    pins.add(&[other], false).await.unwrap();
    pins.flush().await.unwrap();

    let direct = pins.direct_keys().await;
    let recursive = pins.recursive_keys().await;
    let internal = pins.internal_keys().await;
    pins.close().await;

    let restarted = repo.manager(PinSetConfig::default());
    assert!(restarted.direct_keys().await.is_empty());
    restarted.load().await.unwrap();
    assert_eq!(restarted.direct_keys().await, direct);
    assert_eq!(restarted.recursive_keys().await, recursive);
    assert_eq!(restarted.internal_keys().await, internal);
}

#[tokio::test]
async fn sharded_state_survives_restart() {
    let repo = Repo::new();
    let config = PinSetConfig {
        fanout: 4,
        max_items: 3,
    };
    let pins = repo.manager(config);
    let mut leaves = Vec::new();
    for i in 0..30 {
        leaves.push(repo.node(&format!("leaf-{i}"), &[]).await);
    }
    pins.add(&leaves[..20], false).await.unwrap();
    pins.add(&leaves[20..], true).await.unwrap();
    let internal = pins.internal_keys().await;
    assert!(internal.len() > 4, "sub-shards should be internal");

    let restarted = repo.manager(config);
    restarted.load().await.unwrap();
    assert_eq!(restarted.direct_keys().await.len(), 20);
    assert_eq!(restarted.recursive_keys().await.len(), 10);
    assert_eq!(restarted.internal_keys().await, internal);
}

#[tokio::test]
async fn load_without_persisted_state_is_a_no_op() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    pins.load().await.unwrap();
    assert!(pins.list(None, PinType::All).await.unwrap().is_empty());
    assert!(pins.internal_keys().await.is_empty());
}

#[tokio::test]
async fn flush_records_root_and_internal_nodes() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let root = pins.flush().await.unwrap();

    let encoded = repo.datastore.get(PIN_DATASTORE_KEY).await.unwrap();
    let node = DagNode::decode(&encoded).unwrap();
    assert_eq!(node.cid(), root);
    assert_eq!(node.links[0].name, "direct");
    assert_eq!(node.links[1].name, "recursive");

    let internal = pins.internal_keys().await;
    assert!(internal.contains(&root));
    assert!(internal.contains(&Cid::empty()));
    assert!(internal.contains(&node.links[0].cid));
    assert!(repo.dag.has(&Cid::empty()).await.unwrap());
}

#[tokio::test]
async fn failed_flush_leaves_state_untouched() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let a = repo.node("a", &[]).await;
    let b = repo.node("b", &[]).await;
    pins.add(&[a], false).await.unwrap();
    let persisted = repo.datastore.get(PIN_DATASTORE_KEY).await.unwrap();
    let internal = pins.internal_keys().await;

    repo.datastore.fail_puts.store(true, Ordering::SeqCst);
    let err = pins.add(&[b], false).await.unwrap_err();
    assert!(matches!(err, PinError::Persistence(_)));
    repo.datastore.fail_puts.store(false, Ordering::SeqCst);

    repo.dag.fail_puts.store(true, Ordering::SeqCst);
    let err = pins.remove(&[a], true).await.unwrap_err();
    assert!(matches!(err, PinError::Persistence(_)));
    repo.dag.fail_puts.store(false, Ordering::SeqCst);

    assert_eq!(pins.direct_keys().await, vec![a]);
    assert_eq!(pins.internal_keys().await, internal);
    assert_eq!(repo.datastore.get(PIN_DATASTORE_KEY).await.unwrap(), persisted);
}

#[tokio::test]
async fn batches_are_all_or_nothing() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let present = repo.node("present", &[]).await;
    let absent = DagNode::new(Bytes::from_static(b"absent"), vec![]).cid();

    let err = pins.add(&[present, absent], false).await.unwrap_err();
    assert!(matches!(err, PinError::Store(e) if e.is_not_found()));
    assert!(pins.direct_keys().await.is_empty());
    assert!(!repo.datastore.has(PIN_DATASTORE_KEY).await.unwrap());

    pins.add(&[present], false).await.unwrap();
    let err = pins.remove(&[present, absent], true).await.unwrap_err();
    assert!(matches!(err, PinError::NotPinned(c) if c == absent));
    assert_eq!(pins.direct_keys().await, vec![present]);
}

#[tokio::test]
async fn repeated_cids_in_a_batch_are_handled_once() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let a = repo.node("a", &[]).await;
    let r = repo.node("r", &[]).await;

    pins.add(&[a, a], false).await.unwrap();
    pins.add(&[r, r], true).await.unwrap();
    assert_eq!(pins.direct_keys().await, vec![a]);

    pins.remove(&[a, a], false).await.unwrap();
    pins.remove(&[r, r], true).await.unwrap();
    assert!(pins.direct_keys().await.is_empty());
    assert!(pins.recursive_keys().await.is_empty());

    let fresh = repo.manager(PinSetConfig::default());
    fresh.load().await.unwrap();
    assert!(fresh.list(None, PinType::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn recursive_add_needs_whole_graph() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let missing = DagNode::new(Bytes::from_static(b"gone"), vec![]).cid();
    let root = repo.node("root", &[missing]).await;

    let err = pins.add(&[root], true).await.unwrap_err();
    assert!(matches!(
        err,
        PinError::UnresolvedDescendant { root: r, missing: m } if r == root && m == missing
    ));
    assert!(pins.recursive_keys().await.is_empty());
}

#[tokio::test]
async fn direct_and_recursive_stay_exclusive() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let a = repo.node("a", &[]).await;

    pins.add(&[a], false).await.unwrap();
    pins.add(&[a], true).await.unwrap();
    assert!(pins.direct_keys().await.is_empty());
    assert_eq!(pins.recursive_keys().await, vec![a]);

    let err = pins.add(&[a], false).await.unwrap_err();
    assert!(matches!(err, PinError::AlreadyRecursive(c) if c == a));
    assert!(pins.direct_keys().await.is_empty());

    // repeated pins are no-ops
    pins.add(&[a], true).await.unwrap();
    assert_eq!(pins.recursive_keys().await, vec![a]);
}

#[tokio::test]
async fn descendants_report_their_recursive_ancestor() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let deep = repo.node("deep", &[]).await;
    let mid = repo.node("mid", &[deep]).await;
    let side = repo.node("side", &[]).await;
    let top = repo.node("top", &[mid, side]).await;
    pins.add(&[top], true).await.unwrap();

    for cid in [deep, mid, side] {
        for ty in [PinType::All, PinType::Indirect] {
            assert_eq!(
                pins.is_pinned_with_type(&cid, ty).await.unwrap(),
                Some(PinReason::Indirect(top))
            );
        }
        assert_eq!(pins.is_pinned_with_type(&cid, PinType::Direct).await.unwrap(), None);
    }

    let mut indirect = pins.indirect_keys().await.unwrap();
    indirect.sort();
    let mut expected = vec![deep, mid, side];
    expected.sort();
    assert_eq!(indirect, expected);
    assert_eq!(pins.indirect_key_strings().await.unwrap().len(), 3);

    let err = pins.remove(&[mid], true).await.unwrap_err();
    assert!(matches!(
        err,
        PinError::PinnedIndirectly { cid, ancestor } if cid == mid && ancestor == top
    ));
}

#[tokio::test]
async fn type_filters_only_consult_their_category() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let child = repo.node("child", &[]).await;
    let parent = repo.node("parent", &[child]).await;
    pins.add(&[parent], true).await.unwrap();

    assert_eq!(
        pins.is_pinned_with_type(&parent, PinType::Recursive).await.unwrap(),
        Some(PinReason::Recursive)
    );
    assert_eq!(pins.is_pinned_with_type(&parent, PinType::Direct).await.unwrap(), None);
    assert_eq!(pins.is_pinned_with_type(&child, PinType::Recursive).await.unwrap(), None);
    assert_eq!(pins.is_pinned_with_type(&Cid::empty(), PinType::Internal).await.unwrap(), Some(PinReason::Internal));
    assert_eq!(pins.is_pinned(&Cid::empty()).await.unwrap(), Some(PinReason::Internal));
}

#[tokio::test]
async fn internal_nodes_cannot_be_unpinned() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let root = pins.flush().await.unwrap();

    let err = pins.remove(&[root], true).await.unwrap_err();
    assert!(matches!(err, PinError::PinnedInternally(c) if c == root));

    let listed = pins.list(None, PinType::Internal).await.unwrap();
    assert!(listed.contains(&entry(root, PinReason::Internal)));
    assert!(!pins.list(None, PinType::All).await.unwrap().iter().any(|e| e.cid == root));
}

#[tokio::test]
async fn listing_named_cids() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let child = repo.node("child", &[]).await;
    let parent = repo.node("parent", &[child]).await;
    let loose = repo.node("loose", &[]).await;
    pins.add(&[parent], true).await.unwrap();

    let listed = pins.list(Some(&[child, parent][..]), PinType::All).await.unwrap();
    assert_eq!(
        listed,
        vec![entry(child, PinReason::Indirect(parent)), entry(parent, PinReason::Recursive)]
    );

    let err = pins.list(Some(&[loose][..]), PinType::All).await.unwrap_err();
    assert!(matches!(err, PinError::NotPinned(c) if c == loose));

    let err = pins.list(Some(&[parent][..]), PinType::Direct).await.unwrap_err();
    assert!(matches!(err, PinError::NotPinned(_)));
}

#[tokio::test]
async fn clear_forgets_memory_but_not_disk() {
    let repo = Repo::new();
    let pins = repo.manager(PinSetConfig::default());
    let a = repo.node("a", &[]).await;
    pins.add(&[a], false).await.unwrap();

    pins.clear().await;
    assert!(pins.direct_keys().await.is_empty());
    assert!(pins.internal_keys().await.is_empty());

    pins.load().await.unwrap();
    assert_eq!(pins.direct_key_strings().await, vec![a.to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_are_not_lost() {
    let repo = Repo::new();
    let pins = Arc::new(repo.manager(PinSetConfig::default()));
    let mut cids = Vec::new();
    for i in 0..16 {
        cids.push(repo.node(&format!("n{i}"), &[]).await);
    }

    let tasks: Vec<_> = cids
        .iter()
        .map(|cid| {
            let pins = pins.clone();
            let cid = *cid;
            tokio::spawn(async move { pins.add(&[cid], false).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut direct = pins.direct_keys().await;
    direct.sort();
    cids.sort();
    assert_eq!(direct, cids);

    let restarted = repo.manager(PinSetConfig::default());
    restarted.load().await.unwrap();
    assert_eq!(restarted.direct_keys().await.len(), 16);
}
