//! The sharded pin-set: an arbitrary number of identifiers stored as a tree
//! of DAG nodes.
//!
//! Small sets fit in one node: `fanout` bucket links to the empty sentinel,
//! then one item link per member, sorted by the member's binary form. Sets
//! larger than `max_items` are partitioned into `fanout` buckets by an
//! FNV-1a hash of each member, and every non-empty bucket becomes a
//! sub-tree built the same way.

use bytes::{Bytes, BytesMut};
use cairn_core::{Cid, DagLink, DagNode, DagService};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::config::PinSetConfig;
use crate::fnv;
use crate::header::{decode_shard_payload, encode_header};
use crate::{PinError, PinResult};

/// Deepest sub-shard level a build may reach.
pub const MAX_SHARD_DEPTH: u32 = 32;

/// Size recorded on item links and sentinel bucket links.
const ITEM_LINK_SIZE: u64 = 1;

/// Receives the identifier of every pin-set node that is built or visited.
pub type Materialize<'a> = &'a (dyn Fn(Cid) + Send + Sync);

/// Receives every item link of a walked tree, with the item payloads of the
/// node the link belongs to.
pub type VisitItem<'a> = &'a (dyn Fn(&DagLink, &Bytes) + Send + Sync);

/// One member of a set, with the payload stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetItem {
    pub cid: Cid,
    pub data: Bytes,
}

impl SetItem {
    pub fn new(cid: Cid) -> Self {
        Self {
            cid,
            data: Bytes::new(),
        }
    }
}

/// Root of a stored set.
#[derive(Debug, Clone)]
pub struct StoredSet {
    pub node: DagNode,
    pub cid: Cid,
}

#[derive(Debug, Clone)]
pub struct PinSet<D> {
    dag: D,
    config: PinSetConfig,
}

impl<D: DagService> PinSet<D> {
    pub fn new(dag: D, config: PinSetConfig) -> Self {
        Self { dag, config }
    }

    pub fn dag(&self) -> &D {
        &self.dag
    }

    pub fn config(&self) -> &PinSetConfig {
        &self.config
    }

    /// Stores `keys` as a new tree and returns its root.
    pub async fn store_set(
        &self,
        keys: impl IntoIterator<Item = Cid>,
        log: Materialize<'_>,
    ) -> PinResult<StoredSet> {
        let items = keys.into_iter().map(SetItem::new).collect();
        self.store_items(items, log).await
    }

    /// Stores `items` under a freshly drawn seed.
    pub async fn store_items(&self, items: Vec<SetItem>, log: Materialize<'_>) -> PinResult<StoredSet> {
        let seed = rand::random::<u32>();
        self.store_items_with_seed(items, seed, log).await
    }

    /// Stores `items` under `seed`. The same members and seed always produce
    /// the same tree.
    ///
    /// Every item gets its own link, repeated identifiers included; callers
    /// wanting set semantics deduplicate first.
    pub async fn store_items_with_seed(
        &self,
        items: Vec<SetItem>,
        seed: u32,
        log: Materialize<'_>,
    ) -> PinResult<StoredSet> {
        self.config.validate()?;
        let count = items.len();

        log(Cid::empty());
        self.dag
            .put(&DagNode::empty())
            .await
            .map_err(PinError::Persistence)?;

        let node = self.build(items, seed, 0, log).await?;
        let cid = node.cid();
        log(cid);
        self.dag.put(&node).await.map_err(PinError::Persistence)?;

        debug!(root = %cid, items = count, seed, "stored pin-set");
        Ok(StoredSet { node, cid })
    }

    fn build<'a>(
        &'a self,
        items: Vec<SetItem>,
        seed: u32,
        depth: u32,
        log: Materialize<'a>,
    ) -> BoxFuture<'a, PinResult<DagNode>> {
        async move {
            if depth > MAX_SHARD_DEPTH {
                return Err(PinError::ShardDepthExceeded(MAX_SHARD_DEPTH));
            }
            let fanout = self.config.fanout;
            let mut links = vec![DagLink::new("", ITEM_LINK_SIZE, Cid::empty()); fanout as usize];

            if items.len() <= self.config.max_items {
                let mut items = items;
                // stable, so equal keys keep their insertion order
                items.sort_by_key(|item| item.cid.to_bytes());

                let mut data = BytesMut::from(encode_header(fanout, seed).as_ref());
                for item in &items {
                    links.push(DagLink::new("", ITEM_LINK_SIZE, item.cid));
                    data.extend_from_slice(&item.data);
                }
                return Ok(DagNode::new(data.freeze(), links));
            }

            // Offsetting by depth keeps an overfull bucket from landing in a
            // single bucket again one level down.
            let level_seed = seed.wrapping_add(depth);
            let mut buckets: BTreeMap<u32, Vec<SetItem>> = BTreeMap::new();
            for item in items {
                let bucket = fnv::bucket_for(level_seed, &item.cid, fanout);
                buckets.entry(bucket).or_default().push(item);
            }
            debug!(depth, buckets = buckets.len(), "sharding pin-set");

            let children = try_join_all(buckets.into_iter().map(|(bucket, items)| async move {
                let child = self.build(items, seed, depth + 1, log).await?;
                let cid = child.cid();
                log(cid);
                self.dag.put(&child).await.map_err(PinError::Persistence)?;
                Ok::<_, PinError>((bucket, DagLink::new("", child.size(), cid)))
            }))
            .await?;

            for (bucket, link) in children {
                links[bucket as usize] = link;
            }
            Ok(DagNode::new(encode_header(fanout, seed), links))
        }
        .boxed()
    }

    /// Follows the last link of `root` named `name` and returns every member
    /// of the tree it points to, in tree order.
    pub async fn load_set(&self, root: &DagNode, name: &str, log: Materialize<'_>) -> PinResult<Vec<Cid>> {
        let link = root
            .link_named(name)
            .ok_or_else(|| PinError::MissingLink(name.to_owned()))?;
        log(link.cid);
        let node = self.dag.get(&link.cid).await?;

        let keys = Mutex::new(Vec::new());
        let visit = |item: &DagLink, _: &Bytes| {
            keys.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(item.cid);
        };
        self.walk(&node, &visit, log).await?;

        let keys = keys.into_inner().unwrap_or_else(PoisonError::into_inner);
        debug!(name, root = %link.cid, items = keys.len(), "loaded pin-set");
        Ok(keys)
    }

    /// Visits every item link under `node`. Bucket links are reported to
    /// `log`; non-sentinel ones are fetched and walked concurrently.
    ///
    /// The first error is returned; fetches already in flight are dropped.
    pub fn walk<'a>(
        &'a self,
        node: &'a DagNode,
        visit: VisitItem<'a>,
        log: Materialize<'a>,
    ) -> BoxFuture<'a, PinResult<()>> {
        async move {
            let payload = decode_shard_payload(node)?;
            let fanout = payload.header.fanout as usize;

            let mut subtrees = Vec::new();
            for (index, link) in node.links.iter().enumerate() {
                if index < fanout {
                    log(link.cid);
                    if !link.cid.is_empty_node() {
                        subtrees.push(link.cid);
                    }
                } else {
                    visit(link, &payload.items_data);
                }
            }

            try_join_all(subtrees.into_iter().map(|cid| async move {
                let child = self.dag.get(&cid).await?;
                self.walk(&child, visit, log).await
            }))
            .await?;
            Ok(())
        }
        .boxed()
    }
}
