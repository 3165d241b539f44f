use bytes::Bytes;
use cairn_core::{Cid, DagLink, DagNode, DagService, Datastore};
use dashmap::DashSet;
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PinSetConfig;
use crate::search;
use crate::set::PinSet;
use crate::types::{PinEntry, PinReason, PinType};
use crate::{PinError, PinResult};

/// Datastore key holding the encoded root of the persisted pin state.
pub const PIN_DATASTORE_KEY: &str = "/local/pins";

const DIRECT_LINK: &str = "direct";
const RECURSIVE_LINK: &str = "recursive";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PinState {
    direct: BTreeSet<Cid>,
    recursive: BTreeSet<Cid>,
    /// Nodes making up the last flushed or loaded pin-set trees.
    internal: BTreeSet<Cid>,
}

/// Tracks which nodes must survive garbage collection.
///
/// One manager exists per open repository. Every mutation runs under a
/// single lock: the sets are copied, changed, flushed, and the copy only
/// replaces the live state once the flush succeeded. A failed call leaves
/// both memory and the datastore as they were.
#[derive(Debug)]
pub struct PinManager<D, S> {
    set: PinSet<D>,
    datastore: S,
    state: Mutex<PinState>,
}

impl<D: DagService, S: Datastore> PinManager<D, S> {
    pub fn new(dag: D, datastore: S, config: PinSetConfig) -> Self {
        Self {
            set: PinSet::new(dag, config),
            datastore,
            state: Mutex::new(PinState::default()),
        }
    }

    pub fn dag(&self) -> &D {
        self.set.dag()
    }

    /// Pins `cids` and flushes. Recursive pins replace direct ones; a direct
    /// pin of a recursively pinned node is rejected.
    pub async fn add(&self, cids: &[Cid], recursive: bool) -> PinResult<Vec<Cid>> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();

        for cid in cids {
            if recursive {
                if next.recursive.contains(cid) {
                    continue;
                }
                // the whole graph must be available before it can be pinned
                search::collect_descendants(self.set.dag(), cid).await?;
                next.direct.remove(cid);
                next.recursive.insert(*cid);
            } else {
                if next.recursive.contains(cid) {
                    warn!(%cid, "refusing direct pin of recursive pin");
                    return Err(PinError::AlreadyRecursive(*cid));
                }
                if next.direct.contains(cid) {
                    continue;
                }
                self.set.dag().get(cid).await?;
                next.direct.insert(*cid);
            }
        }

        self.flush_locked(&mut state, next).await?;
        debug!(count = cids.len(), recursive, "pinned");
        Ok(cids.to_vec())
    }

    /// Unpins `cids` and flushes. Indirect and internal pins can't be
    /// removed; recursive pins only when `recursive` is set.
    pub async fn remove(&self, cids: &[Cid], recursive: bool) -> PinResult<Vec<Cid>> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let mut handled = BTreeSet::new();

        for cid in cids {
            // repeats within one batch were already unpinned above
            if !handled.insert(*cid) {
                continue;
            }
            let reason = self.reason(&next, cid, PinType::All).await?;
            match reason {
                None => return Err(PinError::NotPinned(*cid)),
                Some(PinReason::Recursive) if recursive => {
                    next.recursive.remove(cid);
                }
                Some(PinReason::Recursive) => return Err(PinError::PinnedRecursively(*cid)),
                Some(PinReason::Direct) => {
                    next.direct.remove(cid);
                }
                Some(PinReason::Internal) => return Err(PinError::PinnedInternally(*cid)),
                Some(PinReason::Indirect(ancestor)) => {
                    return Err(PinError::PinnedIndirectly {
                        cid: *cid,
                        ancestor,
                    });
                }
            }
        }

        self.flush_locked(&mut state, next).await?;
        debug!(count = cids.len(), recursive, "unpinned");
        Ok(cids.to_vec())
    }

    /// Lists pins of the given type.
    ///
    /// With `cids`, reports each one's pin or fails with `NotPinned`.
    /// Without, enumerates direct and recursive pins, then indirect ones.
    /// Internal pins are only listed when asked for explicitly.
    pub async fn list(&self, cids: Option<&[Cid]>, pin_type: PinType) -> PinResult<Vec<PinEntry>> {
        let state = self.snapshot().await;

        if let Some(cids) = cids {
            let mut entries = Vec::with_capacity(cids.len());
            for cid in cids {
                let reason = self
                    .reason(&state, cid, pin_type)
                    .await?
                    .ok_or(PinError::NotPinned(*cid))?;
                entries.push(PinEntry { cid: *cid, reason });
            }
            return Ok(entries);
        }

        let mut entries = Vec::new();
        if pin_type.includes(PinType::Direct) {
            entries.extend(state.direct.iter().map(|cid| PinEntry {
                cid: *cid,
                reason: PinReason::Direct,
            }));
        }
        if pin_type.includes(PinType::Recursive) {
            entries.extend(state.recursive.iter().map(|cid| PinEntry {
                cid: *cid,
                reason: PinReason::Recursive,
            }));
        }
        if pin_type.includes(PinType::Indirect) {
            let indirect = self.indirect(&state).await?;
            entries.extend(indirect.into_iter().map(|(cid, ancestor)| PinEntry {
                cid,
                reason: PinReason::Indirect(ancestor),
            }));
        }
        if pin_type == PinType::Internal {
            entries.extend(state.internal.iter().map(|cid| PinEntry {
                cid: *cid,
                reason: PinReason::Internal,
            }));
        }
        Ok(entries)
    }

    pub async fn is_pinned(&self, cid: &Cid) -> PinResult<Option<PinReason>> {
        self.is_pinned_with_type(cid, PinType::All).await
    }

    /// Why `cid` is pinned, looking only at the categories `pin_type` names.
    pub async fn is_pinned_with_type(&self, cid: &Cid, pin_type: PinType) -> PinResult<Option<PinReason>> {
        let state = self.snapshot().await;
        self.reason(&state, cid, pin_type).await
    }

    /// Writes the current pin state and returns the new root.
    pub async fn flush(&self) -> PinResult<Cid> {
        let mut state = self.state.lock().await;
        let next = state.clone();
        self.flush_locked(&mut state, next).await
    }

    /// Replaces the in-memory state with the persisted one. Nothing persisted
    /// yet is not an error.
    pub async fn load(&self) -> PinResult<()> {
        let mut state = self.state.lock().await;

        if !self.datastore.has(PIN_DATASTORE_KEY).await? {
            debug!("no persisted pin state");
            return Ok(());
        }
        let encoded = self.datastore.get(PIN_DATASTORE_KEY).await?;
        let root = DagNode::decode(&encoded)?;
        let root_cid = root.cid();

        let internal = DashSet::new();
        let log = |cid: Cid| {
            internal.insert(cid);
        };
        log(root_cid);

        let recursive = self.set.load_set(&root, RECURSIVE_LINK, &log).await?;
        let direct = self.set.load_set(&root, DIRECT_LINK, &log).await?;

        *state = PinState {
            direct: direct.into_iter().collect(),
            recursive: recursive.into_iter().collect(),
            internal: internal.into_iter().collect(),
        };
        info!(
            root = %root_cid,
            direct = state.direct.len(),
            recursive = state.recursive.len(),
            "loaded pin state"
        );
        Ok(())
    }

    pub async fn direct_keys(&self) -> Vec<Cid> {
        self.state.lock().await.direct.iter().copied().collect()
    }

    pub async fn recursive_keys(&self) -> Vec<Cid> {
        self.state.lock().await.recursive.iter().copied().collect()
    }

    pub async fn internal_keys(&self) -> Vec<Cid> {
        self.state.lock().await.internal.iter().copied().collect()
    }

    /// Descendants of recursive pins that are not pinned themselves.
    pub async fn indirect_keys(&self) -> PinResult<Vec<Cid>> {
        let state = self.snapshot().await;
        Ok(self.indirect(&state).await?.into_keys().collect())
    }

    pub async fn direct_key_strings(&self) -> Vec<String> {
        to_strings(self.direct_keys().await)
    }

    pub async fn recursive_key_strings(&self) -> Vec<String> {
        to_strings(self.recursive_keys().await)
    }

    pub async fn internal_key_strings(&self) -> Vec<String> {
        to_strings(self.internal_keys().await)
    }

    pub async fn indirect_key_strings(&self) -> PinResult<Vec<String>> {
        Ok(to_strings(self.indirect_keys().await?))
    }

    /// Forgets every pin in memory. Persisted state is untouched until the
    /// next flush.
    pub async fn clear(&self) {
        *self.state.lock().await = PinState::default();
    }

    /// Tears the manager down with the repository.
    pub async fn close(self) {
        let state = self.state.into_inner();
        debug!(
            direct = state.direct.len(),
            recursive = state.recursive.len(),
            "closed pin manager"
        );
    }

    async fn snapshot(&self) -> PinState {
        self.state.lock().await.clone()
    }

    async fn reason(&self, state: &PinState, cid: &Cid, pin_type: PinType) -> PinResult<Option<PinReason>> {
        if pin_type.includes(PinType::Recursive) && state.recursive.contains(cid) {
            return Ok(Some(PinReason::Recursive));
        }
        if pin_type == PinType::Recursive {
            return Ok(None);
        }
        if pin_type.includes(PinType::Direct) && state.direct.contains(cid) {
            return Ok(Some(PinReason::Direct));
        }
        if pin_type == PinType::Direct {
            return Ok(None);
        }
        if pin_type.includes(PinType::Internal) && state.internal.contains(cid) {
            return Ok(Some(PinReason::Internal));
        }
        if pin_type == PinType::Internal {
            return Ok(None);
        }

        for ancestor in &state.recursive {
            let node = self.set.dag().get(ancestor).await?;
            if search::has_child(self.set.dag(), &node, cid).await? {
                return Ok(Some(PinReason::Indirect(*ancestor)));
            }
        }
        Ok(None)
    }

    /// Indirect pins, each with the first recursive pin it was found under.
    async fn indirect(&self, state: &PinState) -> PinResult<BTreeMap<Cid, Cid>> {
        let subtrees = try_join_all(state.recursive.iter().map(|root| async move {
            let descendants = search::collect_descendants(self.set.dag(), root).await?;
            Ok::<_, PinError>((*root, descendants))
        }))
        .await?;

        let mut indirect = BTreeMap::new();
        for (root, descendants) in subtrees {
            for cid in descendants {
                if !state.direct.contains(&cid) && !state.recursive.contains(&cid) {
                    indirect.entry(cid).or_insert(root);
                }
            }
        }
        Ok(indirect)
    }

    async fn flush_locked(&self, state: &mut PinState, next: PinState) -> PinResult<Cid> {
        let internal = DashSet::new();
        let log = |cid: Cid| {
            internal.insert(cid);
        };

        let (direct, recursive) = futures::try_join!(
            self.set.store_set(next.direct.iter().copied(), &log),
            self.set.store_set(next.recursive.iter().copied(), &log),
        )?;

        let dag = self.set.dag();
        dag.put(&DagNode::empty())
            .await
            .map_err(PinError::Persistence)?;

        let root = DagNode::new(
            Bytes::new(),
            vec![
                DagLink::new(DIRECT_LINK, direct.node.size(), direct.cid),
                DagLink::new(RECURSIVE_LINK, recursive.node.size(), recursive.cid),
            ],
        );
        let root_cid = root.cid();
        log(root_cid);
        dag.put(&root).await.map_err(PinError::Persistence)?;

        self.datastore
            .put(PIN_DATASTORE_KEY, root.encode())
            .await
            .map_err(PinError::Persistence)?;

        *state = PinState {
            internal: internal.into_iter().collect(),
            ..next
        };
        info!(
            root = %root_cid,
            direct = state.direct.len(),
            recursive = state.recursive.len(),
            internal = state.internal.len(),
            "flushed pin state"
        );
        Ok(root_cid)
    }
}

fn to_strings(cids: Vec<Cid>) -> Vec<String> {
    cids.iter().map(Cid::to_string).collect()
}
