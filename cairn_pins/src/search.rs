//! Breadth-first searches over the DAG below a pinned node.

use cairn_core::{Cid, DagNode, DagService, StoreResult};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::future::Future;

use crate::{PinError, PinResult};

fn fetch<D: DagService + ?Sized>(
    dag: &D,
    cid: Cid,
) -> impl Future<Output = (Cid, StoreResult<DagNode>)> + Send + '_ {
    async move { (cid, dag.get(&cid).await) }
}

/// Whether `target` is linked from anywhere below `root`.
///
/// Sibling fetches run concurrently and each node is fetched at most once.
/// The first matching link settles the answer; fetches still in flight at
/// that point are dropped without being awaited.
pub async fn has_child<D: DagService + ?Sized>(dag: &D, root: &DagNode, target: &Cid) -> PinResult<bool> {
    let mut seen = HashSet::new();
    let mut pending = FuturesUnordered::new();

    for link in &root.links {
        if link.cid == *target {
            return Ok(true);
        }
        if seen.insert(link.cid) {
            pending.push(fetch(dag, link.cid));
        }
    }

    while let Some((_, fetched)) = pending.next().await {
        let node = fetched?;
        for link in &node.links {
            if link.cid == *target {
                return Ok(true);
            }
            if seen.insert(link.cid) {
                pending.push(fetch(dag, link.cid));
            }
        }
    }

    Ok(false)
}

/// Every node reachable from `root`, `root` included.
///
/// A missing root surfaces as the store's not-found error; a missing node
/// further down as [`PinError::UnresolvedDescendant`].
pub async fn collect_descendants<D: DagService + ?Sized>(dag: &D, root: &Cid) -> PinResult<HashSet<Cid>> {
    let mut seen = HashSet::from([*root]);
    let mut pending = FuturesUnordered::new();
    pending.push(fetch(dag, *root));

    while let Some((cid, fetched)) = pending.next().await {
        let node = match fetched {
            Ok(node) => node,
            Err(err) if err.is_not_found() && cid != *root => {
                return Err(PinError::UnresolvedDescendant {
                    root: *root,
                    missing: cid,
                });
            }
            Err(err) => return Err(err.into()),
        };
        for link in &node.links {
            if seen.insert(link.cid) {
                pending.push(fetch(dag, link.cid));
            }
        }
    }

    Ok(seen)
}
