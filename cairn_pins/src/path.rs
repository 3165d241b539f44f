//! Pin arguments given as paths: `<cid>`, `/ipfs/<cid>` or
//! `/ipfs/<cid>/name/…`, where each name selects a link of the node before
//! it.

use cairn_core::{Cid, DagService};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::{PinError, PinResult};

const PATH_PREFIX: &str = "/ipfs/";

/// A root identifier followed by link names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinPath {
    pub root: Cid,
    pub names: Vec<String>,
}

impl FromStr for PinPath {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(PATH_PREFIX).unwrap_or(s);
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let mut segments = rest.split('/');
        let root = segments.next().unwrap_or_default();
        let names: Vec<String> = segments.map(str::to_owned).collect();
        if root.is_empty() || names.iter().any(String::is_empty) {
            return Err(PinError::InvalidPath(s.to_owned()));
        }

        let root = root.parse().map_err(|source| PinError::InvalidCid {
            input: root.to_owned(),
            source,
        })?;
        Ok(Self { root, names })
    }
}

impl fmt::Display for PinPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PATH_PREFIX}{}", self.root)?;
        for name in &self.names {
            write!(f, "/{name}")?;
        }
        Ok(())
    }
}

impl PinPath {
    /// Follows the names from the root and returns the node they end at.
    /// Each hop takes the first link carrying the name.
    pub async fn resolve<D: DagService + ?Sized>(&self, dag: &D) -> PinResult<Cid> {
        let mut current = self.root;
        for name in &self.names {
            let node = dag.get(&current).await?;
            current = node
                .links
                .iter()
                .find(|link| link.name == *name)
                .map(|link| link.cid)
                .ok_or_else(|| PinError::NoSuchLink {
                    name: name.clone(),
                    parent: current,
                })?;
        }
        if !self.names.is_empty() {
            debug!(path = %self, target = %current, "resolved path");
        }
        Ok(current)
    }
}

/// Parses and resolves every argument, in order.
pub async fn resolve_paths<D, S>(dag: &D, paths: &[S]) -> PinResult<Vec<Cid>>
where
    D: DagService + ?Sized,
    S: AsRef<str>,
{
    let mut cids = Vec::with_capacity(paths.len());
    for path in paths {
        let path: PinPath = path.as_ref().parse()?;
        cids.push(path.resolve(dag).await?);
    }
    Ok(cids)
}
