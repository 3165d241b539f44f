//! Core Cairn types and traits.
//!
//! This crate defines the pieces shared by every Cairn crate:
//!
//! ## Wire-stable types
//!
//! - Content identifiers (`cid::Cid`): multihashes, BLAKE3 for new nodes,
//!   with their base58 text form
//! - Merkle-DAG nodes (`node::DagNode`, `node::DagLink`) and their canonical
//!   dag-pb encoding
//! - Protobuf wire primitives (`pb`)
//!
//! Changing any of these changes node identifiers, and with them every
//! persisted pin-set.
//!
//! ## Storage abstractions
//!
//! - [`DagService`]: content-addressed node store
//! - [`Datastore`]: small mutable key/value store
//!
//! Implementations live in `cairn_store_memory` and `cairn_store_redb`.

pub mod cid;
pub mod dag;
pub mod datastore;
pub mod node;
pub mod pb;
pub mod store;

// Contract suites for backends (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

pub use cid::{Cid, CidError};
pub use dag::DagService;
pub use datastore::Datastore;
pub use node::{DagLink, DagNode, NodeDecodeError};
pub use store::{StoreError, StoreResult};
