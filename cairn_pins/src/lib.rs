//! Pinning for Cairn.
//!
//! Pins protect nodes from garbage collection. They come in four kinds:
//!
//! - **direct**: the node itself
//! - **recursive**: the node and everything reachable from it
//! - **indirect**: reachable from a recursive pin (computed, never stored)
//! - **internal**: the nodes that store the pin state itself
//!
//! [`PinManager`] keeps the direct and recursive sets in memory and persists
//! them as two [`PinSet`] trees linked from one root node, whose encoding is
//! written to the datastore under [`PIN_DATASTORE_KEY`].

pub mod config;
pub mod error;
pub mod fnv;
pub mod header;
pub mod manager;
pub mod path;
pub mod search;
pub mod set;
pub mod types;

pub use config::PinSetConfig;
pub use error::{PinError, PinResult};
pub use header::{HeaderError, SetHeader, ShardPayload, decode_shard_payload, encode_header};
pub use manager::{PIN_DATASTORE_KEY, PinManager};
pub use path::{PinPath, resolve_paths};
pub use set::{Materialize, PinSet, SetItem, StoredSet};
pub use types::{PinEntry, PinReason, PinType};
