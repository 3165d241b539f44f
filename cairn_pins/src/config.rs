use serde::{Deserialize, Serialize};

use crate::{PinError, PinResult};

/// Number of bucket links in every pin-set node.
pub const DEFAULT_FANOUT: u32 = 256;

/// Largest member count stored in a single pin-set node.
pub const DEFAULT_MAX_ITEMS: usize = 8192;

/// Shape of the sharded pin-set tree.
///
/// Both values are part of the persisted format seen by other nodes; only
/// change them for tests or private deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinSetConfig {
    pub fanout: u32,
    pub max_items: usize,
}

impl Default for PinSetConfig {
    fn default() -> Self {
        Self {
            fanout: DEFAULT_FANOUT,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

impl PinSetConfig {
    pub fn validate(&self) -> PinResult<()> {
        if self.fanout == 0 {
            return Err(PinError::InvalidConfig("fanout must be at least 1"));
        }
        if self.max_items == 0 {
            return Err(PinError::InvalidConfig("max_items must be at least 1"));
        }
        Ok(())
    }
}
