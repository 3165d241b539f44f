//! Content identifiers for DAG nodes.
//!
//! A [`Cid`] is a bare multihash over the canonical encoding of a
//! [`DagNode`]: varint code, varint length, digest. Any hash function
//! round-trips, so sets written elsewhere (sha2-256 `Qm…` identifiers) decode
//! and walk fine. Nodes built here are always addressed by BLAKE3.
//!
//! The textual form is plain base58btc over the binary form, which is also
//! the string the pin-set feeds into bucket hashing, so it must never change.
//!
//! [`DagNode`]: crate::DagNode

use multihash::Multihash;
use std::fmt;
use std::str::FromStr;

/// Multihash code for BLAKE3, used for every identifier minted here.
pub const MULTIHASH_BLAKE3: u64 = 0x1e;

/// Multihash code for sha2-256.
pub const MULTIHASH_SHA2_256: u64 = 0x12;

/// Largest digest a [`Cid`] can carry.
pub const MAX_DIGEST_SIZE: usize = 64;

/// BLAKE3 of zero bytes.
const BLAKE3_EMPTY: [u8; 32] = [
    0xaf, 0x13, 0x49, 0xb9, 0xf5, 0xf9, 0xa1, 0xa6, 0xa0, 0x40, 0x4d, 0xea, 0x36, 0xdc, 0xc9, 0x49,
    0x9b, 0xcb, 0x25, 0xc9, 0xad, 0xc1, 0x12, 0xb7, 0xcc, 0x9a, 0x93, 0xca, 0xe4, 0x1f, 0x32, 0x62,
];

/// sha2-256 of zero bytes.
const SHA2_256_EMPTY: [u8; 32] = [
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
];

#[derive(thiserror::Error, Debug)]
pub enum CidError {
    #[error("invalid base58 string: {0}")]
    Multibase(#[from] multibase::Error),
    #[error("invalid multihash: {0}")]
    Multihash(#[from] multihash::Error),
}

/// Address of a DAG node.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cid(Multihash<MAX_DIGEST_SIZE>);

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cid").field(&self.to_base58()).finish()
    }
}

impl Cid {
    /// Identifier of `bytes` under BLAKE3.
    pub fn digest(bytes: &[u8]) -> Self {
        Self::blake3(*blake3::hash(bytes).as_bytes())
    }

    pub fn blake3(digest: [u8; 32]) -> Self {
        Self(Multihash::wrap(MULTIHASH_BLAKE3, &digest).expect("32-byte digest fits"))
    }

    /// Identifier of the empty node (no data, no links).
    ///
    /// The empty node encodes to zero bytes, so this is the digest of
    /// nothing.
    pub fn empty() -> Self {
        Self::blake3(BLAKE3_EMPTY)
    }

    /// Whether this names the empty node under a hash function whose empty
    /// digest is known. Sets written with sha2-256 use that sentinel.
    pub fn is_empty_node(&self) -> bool {
        match self.0.code() {
            MULTIHASH_BLAKE3 => self.0.digest() == BLAKE3_EMPTY,
            MULTIHASH_SHA2_256 => self.0.digest() == SHA2_256_EMPTY,
            _ => false,
        }
    }

    pub fn multihash(&self) -> &Multihash<MAX_DIGEST_SIZE> {
        &self.0
    }

    /// Parses the binary multihash form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CidError> {
        Ok(Self(Multihash::from_bytes(bytes)?))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    /// Canonical textual form (base58btc, no multibase prefix).
    pub fn to_base58(&self) -> String {
        multibase::Base::Base58Btc.encode(self.to_bytes())
    }

    /// Parses the canonical form, falling back to a prefixed multibase string.
    pub fn parse(s: &str) -> Result<Self, CidError> {
        let raw = multibase::Base::Base58Btc
            .decode(s)
            .map_err(CidError::from)
            .and_then(|bytes| Self::from_bytes(&bytes));
        match raw {
            Ok(cid) => Ok(cid),
            Err(err) => match multibase::decode(s) {
                Ok((_, bytes)) => Self::from_bytes(&bytes),
                Err(_) => Err(err),
            },
        }
    }
}

impl From<Multihash<MAX_DIGEST_SIZE>> for Cid {
    fn from(mh: Multihash<MAX_DIGEST_SIZE>) -> Self {
        Self(mh)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl FromStr for Cid {
    type Err = CidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::parse(s)
    }
}
