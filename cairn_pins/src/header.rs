//! Pin-set node header.
//!
//! A pin-set node's payload is `varint(len) || header || item payloads`,
//! where the header is the protobuf message
//! `Set { 1: version uint32, 2: fanout uint32, 3: seed fixed32 }`.
//! This layout is shared with other implementations and must not change.

use bytes::{Bytes, BytesMut};
use cairn_core::DagNode;
use cairn_core::pb::{self, WIRE_FIXED32, WIRE_VARINT, WireError};

pub const SET_VERSION: u32 = 1;

const VERSION_FIELD: u32 = 1;
const FANOUT_FIELD: u32 = 2;
const SEED_FIELD: u32 = 3;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderError {
    #[error("invalid set header length")]
    InvalidHeaderLength,

    #[error("malformed set header: {0}")]
    MalformedHeader(#[from] WireError),

    #[error("unsupported set version: {0}")]
    UnsupportedVersion(u32),

    #[error("impossibly large fanout {fanout} for {links} links")]
    FanoutExceedsLinks { fanout: u32, links: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetHeader {
    pub version: u32,
    pub fanout: u32,
    pub seed: u32,
}

/// A decoded pin-set payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPayload {
    pub header: SetHeader,
    /// Concatenated per-item payloads following the header.
    pub items_data: Bytes,
}

/// Encodes a version-1 header, including its length prefix.
pub fn encode_header(fanout: u32, seed: u32) -> Bytes {
    let mut header = BytesMut::with_capacity(16);
    pb::put_varint_field(&mut header, VERSION_FIELD, SET_VERSION as u64);
    pb::put_varint_field(&mut header, FANOUT_FIELD, fanout as u64);
    pb::put_fixed32_field(&mut header, SEED_FIELD, seed);

    let mut out = BytesMut::with_capacity(1 + header.len());
    pb::put_varint(&mut out, header.len() as u64);
    out.extend_from_slice(&header);
    out.freeze()
}

fn decode_header(mut buf: &[u8]) -> Result<SetHeader, HeaderError> {
    let mut header = SetHeader {
        version: 0,
        fanout: 0,
        seed: 0,
    };
    while !buf.is_empty() {
        let (field, wire_type) = pb::get_key(&mut buf)?;
        match (field, wire_type) {
            (VERSION_FIELD, WIRE_VARINT) => header.version = pb::get_varint_u32(&mut buf)?,
            (FANOUT_FIELD, WIRE_VARINT) => header.fanout = pb::get_varint_u32(&mut buf)?,
            (SEED_FIELD, WIRE_FIXED32) => header.seed = pb::get_fixed32(&mut buf)?,
            (VERSION_FIELD | FANOUT_FIELD | SEED_FIELD, other) => {
                return Err(WireError::UnsupportedWireType(other).into());
            }
            (_, other) => pb::skip_field(&mut buf, other)?,
        }
    }
    Ok(header)
}

/// Splits a pin-set node's payload into its header and item payloads,
/// checking the header against the node's links.
pub fn decode_shard_payload(node: &DagNode) -> Result<ShardPayload, HeaderError> {
    let mut cursor: &[u8] = &node.data;
    let len = pb::get_varint(&mut cursor).map_err(|_| HeaderError::InvalidHeaderLength)?;
    let prefix_len = node.data.len() - cursor.len();
    if len > cursor.len() as u64 {
        return Err(HeaderError::InvalidHeaderLength);
    }
    let header_end = prefix_len + len as usize;

    let header = decode_header(&node.data[prefix_len..header_end])?;
    if header.version != SET_VERSION {
        return Err(HeaderError::UnsupportedVersion(header.version));
    }
    if header.fanout as usize > node.links.len() {
        return Err(HeaderError::FanoutExceedsLinks {
            fanout: header.fanout,
            links: node.links.len(),
        });
    }

    Ok(ShardPayload {
        header,
        items_data: node.data.slice(header_end..),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{Cid, DagLink};

    fn node_with(data: Bytes, links: usize) -> DagNode {
        DagNode::new(data, vec![DagLink::new("", 1, Cid::empty()); links])
    }

    #[test]
    fn header_layout_is_fixed() {
        let encoded = encode_header(256, 0x0403_0201);
        assert_eq!(
            encoded.as_ref(),
            &[
                0x0a, // length
                0x08, 0x01, // version = 1
                0x10, 0x80, 0x02, // fanout = 256
                0x1d, 0x01, 0x02, 0x03, 0x04, // seed, little-endian
            ]
        );
    }

    #[test]
    fn decodes_header_and_items() {
        let mut data = encode_header(2, 99).to_vec();
        data.extend_from_slice(b"items");
        let payload = decode_shard_payload(&node_with(data.into(), 3)).unwrap();
        assert_eq!(
            payload.header,
            SetHeader {
                version: 1,
                fanout: 2,
                seed: 99
            }
        );
        assert_eq!(payload.items_data.as_ref(), b"items");
    }

    #[test]
    fn empty_payload_has_no_header() {
        assert_eq!(
            decode_shard_payload(&DagNode::empty()),
            Err(HeaderError::InvalidHeaderLength)
        );
    }

    #[test]
    fn overrunning_length_is_rejected() {
        let node = node_with(Bytes::from_static(&[0x20, 0x08, 0x01]), 0);
        assert_eq!(
            decode_shard_payload(&node),
            Err(HeaderError::InvalidHeaderLength)
        );
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut header = Vec::new();
        pb::put_varint_field(&mut header, VERSION_FIELD, 2);
        pb::put_varint_field(&mut header, FANOUT_FIELD, 0);
        let mut data = Vec::new();
        pb::put_varint(&mut data, header.len() as u64);
        data.extend_from_slice(&header);
        assert_eq!(
            decode_shard_payload(&node_with(data.into(), 0)),
            Err(HeaderError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn oversized_version_is_not_truncated() {
        let mut header = Vec::new();
        pb::put_varint_field(&mut header, VERSION_FIELD, (1 << 32) + 1);
        pb::put_varint_field(&mut header, FANOUT_FIELD, 0);
        let mut data = Vec::new();
        pb::put_varint(&mut data, header.len() as u64);
        data.extend_from_slice(&header);
        assert_eq!(
            decode_shard_payload(&node_with(data.into(), 0)),
            Err(HeaderError::MalformedHeader(WireError::Uint32Overflow(
                (1 << 32) + 1
            )))
        );
    }

    #[test]
    fn fanout_beyond_links_is_rejected() {
        let node = node_with(encode_header(4, 1), 3);
        assert_eq!(
            decode_shard_payload(&node),
            Err(HeaderError::FanoutExceedsLinks {
                fanout: 4,
                links: 3
            })
        );
    }

    #[test]
    fn unknown_header_fields_are_skipped() {
        let mut header = Vec::new();
        pb::put_varint_field(&mut header, VERSION_FIELD, 1);
        pb::put_len_delimited(&mut header, 9, b"future");
        pb::put_varint_field(&mut header, FANOUT_FIELD, 1);
        let mut data = Vec::new();
        pb::put_varint(&mut data, header.len() as u64);
        data.extend_from_slice(&header);
        let payload = decode_shard_payload(&node_with(data.into(), 1)).unwrap();
        assert_eq!(payload.header.fanout, 1);
        assert_eq!(payload.header.seed, 0);
    }

    #[test]
    fn garbage_header_is_malformed() {
        let node = node_with(Bytes::from_static(&[0x02, 0x0f, 0x00]), 0);
        assert!(matches!(
            decode_shard_payload(&node),
            Err(HeaderError::MalformedHeader(_))
        ));
    }
}
