//! Merkle-DAG nodes and their canonical encoding.
//!
//! The encoding is the dag-pb protobuf layout: every link as field 2 in link
//! order, then the payload as field 1 when it is non-empty. Links are
//! written with all three of their fields so that `decode` followed by
//! `encode` reproduces the same bytes, and therefore the same [`Cid`].

use bytes::{Bytes, BytesMut};

use crate::cid::{Cid, CidError};
use crate::pb::{self, WIRE_LEN, WIRE_VARINT, WireError};

const NODE_DATA_FIELD: u32 = 1;
const NODE_LINK_FIELD: u32 = 2;
const LINK_HASH_FIELD: u32 = 1;
const LINK_NAME_FIELD: u32 = 2;
const LINK_SIZE_FIELD: u32 = 3;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum NodeDecodeError {
    #[error("malformed node encoding: {0}")]
    Wire(#[from] WireError),

    #[error("invalid link hash: {0}")]
    InvalidLinkHash(#[from] CidError),

    #[error("link name is not valid UTF-8")]
    InvalidLinkName,

    #[error("link is missing its hash")]
    MissingLinkHash,

    #[error("unexpected wire type {wire_type} for field {field}")]
    UnexpectedWireType { field: u32, wire_type: u8 },
}

/// A named, sized reference from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DagLink {
    pub name: String,
    /// Cumulative size of the target subtree, or a placeholder.
    pub size: u64,
    pub cid: Cid,
}

impl DagLink {
    pub fn new(name: impl Into<String>, size: u64, cid: Cid) -> Self {
        Self {
            name: name.into(),
            size,
            cid,
        }
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        pb::put_len_delimited(buf, LINK_HASH_FIELD, &self.cid.to_bytes());
        pb::put_len_delimited(buf, LINK_NAME_FIELD, self.name.as_bytes());
        pb::put_varint_field(buf, LINK_SIZE_FIELD, self.size);
    }

    fn decode(mut buf: &[u8]) -> Result<Self, NodeDecodeError> {
        let mut cid = None;
        let mut name = String::new();
        let mut size = 0;

        while !buf.is_empty() {
            let (field, wire_type) = pb::get_key(&mut buf)?;
            match (field, wire_type) {
                (LINK_HASH_FIELD, WIRE_LEN) => {
                    cid = Some(Cid::from_bytes(pb::get_len_delimited(&mut buf)?)?);
                }
                (LINK_NAME_FIELD, WIRE_LEN) => {
                    let raw = pb::get_len_delimited(&mut buf)?;
                    name = std::str::from_utf8(raw)
                        .map_err(|_| NodeDecodeError::InvalidLinkName)?
                        .to_owned();
                }
                (LINK_SIZE_FIELD, WIRE_VARINT) => size = pb::get_varint(&mut buf)?,
                (LINK_HASH_FIELD | LINK_NAME_FIELD | LINK_SIZE_FIELD, _) => {
                    return Err(NodeDecodeError::UnexpectedWireType { field, wire_type });
                }
                (_, _) => pb::skip_field(&mut buf, wire_type)?,
            }
        }

        Ok(Self {
            name,
            size,
            cid: cid.ok_or(NodeDecodeError::MissingLinkHash)?,
        })
    }
}

/// Immutable DAG node: opaque payload plus ordered links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DagNode {
    pub data: Bytes,
    pub links: Vec<DagLink>,
}

impl DagNode {
    pub fn new(data: impl Into<Bytes>, links: Vec<DagLink>) -> Self {
        Self {
            data: data.into(),
            links,
        }
    }

    /// The node with no payload and no links.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + self.links.len() * 48);
        let mut link_buf = BytesMut::new();
        for link in &self.links {
            link_buf.clear();
            link.encode_into(&mut link_buf);
            pb::put_len_delimited(&mut buf, NODE_LINK_FIELD, &link_buf);
        }
        if !self.data.is_empty() {
            pb::put_len_delimited(&mut buf, NODE_DATA_FIELD, &self.data);
        }
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NodeDecodeError> {
        let mut buf = bytes;
        let mut node = DagNode::empty();

        while !buf.is_empty() {
            let (field, wire_type) = pb::get_key(&mut buf)?;
            match (field, wire_type) {
                (NODE_LINK_FIELD, WIRE_LEN) => {
                    node.links
                        .push(DagLink::decode(pb::get_len_delimited(&mut buf)?)?);
                }
                (NODE_DATA_FIELD, WIRE_LEN) => {
                    node.data = Bytes::copy_from_slice(pb::get_len_delimited(&mut buf)?);
                }
                (NODE_LINK_FIELD | NODE_DATA_FIELD, _) => {
                    return Err(NodeDecodeError::UnexpectedWireType { field, wire_type });
                }
                (_, _) => pb::skip_field(&mut buf, wire_type)?,
            }
        }

        Ok(node)
    }

    pub fn cid(&self) -> Cid {
        Cid::digest(&self.encode())
    }

    /// Encoded size of this node plus the sizes recorded on its links.
    pub fn size(&self) -> u64 {
        let own = self.encode().len() as u64;
        self.links
            .iter()
            .fold(own, |acc, link| acc.saturating_add(link.size))
    }

    /// Last link carrying `name`, if any.
    pub fn link_named(&self, name: &str) -> Option<&DagLink> {
        self.links.iter().rev().find(|link| link.name == name)
    }
}
