//! 32-bit FNV-1a, used to assign pin-set members to buckets.

use cairn_core::Cid;

const OFFSET_BASIS: u32 = 0x811c_9dc5;
const PRIME: u32 = 0x0100_0193;

pub fn fnv1a32(data: &[u8]) -> u32 {
    data.iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ *byte as u32).wrapping_mul(PRIME)
    })
}

/// Bucket of `cid` among `fanout` buckets.
///
/// Hashes `le32(seed) || base58(cid)`; the text form is what other
/// implementations of the format hash, so it must stay byte-for-byte equal.
pub fn bucket_for(seed: u32, cid: &Cid, fanout: u32) -> u32 {
    let text = cid.to_base58();
    let mut data = Vec::with_capacity(4 + text.len());
    data.extend_from_slice(&seed.to_le_bytes());
    data.extend_from_slice(text.as_bytes());
    fnv1a32(&data) % fanout
}
