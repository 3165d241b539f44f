//! Protobuf wire primitives.
//!
//! Only the handful of encodings the DAG node codec and the pin-set header
//! need: base-128 varints, field keys, length-delimited fields and
//! little-endian `fixed32`. Decoders read from a `&mut &[u8]` cursor and
//! advance it past what they consumed.

use bytes::{Buf, BufMut};

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_FIXED64: u8 = 1;
pub const WIRE_LEN: u8 = 2;
pub const WIRE_FIXED32: u8 = 5;

/// Longest valid encoding of a `u64` varint.
const MAX_VARINT_LEN: usize = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WireError {
    #[error("truncated varint")]
    TruncatedVarint,

    #[error("varint overflows 64 bits")]
    VarintOverflow,

    #[error("value {0} does not fit a uint32 field")]
    Uint32Overflow(u64),

    #[error("field length {len} exceeds remaining {remaining} bytes")]
    LengthOverrun { len: u64, remaining: usize },

    #[error("truncated fixed-width field")]
    TruncatedFixed,

    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u8),

    #[error("field number 0 is reserved")]
    ZeroField,
}

pub fn put_varint(buf: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

pub fn put_key(buf: &mut impl BufMut, field: u32, wire_type: u8) {
    put_varint(buf, ((field as u64) << 3) | wire_type as u64);
}

pub fn put_varint_field(buf: &mut impl BufMut, field: u32, value: u64) {
    put_key(buf, field, WIRE_VARINT);
    put_varint(buf, value);
}

pub fn put_len_delimited(buf: &mut impl BufMut, field: u32, bytes: &[u8]) {
    put_key(buf, field, WIRE_LEN);
    put_varint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

pub fn put_fixed32_field(buf: &mut impl BufMut, field: u32, value: u32) {
    put_key(buf, field, WIRE_FIXED32);
    buf.put_u32_le(value);
}

pub fn get_varint(buf: &mut &[u8]) -> Result<u64, WireError> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(WireError::TruncatedVarint);
        }
        let byte = buf.get_u8();
        let bits = (byte & 0x7f) as u64;
        if i == MAX_VARINT_LEN - 1 && bits > 1 {
            return Err(WireError::VarintOverflow);
        }
        value |= bits << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(WireError::VarintOverflow)
}

/// Reads a varint that must fit a `uint32` field.
pub fn get_varint_u32(buf: &mut &[u8]) -> Result<u32, WireError> {
    let value = get_varint(buf)?;
    u32::try_from(value).map_err(|_| WireError::Uint32Overflow(value))
}

/// Reads a field key, returning `(field_number, wire_type)`.
pub fn get_key(buf: &mut &[u8]) -> Result<(u32, u8), WireError> {
    let key = get_varint(buf)?;
    let field = (key >> 3) as u32;
    if field == 0 {
        return Err(WireError::ZeroField);
    }
    Ok((field, (key & 0x7) as u8))
}

pub fn get_len_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], WireError> {
    let len = get_varint(buf)?;
    let slice: &'a [u8] = *buf;
    let remaining = slice.len();
    if len > remaining as u64 {
        return Err(WireError::LengthOverrun { len, remaining });
    }
    let (field, rest) = slice.split_at(len as usize);
    *buf = rest;
    Ok(field)
}

pub fn get_fixed32(buf: &mut &[u8]) -> Result<u32, WireError> {
    if buf.remaining() < 4 {
        return Err(WireError::TruncatedFixed);
    }
    Ok(buf.get_u32_le())
}

/// Skips over the value of a field whose key has already been read.
pub fn skip_field(buf: &mut &[u8], wire_type: u8) -> Result<(), WireError> {
    match wire_type {
        WIRE_VARINT => get_varint(buf).map(|_| ()),
        WIRE_FIXED64 => {
            if buf.remaining() < 8 {
                return Err(WireError::TruncatedFixed);
            }
            buf.advance(8);
            Ok(())
        }
        WIRE_LEN => get_len_delimited(buf).map(|_| ()),
        WIRE_FIXED32 => get_fixed32(buf).map(|_| ()),
        other => Err(WireError::UnsupportedWireType(other)),
    }
}
