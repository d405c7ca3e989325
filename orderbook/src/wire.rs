//! Big-endian field extraction for fixed-layout feed messages.
//!
//! Every read is bounds-checked against the message slice; an undersized
//! message surfaces as a [`DecodeError`] instead of reading past the end.

use crate::message::MessageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty message")]
    Empty,

    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),

    #[error("malformed {kind:?} message: need {expected} bytes, got {actual}")]
    MalformedMessage {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    #[error("field at offset {offset} needs {width} bytes, message has {len}")]
    Truncated { offset: usize, width: usize, len: usize },

    #[error("invalid side indicator {0:#04x}")]
    InvalidSide(u8),
}

/// Copies `N` bytes starting at `offset`.
#[inline]
pub fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], DecodeError> {
    buf.get(offset..offset.saturating_add(N))
        .and_then(|s| s.try_into().ok())
        .ok_or(DecodeError::Truncated {
            offset,
            width: N,
            len: buf.len(),
        })
}

#[inline]
pub fn read_u8(buf: &[u8], offset: usize) -> Result<u8, DecodeError> {
    read_array::<1>(buf, offset).map(|b| b[0])
}

#[inline]
pub fn read_u16(buf: &[u8], offset: usize) -> Result<u16, DecodeError> {
    read_array(buf, offset).map(u16::from_be_bytes)
}

#[inline]
pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32, DecodeError> {
    read_array(buf, offset).map(u32::from_be_bytes)
}

/// 6-byte timestamp field. Same value as taking the top 48 bits of a
/// big-endian 8-byte read at `offset`, without touching bytes past `offset + 6`.
#[inline]
pub fn read_u48(buf: &[u8], offset: usize) -> Result<u64, DecodeError> {
    let b: [u8; 6] = read_array(buf, offset)?;
    Ok(u64::from_be_bytes([0, 0, b[0], b[1], b[2], b[3], b[4], b[5]]))
}

#[inline]
pub fn read_u64(buf: &[u8], offset: usize) -> Result<u64, DecodeError> {
    read_array(buf, offset).map(u64::from_be_bytes)
}

// Writers used by message encoding. Callers size the buffer first.

#[inline]
pub(crate) fn put_u16(buf: &mut [u8], offset: usize, v: u16) {
    buf[offset..offset + 2].copy_from_slice(&v.to_be_bytes());
}

#[inline]
pub(crate) fn put_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_be_bytes());
}

#[inline]
pub(crate) fn put_u48(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 6].copy_from_slice(&v.to_be_bytes()[2..]);
}

#[inline]
pub(crate) fn put_u64(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_network_order() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        assert_eq!(read_u16(&buf, 0).unwrap(), 0x0102);
        assert_eq!(read_u32(&buf, 1).unwrap(), 0x0203_0405);
        assert_eq!(read_u64(&buf, 1).unwrap(), 0x0203_0405_0607_0809);
        assert_eq!(read_u8(&buf, 8).unwrap(), 0x09);
    }

    #[test]
    fn u48_matches_eight_byte_shift() {
        let buf = [0xde, 0xad, 0xbe, 0xef, 0x12, 0x34, 0x56, 0x78];
        let reference = (u64::from_be_bytes(buf) & (((1u64 << 48) - 1) << 16)) >> 16;
        assert_eq!(read_u48(&buf, 0).unwrap(), reference);
        assert_eq!(reference, 0xdead_beef_1234);
    }

    #[test]
    fn u48_needs_only_six_bytes() {
        let buf = [0, 0, 0, 0, 0, 0x2a];
        assert_eq!(read_u48(&buf, 0).unwrap(), 42);
    }

    #[test]
    fn short_buffer_is_error() {
        let buf = [0u8; 5];
        assert_eq!(
            read_u32(&buf, 2),
            Err(DecodeError::Truncated { offset: 2, width: 4, len: 5 })
        );
        assert!(read_u64(&buf, 0).is_err());
        assert!(read_u8(&buf, 5).is_err());
        // offset past the end must not panic
        assert!(read_u16(&buf, 100).is_err());
    }

    #[test]
    fn writers_invert_readers() {
        let mut buf = [0u8; 8];
        put_u48(&mut buf, 1, 34_200_000_000_000);
        assert_eq!(read_u48(&buf, 1).unwrap(), 34_200_000_000_000);
        put_u16(&mut buf, 0, 0xbeef);
        assert_eq!(read_u16(&buf, 0).unwrap(), 0xbeef);
    }
}
