//! Byte-level helpers shared by every wire format in the library: varints,
//! fixed-width little-endian integers, and exact reads that turn EOF into a
//! parse error instead of an I/O error.

use std::io::Read;

use crate::error::{Error, Result};

/// Reads exactly `n` bytes, reporting truncation as a parse failure.
pub fn read_bytes(reader: &mut impl Read, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    fill(reader, &mut buf)?;
    Ok(buf)
}

/// Reads a fixed-size array, reporting truncation as a parse failure.
pub fn read_array<const N: usize>(reader: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    fill(reader, &mut buf)?;
    Ok(buf)
}

pub fn read_u16_le(reader: &mut impl Read) -> Result<u16> {
    Ok(u16::from_le_bytes(read_array(reader)?))
}

pub fn read_u32_le(reader: &mut impl Read) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(reader)?))
}

pub fn read_u64_le(reader: &mut impl Read) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(reader)?))
}

pub fn read_i64_le(reader: &mut impl Read) -> Result<i64> {
    Ok(i64::from_le_bytes(read_array(reader)?))
}

/// Bitcoin's variable-length unsigned integer: one byte below 0xfd, else a
/// marker byte followed by a 2-, 4-, or 8-byte little-endian value.
pub fn read_varint(reader: &mut impl Read) -> Result<u64> {
    let first = read_array::<1>(reader)?[0];
    read_varint_tail(first, reader)
}

/// Finishes a varint whose first byte was already consumed, which is how
/// the transaction parser discovers the SegWit marker.
pub fn read_varint_tail(first: u8, reader: &mut impl Read) -> Result<u64> {
    match first {
        0xfd => Ok(u64::from(read_u16_le(reader)?)),
        0xfe => Ok(u64::from(read_u32_le(reader)?)),
        0xff => read_u64_le(reader),
        small => Ok(u64::from(small)),
    }
}

pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// A varint-prefixed byte string, as used for user agents and witness
/// items.
pub fn read_varbytes(reader: &mut impl Read) -> Result<Vec<u8>> {
    let len = read_varint(reader)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Parse(format!("varbytes length {len} out of range")))?;
    read_bytes(reader, len)
}

pub fn write_varbytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn fill(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Parse("unexpected end of input".into())
        } else {
            Error::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, value);
        assert_eq!(read_varint(&mut buf.as_slice()).unwrap(), value);
        buf
    }

    #[test]
    fn varint_boundaries() {
        assert_eq!(round_trip(0).len(), 1);
        assert_eq!(round_trip(0xfc).len(), 1);
        assert_eq!(round_trip(0xfd).len(), 3);
        assert_eq!(round_trip(0xffff).len(), 3);
        assert_eq!(round_trip(0x10000).len(), 5);
        assert_eq!(round_trip(0xffff_ffff).len(), 5);
        assert_eq!(round_trip(0x1_0000_0000).len(), 9);
        assert_eq!(round_trip(u64::MAX).len(), 9);
    }

    #[test]
    fn varint_known_bytes() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 555);
        assert_eq!(buf, [0xfd, 0x2b, 0x02]);
    }

    #[test]
    fn truncation_is_a_parse_error() {
        let err = read_varint(&mut [0xfdu8, 0x01].as_slice()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = read_bytes(&mut [1u8, 2].as_slice(), 3).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn varbytes_round_trip() {
        let mut buf = Vec::new();
        write_varbytes(&mut buf, b"witness item");
        assert_eq!(read_varbytes(&mut buf.as_slice()).unwrap(), b"witness item");
    }
}
