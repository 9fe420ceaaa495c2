//! Base58 and Base58Check. The alphabet drops 0, O, I and l; the Check
//! variant appends the first four bytes of HASH256 as a checksum.
//!
//! Payloads here are at most 32 bytes (addresses are 25), so the radix
//! conversion runs over [`U256`] rather than a general big integer.

use crate::error::{Error, Result};
use crate::hash::hash256;
use crate::u256::U256;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Longest string a 32-byte payload can encode to.
const MAX_ENCODED_LEN: usize = 44;

/// Encodes up to 32 bytes. Leading zero bytes become leading '1's.
pub fn encode(data: &[u8]) -> String {
    debug_assert!(data.len() <= 32, "base58 payloads are at most 32 bytes");

    let leading_zeros = data.iter().take_while(|&&b| b == 0).count();
    let mut num = U256::from_be_slice(data).expect("length checked above");
    let fifty_eight = U256::from(58u8);

    let mut out = Vec::with_capacity(MAX_ENCODED_LEN);
    while !num.is_zero() {
        let (quot, rem) = num.div_rem(fifty_eight);
        out.push(ALPHABET[usize::from(rem.to_le_bytes()[0])]);
        num = quot;
    }
    out.extend(std::iter::repeat(b'1').take(leading_zeros));
    out.reverse();

    String::from_utf8(out).expect("alphabet is ASCII")
}

/// Decodes a base58 string of at most 32 bytes' worth of digits.
pub fn decode(s: &str) -> Result<Vec<u8>> {
    if s.len() > MAX_ENCODED_LEN {
        return Err(Error::Parse(format!(
            "base58 string too long: {} chars",
            s.len()
        )));
    }

    let leading_ones = s.bytes().take_while(|&b| b == b'1').count();

    let mut num = U256::ZERO;
    for c in s.bytes() {
        let digit = ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| Error::Parse(format!("invalid base58 character {:?}", char::from(c))))?;
        let (scaled, overflow) = num.overflowing_mul(58);
        if overflow {
            return Err(Error::Parse("base58 value out of range".into()));
        }
        let (sum, overflow) = scaled.overflowing_add(U256::from(digit as u64));
        if overflow {
            return Err(Error::Parse("base58 value out of range".into()));
        }
        num = sum;
    }

    let be = num.to_be_bytes();
    let significant = be.iter().skip_while(|&&b| b == 0).copied();
    let mut out = vec![0u8; leading_ones];
    out.extend(significant);
    Ok(out)
}

/// Base58 with a 4-byte HASH256 checksum suffix.
pub fn encode_check(payload: &[u8]) -> String {
    let checksum = hash256(payload);
    let mut full = Vec::with_capacity(payload.len() + 4);
    full.extend_from_slice(payload);
    full.extend_from_slice(&checksum.0[..4]);
    encode(&full)
}

/// Decodes and verifies the checksum, returning the payload without it.
pub fn decode_check(s: &str) -> Result<Vec<u8>> {
    let full = decode(s)?;
    if full.len() < 4 {
        return Err(Error::Parse("base58check string too short".into()));
    }
    let (payload, checksum) = full.split_at(full.len() - 4);
    let expected = hash256(payload);
    if checksum != &expected.0[..4] {
        return Err(Error::Crypto(format!(
            "base58check checksum mismatch: got {}, expected {}",
            hex::encode(checksum),
            hex::encode(&expected.0[..4])
        )));
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_encodings() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(&[0x00]), "1");
        assert_eq!(encode(&[0x00, 0x00, 0x01]), "112");
        // 0x73 = 115 = 1*58 + 57 -> "2z"
        assert_eq!(encode(&[0x73]), "2z");
    }

    #[test]
    fn round_trips() {
        for data in [
            &b""[..],
            &[0u8][..],
            &[0, 0, 0, 1, 2, 3][..],
            &[0xff; 25][..],
            &[0x42; 32][..],
        ] {
            assert_eq!(decode(&encode(data)).unwrap(), data, "{data:02x?}");
        }
    }

    #[test]
    fn rejects_bad_characters() {
        assert!(decode("0OIl").is_err());
        assert!(decode("abc!").is_err());
    }

    #[test]
    fn check_round_trip() {
        let payload = [0x6f; 21];
        let encoded = encode_check(&payload);
        assert_eq!(decode_check(&encoded).unwrap(), payload);
    }

    #[test]
    fn check_detects_corruption() {
        let payload = [0x00, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20];
        let encoded = encode_check(&payload);
        // Flip one character to a different alphabet member.
        let mut corrupted: Vec<u8> = encoded.clone().into_bytes();
        let idx = corrupted.len() / 2;
        corrupted[idx] = if corrupted[idx] == b'2' { b'3' } else { b'2' };
        let corrupted = String::from_utf8(corrupted).unwrap();
        assert!(matches!(
            decode_check(&corrupted),
            Err(Error::Crypto(_)) | Err(Error::Parse(_))
        ));
    }
}
