//! SHA-256 to FIPS 180-4, plus the two composite hashes Bitcoin leans on:
//! HASH256 (double SHA-256) and HASH160 (RIPEMD-160 over SHA-256), and an
//! HMAC-SHA-256 for deterministic nonce derivation.
//!
//! SHA-256 is implemented from scratch; RIPEMD-160 only ever appears inside
//! HASH160, so its 32-to-20-byte interface is taken from the `ripemd` crate.

use std::fmt;
use std::str::FromStr;

use ripemd::{Digest, Ripemd160};
use serde::de::{self, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// First 32 bits of the fractional parts of the square roots of the first
/// 8 primes; the FIPS 180-4 initial hash value.
const INIT: [u32; 8] = [
    0x6a09_e667,
    0xbb67_ae85,
    0x3c6e_f372,
    0xa54f_f53a,
    0x510e_527f,
    0x9b05_688c,
    0x1f83_d9ab,
    0x5be0_cd19,
];

/// First 32 bits of the fractional parts of the cube roots of the first
/// 64 primes; the FIPS 180-4 round constants.
const K: [u32; 64] = [
    0x428a_2f98, 0x7137_4491, 0xb5c0_fbcf, 0xe9b5_dba5, 0x3956_c25b, 0x59f1_11f1, 0x923f_82a4,
    0xab1c_5ed5, 0xd807_aa98, 0x1283_5b01, 0x2431_85be, 0x550c_7dc3, 0x72be_5d74, 0x80de_b1fe,
    0x9bdc_06a7, 0xc19b_f174, 0xe49b_69c1, 0xefbe_4786, 0x0fc1_9dc6, 0x240c_a1cc, 0x2de9_2c6f,
    0x4a74_84aa, 0x5cb0_a9dc, 0x76f9_88da, 0x983e_5152, 0xa831_c66d, 0xb003_27c8, 0xbf59_7fc7,
    0xc6e0_0bf3, 0xd5a7_9147, 0x06ca_6351, 0x1429_2967, 0x27b7_0a85, 0x2e1b_2138, 0x4d2c_6dfc,
    0x5338_0d13, 0x650a_7354, 0x766a_0abb, 0x81c2_c92e, 0x9272_2c85, 0xa2bf_e8a1, 0xa81a_664b,
    0xc24b_8b70, 0xc76c_51a3, 0xd192_e819, 0xd699_0624, 0xf40e_3585, 0x106a_a070, 0x19a4_c116,
    0x1e37_6c08, 0x2748_774c, 0x34b0_bcb5, 0x391c_0cb3, 0x4ed8_aa4a, 0x5b9c_ca4f, 0x682e_6ff3,
    0x748f_82ee, 0x78a5_636f, 0x84c8_7814, 0x8cc7_0208, 0x90be_fffa, 0xa450_6ceb, 0xbef9_a3f7,
    0xc671_78f2,
];

/// Streaming SHA-256 state: eight words of chaining state plus the
/// not-yet-compressed tail of the input.
pub struct Sha256 {
    state: [u32; 8],
    buffer: [u8; 64],
    buffered: usize,
    length: u64,
}

impl Sha256 {
    pub fn new() -> Self {
        Sha256 {
            state: INIT,
            buffer: [0u8; 64],
            buffered: 0,
            length: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.length += data.len() as u64;
        let mut rest = data;

        if self.buffered > 0 {
            let take = rest.len().min(64 - self.buffered);
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&rest[..take]);
            self.buffered += take;
            rest = &rest[take..];
            if self.buffered == 64 {
                let block = self.buffer;
                self.compress(&block);
                self.buffered = 0;
            }
        }

        let mut chunks = rest.chunks_exact(64);
        for block in &mut chunks {
            let block: [u8; 64] = block.try_into().expect("chunks_exact yields 64 bytes");
            self.compress(&block);
        }

        let tail = chunks.remainder();
        self.buffer[..tail.len()].copy_from_slice(tail);
        self.buffered = tail.len();
    }

    pub fn finalize(mut self) -> [u8; 32] {
        let bit_length = self.length * 8;

        // Append 0x80, zero-fill to 56 mod 64, then the big-endian bit
        // length.
        self.buffer[self.buffered] = 0x80;
        if self.buffered >= 56 {
            self.buffer[self.buffered + 1..].fill(0);
            let block = self.buffer;
            self.compress(&block);
            self.buffer.fill(0);
        } else {
            self.buffer[self.buffered + 1..56].fill(0);
        }
        self.buffer[56..].copy_from_slice(&bit_length.to_be_bytes());
        let block = self.buffer;
        self.compress(&block);

        let mut digest = [0u8; 32];
        for (chunk, word) in digest.chunks_exact_mut(4).zip(self.state) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        digest
    }

    /// One round of the FIPS 180-4 compression function over a 512-bit
    /// block.
    fn compress(&mut self, block: &[u8; 64]) {
        // Message schedule: 16 words from the block, 48 from the sigma
        // recurrence.
        let mut w = [0u32; 64];
        for (i, chunk) in block.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes(chunk.try_into().expect("chunks_exact yields 4 bytes"));
        }
        for i in 16..64 {
            let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
            let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
            w[i] = w[i - 16]
                .wrapping_add(s0)
                .wrapping_add(w[i - 7])
                .wrapping_add(s1);
        }

        let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = self.state;

        for i in 0..64 {
            let s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
            let ch = (e & f) ^ (!e & g);
            let t1 = h
                .wrapping_add(s1)
                .wrapping_add(ch)
                .wrapping_add(K[i])
                .wrapping_add(w[i]);
            let s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
            let maj = (a & b) ^ (a & c) ^ (b & c);
            let t2 = s0.wrapping_add(maj);

            h = g;
            g = f;
            f = e;
            e = d.wrapping_add(t1);
            d = c;
            c = b;
            b = a;
            a = t1.wrapping_add(t2);
        }

        for (s, v) in self.state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
            *s = s.wrapping_add(v);
        }
    }
}

impl Default for Sha256 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize()
}

/// HASH256: SHA-256 applied twice. Bitcoin's block, transaction, and
/// checksum hash.
pub fn hash256(data: &[u8]) -> H256 {
    H256(sha256(&sha256(data)))
}

/// HASH160: RIPEMD-160 over SHA-256. Bitcoin's public-key and script hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// HMAC-SHA-256 (RFC 2104) over the from-scratch hash. Only consumer is the
/// RFC 6979 nonce derivation.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    const BLOCK: usize = 64;

    let mut key_block = [0u8; BLOCK];
    if key.len() > BLOCK {
        key_block[..32].copy_from_slice(&sha256(key));
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    let ipad: Vec<u8> = key_block.iter().map(|b| b ^ 0x36).collect();
    inner.update(&ipad);
    inner.update(message);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    let opad: Vec<u8> = key_block.iter().map(|b| b ^ 0x5c).collect();
    outer.update(&opad);
    outer.update(&inner_digest);
    outer.finalize()
}

/// A 32-byte hash in Bitcoin's internal byte order (the order it appears in
/// on the wire). Human-facing hex is the byte-reversed view; see
/// [`H256::to_display_hex`].
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct H256(pub [u8; 32]);

impl H256 {
    pub const ZERO: H256 = H256([0u8; 32]);

    /// Hex in the familiar big-endian display order (block explorers,
    /// `getheaders` RPCs).
    pub fn to_display_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }

    /// Parses display-order hex into the internal byte order.
    pub fn from_display_hex(s: &str) -> Result<H256> {
        let mut hash: H256 = s.parse()?;
        hash.0.reverse();
        Ok(hash)
    }
}

impl From<[u8; 32]> for H256 {
    fn from(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }
}

impl TryFrom<Vec<u8>> for H256 {
    type Error = Error;

    fn try_from(value: Vec<u8>) -> Result<Self> {
        let len = value.len();
        Ok(H256(value.try_into().map_err(|_| {
            Error::Parse(format!("expected 32 hash bytes, got {len}"))
        })?))
    }
}

impl FromStr for H256 {
    type Err = Error;

    /// Parses hex in internal byte order.
    fn from_str(s: &str) -> Result<Self> {
        hex::decode(s)
            .map_err(|e| Error::Parse(format!("invalid hash hex: {e}")))?
            .try_into()
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256({})", hex::encode(self.0))
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct HexVisitor;

        impl<'de> Visitor<'de> for HexVisitor {
            type Value = H256;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a hex string")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

impl Serialize for H256 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fips_vectors() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(sha256(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq")),
            "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1"
        );
    }

    #[test]
    fn file_sized_inputs_match_reference() {
        use sha2::Digest as _;

        // Lengths straddling every padding branch: short, exactly one
        // block, the 55/56/64 boundaries, and a multi-block tail.
        for len in [0usize, 1, 54, 55, 56, 63, 64, 65, 119, 120, 128, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31) as u8).collect();
            let reference: [u8; 32] = sha2::Sha256::digest(&data).into();
            assert_eq!(sha256(&data), reference, "length {len}");
        }
    }

    #[test]
    fn streaming_matches_one_shot() {
        let data: Vec<u8> = (0..300).map(|i| i as u8).collect();
        let mut hasher = Sha256::new();
        for chunk in data.chunks(7) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.finalize(), sha256(&data));
    }

    #[test]
    fn spec_test_file_digest() {
        assert_eq!(
            hex::encode(sha256(b"some test file lol\n")),
            "4a79aed64097a0cd9e87f1e88e9ad771ddb5c5d762b3c3bbf02adf3112d5d375"
        );
    }

    #[test]
    fn hash160_composition() {
        use sha2::Digest as _;

        let data = b"hash160 input";
        let reference: [u8; 20] =
            Ripemd160::digest(sha2::Sha256::digest(data)).into();
        assert_eq!(hash160(data), reference);
    }

    #[test]
    fn hmac_rfc4231_vector() {
        // RFC 4231 test case 2.
        let digest = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(digest),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_long_key() {
        // Keys longer than the block size are hashed down first; check
        // against RFC 4231 test case 6.
        let key = [0xaau8; 131];
        let digest = hmac_sha256(&key, b"Test Using Larger Than Block-Size Key - Hash Key First");
        assert_eq!(
            hex::encode(digest),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }

    #[test]
    fn display_order_round_trip() {
        let genesis = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
        let hash = H256::from_display_hex(genesis).unwrap();
        assert_eq!(hash.to_display_hex(), genesis);
        // Internal order is the reverse.
        assert_eq!(hash.0[31], 0x00);
        assert_eq!(hash.0[0], 0x6f);
    }

    #[test]
    fn serde_hex_round_trip() {
        let hash = hash256(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        let back: H256 = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, back);
    }
}
