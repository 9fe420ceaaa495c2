//! ECDSA over secp256k1: deterministic signing per RFC 6979, low-S
//! normalization, DER serialization, and verification.

use std::fmt;

use crate::curve::Point;
use crate::error::{Error, Result};
use crate::hash::hmac_sha256;
use crate::secp256k1::SECP256K1;
use crate::u256::U256;

/// An (r, s) signature pair; both positive and below the curve order.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: U256,
    pub s: U256,
}

impl Signature {
    /// DER encoding: 0x30, total length, then each integer as 0x02,
    /// length, unpadded big-endian bytes — left-padded with one zero byte
    /// when the high bit is set.
    pub fn der(&self) -> Vec<u8> {
        fn encode_int(x: U256) -> Vec<u8> {
            let be = x.to_be_bytes();
            let mut bytes: Vec<u8> = be.iter().skip_while(|&&b| b == 0).copied().collect();
            if bytes.is_empty() {
                bytes.push(0);
            }
            if bytes[0] & 0x80 != 0 {
                bytes.insert(0, 0);
            }
            bytes
        }

        let r = encode_int(self.r);
        let s = encode_int(self.s);
        let mut out = Vec::with_capacity(6 + r.len() + s.len());
        out.push(0x30);
        out.push((4 + r.len() + s.len()) as u8);
        out.push(0x02);
        out.push(r.len() as u8);
        out.extend_from_slice(&r);
        out.push(0x02);
        out.push(s.len() as u8);
        out.extend_from_slice(&s);
        out
    }

    /// Parses DER, rejecting structure that does not round-trip: wrong
    /// markers, length mismatches, empty or oversized integers.
    pub fn parse_der(bytes: &[u8]) -> Result<Signature> {
        fn take_int<'a>(rest: &'a [u8]) -> Result<(U256, &'a [u8])> {
            let [0x02, len, tail @ ..] = rest else {
                return Err(Error::Parse("DER integer marker missing".into()));
            };
            let len = usize::from(*len);
            if len == 0 || len > 33 || tail.len() < len {
                return Err(Error::Parse(format!("bad DER integer length {len}")));
            }
            let (int_bytes, rest) = tail.split_at(len);
            if len == 33 && int_bytes[0] != 0 {
                return Err(Error::Parse("DER integer exceeds 256 bits".into()));
            }
            let value = U256::from_be_slice(if len == 33 { &int_bytes[1..] } else { int_bytes })?;
            Ok((value, rest))
        }

        let [0x30, total, body @ ..] = bytes else {
            return Err(Error::Parse("DER signature marker missing".into()));
        };
        if usize::from(*total) != body.len() {
            return Err(Error::Parse(format!(
                "DER length byte {total} does not match {} body bytes",
                body.len()
            )));
        }
        let (r, rest) = take_int(body)?;
        let (s, rest) = take_int(rest)?;
        if !rest.is_empty() {
            return Err(Error::Parse("trailing bytes after DER signature".into()));
        }
        Ok(Signature { r, s })
    }

    /// Canonical signatures keep s in the lower half of the order.
    pub fn is_low_s(&self) -> bool {
        self.s <= SECP256K1.n >> 1
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(r: {:x}, s: {:x})", self.r, self.s)
    }
}

/// RFC 6979 nonce candidates for (secret, digest), in derivation order.
/// Practically the first candidate is always taken; the iterator form
/// exists so a zero r or s can pull the next one.
struct NonceSequence {
    k: [u8; 32],
    v: [u8; 32],
    first: bool,
}

impl NonceSequence {
    fn new(secret: U256, z: U256) -> Self {
        let mut k = [0u8; 32];
        let mut v = [1u8; 32];

        let mut seed = Vec::with_capacity(97);
        seed.extend_from_slice(&v);
        seed.push(0x00);
        seed.extend_from_slice(&secret.to_be_bytes());
        seed.extend_from_slice(&z.to_be_bytes());
        k = hmac_sha256(&k, &seed);
        v = hmac_sha256(&k, &v);

        seed.clear();
        seed.extend_from_slice(&v);
        seed.push(0x01);
        seed.extend_from_slice(&secret.to_be_bytes());
        seed.extend_from_slice(&z.to_be_bytes());
        k = hmac_sha256(&k, &seed);
        v = hmac_sha256(&k, &v);

        NonceSequence { k, v, first: true }
    }

    fn next_nonce(&mut self) -> U256 {
        loop {
            if !self.first {
                let mut retry = Vec::with_capacity(33);
                retry.extend_from_slice(&self.v);
                retry.push(0x00);
                self.k = hmac_sha256(&self.k, &retry);
                self.v = hmac_sha256(&self.k, &self.v);
            }
            self.first = false;

            self.v = hmac_sha256(&self.k, &self.v);
            let candidate = U256::from_be_bytes(&self.v);
            if !candidate.is_zero() && candidate < SECP256K1.n {
                return candidate;
            }
        }
    }
}

/// Signs digest z with the secret scalar e. The nonce is deterministic
/// (RFC 6979), so equal inputs give equal signatures; s is normalized to
/// the low half of the order.
pub fn sign(secret: U256, z: U256) -> Signature {
    let n = SECP256K1.n;
    let z = if z >= n { z.wrapping_sub(n) } else { z };
    let g = SECP256K1.g();

    let mut nonces = NonceSequence::new(secret, z);
    loop {
        let k = nonces.next_nonce();
        let r = match g.scalar_mul(k).x() {
            Some(x) => x % n,
            None => continue,
        };
        if r.is_zero() {
            continue;
        }
        let k_inv = k.inv_mod(n);
        let s = z.add_mod(r.mul_mod(secret, n), n).mul_mod(k_inv, n);
        if s.is_zero() {
            continue;
        }
        let s = if s > n >> 1 { n.wrapping_sub(s) } else { s };
        return Signature { r, s };
    }
}

/// Verifies signature (r, s) on digest z against public point P:
/// accept iff (z/s)G + (r/s)P lands on x = r.
pub fn verify(point: &Point, z: U256, sig: &Signature) -> bool {
    let n = SECP256K1.n;
    if sig.r.is_zero() || sig.r >= n || sig.s.is_zero() || sig.s >= n {
        return false;
    }
    let z = z % n;
    let s_inv = sig.s.inv_mod(n);
    let u = z.mul_mod(s_inv, n);
    let v = sig.r.mul_mod(s_inv, n);
    let total = SECP256K1.g().scalar_mul(u) + point.scalar_mul(v);
    match total.x() {
        Some(x) => x % n == sig.r,
        None => false,
    }
}
