//! Private and public keys, SEC encoding, and Base58Check addresses.

use std::fmt;

use crate::base58;
use crate::curve::Point;
use crate::ecdsa::{self, Signature};
use crate::error::{Error, Result};
use crate::field::FieldElement;
use crate::hash::hash160;
use crate::network::Network;
use crate::secp256k1::SECP256K1;
use crate::u256::U256;

/// A secret scalar in [1, n-1].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PrivateKey {
    secret: U256,
}

impl PrivateKey {
    pub fn new(secret: U256) -> Result<PrivateKey> {
        if secret.is_zero() || secret >= SECP256K1.n {
            return Err(Error::Invariant(
                "secret scalar outside [1, n-1]".into(),
            ));
        }
        Ok(PrivateKey { secret })
    }

    pub fn from_hex(s: &str) -> Result<PrivateKey> {
        PrivateKey::new(U256::from_hex(s)?)
    }

    pub fn secret(&self) -> U256 {
        self.secret
    }

    /// The corresponding public point, secret * G.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            point: SECP256K1.g().scalar_mul(self.secret),
        }
    }

    /// Deterministic ECDSA signature over digest z.
    pub fn sign(&self, z: U256) -> Signature {
        ecdsa::sign(self.secret, z)
    }
}

impl fmt::Debug for PrivateKey {
    // The scalar stays out of debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.secret)
    }
}

/// A non-infinity point on secp256k1.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey {
    point: Point,
}

impl PublicKey {
    pub fn from_point(point: Point) -> Result<PublicKey> {
        if point.is_infinity() {
            return Err(Error::Invariant("public key cannot be infinity".into()));
        }
        Ok(PublicKey { point })
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    /// SEC serialization: `04 || X || Y` uncompressed, or `02/03 || X`
    /// compressed with the prefix carrying Y's parity.
    pub fn sec(&self, compressed: bool) -> Vec<u8> {
        let x = self.point.x().expect("public keys are never infinity");
        let y = self.point.y().expect("public keys are never infinity");
        if compressed {
            let mut out = Vec::with_capacity(33);
            out.push(if y.bit(0) { 0x03 } else { 0x02 });
            out.extend_from_slice(&x.to_be_bytes());
            out
        } else {
            let mut out = Vec::with_capacity(65);
            out.push(0x04);
            out.extend_from_slice(&x.to_be_bytes());
            out.extend_from_slice(&y.to_be_bytes());
            out
        }
    }

    /// Parses either SEC form. The compressed form recovers Y as the
    /// square root of x^3 + 7 whose parity matches the prefix.
    pub fn parse_sec(bytes: &[u8]) -> Result<PublicKey> {
        match bytes {
            [0x04, rest @ ..] if rest.len() == 64 => {
                let x = U256::from_be_slice(&rest[..32])?;
                let y = U256::from_be_slice(&rest[32..])?;
                PublicKey::from_point(Point::new(&SECP256K1, x, y)?)
            }
            [prefix @ (0x02 | 0x03), rest @ ..] if rest.len() == 32 => {
                let x_num = U256::from_be_slice(rest)?;
                let x = FieldElement::new(x_num, SECP256K1.p)?;
                let b = FieldElement::new(SECP256K1.b, SECP256K1.p)?;
                let y_squared = x * x * x + b;
                let even_or_odd = y_squared.sqrt()?;
                let want_odd = *prefix == 0x03;
                let y = if even_or_odd.num().bit(0) == want_odd {
                    even_or_odd.num()
                } else {
                    SECP256K1.p.wrapping_sub(even_or_odd.num())
                };
                PublicKey::from_point(Point::new(&SECP256K1, x_num, y)?)
            }
            [prefix, ..] => Err(Error::Parse(format!(
                "invalid SEC prefix 0x{prefix:02x} for {} bytes",
                bytes.len()
            ))),
            [] => Err(Error::Parse("empty SEC bytes".into())),
        }
    }

    /// HASH160 of the SEC serialization; the payload P2PKH scripts lock to.
    pub fn hash160(&self, compressed: bool) -> [u8; 20] {
        hash160(&self.sec(compressed))
    }

    /// Base58Check address: network version byte plus the key hash.
    pub fn address(&self, compressed: bool, network: Network) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(network.address_version());
        payload.extend_from_slice(&self.hash160(compressed));
        base58::encode_check(&payload)
    }

    pub fn verify(&self, z: U256, sig: &Signature) -> bool {
        ecdsa::verify(&self.point, z, sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_secrets() {
        assert!(PrivateKey::new(U256::ZERO).is_err());
        assert!(PrivateKey::new(SECP256K1.n).is_err());
        assert!(PrivateKey::new(SECP256K1.n.wrapping_sub(U256::ONE)).is_ok());
    }

    #[test]
    fn sec_round_trips() {
        let key = PrivateKey::new(U256::from(0xdeadbeefu32)).unwrap();
        let public = key.public_key();

        for compressed in [true, false] {
            let sec = public.sec(compressed);
            assert_eq!(sec.len(), if compressed { 33 } else { 65 });
            assert_eq!(PublicKey::parse_sec(&sec).unwrap(), public);
        }
    }

    #[test]
    fn compressed_prefix_tracks_parity() {
        // 5 * G has an odd y; 2 * G an even one. Checked against the
        // uncompressed serialization rather than external vectors.
        for secret in 2u32..6 {
            let public = PrivateKey::new(U256::from(secret)).unwrap().public_key();
            let sec = public.sec(true);
            let y = public.point().y().unwrap();
            assert_eq!(sec[0], if y.bit(0) { 0x03 } else { 0x02 });
        }
    }

    #[test]
    fn sec_rejects_garbage() {
        assert!(PublicKey::parse_sec(&[]).is_err());
        assert!(PublicKey::parse_sec(&[0x05; 33]).is_err());
        assert!(PublicKey::parse_sec(&[0x02; 30]).is_err());
        // Uncompressed coordinates that are not on the curve.
        let mut off_curve = vec![0x04];
        off_curve.extend_from_slice(&U256::from(1u8).to_be_bytes());
        off_curve.extend_from_slice(&U256::from(1u8).to_be_bytes());
        assert!(PublicKey::parse_sec(&off_curve).is_err());
    }

    #[test]
    fn mastering_bitcoin_address_vector() {
        let key = PrivateKey::from_hex(
            "0x3aba4162c7251c891207b747840551a71939b0de081f85c4e44cf7c13e41daa6",
        )
        .unwrap();
        assert_eq!(
            key.public_key().address(true, Network::Mainnet),
            "14cxpo3MBCYYWCgF74SWTdcmxipnGUsPw3"
        );
    }

    #[test]
    fn testnet_addresses_differ_by_version() {
        let key = PrivateKey::new(U256::from(999u32)).unwrap();
        let mainnet = key.public_key().address(true, Network::Mainnet);
        let testnet = key.public_key().address(true, Network::Testnet);
        assert_ne!(mainnet, testnet);
        assert!(mainnet.starts_with('1'));
        assert!(testnet.starts_with('m') || testnet.starts_with('n'));
    }

    #[test]
    fn display_is_prefixed_hex() {
        let key = PrivateKey::new(U256::from(0xabcu16)).unwrap();
        assert_eq!(
            key.to_string(),
            format!("0x{:0>64}", "abc")
        );
    }
}
