//! Entropy sources for key generation: the OS random number generator, and
//! a keyboard-timing mixer for the paranoid. Both reduce to a secret scalar
//! the same way: 32 bytes read as a big-endian integer modulo the curve
//! order, rejecting zero.

use rand_core::{OsRng, RngCore};

use crate::error::{Error, Result};
use crate::hash::sha256;
use crate::keys::PrivateKey;
use crate::secp256k1::SECP256K1;
use crate::u256::U256;

/// Minimum number of user inputs the mixer accepts.
pub const MIN_USER_INPUTS: usize = 5;

/// Uniform random bytes from the operating system.
pub fn rand_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// A fresh secret from OS randomness. The zero residue is rejected and
/// redrawn; the modulo bias from reduction is below 2^-128 for secp256k1.
pub fn secret_from_os() -> PrivateKey {
    loop {
        let mut buf = [0u8; 32];
        OsRng.fill_bytes(&mut buf);
        let candidate = U256::from_be_bytes(&buf) % SECP256K1.n;
        if let Ok(key) = PrivateKey::new(candidate) {
            return key;
        }
    }
}

/// A secret from user-supplied entropy: each input is folded into a
/// running SHA-256 seed, then the seed reduces modulo n like the OS path.
/// The caller is expected to mix timing jitter into the input strings.
pub fn secret_from_user<I, S>(inputs: I) -> Result<PrivateKey>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut count = 0usize;
    let mut seed = [0u8; 32];
    for input in inputs {
        count += 1;
        let mut material = seed.to_vec();
        material.extend_from_slice(input.as_ref());
        seed = sha256(&material);
    }
    if count < MIN_USER_INPUTS {
        return Err(Error::Invariant(format!(
            "need at least {MIN_USER_INPUTS} entropy inputs, got {count}"
        )));
    }

    loop {
        let candidate = U256::from_be_bytes(&seed) % SECP256K1.n;
        if let Ok(key) = PrivateKey::new(candidate) {
            return Ok(key);
        }
        // A zero residue is astronomically unlikely; stretch once more
        // rather than fail.
        seed = sha256(&seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_bytes_has_the_requested_length() {
        assert_eq!(rand_bytes(0).len(), 0);
        assert_eq!(rand_bytes(32).len(), 32);
        // Two draws colliding would mean the source is broken.
        assert_ne!(rand_bytes(32), rand_bytes(32));
    }

    #[test]
    fn os_secrets_are_in_range_and_distinct() {
        let a = secret_from_os();
        let b = secret_from_os();
        assert_ne!(a.secret(), b.secret());
    }

    #[test]
    fn user_entropy_requires_five_inputs() {
        let few = ["a", "b", "c", "d"];
        assert!(matches!(
            secret_from_user(few),
            Err(Error::Invariant(_))
        ));
    }

    #[test]
    fn user_entropy_is_deterministic_in_its_inputs() {
        let inputs = ["one 172", "two 9917", "three 3", "four 4410", "five 82"];
        let a = secret_from_user(inputs).unwrap();
        let b = secret_from_user(inputs).unwrap();
        assert_eq!(a.secret(), b.secret());

        let different = ["one 172", "two 9917", "three 3", "four 4410", "five 83"];
        let c = secret_from_user(different).unwrap();
        assert_ne!(a.secret(), c.secret());
    }
}
