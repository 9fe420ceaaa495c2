//! From-scratch Bitcoin primitives.
//!
//! Everything consensus-shaped is implemented here rather than imported:
//! 256-bit modular arithmetic, the secp256k1 group, SHA-256 to FIPS 180-4,
//! ECDSA with RFC 6979 nonces, Base58Check, the P2PKH script machine,
//! transaction and block-header wire formats, and the proof-of-work
//! retarget rule. The exceptions are deliberate: RIPEMD-160 appears only
//! inside HASH160 and comes from the `ripemd` crate, and the OS entropy
//! source comes from `rand_core`.
//!
//! The crate is synchronous and pure; nothing here touches the network.
//! The pieces that need I/O take it through narrow interfaces
//! ([`tx::TxFetcher`], [`entropy`]) so callers decide where bytes come
//! from.

pub mod base58;
pub mod block;
pub mod curve;
pub mod ecdsa;
pub mod encode;
pub mod entropy;
pub mod error;
pub mod field;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod network;
pub mod script;
pub mod secp256k1;
pub mod tx;
pub mod u256;

pub use error::{Error, Result};
pub use hash::H256;
pub use network::Network;
pub use u256::U256;
