//! The I/O shell around `btc-primitives`: a blocking P2P client, a
//! validating header chain, an explorer-backed prev-tx fetcher, and the
//! configuration the binary reads.

pub mod chain;
pub mod config;
pub mod fetcher;
pub mod p2p;
