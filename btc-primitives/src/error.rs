use thiserror::Error;

/// Library-wide error type. Parsing and validation return these to the
/// caller; script evaluation failure is a `false` result, not an error.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed bytes: bad varint, truncated message, invalid SEC prefix,
    /// non-canonical DER, point not on curve.
    #[error("parse error: {0}")]
    Parse(String),

    /// Signature invalid, checksum mismatch, proof-of-work target exceeded.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Unexpected peer message, magic or checksum mismatch, handshake
    /// failure.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket closed, read timeout, file read failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Precondition violation inside the core: mixing field primes, a
    /// scalar outside [1, n-1], and the like.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
