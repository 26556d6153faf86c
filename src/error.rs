//! Error types for spdg.
//!
//! Errors are never the primary result of an operation; those are
//! `Outcome` pairs. An `SpdgError` is the diagnostic detail that travels
//! alongside an `ERR` outcome. Messages are intentionally minimal: they
//! signal *what* failed without revealing key or plaintext state.

use thiserror::Error;

/// The single error type for all spdg failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpdgError {
    /// Key material was invalid (wrong length, non-contributory, etc.).
    #[error("invalid key")]
    InvalidKey,

    /// Encryption failed. The underlying `ring` operation returned an error.
    #[error("encryption failed")]
    EncryptionFailure,

    /// Decryption failed with a matching key: tampered or corrupted ciphertext.
    #[error("decryption failed")]
    DecryptionFailure,

    /// Content key derivation (HKDF) failed.
    #[error("key derivation failed")]
    KeyDerivationFailure,

    /// The system's random number generator failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// A stored ciphertext is shorter than its fixed header.
    #[error("malformed ciphertext")]
    MalformedCiphertext,

    /// A facade configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An audit sink could not be opened.
    #[error("audit sink unavailable: {0}")]
    AuditSink(String),
}

impl From<serde_json::Error> for SpdgError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for SpdgError {
    fn from(err: std::io::Error) -> Self {
        Self::AuditSink(err.to_string())
    }
}

/// Result type for fallible internals.
pub type Result<T> = std::result::Result<T, SpdgError>;
