//! Error types and handling for the game API client
//!
//! Provides structured error types for every stage of the encrypted request
//! pipeline, with enough context (operation name, underlying cause) to log and
//! exit from the binary.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Operation;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures of the symmetric payload cipher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key length is not one of the supported AES sizes
    #[error("invalid key length {0} (expected 16, 24 or 32 bytes)")]
    InvalidKeyLength(usize),

    /// IV length is not one AES block
    #[error("invalid IV length {0} (expected 16 bytes)")]
    InvalidIvLength(usize),

    /// Key or IV was not valid hex
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex {
        /// Which field failed to decode
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Ciphertext cannot be a CBC output
    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    InvalidCiphertextLength(usize),

    /// Decrypted block did not end in valid PKCS#7 padding
    #[error("bad padding after decryption")]
    BadPadding,
}

/// Failures of the MessagePack / JSON body codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Value could not be written
    #[error("MessagePack encode error: {0}")]
    Encode(String),

    /// Bytes are not a MessagePack value
    #[error("MessagePack decode error: {0}")]
    Decode(String),

    /// A complete value was followed by garbage
    #[error("{0} trailing bytes after MessagePack value")]
    TrailingBytes(usize),

    /// Body declared as JSON did not parse
    #[error("JSON decode error: {0}")]
    Json(String),
}

/// Comprehensive error type for the client pipeline
#[derive(Error, Debug)]
pub enum ClientError {
    // ═══════════════════════════════════════════════════════════════
    // Payload Errors
    // ═══════════════════════════════════════════════════════════════
    /// Encryption or decryption failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Binary or JSON payload was malformed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    // ═══════════════════════════════════════════════════════════════
    // Network & HTTP Errors
    // ═══════════════════════════════════════════════════════════════
    /// Connection, DNS or timeout failure
    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// A header value could not be put on the wire
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    /// Server answered with a non-success status
    #[error("Server returned {status} ({class})")]
    ServerStatus {
        status: u16,
        class: crate::client::ApiStatus,
    },

    // ═══════════════════════════════════════════════════════════════
    // Operation Errors
    // ═══════════════════════════════════════════════════════════════
    /// Response body does not have the shape the operation needs
    #[error("Unexpected {record} payload: {reason}")]
    DecodeValidation { record: &'static str, reason: String },

    /// Operation ran in a session state that does not allow it
    #[error("{operation} cannot run: {reason}")]
    Precondition {
        operation: Operation,
        reason: &'static str,
    },

    /// Failure raised while running a named operation
    #[error("{operation} failed: {source}")]
    Operation {
        operation: Operation,
        #[source]
        source: Box<ClientError>,
    },

    // ═══════════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════════
    /// Failed to read configuration file
    #[error("Failed to read config from {path}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Wrap this error with the operation it was raised in
    #[must_use]
    pub fn in_operation(self, operation: Operation) -> Self {
        match self {
            already @ Self::Operation { .. } => already,
            other => Self::Operation {
                operation,
                source: Box::new(other),
            },
        }
    }

    /// The underlying cause, skipping operation context
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get the exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Self::ConfigRead { .. } | Self::InvalidConfig(_) => 2,
            Self::Transport { .. } | Self::InvalidHeader { .. } => 4,
            Self::Crypto(_) | Self::Codec(_) => 5,
            Self::DecodeValidation { .. } => 6,
            Self::Precondition { .. } => 7,
            Self::ServerStatus { .. } => 8,
            Self::Operation { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_skips_operation_context() {
        let err = ClientError::from(CryptoError::BadPadding).in_operation(Operation::Authenticate);
        assert!(matches!(err.root(), ClientError::Crypto(CryptoError::BadPadding)));
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().starts_with("Authenticate failed"));
    }

    #[test]
    fn test_context_is_not_nested_twice() {
        let err = ClientError::InvalidConfig("x".to_string())
            .in_operation(Operation::RefreshSignature)
            .in_operation(Operation::UpdateSystemInfo);
        assert!(matches!(
            err,
            ClientError::Operation {
                operation: Operation::RefreshSignature,
                ..
            }
        ));
    }
}
