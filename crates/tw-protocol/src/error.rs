//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Unknown frame kind
    #[error("Unknown frame kind: {0:#04x}")]
    UnknownFrameKind(u8),

    /// Header kind and payload disagree
    #[error("Frame kind mismatch: header says {header:?}, payload is {payload:?}")]
    KindMismatch {
        header: crate::message::FrameKind,
        payload: crate::message::FrameKind,
    },

    /// Payload exceeds maximum size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
