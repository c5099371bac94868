//! Error types for dbnet-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// dbnet-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply within the configured timeout
    #[error("Reply timeout")]
    Timeout,

    /// Controller did not answer the connection probe
    #[error("Handshake timeout: no reply from controller")]
    HandshakeTimeout,

    /// Controller replies decrypt to garbage, which means the password is wrong
    #[error("Handshake rejected (check the station password)")]
    HandshakeRejected,

    /// Telegram check byte mismatch
    #[error("Checksum error: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch {
        /// Check byte computed over the received telegram
        expected: u8,
        /// Check byte carried by the received telegram
        actual: u8,
    },

    /// Frame or telegram structure is inconsistent
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame start byte is not a known telegram type
    #[error("Unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    /// Exchange failed after the session's retry budget
    #[error("Communication failed: {0}")]
    Comm(String),

    /// WID not present in the current catalog
    #[error("Unknown WID: {0}")]
    UnknownWid(u16),

    /// Value cannot be represented in the variable's declared type
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Controller refused the write
    #[error("Write rejected by controller (status {0:#04x})")]
    WriteNack(u8),

    /// Session is not in the Ready state
    #[error("Session not connected")]
    NotConnected,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration file error
    #[error("Config error: {0}")]
    Config(String),
}
