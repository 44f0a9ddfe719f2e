//! Error types for motor controller drivers.
//!
//! Two layers are kept apart:
//!
//! - **`TransportError`**: the byte-stream layer failed (connection could not be
//!   opened, a write or read failed, a read timed out with nothing usable, or the
//!   peer closed the link). Every transport error raises the axis
//!   communications-error flag.
//! - **`MotorError`**: the outcome a motion primitive hands back to its host. It
//!   wraps transport failures and adds protocol/validation failures (a response
//!   that arrived but is semantically unusable) and rejected parameters.
//!
//! Device-reported error codes are not errors in this taxonomy. They are read
//! after a primitive already failed, purely for diagnostics, and surface through
//! the axis status and the log.
//!
//! By using `#[from]`, `MotorError` can be created from `TransportError` with the
//! `?` operator.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the motor error type.
pub type MotorResult<T> = std::result::Result<T, MotorError>;

// =============================================================================
// Transport Errors
// =============================================================================

/// Failure at the byte-stream layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The serial device or TCP endpoint could not be opened.
    #[error("Failed to open connection to {target}: {source}")]
    Connect {
        /// Connection target as configured (device path or `host:port`)
        target: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Writing a command frame failed.
    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    /// Reading a response failed.
    #[error("Read failed: {0}")]
    Read(#[source] std::io::Error),

    /// The operation did not complete before its deadline.
    ///
    /// `received` is the number of response bytes that had arrived when the
    /// deadline expired (always zero for writes).
    #[error("Timed out after {timeout:?} ({received} bytes received)")]
    Timeout {
        /// Deadline that expired
        timeout: Duration,
        /// Bytes received before expiry
        received: usize,
    },

    /// The peer closed the connection (end of stream).
    #[error("Connection closed by peer")]
    Disconnected,
}

impl TransportError {
    /// Returns true when the failure was a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// =============================================================================
// Motor Errors
// =============================================================================

/// Outcome of a failed motion primitive, poll, or configuration step.
///
/// # Error Categories
///
/// 1. **Transport** - the link failed. Transient in most cases; the next poll
///    tick or the next user command is the retry.
/// 2. **InvalidResponse** - a response arrived but cannot be used (for example
///    a firmware version string shorter than two characters).
/// 3. **InvalidParameter** - the caller asked for something the driver refuses
///    before touching the wire.
/// 4. **Configuration** - driver configuration is invalid. Permanent until the
///    configuration is fixed.
#[derive(Error, Debug)]
pub enum MotorError {
    /// Byte-stream layer failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response received but semantically invalid.
    #[error("Invalid response to '{command}': {response:?}")]
    InvalidResponse {
        /// Command whose response was rejected
        command: String,
        /// Raw response text
        response: String,
    },

    /// Request rejected before any command was issued.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Driver configuration failed validation.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MotorError {
    /// Returns true when the failure originated in the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
