//! Command execution error taxonomy.
//!
//! Errors the control surface can observe. Transport-level failures inside
//! the link task never escape as-is; they are mapped to these variants and
//! otherwise only drive the reconnect state machine.

use thiserror::Error;

/// Outcome of dispatching a command toward the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The link was down when the write was attempted.
    #[error("not connected to the device")]
    NotConnected,

    /// The transport rejected or errored on the write.
    #[error("device write failed: {0}")]
    WriteFailed(String),

    /// The dispatcher round-trip exceeded its bound.
    #[error("command timed out")]
    TimeoutExceeded,

    /// Out-of-range parameter that is rejected rather than clamped.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
