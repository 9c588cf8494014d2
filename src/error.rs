//! Error taxonomy for bridge calls
//!
//! Every failure of a bridge call is local and synchronous: `Bridge::call`
//! returns exactly one of these, with no retries and no partial results.
//!
//! - **Overflow**: the serialized payload does not fit in the shared buffer
//! - **Operation**: the worker operation itself failed; carried faithfully
//! - **Decode**: reply bytes do not parse per the wire format
//! - **TimedOut**: the bounded wait elapsed before the worker signaled
//! - **Disposed / WorkerGone**: the bridge or its worker is no longer usable

use std::time::Duration;
use thiserror::Error;

/// A failure produced by a worker operation.
///
/// Round-trips through the wire format as a tagged error record, so the
/// caller observes the same name, message, and trace text the operation
/// raised on the worker side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct OpError {
    /// Error kind/name (e.g. "Error", "TypeError")
    pub name: String,

    /// Human-readable message
    pub message: String,

    /// Optional trace text captured where the error was raised
    pub trace: Option<String>,
}

impl OpError {
    /// Create an operation error with the generic "Error" name
    pub fn new(message: impl Into<String>) -> Self {
        OpError {
            name: "Error".to_string(),
            message: message.into(),
            trace: None,
        }
    }

    /// Create an operation error with an explicit name
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        OpError {
            name: name.into(),
            message: message.into(),
            trace: None,
        }
    }
}

/// Failure to encode a value into wire payload text
#[derive(Debug, Error)]
pub enum EncodeError {
    /// JSON text cannot represent NaN or infinity
    #[error("cannot encode non-finite number")]
    NonFiniteNumber,

    #[error("cannot format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("cannot encode value: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to decode wire payload bytes back into a value
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload bytes are not valid UTF-8
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Payload text is not valid JSON
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A mapping carried the reserved discriminant key but its tag is
    /// unknown or its record shape is malformed
    #[error("unrecognized or malformed tagged record: {0}")]
    Tag(#[source] serde_json::Error),

    /// A Date record carried a string that is not RFC3339
    #[error("malformed timestamp: {0}")]
    Timestamp(#[from] time::error::Parse),

    /// Status word declares a payload length the buffer cannot hold
    #[error("status word declares {len} payload bytes but buffer capacity is {capacity}")]
    BadLength { len: i64, capacity: usize },
}

/// Failure of a single bridge call
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Serialized payload exceeds buffer capacity; detected before any
    /// out-of-bounds write. `needed` is 0 when the buffer was too small
    /// to even carry the needed-length word.
    #[error("serialized payload of {needed} bytes exceeds buffer capacity of {capacity} bytes")]
    Overflow { needed: usize, capacity: usize },

    /// The worker operation failed; re-raised here as the call's failure
    #[error("worker operation failed: {0}")]
    Operation(OpError),

    /// Reply payload violated the wire format
    #[error("protocol violation decoding reply: {0}")]
    Decode(#[from] DecodeError),

    /// The bounded wait elapsed before the worker signaled completion
    #[error("call timed out after {waited:?}")]
    TimedOut { waited: Duration },

    /// The bridge was disposed before this call was issued
    #[error("bridge has been disposed")]
    Disposed,

    /// The worker's inbound channel is closed; it can no longer take calls
    #[error("worker is no longer running")]
    WorkerGone,

    /// Buffer size below the 4-byte status-word minimum
    #[error("buffer size {0} is below the 4-byte minimum")]
    BufferTooSmall(usize),
}
