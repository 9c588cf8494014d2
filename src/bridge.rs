//! Caller-side bridge
//!
//! Turns a worker operation into a blocking call:
//!
//! ```text
//! caller                      worker
//!   │ allocate SharedBuffer     │
//!   │ post {args, buffer} ────► │ run operation
//!   │ block on signal           │ write payload at [4..)
//!   │                           │ write status word, notify
//!   │ ◄──────────── wake        │
//!   │ decode, return or raise   │
//! ```
//!
//! The wait is a genuine thread suspension, not a cooperative yield; the
//! calling thread does nothing else until the worker signals. Calls on
//! one bridge are strictly sequential — a fresh buffer per call plus the
//! internal call guard mean call N+1 cannot start before call N returns.
//! Independent bridges with independent workers run fully in parallel.

use crate::error::{BridgeError, OpError};
use crate::transport::{CallMessage, WorkerSource, WorkerTransport};
use crate::value::{self, Value};
use crate::wire::{Completion, SharedBuffer, DEFAULT_BUFFER_SIZE, HEADER_SIZE};
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tuning for a bridge instance
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Size of the per-call shared buffer. Must hold the 4-byte status
    /// word plus the largest expected encoded payload; it never grows.
    pub buffer_size: usize,

    /// Bound on the completion wait. `None` preserves the reference
    /// behavior: a worker that never signals blocks the caller forever.
    pub call_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
            call_timeout: None,
        }
    }
}

/// A synchronous handle to an asynchronous worker operation.
///
/// Owns its worker transport. Disposal terminates the worker exactly
/// once; calls after disposal fail with [`BridgeError::Disposed`] rather
/// than hanging. Dropping the bridge disposes it.
pub struct Bridge {
    transport: Box<dyn WorkerTransport>,
    config: BridgeConfig,
    call_guard: Mutex<()>,
    disposed: AtomicBool,
}

impl Bridge {
    /// Build a bridge with default tuning (64 KiB buffer, no timeout)
    pub fn new(source: WorkerSource) -> Self {
        Bridge {
            transport: source.into_transport(),
            config: BridgeConfig::default(),
            call_guard: Mutex::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Build a bridge with explicit tuning
    pub fn with_config(source: WorkerSource, config: BridgeConfig) -> Result<Self, BridgeError> {
        if config.buffer_size < HEADER_SIZE {
            return Err(BridgeError::BufferTooSmall(config.buffer_size));
        }
        Ok(Bridge {
            transport: source.into_transport(),
            config,
            call_guard: Mutex::new(()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Invoke the worker operation and block until it completes.
    ///
    /// Returns the decoded success value, or re-raises the worker's
    /// failure as [`BridgeError::Operation`]. One call is in flight at a
    /// time; concurrent callers sharing a bridge serialize behind the
    /// call guard.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, BridgeError> {
        let _guard = self.call_guard.lock();

        if self.disposed.load(Ordering::Acquire) {
            return Err(BridgeError::Disposed);
        }

        let buffer = Arc::new(SharedBuffer::new(self.config.buffer_size)?);
        debug!(
            "posting call with {} argument(s), buffer of {} bytes",
            args.len(),
            buffer.capacity()
        );

        self.transport.post(CallMessage {
            args,
            buffer: Arc::clone(&buffer),
        })?;

        let completion = buffer.wait(self.config.call_timeout)?;
        match completion {
            Completion::Success(payload) => {
                let text = String::from_utf8(payload).map_err(crate::error::DecodeError::from)?;
                Ok(value::decode(&text)?)
            }
            Completion::Failure(payload) => {
                let text = String::from_utf8(payload).map_err(crate::error::DecodeError::from)?;
                Err(BridgeError::Operation(into_op_error(value::decode(&text)?)))
            }
            Completion::Overflow { needed } => Err(BridgeError::Overflow {
                needed,
                capacity: self.config.buffer_size,
            }),
        }
    }

    /// Terminate the worker. Idempotent; further calls fail with
    /// [`BridgeError::Disposed`].
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!("disposing bridge");
            self.transport.terminate();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A failure payload is normally a tagged error record, but a custom
/// transport may publish any value as a failure; wrap those faithfully.
fn into_op_error(decoded: Value) -> OpError {
    match decoded {
        Value::Error(err) => err,
        other => OpError::new(other.to_debug_string()),
    }
}
