//! sync-bridge: call asynchronous worker operations synchronously
//!
//! A synchronous function signature sometimes cannot change, but the work
//! behind it must run elsewhere. This crate bridges that gap with a
//! shared-buffer handshake: the caller posts arguments to a worker,
//! blocks its thread on a completion signal, and the worker publishes the
//! encoded outcome into the buffer before raising the signal.
//!
//! # Architecture
//!
//! - **wire**: shared-buffer layout, status word, wait/notify signaling
//! - **value**: serializable value model and tagged JSON wire text
//! - **responder**: worker side — runs the operation, publishes outcomes
//! - **transport**: worker spawning and messaging behind a capability trait
//! - **bridge**: caller side — posts, blocks, decodes, returns or raises
//!
//! # Protocol
//!
//! One call at a time per bridge. Per call: a fresh fixed-size buffer is
//! allocated; its first four bytes hold a signed status word (a pending
//! sentinel until completion, then the signed payload length — negative
//! on failure); the payload is UTF-8 JSON text starting at offset 4. The
//! status word is the single synchronization point.
//!
//! # Usage
//!
//! ```rust
//! use sync_bridge::{Bridge, Value, WorkerSource};
//!
//! let bridge = Bridge::new(WorkerSource::operation(|args| {
//!     let n = args[0].as_i64().unwrap_or(0);
//!     Ok(Value::Int(n + 1))
//! }));
//!
//! let result = bridge.call(vec![Value::Int(1)]).unwrap();
//! assert_eq!(result, Value::Int(2));
//! bridge.dispose();
//! ```

pub mod bridge;
pub mod error;
pub mod responder;
pub mod transport;
pub mod value;
pub mod wire;

// Re-exports
pub use bridge::{Bridge, BridgeConfig};
pub use error::{BridgeError, DecodeError, EncodeError, OpError};
pub use responder::{run_as_bridge_worker, BoxedOperation, Responder};
pub use transport::{CallMessage, ThreadWorker, WorkerId, WorkerSource, WorkerTransport};
pub use value::{decode, encode, Value};
pub use wire::{Completion, SharedBuffer, DEFAULT_BUFFER_SIZE, STATUS_OVERFLOW, STATUS_PENDING};
