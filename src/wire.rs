//! Shared buffer layout and completion signaling
//!
//! Each call gets one fixed-size buffer shared by the caller and the
//! worker:
//!
//! ```text
//! ┌────────────────┬───────────────────────────────────┐
//! │ [0..4)         │ [4..4+len)                        │
//! │ status word    │ UTF-8 payload text                │
//! │ (i32, LE)      │                                   │
//! └────────────────┴───────────────────────────────────┘
//! ```
//!
//! # Status word
//!
//! - [`STATUS_PENDING`] (`i32::MIN`): written at creation; never a valid
//!   signed length, so "not yet complete" is unambiguous even for
//!   zero-length success payloads.
//! - [`STATUS_OVERFLOW`] (`i32::MIN + 1`): the serialized payload did not
//!   fit; where capacity permits, the needed byte count is stored as a
//!   u32 at offset 4.
//! - `status >= 0`: success, payload length `status`.
//! - any other `status < 0`: failure, payload length `-status`.
//!
//! # Synchronization
//!
//! The worker writes payload then status under the lock and notifies; the
//! caller blocks until the status word leaves [`STATUS_PENDING`]. The
//! caller only reads after waking and the worker only writes before
//! notifying, so the signal establishes the happens-before edge for every
//! other byte and no concurrent read/write window exists.

use crate::error::{BridgeError, DecodeError};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Bytes reserved for the status word at offset 0
pub const HEADER_SIZE: usize = 4;

/// Default buffer size for bridge calls (64 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Status word sentinel: the worker has not yet published a completion
pub const STATUS_PENDING: i32 = i32::MIN;

/// Status word sentinel: the outcome did not fit in the buffer
pub const STATUS_OVERFLOW: i32 = i32::MIN + 1;

/// A decoded completion read back from the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Operation succeeded; payload is encoded result text
    Success(Vec<u8>),
    /// Operation failed; payload is an encoded error value
    Failure(Vec<u8>),
    /// Outcome exceeded buffer capacity; `needed` is 0 when the buffer
    /// was too small to even carry the needed-length word
    Overflow { needed: usize },
}

/// Fixed-size memory region shared by one caller and one worker.
///
/// Created fresh per call, exclusively written by the worker, exclusively
/// read by the caller after the completion signal fires.
pub struct SharedBuffer {
    bytes: Mutex<Box<[u8]>>,
    signal: Condvar,
    capacity: usize,
}

impl SharedBuffer {
    /// Allocate a buffer of `capacity` bytes with the status word set to
    /// [`STATUS_PENDING`]. Capacity below [`HEADER_SIZE`] is rejected.
    pub fn new(capacity: usize) -> Result<Self, BridgeError> {
        if capacity < HEADER_SIZE {
            return Err(BridgeError::BufferTooSmall(capacity));
        }
        let mut bytes = vec![0u8; capacity].into_boxed_slice();
        bytes[..HEADER_SIZE].copy_from_slice(&STATUS_PENDING.to_le_bytes());
        Ok(SharedBuffer {
            bytes: Mutex::new(bytes),
            signal: Condvar::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes available for payload text
    pub fn payload_capacity(&self) -> usize {
        self.capacity - HEADER_SIZE
    }

    /// Write a completed outcome and wake the waiting caller.
    ///
    /// Fails fast with [`BridgeError::Overflow`] if the payload does not
    /// fit; nothing is written in that case and the status word stays
    /// pending (the responder then publishes the overflow sentinel).
    pub fn publish(&self, payload: &[u8], failed: bool) -> Result<(), BridgeError> {
        if payload.len() > self.payload_capacity() || payload.len() > i32::MAX as usize {
            return Err(BridgeError::Overflow {
                needed: payload.len(),
                capacity: self.capacity,
            });
        }
        // A zero-length failure would encode as status 0, i.e. empty
        // success. Encoded error records are never empty.
        debug_assert!(!(failed && payload.is_empty()));

        let status = if failed {
            -(payload.len() as i32)
        } else {
            payload.len() as i32
        };

        let mut bytes = self.bytes.lock();
        bytes[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);
        bytes[..HEADER_SIZE].copy_from_slice(&status.to_le_bytes());
        drop(bytes);

        self.signal.notify_all();
        Ok(())
    }

    /// Publish the overflow sentinel, storing the needed byte count at
    /// offset 4 when the buffer has room for it.
    pub fn publish_overflow(&self, needed: usize) {
        let mut bytes = self.bytes.lock();
        if self.payload_capacity() >= 4 {
            let needed = needed.min(u32::MAX as usize) as u32;
            bytes[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&needed.to_le_bytes());
        }
        bytes[..HEADER_SIZE].copy_from_slice(&STATUS_OVERFLOW.to_le_bytes());
        drop(bytes);

        self.signal.notify_all();
    }

    /// Block the calling thread until the worker publishes, then read the
    /// completion out of the buffer.
    ///
    /// With `timeout == None` this waits indefinitely, matching the
    /// reference behavior; a worker that never signals blocks the caller
    /// forever. With a bounded wait, expiry yields
    /// [`BridgeError::TimedOut`] and the buffer is simply abandoned (the
    /// worker may still write into its own handle later; nobody reads it).
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Completion, BridgeError> {
        let mut bytes = self.bytes.lock();

        match timeout {
            None => {
                while read_status(&bytes) == STATUS_PENDING {
                    self.signal.wait(&mut bytes);
                }
            }
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while read_status(&bytes) == STATUS_PENDING {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(BridgeError::TimedOut { waited: limit });
                    }
                    // Expiry is re-checked at the top of the loop, which
                    // also covers spurious wakeups
                    let _ = self.signal.wait_for(&mut bytes, deadline - now);
                }
            }
        }

        let status = read_status(&bytes);
        self.read_completion(&bytes, status)
    }

    /// Current status word (pending until the worker publishes)
    pub fn status(&self) -> i32 {
        read_status(&self.bytes.lock())
    }

    fn read_completion(&self, bytes: &[u8], status: i32) -> Result<Completion, BridgeError> {
        if status == STATUS_OVERFLOW {
            let needed = if self.payload_capacity() >= 4 {
                u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize
            } else {
                0
            };
            return Ok(Completion::Overflow { needed });
        }

        let failed = status < 0;
        let len = status.unsigned_abs() as usize;
        if len > self.payload_capacity() {
            return Err(BridgeError::Decode(DecodeError::BadLength {
                len: len as i64,
                capacity: self.capacity,
            }));
        }

        let payload = bytes[HEADER_SIZE..HEADER_SIZE + len].to_vec();
        Ok(if failed {
            Completion::Failure(payload)
        } else {
            Completion::Success(payload)
        })
    }
}

fn read_status(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
