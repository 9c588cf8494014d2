//! Worker-side responder
//!
//! The responder owns the registered operation and services call messages
//! one at a time, in arrival order: Idle → Executing → Publishing → Idle.
//! Messages that arrive while a call is executing queue in the worker's
//! inbound channel; nothing here is reentrant.
//!
//! Constructing a [`Responder`] *is* the registration — there is no
//! ambient global handler, and [`run_as_bridge_worker`] consumes the
//! inbound channel receiver, so exactly one responder can drain it.
//!
//! # Publishing guarantee
//!
//! Once a message has been taken off the channel, the status word of its
//! buffer never stays pending: operation failures, panics, encoding
//! defects, and overflow all publish a completion of some kind.

use crate::error::{BridgeError, OpError};
use crate::transport::CallMessage;
use crate::value::{self, Value};
use crossbeam::channel::Receiver;
use log::{debug, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The registered asynchronous operation, boxed for transport across the
/// spawn boundary
pub type BoxedOperation = Box<dyn Fn(Vec<Value>) -> Result<Value, OpError> + Send + 'static>;

/// Executes the registered operation and publishes outcomes
pub struct Responder<F> {
    operation: F,
}

impl<F> Responder<F>
where
    F: Fn(Vec<Value>) -> Result<Value, OpError>,
{
    pub fn new(operation: F) -> Self {
        Responder { operation }
    }

    /// Service one call message: run the operation exactly once, then
    /// publish its outcome into the message's buffer and signal.
    pub fn handle(&self, msg: CallMessage) {
        let CallMessage { args, buffer } = msg;
        debug!("executing operation with {} argument(s)", args.len());

        let outcome = catch_unwind(AssertUnwindSafe(|| (self.operation)(args)));
        let (value, failed) = match outcome {
            Ok(Ok(value)) => (value, false),
            Ok(Err(err)) => {
                debug!("operation failed: {err}");
                (Value::Error(err), true)
            }
            Err(panic) => {
                let err = OpError::named("Panic", panic_message(panic.as_ref()));
                warn!("operation panicked: {err}");
                (Value::Error(err), true)
            }
        };

        match value::encode(&value) {
            Ok(text) => self.publish(&buffer, text.as_bytes(), failed),
            Err(encode_err) => {
                // Encoding the outcome is the responder's own defect; the
                // caller still gets a completion, not a permanent block.
                let err = Value::Error(OpError::named(
                    "InternalError",
                    format!("failed to encode outcome: {encode_err}"),
                ));
                warn!("outcome not encodable: {encode_err}");
                match value::encode(&err) {
                    Ok(text) => self.publish(&buffer, text.as_bytes(), true),
                    Err(_) => buffer.publish_overflow(0),
                }
            }
        }
    }

    fn publish(&self, buffer: &crate::wire::SharedBuffer, payload: &[u8], failed: bool) {
        match buffer.publish(payload, failed) {
            Ok(()) => debug!("published {} payload byte(s), failed={failed}", payload.len()),
            Err(BridgeError::Overflow { needed, capacity }) => {
                warn!("payload of {needed} bytes exceeds buffer capacity of {capacity} bytes");
                buffer.publish_overflow(needed);
            }
            Err(err) => {
                // publish only fails with Overflow; keep the guarantee anyway
                warn!("publish failed unexpectedly: {err}");
                buffer.publish_overflow(0);
            }
        }
    }
}

/// Register `operation` against an inbound call channel and service it
/// until the channel closes. This is the worker-side entry point; call it
/// from inside the worker context. Blocks the current thread.
pub fn run_as_bridge_worker<F>(inbox: Receiver<CallMessage>, operation: F)
where
    F: Fn(Vec<Value>) -> Result<Value, OpError>,
{
    let responder = Responder::new(operation);
    for msg in inbox.iter() {
        responder.handle(msg);
    }
    debug!("inbound channel closed, responder stopping");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker operation panicked".to_string()
    }
}
