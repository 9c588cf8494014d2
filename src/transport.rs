//! Worker transports
//!
//! The bridge never probes its environment for a worker API. It talks to
//! a [`WorkerTransport`] — post a call message, terminate — chosen at
//! construction time. [`ThreadWorker`] is the built-in transport: a
//! dedicated OS thread draining a channel mailbox through a responder.
//! Other transports (a pre-spawned worker, a test double) plug in through
//! [`WorkerSource::handle`].

use crate::error::{BridgeError, OpError};
use crate::responder::{self, BoxedOperation};
use crate::value::Value;
use crate::wire::SharedBuffer;
use crossbeam::channel::{unbounded, Sender};
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use uuid::Uuid;

/// Unique identifier for a worker (used in log output)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    pub fn new() -> Self {
        WorkerId(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One call, posted from caller to worker: the arguments and the buffer
/// the outcome must be published into
pub struct CallMessage {
    pub args: Vec<Value>,
    pub buffer: Arc<SharedBuffer>,
}

/// Capability surface the bridge needs from a worker
pub trait WorkerTransport: Send + Sync {
    /// Queue a call message for the worker. Fails with
    /// [`BridgeError::WorkerGone`] if the worker can no longer take calls.
    fn post(&self, msg: CallMessage) -> Result<(), BridgeError>;

    /// Stop the worker. Idempotent; posted-but-unserviced messages are
    /// dropped.
    fn terminate(&self);
}

/// Built-in transport: one OS thread running a responder over a channel
/// mailbox. Terminating closes the channel and joins the thread.
pub struct ThreadWorker {
    id: WorkerId,
    sender: Mutex<Option<Sender<CallMessage>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadWorker {
    /// Spawn a worker thread with `operation` registered as its responder
    pub fn spawn<F>(operation: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, OpError> + Send + 'static,
    {
        let id = WorkerId::new();
        let (tx, rx) = unbounded();

        let thread_id = id.clone();
        let handle = std::thread::Builder::new()
            .name(format!("bridge-worker-{thread_id}"))
            .spawn(move || {
                debug!("worker {thread_id} started");
                responder::run_as_bridge_worker(rx, operation);
                debug!("worker {thread_id} stopped");
            })
            .expect("failed to spawn worker thread");

        ThreadWorker {
            id,
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }
}

impl WorkerTransport for ThreadWorker {
    fn post(&self, msg: CallMessage) -> Result<(), BridgeError> {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(msg).map_err(|_| BridgeError::WorkerGone),
            None => Err(BridgeError::WorkerGone),
        }
    }

    fn terminate(&self) {
        // Dropping the sender closes the mailbox; the responder loop ends
        // after finishing the message it is on.
        let sender = self.sender.lock().take();
        drop(sender);

        if let Some(handle) = self.handle.lock().take() {
            debug!("terminating worker {}", self.id);
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Where a bridge gets its worker from: an operation to spawn a fresh
/// [`ThreadWorker`] around, or an already-running transport handle
pub enum WorkerSource {
    Operation(BoxedOperation),
    Handle(Box<dyn WorkerTransport>),
}

impl WorkerSource {
    /// Spawn a fresh worker around `operation` when the bridge is built
    pub fn operation<F>(operation: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, OpError> + Send + 'static,
    {
        WorkerSource::Operation(Box::new(operation))
    }

    /// Use an already-running worker
    pub fn handle(transport: impl WorkerTransport + 'static) -> Self {
        WorkerSource::Handle(Box::new(transport))
    }

    pub(crate) fn into_transport(self) -> Box<dyn WorkerTransport> {
        match self {
            WorkerSource::Operation(op) => Box::new(ThreadWorker::spawn(op)),
            WorkerSource::Handle(transport) => transport,
        }
    }
}
