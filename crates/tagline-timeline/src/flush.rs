//! Asynchronous flush of collapsed edits to storage.
//!
//! Edits apply locally and synchronously; persisting them happens later on
//! a tokio task. Only one flush is in flight at a time: submitting a new
//! batch aborts the running one instead of queueing behind it. A failed
//! flush is reported as retryable and never touches local state.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tagline_core::{Result, TaglineError};

use crate::action::FlushBatch;

/// Destination for flushed batches, typically the content platform client.
pub trait FlushSink: Send + Sync + 'static {
    fn flush(&self, batch: FlushBatch) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug)]
pub enum FlushOutcome {
    /// Storage accepted the batch; hand it to `ActionStack::mark_flushed`.
    Completed(FlushBatch),
    /// Retryable failure, cancellation or supersession.
    Failed(TaglineError),
}

impl FlushOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Resolves when the flush it was issued for finishes or is replaced.
#[derive(Debug)]
pub struct FlushTicket {
    generation: u64,
    rx: oneshot::Receiver<FlushOutcome>,
}

impl FlushTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn wait(self) -> FlushOutcome {
        self.rx
            .await
            .unwrap_or(FlushOutcome::Failed(TaglineError::FlushCancelled))
    }
}

struct InFlight {
    generation: u64,
    handle: JoinHandle<()>,
    tx: oneshot::Sender<FlushOutcome>,
}

#[derive(Default)]
struct FlushState {
    generation: u64,
    in_flight: Option<InFlight>,
}

impl FlushState {
    /// Abort the running flush, if any, and resolve its ticket with `reason`.
    fn abort_in_flight(&mut self, reason: TaglineError) {
        if let Some(old) = self.in_flight.take() {
            old.handle.abort();
            debug!(generation = old.generation, reason = %reason, "Aborted flush");
            let _ = old.tx.send(FlushOutcome::Failed(reason));
        }
    }
}

pub struct FlushCoordinator<S: FlushSink> {
    sink: Arc<S>,
    state: Arc<Mutex<FlushState>>,
}

impl<S: FlushSink> FlushCoordinator<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
            state: Arc::new(Mutex::new(FlushState::default())),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Start flushing `batch`, superseding any flush still running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, batch: FlushBatch) -> FlushTicket {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        state.abort_in_flight(TaglineError::FlushSuperseded);
        state.generation += 1;
        let generation = state.generation;

        info!(
            generation,
            items = batch.items.len(),
            context = %batch.context,
            "Submitting flush"
        );
        let sink = Arc::clone(&self.sink);
        let shared = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            let outcome = match sink.flush(batch.clone()).await {
                Ok(()) => {
                    info!(generation, items = batch.items.len(), "Flush completed");
                    FlushOutcome::Completed(batch)
                }
                Err(e) => {
                    warn!(generation, error = %e, "Flush failed");
                    FlushOutcome::Failed(retryable(e))
                }
            };
            let mut state = shared.lock();
            if state.in_flight.as_ref().map(|f| f.generation) == Some(generation) {
                if let Some(done) = state.in_flight.take() {
                    let _ = done.tx.send(outcome);
                }
            }
        });

        state.in_flight = Some(InFlight {
            generation,
            handle,
            tx,
        });
        FlushTicket { generation, rx }
    }

    /// Abort the running flush. Its ticket resolves as cancelled.
    pub fn cancel(&self) {
        self.state.lock().abort_in_flight(TaglineError::FlushCancelled);
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }
}

impl<S: FlushSink> Drop for FlushCoordinator<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn retryable(error: TaglineError) -> TaglineError {
    match error {
        TaglineError::Flush { message, .. } => TaglineError::Flush {
            message,
            retryable: true,
        },
        other => TaglineError::Flush {
            message: other.to_string(),
            retryable: true,
        },
    }
}
