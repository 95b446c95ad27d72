use std::sync::{Mutex, MutexGuard, PoisonError};

use cosmrs::Any;
use thiserror::Error as ThisError;
use tokio::sync::oneshot;

use crate::chain::TxOutcome;

pub mod batch;

/// What an enqueued request eventually resolves to: the outcome of the
/// transaction its message was submitted in, or the submission failure.
pub type SubmitResult = Result<TxOutcome, SubmitError>;

/// Cloneable submission failure, fanned out to every request of a batch.
#[derive(Debug, Clone, ThisError)]
#[error("Transaction submission failed! Context: {0}")]
pub struct SubmitError(pub String);

pub struct PendingRequest {
    pub msg: Any,
    pub gas_limit: u64,
    pub grantee: String,
    responder: oneshot::Sender<SubmitResult>,
}

impl PendingRequest {
    /// Completes the request's future. A send failure only means the caller
    /// abandoned its receiver, which is fine.
    pub fn resolve(self, result: SubmitResult) {
        _ = self.responder.send(result);
    }
}

/// FIFO queue of pending grant and revoke requests, appended to by HTTP
/// handlers and drained by the single broadcaster task.
#[derive(Default)]
#[must_use]
pub struct BroadcastQueue {
    pending: Mutex<Vec<PendingRequest>>,
}

impl BroadcastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request and hands back the future its caller awaits.
    /// Performs no chain I/O.
    pub fn enqueue(
        &self,
        msg: Any,
        gas_limit: u64,
        grantee: String,
    ) -> oneshot::Receiver<SubmitResult> {
        let (responder, receiver) = oneshot::channel();

        self.lock().push(PendingRequest {
            msg,
            gas_limit,
            grantee,
            responder,
        });

        receiver
    }

    /// Takes a snapshot of everything pending, leaving the queue empty.
    /// Requests enqueued afterwards are picked up on the next tick.
    pub fn drain(&self) -> Vec<PendingRequest> {
        std::mem::take(&mut *self.lock())
    }

    /// Puts postponed requests back at the tail of the queue.
    pub fn requeue(&self, requests: Vec<PendingRequest>) {
        self.lock().extend(requests);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
