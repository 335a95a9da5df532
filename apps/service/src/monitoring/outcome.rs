//! Single-assignment slot for a probe's outcome.
//!
//! A probe has three things racing to finish it: the response, a transport
//! error and the timeout timer. Each holds a clone of the [`OutcomeCell`];
//! the first `commit` delivers its outcome and every later one is dropped.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

use super::types::ProbeOutcome;

pub type OutcomeReceiver = oneshot::Receiver<ProbeOutcome>;

#[derive(Debug, Clone)]
pub struct OutcomeCell {
    slot: Arc<Mutex<Option<oneshot::Sender<ProbeOutcome>>>>,
}

impl OutcomeCell {
    /// Create an empty cell and the receiver its outcome is delivered to
    pub fn new() -> (Self, OutcomeReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self { slot: Arc::new(Mutex::new(Some(tx))) }, rx)
    }

    /// Commit `outcome` if nothing has been committed yet
    ///
    /// Returns `true` for the one caller whose outcome was accepted.
    pub fn commit(&self, outcome: ProbeOutcome) -> bool {
        let sender = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(tx) => {
                // A dropped receiver means nobody is waiting any more; the
                // commit still counts as the winning one.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}
