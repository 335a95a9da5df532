use std::time::Duration;
use tracing::debug;

use super::checker::{ProbeRequest, TransportSet};
use super::outcome::OutcomeCell;
use super::types::{Check, ProbeOutcome};

/// Probe executor - issues exactly one request per check and settles on one outcome
pub struct ProbeExecutor {
    transports: TransportSet,
}

impl ProbeExecutor {
    /// Create a new probe executor
    pub fn new(transports: TransportSet) -> Self {
        Self { transports }
    }

    /// Probe a validated check
    ///
    /// The request and a timer for `timeout_seconds` race to commit the
    /// outcome; whichever finishes first decides it and the other is
    /// cancelled.
    pub async fn probe(&self, check: &Check) -> ProbeOutcome {
        let request = match ProbeRequest::from_check(check) {
            Ok(request) => request,
            Err(e) => return ProbeOutcome::transport_error(e.to_string()),
        };

        let transport = match self.transports.for_protocol(check.protocol) {
            Ok(transport) => transport,
            Err(e) => return ProbeOutcome::transport_error(e.to_string()),
        };

        let timeout = request.timeout;
        let (cell, receiver) = OutcomeCell::new();

        let request_cell = cell.clone();
        let request_task = tokio::spawn(async move {
            let outcome = match transport.issue_request(&request).await {
                Ok(status_code) => ProbeOutcome::response(status_code),
                Err(e) => ProbeOutcome::transport_error(e.to_string()),
            };
            request_cell.commit(outcome)
        });

        let timer_task = tokio::spawn(expire_after(cell, timeout));

        let outcome = receiver
            .await
            .unwrap_or_else(|_| ProbeOutcome::transport_error("probe ended without an outcome"));

        request_task.abort();
        timer_task.abort();

        debug!(check_id = %check.id, ?outcome, "Probe finished");
        outcome
    }
}

async fn expire_after(cell: OutcomeCell, timeout: Duration) -> bool {
    tokio::time::sleep(timeout).await;
    cell.commit(ProbeOutcome::timed_out())
}
