//! What happens after a probe: classify, record, persist, alert.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::classifier::classify;
use super::types::{Check, CheckState, EvaluationLogEntry, ProbeOutcome};
use crate::alerts::AlertDispatcher;
use crate::database::{CHECKS, Database};
use crate::logs::AuditLog;

/// An alert is due when the check has been evaluated before and its state flipped
///
/// A check that has never been evaluated starts out `down`, so alerting on
/// the first evaluation would page every owner of a new check.
pub fn alert_warranted(previous: &Check, new_state: CheckState) -> bool {
    previous.last_checked.is_some() && previous.state != new_state
}

/// Text sent to the check's owner when its state changes
pub fn alert_message(check: &Check, state: CheckState) -> String {
    format!(
        "Alert: your check for {} {} is currently {}",
        check.method,
        check.target(),
        state
    )
}

/// Summary of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub state: CheckState,
    pub alert_warranted: bool,
    /// The audit log entry was written
    pub logged: bool,
    /// The check record was updated
    pub persisted: bool,
    /// `None` when no alert was due, otherwise whether it went out
    pub alert_delivered: Option<bool>,
}

/// Applies a probe outcome to a check
///
/// The audit log write, the record update and the alert are attempted in that
/// order. Each may fail on its own; failures are logged and never stop the
/// steps after them.
pub struct TransitionHandler {
    database: Arc<dyn Database>,
    audit_log: Arc<AuditLog>,
    alerts: Arc<dyn AlertDispatcher>,
}

impl TransitionHandler {
    pub fn new(
        database: Arc<dyn Database>,
        audit_log: Arc<AuditLog>,
        alerts: Arc<dyn AlertDispatcher>,
    ) -> Self {
        Self { database, audit_log, alerts }
    }

    /// Process the outcome of probing `check`, as it was read before the probe
    pub async fn process(&self, check: &Check, outcome: ProbeOutcome) -> Evaluation {
        self.process_at(check, outcome, Utc::now()).await
    }

    pub async fn process_at(
        &self,
        check: &Check,
        outcome: ProbeOutcome,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let state = classify(&outcome, &check.success_codes);
        let alert_warranted = alert_warranted(check, state);

        let logged = self.record(check, outcome, state, alert_warranted, now).await;
        let persisted = self.persist(check, state, now).await;

        let alert_delivered = if alert_warranted {
            Some(self.alert(check, state).await)
        } else {
            debug!(check_id = %check.id, %state, "Check state unchanged, no alert needed");
            None
        };

        Evaluation { state, alert_warranted, logged, persisted, alert_delivered }
    }

    async fn record(
        &self,
        check: &Check,
        outcome: ProbeOutcome,
        state: CheckState,
        alert_sent: bool,
        time: DateTime<Utc>,
    ) -> bool {
        let entry = EvaluationLogEntry { check: check.clone(), outcome, state, alert_sent, time };

        match self.audit_log.append_entry(&entry).await {
            Ok(()) => true,
            Err(e) => {
                error!(check_id = %check.id, "Failed to write audit log entry: {}", e);
                false
            }
        }
    }

    async fn persist(&self, check: &Check, state: CheckState, now: DateTime<Utc>) -> bool {
        let mut updated = check.clone();
        updated.state = state;
        updated.last_checked = Some(now);

        let record = match updated.to_record() {
            Ok(record) => record,
            Err(e) => {
                error!(check_id = %check.id, "Failed to serialize check update: {}", e);
                return false;
            }
        };

        match self.database.update(CHECKS, &check.id, &record).await {
            Ok(()) => true,
            Err(e) => {
                error!(check_id = %check.id, "Failed to save check update: {}", e);
                false
            }
        }
    }

    async fn alert(&self, check: &Check, state: CheckState) -> bool {
        let message = alert_message(check, state);

        match self.alerts.send(&check.owner_id, &message).await {
            Ok(()) => {
                info!(check_id = %check.id, %state, "Owner alerted to status change");
                true
            }
            Err(e) => {
                error!(check_id = %check.id, "Could not send status change alert: {}", e);
                false
            }
        }
    }
}
