//! End-to-end check cycles against fake transports and alert sinks.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use upcheck::alerts::{AlertDispatcher, AlertError};
use upcheck::database::{CHECKS, Database, MemoryDatabase};
use upcheck::logs::AuditLog;
use upcheck::monitoring::checker::{ProbeError, ProbeRequest};
use upcheck::monitoring::{
    Check, CheckState, EvaluationLogEntry, HttpMethod, Protocol, Transport, TransportSet,
};
use upcheck::orchestrator::Orchestrator;

enum Step {
    Respond(u16),
    RespondAfter(u16, Duration),
    Hang,
}

/// Transport that plays back a script, one step per request
#[derive(Default)]
struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
}

impl ScriptedTransport {
    fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self { steps: Mutex::new(steps.into_iter().collect()) })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn issue_request(&self, _request: &ProbeRequest) -> Result<u16, ProbeError> {
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Hang);
        match step {
            Step::Respond(code) => Ok(code),
            Step::RespondAfter(code, delay) => {
                tokio::time::sleep(delay).await;
                Ok(code)
            }
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(200)
            }
        }
    }
}

#[derive(Default)]
struct RecordingAlerts {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AlertDispatcher for RecordingAlerts {
    async fn send(&self, contact: &str, message: &str) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push((contact.to_string(), message.to_string()));
        Ok(())
    }
}

struct Harness {
    orchestrator: Orchestrator,
    database: Arc<MemoryDatabase>,
    audit_log: Arc<AuditLog>,
    alerts: Arc<RecordingAlerts>,
    _logs: TempDir,
}

async fn harness(transport: Arc<ScriptedTransport>) -> Harness {
    let logs = tempfile::tempdir().unwrap();
    let database = Arc::new(MemoryDatabase::new());
    let audit_log = Arc::new(AuditLog::open(logs.path()).await.unwrap());
    let alerts = Arc::new(RecordingAlerts::default());
    let transports = TransportSet::new()
        .with(Protocol::Http, transport.clone())
        .with(Protocol::Https, transport);

    let orchestrator = Orchestrator::from_parts(
        database.clone(),
        audit_log.clone(),
        alerts.clone(),
        transports,
        Duration::from_secs(60),
        Duration::from_secs(86_400),
    );

    Harness { orchestrator, database, audit_log, alerts, _logs: logs }
}

async fn store_check(database: &MemoryDatabase, timeout_seconds: u64) -> Check {
    let check = Check::new(
        "5551234567",
        Protocol::Https,
        "example.com/up",
        HttpMethod::Get,
        vec![200],
        timeout_seconds,
    );
    database.create(CHECKS, &check.id, &check.to_record().unwrap()).await.unwrap();
    check
}

async fn log_entries(audit_log: &AuditLog, id: &str) -> Vec<EvaluationLogEntry> {
    audit_log
        .read(id)
        .await
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn first_successful_probe_marks_check_up_without_alert() {
    let h = harness(ScriptedTransport::new([Step::Respond(200)])).await;
    let check = store_check(&h.database, 5).await;

    let evaluations = h.orchestrator.run_cycle().await.join().await;
    assert_eq!(evaluations.len(), 1);
    assert_eq!(evaluations[0].state, CheckState::Up);
    assert!(!evaluations[0].alert_warranted);

    let stored = h.database.read(CHECKS, &check.id).await.unwrap();
    assert_eq!(stored["state"], "up");
    assert!(stored["lastChecked"].as_i64().unwrap() > 0);
    assert!(h.alerts.sent.lock().unwrap().is_empty());

    let entries = log_entries(&h.audit_log, &check.id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome.response_code, Some(200));
    assert!(!entries[0].alert_sent);
}

#[tokio::test]
async fn timeout_after_success_alerts_once() {
    let h = harness(ScriptedTransport::new([Step::Respond(200), Step::Hang, Step::Hang])).await;
    let check = store_check(&h.database, 1).await;

    h.orchestrator.run_cycle().await.join().await;

    let second = h.orchestrator.run_cycle().await.join().await;
    assert_eq!(second[0].state, CheckState::Down);
    assert_eq!(second[0].alert_delivered, Some(true));

    let third = h.orchestrator.run_cycle().await.join().await;
    assert_eq!(third[0].state, CheckState::Down);
    assert!(!third[0].alert_warranted);

    let sent = h.alerts.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![(
            "5551234567".to_string(),
            "Alert: your check for GET https://example.com/up is currently down".to_string()
        )]
    );

    let entries = log_entries(&h.audit_log, &check.id).await;
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].outcome.error.as_deref(), Some("timeout"));
    assert!(entries[1].outcome.failed);
    assert_eq!(entries[1].outcome.response_code, None);
    assert!(entries[1].alert_sent);
}

#[tokio::test]
async fn record_missing_url_is_skipped_and_left_alone() {
    let h = harness(ScriptedTransport::new([Step::Respond(200)])).await;
    let valid = store_check(&h.database, 5).await;

    let broken = json!({
        "id": "aaaaaaaaaaaaaaaaaaaa",
        "ownerId": "5550000000",
        "protocol": "https",
        "method": "get",
        "successCodes": [200],
        "timeoutSeconds": 5,
        "label": "kept"
    });
    h.database.create(CHECKS, "aaaaaaaaaaaaaaaaaaaa", &broken).await.unwrap();

    let cycle = h.orchestrator.run_cycle().await;
    assert_eq!(cycle.invalid, 1);
    let evaluations = cycle.join().await;
    assert_eq!(evaluations.len(), 1);

    assert_eq!(h.database.read(CHECKS, "aaaaaaaaaaaaaaaaaaaa").await.unwrap(), broken);
    assert_eq!(h.database.read(CHECKS, &valid.id).await.unwrap()["state"], "up");
    assert_eq!(h.audit_log.read("aaaaaaaaaaaaaaaaaaaa").await.unwrap(), "");
}

#[tokio::test]
async fn unknown_fields_survive_write_back() {
    let h = harness(ScriptedTransport::new([Step::Respond(503)])).await;
    let check = store_check(&h.database, 5).await;

    let mut record = h.database.read(CHECKS, &check.id).await.unwrap();
    record["label"] = Value::from("homepage");
    h.database.update(CHECKS, &check.id, &record).await.unwrap();

    let evaluations = h.orchestrator.run_cycle().await.join().await;
    assert_eq!(evaluations[0].state, CheckState::Down);

    let stored = h.database.read(CHECKS, &check.id).await.unwrap();
    assert_eq!(stored["label"], "homepage");
    assert_eq!(stored["state"], "down");
}

#[tokio::test(start_paused = true)]
async fn response_racing_timeout_is_evaluated_once() {
    let h = harness(ScriptedTransport::new([Step::RespondAfter(200, Duration::from_secs(2))])).await;
    let check = store_check(&h.database, 2).await;

    let evaluations = h.orchestrator.run_cycle().await.join().await;
    assert_eq!(evaluations.len(), 1);
    assert_eq!(log_entries(&h.audit_log, &check.id).await.len(), 1);
}

#[tokio::test]
async fn rotation_archives_two_entries_and_empties_live_log() {
    let h = harness(ScriptedTransport::new([Step::Respond(200), Step::Respond(500)])).await;
    let check = store_check(&h.database, 5).await;

    h.orchestrator.run_cycle().await.join().await;
    h.orchestrator.run_cycle().await.join().await;
    let before = h.audit_log.read(&check.id).await.unwrap();
    assert_eq!(before.lines().count(), 2);

    let report = h.orchestrator.rotate_logs().await;
    assert_eq!(report.rotated, 1);

    let archives: Vec<String> = h
        .audit_log
        .list(true)
        .await
        .unwrap()
        .into_iter()
        .filter(|name| *name != check.id)
        .collect();
    assert_eq!(archives.len(), 1);

    let archive_id = archives[0].as_str();
    assert!(archive_id.starts_with(&format!("{}-", check.id)));
    assert_eq!(h.audit_log.decompress(archive_id).await.unwrap(), before);
    assert_eq!(h.audit_log.read(&check.id).await.unwrap(), "");

    h.audit_log.append(&check.id, "{\"after\":true}").await.unwrap();
    assert_eq!(h.audit_log.read(&check.id).await.unwrap(), "{\"after\":true}\n");
}
