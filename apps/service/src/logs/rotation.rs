//! Periodic compaction of the audit logs.
//!
//! Each live stream is archived under `{id}-{unix_millis}` and then emptied.
//! Streams rotate independently; one failing stream is logged and the rest
//! carry on.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::{AuditLog, StreamRotation};

/// Counts from one rotation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Rotation manager for the audit log directory
pub struct LogRotation {
    audit_log: Arc<AuditLog>,
    interval: Duration,
}

impl LogRotation {
    pub fn new(audit_log: Arc<AuditLog>, interval: Duration) -> Self {
        Self { audit_log, interval }
    }

    /// Rotate every live stream once
    pub async fn rotate_all(&self) -> RotationReport {
        let streams = match self.audit_log.list(false).await {
            Ok(streams) => streams,
            Err(e) => {
                error!("Could not list log streams for rotation: {}", e);
                return RotationReport::default();
            }
        };

        if streams.is_empty() {
            debug!("No log streams to rotate");
            return RotationReport::default();
        }

        let rotations = streams.iter().map(|id| self.rotate_stream(id));
        let mut report = RotationReport::default();

        for result in join_all(rotations).await {
            match result {
                Some(StreamRotation::Archived { .. }) => report.rotated += 1,
                Some(StreamRotation::Empty) => report.empty += 1,
                None => report.failed += 1,
            }
        }

        info!(
            rotated = report.rotated,
            empty = report.empty,
            failed = report.failed,
            "Log rotation completed"
        );
        report
    }

    async fn rotate_stream(&self, id: &str) -> Option<StreamRotation> {
        let archive_id = format!("{}-{}", id, Utc::now().timestamp_millis());

        match self.audit_log.rotate(id, &archive_id).await {
            Ok(rotation) => {
                if let StreamRotation::Archived { bytes } = rotation {
                    debug!(stream = id, archive = %archive_id, bytes, "Log stream archived and truncated");
                }
                Some(rotation)
            }
            Err(e) => {
                warn!(stream = id, archive = %archive_id, "Log rotation failed: {}", e);
                None
            }
        }
    }

    /// Start background rotation; the first pass runs immediately
    pub fn start_periodic_rotation(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                self.rotate_all().await;
            }
        })
    }
}
