/// Orchestrator module - coordinates all components
///
/// The orchestrator wires the record store, audit log, alert dispatcher and
/// transports together once at startup and owns the two background workers:
/// the check cycle and log rotation.
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alerts::{AlertDispatcher, LogOnlyDispatcher, TwilioSms};
use crate::config::Config;
use crate::database::{Database, LibsqlDatabase, initialize_database};
use crate::logs::{AuditLog, LogRotation, RotationReport};
use crate::monitoring::{CheckScheduler, Cycle, ProbeExecutor, TransitionHandler, TransportSet};
use crate::pool::open_pool;

/// Main orchestrator for the upcheck service
pub struct Orchestrator {
    database: Arc<dyn Database>,
    audit_log: Arc<AuditLog>,
    scheduler: Arc<CheckScheduler>,
    check_interval: Duration,
    rotation_interval: Duration,
}

impl Orchestrator {
    /// Create and start a new orchestrator, running until Ctrl-C
    pub async fn start(config: Config) -> Result<()> {
        let orchestrator = Self::new(&config).await?;
        orchestrator.run().await
    }

    /// Build every component from configuration
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = open_pool(&config.storage.database_path, config.storage.pool_size).await?;

        {
            let conn = pool.get().await.map_err(|e| anyhow::anyhow!("{e}"))?;
            info!("Initializing database schema...");
            initialize_database(&conn).await?;
        }

        let database: Arc<dyn Database> = Arc::new(LibsqlDatabase::new_from_pool(pool));
        let audit_log = Arc::new(AuditLog::open(&config.storage.logs_dir).await?);

        let alerts: Arc<dyn AlertDispatcher> = match &config.alerts.twilio {
            Some(twilio) => {
                info!(from = %twilio.from_phone, "Alerts will be sent as SMS");
                Arc::new(TwilioSms::new(twilio.clone())?)
            }
            None => {
                warn!("No alert provider configured, alerts will only be logged");
                Arc::new(LogOnlyDispatcher)
            }
        };

        Ok(Self::from_parts(
            database,
            audit_log,
            alerts,
            TransportSet::standard()?,
            config.check_interval(),
            config.rotation_interval(),
        ))
    }

    /// Assemble an orchestrator from already constructed collaborators
    pub fn from_parts(
        database: Arc<dyn Database>,
        audit_log: Arc<AuditLog>,
        alerts: Arc<dyn AlertDispatcher>,
        transports: TransportSet,
        check_interval: Duration,
        rotation_interval: Duration,
    ) -> Self {
        let handler = TransitionHandler::new(database.clone(), audit_log.clone(), alerts);
        let scheduler = CheckScheduler::new(
            database.clone(),
            Arc::new(ProbeExecutor::new(transports)),
            Arc::new(handler),
        );

        Self {
            database,
            audit_log,
            scheduler: Arc::new(scheduler),
            check_interval,
            rotation_interval,
        }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit_log
    }

    /// Run a single check cycle
    pub async fn run_cycle(&self) -> Cycle {
        self.scheduler.run_cycle().await
    }

    /// Run a single rotation pass over every live log stream
    pub async fn rotate_logs(&self) -> RotationReport {
        LogRotation::new(self.audit_log.clone(), self.rotation_interval).rotate_all().await
    }

    /// Start both background workers
    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        info!(
            check_interval = ?self.check_interval,
            rotation_interval = ?self.rotation_interval,
            "Starting background workers"
        );

        let checks = self.scheduler.clone().start_periodic_checks(self.check_interval);
        let rotation = LogRotation::new(self.audit_log.clone(), self.rotation_interval)
            .start_periodic_rotation();

        vec![checks, rotation]
    }

    /// Run the workers until Ctrl-C
    pub async fn run(self) -> Result<()> {
        info!("Starting upcheck orchestrator...");
        let task_handles = self.spawn_workers();

        tokio::signal::ctrl_c().await?;
        info!("Shutting down, in-flight evaluations: {}", self.scheduler.in_flight());

        for handle in task_handles {
            handle.abort();
        }
        Ok(())
    }
}
