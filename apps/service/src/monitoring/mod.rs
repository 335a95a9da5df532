/// Monitoring engine module - handles evaluation of checks
///
/// This module is responsible for:
/// - Validating stored check records
/// - Probing HTTP/HTTPS endpoints with a bounded timeout
/// - Classifying outcomes and deciding on alerts
/// - Scheduling check cycles
pub mod checker;
pub mod classifier;
pub mod executor;
pub mod outcome;
pub mod scheduler;
pub mod transition;
pub mod types;
pub mod validation;

pub use checker::{ProbeError, Transport, TransportSet};
pub use classifier::classify;
pub use executor::ProbeExecutor;
pub use outcome::OutcomeCell;
pub use scheduler::{CheckScheduler, Cycle};
pub use transition::{Evaluation, TransitionHandler};
pub use types::{Check, CheckState, EvaluationLogEntry, HttpMethod, ProbeOutcome, Protocol};
pub use validation::{CheckValidationError, validate_check};
