//! upcheck - periodic endpoint monitoring with transition alerts
//!
//! Checks are read from a record store on a fixed cadence, probed once per
//! cycle, classified as up or down, and written back. Every evaluation is
//! appended to a per-check audit log which is rotated into compressed
//! archives. A flip between up and down notifies the check's owner.

pub mod alerts;
pub mod config;
pub mod database;
pub mod logs;
pub mod monitoring;
pub mod orchestrator;
pub mod pool;
