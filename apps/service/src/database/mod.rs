/// Database abstraction layer
///
/// This module is the record store the monitor reads check definitions from
/// and writes evaluation results back to. LibSQL (SQLite) is the durable
/// backend; an in-memory store backs dry runs and tests.
pub mod error;
pub mod memory;
pub mod migrations;
pub mod repository;

pub use error::DatabaseError;
pub use memory::MemoryDatabase;
pub use repository::{CHECKS, Database, DbResult, LibsqlDatabase};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
