use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    QueryFailure(#[from] libsql::Error),

    #[error("Could not get a database connection: {0}")]
    Pool(String),

    #[error("Record not found")]
    NotFound,

    #[error("Record already exists")]
    Conflict,

    #[error("Record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}
