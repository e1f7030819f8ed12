//! Entity persistence and transaction boundaries.
//!
//! Every write happens inside an explicit `sqlx::Transaction`; reads may use
//! either a transaction or the pool directly, via the generic `PgExecutor<'e>`
//! bound each function takes.

pub mod assets;
#[cfg(test)]
pub mod fake;
pub mod holdings;
pub mod idempotency;
pub mod investors;
pub mod orders;
pub mod postgres;
pub mod state_log;
pub mod traits;
pub mod trades;

#[cfg(test)]
pub use fake::FakeStore;
pub use postgres::PgStore;
pub use traits::{CreateOutcome, OrderStore};

/// Failure kinds a store operation can surface.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("transient: {0}")]
    Transient(String),
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("{0}")]
    InvalidState(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".into()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    StoreError::Conflict(db_err.message().to_string())
                } else if is_retryable(db_err.as_ref()) {
                    StoreError::Transient(db_err.message().to_string())
                } else {
                    StoreError::Fatal(e.to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Transient(e.to_string()),
            other => StoreError::Fatal(other.to_string()),
        }
    }
}

fn is_retryable(db_err: &(dyn sqlx::error::DatabaseError + '_)) -> bool {
    // Postgres SQLSTATE 40001 = serialization_failure, 40P01 = deadlock_detected.
    matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
}
