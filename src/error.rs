use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Failures raised by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("cycle not found: {0}")]
    CycleNotFound(Uuid),

    #[error("no symptoms recorded for {0}")]
    SymptomNotFound(NaiveDate),

    #[error(transparent)]
    Store(#[from] StoreError),
}
