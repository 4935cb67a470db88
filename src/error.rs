//! Error types for floorwatch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("empty payload: at least one event is required")]
    EmptyPayload,

    #[error("invalid event at index {index}: {field}: {message}")]
    Validation {
        index: usize,
        field: &'static str,
        message: String,
    },

    /// A query parameter outside its allowed range.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// A storage fault interrupted a bulk write after some records were
    /// durably stored. The counts describe what did persist.
    #[error("ingest interrupted after {inserted} inserted / {skipped} skipped: {source}")]
    PartialIngest {
        inserted: u64,
        skipped: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn validation(index: usize, field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            index,
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
