//! Error types for query recording.

use sea_orm::DbErr;
use thiserror::Error;

use crate::binding::BindingKey;

/// Errors that abort the recording of a single query.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The driver's native quoting rejected a string binding.
    #[error("failed to quote binding {key} for {driver}: {source}")]
    Quote {
        driver: String,
        key: BindingKey,
        #[source]
        source: DbErr,
    },
}

impl RecordError {
    /// The underlying database error.
    pub fn db_err(&self) -> &DbErr {
        match self {
            RecordError::Quote { source, .. } => source,
        }
    }
}
