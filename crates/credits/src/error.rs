//! Ledger error types.

use thiserror::Error;

/// Errors surfaced by a [`crate::CreditStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed (connection, query, constraint).
    #[error("credit store error: {0}")]
    Backend(String),

    /// The record already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),
}

impl From<database::DatabaseError> for StoreError {
    fn from(err: database::DatabaseError) -> Self {
        match err {
            database::DatabaseError::AlreadyExists { entity, id } => {
                StoreError::AlreadyExists(format!("{entity} {id}"))
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}
