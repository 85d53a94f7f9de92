mod group_service;
mod member_service;
mod validation_error;

pub use group_service::GroupService;
pub use member_service::MemberService;
pub use validation_error::ValidationError;

use thiserror::Error;
use tracing::warn;

use crate::database::{Db, StoreError};

/// What a service call can fail with. The boundary layer maps
/// `Validation` to a bad-input response, `NotFound` to a missing
/// resource, and treats `Database` as an internal failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller input violates a business rule; detected before any
    /// database call and never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The named entity does not exist in the caller's tenant scope. An
    /// expected outcome, not a fault; also how a create loses the race
    /// against a concurrent delete.
    #[error("identified data not found")]
    NotFound,

    /// Opaque infrastructure failure, propagated untouched.
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::Sqlx(err) => ServiceError::Database(err),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(err)
    }
}

/// Roll a failed transaction back. A rollback failure cannot change the
/// outcome the caller already has, so it is only logged.
async fn rollback(tx: Db) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "failed to roll back transaction");
    }
}
