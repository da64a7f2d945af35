use thiserror::Error;

use crate::db_types::ListingStatus;

/// The error taxonomy for every state-changing operation. All variants are surfaced to the caller
/// as structured responses; none are swallowed. Any error raised inside a transaction triggers a
/// full rollback before it propagates.
#[derive(Debug, Clone, Error)]
pub enum HandoverApiError {
    #[error("The record was not found. {0}")]
    NotFound(String),
    #[error("Caller is not a party to this transaction. {0}")]
    Forbidden(String),
    #[error("Operation is not valid while the listing is {actual}")]
    InvalidState { actual: ListingStatus },
    #[error("A reschedule request is pending. Resolve it before continuing.")]
    Blocked,
    #[error("Lost the race: {0}")]
    Conflict(String),
    #[error("A reschedule request by this caller is already pending. Withdraw it first.")]
    AlreadyRequested,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Too many failed attempts. The exchange code has been locked.")]
    RateLimited,
    #[error("The exchange code has expired.")]
    Expired,
    #[error("Incorrect exchange code. {attempts_remaining} attempts remaining.")]
    CodeMismatch { attempts_remaining: i64 },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl HandoverApiError {
    pub fn not_found(listing_id: i64) -> Self {
        Self::NotFound(format!("Listing #{listing_id} does not exist"))
    }

    pub fn invalid_state(actual: ListingStatus) -> Self {
        Self::InvalidState { actual }
    }
}

impl From<sqlx::Error> for HandoverApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
