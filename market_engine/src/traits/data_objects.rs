use chrono::{DateTime, Utc};
use cm_common::Secret;
use serde::Serialize;

/// The result of asking for an exchange code. A second ask while a live token exists is answered
/// idempotently with the original expiry and no plaintext, guarding against duplicate submissions.
#[derive(Debug, Clone)]
pub enum CodeIssue {
    Issued { code: Secret<String>, expires_at: DateTime<Utc> },
    AlreadyIssued { expires_at: DateTime<Utc> },
}

impl CodeIssue {
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            CodeIssue::Issued { expires_at, .. } => *expires_at,
            CodeIssue::AlreadyIssued { expires_at } => *expires_at,
        }
    }
}

/// First call on a listing is a request; a follow-up call by the counterparty confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RescheduleOutcome {
    Requested,
    Confirmed,
}

/// A requester withdrawing their own request simply clears it. A buyer rejecting the seller's
/// request cancels the whole transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectOutcome {
    Cleared,
    Cancelled,
}

/// Row counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReconcileSummary {
    pub expired_tokens: u64,
    pub reclaimed_listings: u64,
    pub orphaned_locations: u64,
    pub cleared_reschedules: u64,
}

impl ReconcileSummary {
    pub fn total(&self) -> u64 {
        self.expired_tokens + self.reclaimed_listings + self.orphaned_locations + self.cleared_reschedules
    }
}
