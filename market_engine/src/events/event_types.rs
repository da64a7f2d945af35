use serde::Serialize;

use crate::db_types::{CancellationRecord, Listing};

/// Emitted when a handover has been verified and the listing settles as `Sold`. The trust-scoring
/// and notification collaborators subscribe to this; they react to the transition but play no part
/// in its correctness.
#[derive(Debug, Clone, Serialize)]
pub struct ListingSoldEvent {
    pub listing: Listing,
}

impl ListingSoldEvent {
    pub fn new(listing: Listing) -> Self {
        Self { listing }
    }
}

/// Emitted whenever a reservation is torn down outside the happy path, carrying the audit record
/// with its fault attribution so scoring can apply the trust penalty.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationCancelledEvent {
    pub record: CancellationRecord,
}

impl ReservationCancelledEvent {
    pub fn new(record: CancellationRecord) -> Self {
        Self { record }
    }
}
