use serde::Serialize;

use crate::db_types::{CandidateLocation, Listing, ListingStatus, MeetingPlace, UserId};

/// The shape of a candidate location as clients see it.
#[derive(Debug, Clone, Serialize)]
pub struct LocationResult {
    pub location: MeetingPlace,
    pub meeting_time: Option<String>,
    pub is_selected: bool,
}

impl From<CandidateLocation> for LocationResult {
    fn from(row: CandidateLocation) -> Self {
        Self { location: row.place, meeting_time: row.meeting_time, is_selected: row.is_selected }
    }
}

/// Listing state for display. Derived from a lock-free read, so it may trail the authoritative
/// row by a moment.
#[derive(Debug, Clone, Serialize)]
pub struct ListingResult {
    pub id: i64,
    pub title: String,
    pub seller_id: UserId,
    pub status: ListingStatus,
    pub reserved_by: Option<UserId>,
    pub reschedule_pending: bool,
}

impl From<Listing> for ListingResult {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            title: listing.title.clone(),
            seller_id: listing.seller_id.clone(),
            status: listing.status,
            reschedule_pending: listing.has_pending_reschedule(),
            reserved_by: listing.reserved_by,
        }
    }
}
