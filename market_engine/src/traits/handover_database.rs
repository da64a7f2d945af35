use chrono::Duration;

use crate::{
    db_types::{
        CancellationRecord,
        CandidateLocation,
        FaultReason,
        Listing,
        NewDispute,
        NewListing,
        ProposedLocation,
        UserId,
    },
    db_types::MeetingPlace,
    traits::{CodeIssue, HandoverApiError, ReconcileSummary, RejectOutcome, RescheduleOutcome},
};

/// The storage contract for the product transaction state machine.
///
/// Every state-mutating method executes as a single atomic unit of work that takes the exclusive
/// write lock on the listing row before reading it, and commits or rolls back as a whole. The
/// read-only methods (`fetch_*`) are lock-free and may serve slightly stale state to the UI.
#[allow(async_fn_in_trait)]
pub trait HandoverDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Creates a new listing in the `Available` state. The entry point of the protocol.
    async fn insert_listing(&self, listing: NewListing) -> Result<Listing, HandoverApiError>;

    /// Lock-free read of a listing row for display purposes.
    async fn fetch_listing(&self, id: i64) -> Result<Option<Listing>, HandoverApiError>;

    /// Lock-free read of the candidate meeting locations for a listing.
    async fn fetch_locations(&self, listing_id: i64) -> Result<Vec<CandidateLocation>, HandoverApiError>;

    /// Reserves an `Available` listing for `buyer`.
    ///
    /// Fails with `Conflict` if the listing is no longer available, and `Forbidden` if the buyer
    /// is the seller.
    async fn reserve_listing(&self, id: i64, buyer: &UserId) -> Result<Listing, HandoverApiError>;

    /// Replaces the candidate meeting set and moves the listing to `LocationProposed`.
    ///
    /// Only the seller may propose, and only while the listing is `Reserved`. A seller proposing
    /// again after a reschedule reset replaces the previous set wholesale. An empty candidate
    /// list is rejected.
    async fn propose_locations(
        &self,
        id: i64,
        seller: &UserId,
        candidates: &[ProposedLocation],
    ) -> Result<Listing, HandoverApiError>;

    /// Marks one of the proposed locations as selected and moves the listing to
    /// `LocationSelected`. Only the reserving buyer may select, and only a place that is actually
    /// in the current candidate set.
    async fn select_location(
        &self,
        id: i64,
        buyer: &UserId,
        place: MeetingPlace,
    ) -> Result<(Listing, CandidateLocation), HandoverApiError>;

    /// Issues (or idempotently re-acknowledges) the one-time exchange code for the meeting, and
    /// moves the listing to `OtpGenerated`.
    ///
    /// Requires the reserving buyer, a selected location, status `LocationSelected` or
    /// `OtpGenerated`, and no pending reschedule request (`Blocked` otherwise). If a live token
    /// already exists its expiry is returned without a new code being minted.
    async fn request_exchange_code(
        &self,
        id: i64,
        buyer: &UserId,
        ttl: Duration,
    ) -> Result<CodeIssue, HandoverApiError>;

    /// Verifies the code the buyer read out at the meeting and, on a match, settles the listing as
    /// `Sold`.
    ///
    /// Only the seller may verify, only while `OtpGenerated` with no pending reschedule. A
    /// mismatch increments the failed-attempt counter and reports the remaining attempts; hitting
    /// the ceiling soft-locks the token and surfaces as `RateLimited` from then on.
    async fn verify_exchange_code(&self, id: i64, seller: &UserId, code: &str) -> Result<Listing, HandoverApiError>;

    /// The two-phase reschedule handshake. A first call records the caller as the requester; a
    /// call by the counterparty while a request is pending accepts it, invalidating tokens,
    /// deselecting locations and resetting the listing to `Reserved`.
    async fn request_reschedule(&self, id: i64, caller: &UserId) -> Result<RescheduleOutcome, HandoverApiError>;

    /// Resolves a pending reschedule request negatively. The requester withdrawing their own
    /// request clears the flag; the buyer rejecting a seller-raised request cancels the entire
    /// transaction (see `RejectOutcome`).
    async fn reject_reschedule(&self, id: i64, caller: &UserId) -> Result<RejectOutcome, HandoverApiError>;

    /// Cancels an in-progress reservation, invalidating tokens, clearing locations, returning the
    /// listing to `Available` and appending an audit record with fault attribution. Rejected once
    /// the listing has reached `OtpGenerated`.
    async fn cancel_reservation(
        &self,
        id: i64,
        caller: &UserId,
        reason: Option<FaultReason>,
    ) -> Result<CancellationRecord, HandoverApiError>;

    /// Appends an open dispute record without mutating listing state. Available to either party
    /// while the listing is `LocationSelected` or `OtpGenerated`.
    async fn create_dispute(
        &self,
        id: i64,
        caller: &UserId,
        dispute: NewDispute,
    ) -> Result<CancellationRecord, HandoverApiError>;

    /// One atomic reconciliation pass: expires stale tokens, reclaims abandoned reservations,
    /// deletes orphaned candidate locations and clears stale reschedule flags.
    async fn reconcile(&self, abandonment_window: Duration) -> Result<ReconcileSummary, HandoverApiError>;
}
