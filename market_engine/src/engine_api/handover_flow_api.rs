use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{
        CancellationRecord,
        CandidateLocation,
        FaultReason,
        Listing,
        MeetingPlace,
        NewDispute,
        NewListing,
        ProposedLocation,
        UserId,
    },
    events::{EventProducers, ListingSoldEvent, ReservationCancelledEvent},
    traits::{CodeIssue, HandoverApiError, HandoverDatabase, ReconcileSummary, RejectOutcome, RescheduleOutcome},
};

/// `HandoverFlowApi` is the primary API for driving a listing through the handover protocol, from
/// `Available` to `Sold`, in response to buyer and seller actions.
///
/// The atomicity guarantees live in the backend; this layer adds logging and publishes events for
/// the collaborators (trust scoring, notifications) that react to state transitions.
pub struct HandoverFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for HandoverFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HandoverFlowApi")
    }
}

impl<B> HandoverFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> HandoverFlowApi<B>
where B: HandoverDatabase
{
    pub async fn create_listing(&self, listing: NewListing) -> Result<Listing, HandoverApiError> {
        let listing = self.db.insert_listing(listing).await?;
        debug!("🔄️🏷️ Listing #{} ({}) is up for sale", listing.id, listing.title);
        Ok(listing)
    }

    pub async fn listing(&self, id: i64) -> Result<Option<Listing>, HandoverApiError> {
        self.db.fetch_listing(id).await
    }

    pub async fn locations(&self, listing_id: i64) -> Result<Vec<CandidateLocation>, HandoverApiError> {
        self.db.fetch_locations(listing_id).await
    }

    pub async fn reserve(&self, id: i64, buyer: &UserId) -> Result<Listing, HandoverApiError> {
        let listing = self.db.reserve_listing(id, buyer).await?;
        debug!("🔄️🏷️ Listing #{id} is now held by {buyer}");
        Ok(listing)
    }

    pub async fn propose_locations(
        &self,
        id: i64,
        seller: &UserId,
        candidates: &[ProposedLocation],
    ) -> Result<Listing, HandoverApiError> {
        let listing = self.db.propose_locations(id, seller, candidates).await?;
        debug!("🔄️📍️ Seller proposed {} meeting spots for listing #{id}", candidates.len());
        Ok(listing)
    }

    pub async fn select_location(
        &self,
        id: i64,
        buyer: &UserId,
        place: MeetingPlace,
    ) -> Result<(Listing, CandidateLocation), HandoverApiError> {
        let result = self.db.select_location(id, buyer, place).await?;
        debug!("🔄️📍️ {place} locked in for listing #{id}");
        Ok(result)
    }

    pub async fn request_exchange_code(
        &self,
        id: i64,
        buyer: &UserId,
        ttl: Duration,
    ) -> Result<CodeIssue, HandoverApiError> {
        let issue = self.db.request_exchange_code(id, buyer, ttl).await?;
        match &issue {
            CodeIssue::Issued { .. } => debug!("🔄️🔑️ Exchange code issued for listing #{id}"),
            CodeIssue::AlreadyIssued { .. } => {
                debug!("🔄️🔑️ Exchange code for listing #{id} was already issued")
            },
        }
        Ok(issue)
    }

    /// Verifies the exchange code and, on success, settles the listing and notifies the
    /// `ListingSold` subscribers.
    pub async fn verify_exchange_code(
        &self,
        id: i64,
        seller: &UserId,
        code: &str,
    ) -> Result<Listing, HandoverApiError> {
        let listing = self.db.verify_exchange_code(id, seller, code).await?;
        debug!("🔄️🔑️ Handover of listing #{id} verified. Congratulations all round.");
        self.call_listing_sold_hook(&listing).await;
        Ok(listing)
    }

    pub async fn request_reschedule(&self, id: i64, caller: &UserId) -> Result<RescheduleOutcome, HandoverApiError> {
        let outcome = self.db.request_reschedule(id, caller).await?;
        debug!("🔄️🔁️ Reschedule on listing #{id}: {outcome:?}");
        Ok(outcome)
    }

    pub async fn reject_reschedule(&self, id: i64, caller: &UserId) -> Result<RejectOutcome, HandoverApiError> {
        let outcome = self.db.reject_reschedule(id, caller).await?;
        debug!("🔄️🔁️ Reschedule rejection on listing #{id}: {outcome:?}");
        Ok(outcome)
    }

    pub async fn cancel_reservation(
        &self,
        id: i64,
        caller: &UserId,
        reason: Option<FaultReason>,
    ) -> Result<CancellationRecord, HandoverApiError> {
        let record = self.db.cancel_reservation(id, caller, reason).await?;
        debug!("🔄️❌️ Reservation on listing #{id} cancelled. Penalty applied to the {}", record.fault);
        self.call_reservation_cancelled_hook(&record).await;
        Ok(record)
    }

    pub async fn create_dispute(
        &self,
        id: i64,
        caller: &UserId,
        dispute: NewDispute,
    ) -> Result<CancellationRecord, HandoverApiError> {
        let record = self.db.create_dispute(id, caller, dispute).await?;
        debug!("🔄️⚖️ Dispute #{} opened on listing #{id}", record.id);
        Ok(record)
    }

    /// One reconciliation pass. Called by the background worker, never by a request handler.
    pub async fn reconcile(&self, abandonment_window: Duration) -> Result<ReconcileSummary, HandoverApiError> {
        let summary = self.db.reconcile(abandonment_window).await?;
        if summary.total() > 0 {
            info!(
                "🔄️🕰️ Reconciliation pass: {} tokens expired, {} reservations reclaimed, {} orphaned locations \
                 removed, {} stale reschedule flags cleared",
                summary.expired_tokens,
                summary.reclaimed_listings,
                summary.orphaned_locations,
                summary.cleared_reschedules
            );
        }
        Ok(summary)
    }

    async fn call_listing_sold_hook(&self, listing: &Listing) {
        for emitter in &self.producers.listing_sold_producer {
            trace!("🔄️📬️ Notifying listing sold hook subscribers");
            let event = ListingSoldEvent::new(listing.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_reservation_cancelled_hook(&self, record: &CancellationRecord) {
        for emitter in &self.producers.reservation_cancelled_producer {
            trace!("🔄️📬️ Notifying reservation cancelled hook subscribers");
            let event = ReservationCancelledEvent::new(record.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
