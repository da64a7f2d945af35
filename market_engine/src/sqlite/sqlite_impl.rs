//! `SqliteDatabase` is the concrete SQLite implementation of the handover engine backend.
//!
//! Every state-changing method follows the same discipline: open a transaction, take the write
//! lock on the listing row ([`db::listings::lock_row`]) before reading anything, evaluate every
//! guard against that locked read, perform the writes, and commit. Dropping the transaction on an
//! early error return rolls back all partial writes, which is the only recovery mechanism the
//! engine needs. No operation ever locks rows belonging to two different listings.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool, Transaction};

use super::db::{self, cancellations, exchange_tokens, listings, locations, new_pool};
use crate::{
    db_types::{
        CancellationRecord,
        CandidateLocation,
        FaultParty,
        FaultReason,
        Listing,
        ListingStatus,
        MeetingPlace,
        NewCancellationRecord,
        NewDispute,
        NewListing,
        ProposedLocation,
        RecordKind,
        Reservation,
        UserId,
        MAX_OTP_ATTEMPTS,
    },
    helpers::otp,
    traits::{CodeIssue, HandoverApiError, HandoverDatabase, ReconcileSummary, RejectOutcome, RescheduleOutcome},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database api with the default connection URL (from the `CM_DATABASE_URL`
    /// environment variable).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Creates the database file if it does not exist yet, connects, and brings the schema up to
    /// date. The standard entry point for server startup.
    pub async fn initialize(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        if !Sqlite::database_exists(url).await? {
            info!("🗃️ Database at {url} does not exist yet. Creating it.");
            Sqlite::create_database(url).await?;
        }
        let db = Self::new_with_url(url, max_connections).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }

    /// Locks the listing row and returns the authoritative in-transaction view of it.
    async fn locked_fetch(
        id: i64,
        tx: &mut Transaction<'_, sqlx::Sqlite>,
    ) -> Result<Listing, HandoverApiError> {
        if !listings::lock_row(id, tx).await? {
            return Err(HandoverApiError::not_found(id));
        }
        listings::fetch_listing(id, tx).await?.ok_or_else(|| HandoverApiError::not_found(id))
    }

    /// Guard shared by both parties' operations: the caller must be the seller or the reserving
    /// buyer of this listing.
    fn require_party(listing: &Listing, caller: &UserId) -> Result<(), HandoverApiError> {
        if listing.is_seller(caller) || listing.is_reserved_by(caller) {
            Ok(())
        } else {
            Err(HandoverApiError::Forbidden(format!(
                "{caller} is neither the seller nor the reserving buyer of listing #{}",
                listing.id
            )))
        }
    }

    /// The shared teardown for every exit that releases the reservation: consume live tokens,
    /// drop the candidate set, return the listing to `Available` and append the audit record.
    async fn cancel_in_tx(
        listing: &Listing,
        cancelled_by: &UserId,
        reason: FaultReason,
        fault: FaultParty,
        details: Option<String>,
        tx: &mut Transaction<'_, sqlx::Sqlite>,
    ) -> Result<CancellationRecord, HandoverApiError> {
        let buyer = match listing.reservation() {
            Reservation::Held { buyer, .. } => buyer,
            Reservation::Open => return Err(HandoverApiError::invalid_state(listing.status)),
        };
        exchange_tokens::invalidate_for_listing(listing.id, tx).await?;
        locations::delete_for_listing(listing.id, tx).await?;
        listings::clear_reservation(listing.id, tx).await?;
        let record = NewCancellationRecord {
            listing_id: listing.id,
            buyer_id: buyer,
            seller_id: listing.seller_id.clone(),
            cancelled_by: cancelled_by.clone(),
            status_at_cancellation: listing.status,
            fault,
            reason,
            details,
            kind: RecordKind::Cancellation,
        };
        cancellations::insert_record(record, tx).await
    }
}

impl HandoverDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_listing(&self, listing: NewListing) -> Result<Listing, HandoverApiError> {
        let mut conn = self.pool.acquire().await?;
        let listing = listings::insert_listing(listing, &mut conn).await?;
        debug!("🗃️ Listing #{} created by {}", listing.id, listing.seller_id);
        Ok(listing)
    }

    async fn fetch_listing(&self, id: i64) -> Result<Option<Listing>, HandoverApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(listings::fetch_listing(id, &mut conn).await?)
    }

    async fn fetch_locations(&self, listing_id: i64) -> Result<Vec<CandidateLocation>, HandoverApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(locations::fetch_for_listing(listing_id, &mut conn).await?)
    }

    async fn reserve_listing(&self, id: i64, buyer: &UserId) -> Result<Listing, HandoverApiError> {
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        if listing.is_seller(buyer) {
            return Err(HandoverApiError::Forbidden("Sellers cannot reserve their own listing".into()));
        }
        if listing.status != ListingStatus::Available {
            return Err(HandoverApiError::Conflict(format!("Listing #{id} is no longer available")));
        }
        let listing = listings::begin_reservation(id, buyer, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Listing #{id} reserved by {buyer}");
        Ok(listing)
    }

    async fn propose_locations(
        &self,
        id: i64,
        seller: &UserId,
        candidates: &[ProposedLocation],
    ) -> Result<Listing, HandoverApiError> {
        if candidates.is_empty() {
            return Err(HandoverApiError::InvalidRequest("At least one candidate location is required".into()));
        }
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        if !listing.is_seller(seller) {
            return Err(HandoverApiError::Forbidden("Only the seller may propose meeting locations".into()));
        }
        if listing.status != ListingStatus::Reserved {
            return Err(HandoverApiError::invalid_state(listing.status));
        }
        locations::replace_for_listing(id, candidates, &mut tx).await?;
        let listing = listings::set_status(id, ListingStatus::LocationProposed, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {} meeting locations proposed for listing #{id}", candidates.len());
        Ok(listing)
    }

    async fn select_location(
        &self,
        id: i64,
        buyer: &UserId,
        place: MeetingPlace,
    ) -> Result<(Listing, CandidateLocation), HandoverApiError> {
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        if !listing.is_reserved_by(buyer) {
            return Err(HandoverApiError::Forbidden("Only the reserving buyer may select a location".into()));
        }
        if listing.status != ListingStatus::LocationProposed {
            return Err(HandoverApiError::invalid_state(listing.status));
        }
        let selected = locations::select_place(id, place, &mut tx)
            .await?
            .ok_or_else(|| HandoverApiError::NotFound(format!("{place} is not among the proposed locations")))?;
        let listing = listings::set_status(id, ListingStatus::LocationSelected, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Buyer selected {place} for listing #{id}");
        Ok((listing, selected))
    }

    async fn request_exchange_code(
        &self,
        id: i64,
        buyer: &UserId,
        ttl: Duration,
    ) -> Result<CodeIssue, HandoverApiError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        if !listing.is_reserved_by(buyer) {
            return Err(HandoverApiError::Forbidden("Only the reserving buyer may request an exchange code".into()));
        }
        if listing.has_pending_reschedule() {
            return Err(HandoverApiError::Blocked);
        }
        if !matches!(listing.status, ListingStatus::LocationSelected | ListingStatus::OtpGenerated) {
            return Err(HandoverApiError::invalid_state(listing.status));
        }
        if locations::fetch_selected(id, &mut tx).await?.is_none() {
            return Err(HandoverApiError::invalid_state(listing.status));
        }
        // Duplicate submission guard: a live token short-circuits with its original expiry.
        if let Some(token) = exchange_tokens::fetch_live_token(id, now, &mut tx).await? {
            tx.commit().await?;
            debug!("🗃️ Exchange code for listing #{id} already issued; returning remaining TTL");
            return Ok(CodeIssue::AlreadyIssued { expires_at: token.expires_at });
        }
        let code = otp::generate_code();
        let salt = otp::new_salt();
        let hash = otp::hash_code(&salt, code.reveal());
        let expires_at = now + ttl;
        exchange_tokens::insert_token(id, buyer, &listing.seller_id, &salt, &hash, expires_at, &mut tx).await?;
        listings::set_status(id, ListingStatus::OtpGenerated, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Fresh exchange code issued for listing #{id}, expires at {expires_at}");
        Ok(CodeIssue::Issued { code, expires_at })
    }

    async fn verify_exchange_code(&self, id: i64, seller: &UserId, code: &str) -> Result<Listing, HandoverApiError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        if !listing.is_seller(seller) {
            return Err(HandoverApiError::Forbidden("Only the seller may verify the exchange code".into()));
        }
        if listing.has_pending_reschedule() {
            return Err(HandoverApiError::Blocked);
        }
        if listing.status != ListingStatus::OtpGenerated {
            return Err(HandoverApiError::invalid_state(listing.status));
        }
        let token = exchange_tokens::fetch_latest(id, &mut tx)
            .await?
            .ok_or_else(|| HandoverApiError::NotFound(format!("No exchange code exists for listing #{id}")))?;
        if token.failed_attempts >= MAX_OTP_ATTEMPTS {
            return Err(HandoverApiError::RateLimited);
        }
        if token.is_expired(now) {
            return Err(HandoverApiError::Expired);
        }
        if token.used {
            return Err(HandoverApiError::NotFound(format!("No active exchange code exists for listing #{id}")));
        }
        if otp::verify_code(&token.salt, &token.code_hash, code) {
            exchange_tokens::mark_used(token.id, &mut tx).await?;
            let listing = listings::set_status(id, ListingStatus::Sold, &mut tx).await?;
            tx.commit().await?;
            info!("🗃️ Listing #{id} sold. Handover verified.");
            Ok(listing)
        } else {
            // The attempt counter must survive the error, so this branch commits before bailing.
            let token = exchange_tokens::record_failed_attempt(token.id, MAX_OTP_ATTEMPTS, &mut tx).await?;
            tx.commit().await?;
            let remaining = token.attempts_remaining();
            warn!("🗃️ Incorrect exchange code for listing #{id}. {remaining} attempts remaining");
            Err(HandoverApiError::CodeMismatch { attempts_remaining: remaining })
        }
    }

    async fn request_reschedule(&self, id: i64, caller: &UserId) -> Result<RescheduleOutcome, HandoverApiError> {
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        Self::require_party(&listing, caller)?;
        if !listing.status.allows_reschedule() {
            return Err(HandoverApiError::invalid_state(listing.status));
        }
        match &listing.reschedule_requested_by {
            None => {
                listings::set_reschedule_flag(id, caller, &mut tx).await?;
                tx.commit().await?;
                debug!("🗃️ Reschedule requested by {caller} for listing #{id}");
                Ok(RescheduleOutcome::Requested)
            },
            Some(requester) if requester == caller => Err(HandoverApiError::AlreadyRequested),
            Some(_) => {
                // The counterparty calling while a request is pending accepts it. The pair fall
                // back to `Reserved` and must negotiate the meeting again from scratch.
                exchange_tokens::invalidate_for_listing(id, &mut tx).await?;
                locations::deselect_all(id, &mut tx).await?;
                let reset = listings::reset_to_reserved(id, &mut tx).await?;
                if reset.is_none() {
                    // The listing settled as Sold in the meantime. Leave it alone.
                    warn!("🗃️ Reschedule acceptance on listing #{id} ignored: already sold");
                    return Err(HandoverApiError::Conflict(format!("Listing #{id} has already been sold")));
                }
                tx.commit().await?;
                debug!("🗃️ Reschedule confirmed for listing #{id}; back to Reserved");
                Ok(RescheduleOutcome::Confirmed)
            },
        }
    }

    async fn reject_reschedule(&self, id: i64, caller: &UserId) -> Result<RejectOutcome, HandoverApiError> {
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        Self::require_party(&listing, caller)?;
        let requester = listing
            .reschedule_requested_by
            .clone()
            .ok_or_else(|| HandoverApiError::NotFound(format!("No reschedule request is pending on listing #{id}")))?;
        let seller_requested = listing.is_seller(&requester);
        if seller_requested && listing.is_reserved_by(caller) {
            // The buyer refusing the seller's reschedule terms ends the transaction entirely
            // rather than just clearing the flag.
            let record = Self::cancel_in_tx(
                &listing,
                caller,
                FaultReason::RescheduleRefused,
                FaultParty::Buyer,
                Some("Buyer rejected the seller's reschedule request".to_string()),
                &mut tx,
            )
            .await?;
            tx.commit().await?;
            info!(
                "🗃️ Listing #{id} cancelled: buyer rejected the seller's reschedule request (record #{})",
                record.id
            );
            Ok(RejectOutcome::Cancelled)
        } else {
            listings::clear_reschedule_flag(id, &mut tx).await?;
            tx.commit().await?;
            debug!("🗃️ Reschedule request on listing #{id} cleared by {caller}");
            Ok(RejectOutcome::Cleared)
        }
    }

    async fn cancel_reservation(
        &self,
        id: i64,
        caller: &UserId,
        reason: Option<FaultReason>,
    ) -> Result<CancellationRecord, HandoverApiError> {
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        Self::require_party(&listing, caller)?;
        if !listing.status.allows_cancellation() {
            return Err(HandoverApiError::invalid_state(listing.status));
        }
        let seller_cancelled = listing.is_seller(caller);
        let reason = reason.unwrap_or(if seller_cancelled {
            FaultReason::SellerWithdrew
        } else {
            FaultReason::BuyerChangedMind
        });
        let fault = if seller_cancelled || reason.is_seller_fault() { FaultParty::Seller } else { FaultParty::Buyer };
        let record = Self::cancel_in_tx(&listing, caller, reason, fault, None, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Reservation on listing #{id} cancelled by {caller} ({fault} at fault)");
        Ok(record)
    }

    async fn create_dispute(
        &self,
        id: i64,
        caller: &UserId,
        dispute: NewDispute,
    ) -> Result<CancellationRecord, HandoverApiError> {
        let mut tx = self.pool.begin().await?;
        let listing = Self::locked_fetch(id, &mut tx).await?;
        Self::require_party(&listing, caller)?;
        if !matches!(listing.status, ListingStatus::LocationSelected | ListingStatus::OtpGenerated) {
            return Err(HandoverApiError::invalid_state(listing.status));
        }
        let buyer = match listing.reservation() {
            Reservation::Held { buyer, .. } => buyer,
            Reservation::Open => return Err(HandoverApiError::invalid_state(listing.status)),
        };
        let fault = if listing.is_seller(caller) || dispute.reason.is_seller_fault() {
            FaultParty::Seller
        } else {
            FaultParty::Buyer
        };
        let details = match (&dispute.details, &dispute.evidence_url) {
            (Some(d), Some(url)) => Some(format!("{d} (evidence: {url})")),
            (Some(d), None) => Some(d.clone()),
            (None, Some(url)) => Some(format!("evidence: {url}")),
            (None, None) => None,
        };
        let record = NewCancellationRecord {
            listing_id: id,
            buyer_id: buyer,
            seller_id: listing.seller_id.clone(),
            cancelled_by: caller.clone(),
            status_at_cancellation: listing.status,
            fault,
            reason: dispute.reason,
            details,
            kind: RecordKind::Dispute,
        };
        let record = cancellations::insert_record(record, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Dispute opened on listing #{id} by {caller}");
        Ok(record)
    }

    async fn reconcile(&self, abandonment_window: Duration) -> Result<ReconcileSummary, HandoverApiError> {
        let now = Utc::now();
        let cutoff = now - abandonment_window;
        let mut tx = self.pool.begin().await?;
        let expired_tokens = exchange_tokens::expire_stale(now, &mut tx).await?;
        let reclaimed = listings::reclaim_abandoned(cutoff, &mut tx).await?;
        let orphaned_tokens = exchange_tokens::invalidate_orphaned(&mut tx).await?;
        let orphaned_locations = locations::delete_orphaned(&mut tx).await?;
        let cleared_reschedules = listings::clear_stale_reschedules(cutoff, &mut tx).await?;
        tx.commit().await?;
        Ok(ReconcileSummary {
            expired_tokens: expired_tokens + orphaned_tokens,
            reclaimed_listings: reclaimed.len() as u64,
            orphaned_locations,
            cleared_reschedules,
        })
    }
}
