use chrono::Duration;
use market_engine::{
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
    traits::{
        CodeIssue,
        HandoverApiError,
        HandoverDatabase,
        ReconcileSummary,
        RejectOutcome,
        RescheduleOutcome,
    },
};
use mockall::mock;

mock! {
    pub HandoverBackend {}

    impl Clone for HandoverBackend {
        fn clone(&self) -> Self;
    }

    impl HandoverDatabase for HandoverBackend {
        fn url(&self) -> &str;
        async fn insert_listing(&self, listing: NewListing) -> Result<Listing, HandoverApiError>;
        async fn fetch_listing(&self, id: i64) -> Result<Option<Listing>, HandoverApiError>;
        async fn fetch_locations(&self, listing_id: i64) -> Result<Vec<CandidateLocation>, HandoverApiError>;
        async fn reserve_listing(&self, id: i64, buyer: &UserId) -> Result<Listing, HandoverApiError>;
        async fn propose_locations(
            &self,
            id: i64,
            seller: &UserId,
            candidates: &[ProposedLocation],
        ) -> Result<Listing, HandoverApiError>;
        async fn select_location(
            &self,
            id: i64,
            buyer: &UserId,
            place: MeetingPlace,
        ) -> Result<(Listing, CandidateLocation), HandoverApiError>;
        async fn request_exchange_code(
            &self,
            id: i64,
            buyer: &UserId,
            ttl: Duration,
        ) -> Result<CodeIssue, HandoverApiError>;
        async fn verify_exchange_code(&self, id: i64, seller: &UserId, code: &str) -> Result<Listing, HandoverApiError>;
        async fn request_reschedule(&self, id: i64, caller: &UserId) -> Result<RescheduleOutcome, HandoverApiError>;
        async fn reject_reschedule(&self, id: i64, caller: &UserId) -> Result<RejectOutcome, HandoverApiError>;
        async fn cancel_reservation(
            &self,
            id: i64,
            caller: &UserId,
            reason: Option<FaultReason>,
        ) -> Result<CancellationRecord, HandoverApiError>;
        async fn create_dispute(
            &self,
            id: i64,
            caller: &UserId,
            dispute: NewDispute,
        ) -> Result<CancellationRecord, HandoverApiError>;
        async fn reconcile(&self, abandonment_window: Duration) -> Result<ReconcileSummary, HandoverApiError>;
    }
}
