use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::{TimeZone, Utc};
use market_engine::db_types::{
    CancellationRecord,
    FaultParty,
    FaultReason,
    Listing,
    ListingStatus,
    RecordKind,
    UserId,
};

use crate::auth::PRINCIPAL_HEADER;

pub async fn get_request(user: &str, path: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let req = TestRequest::get().uri(path);
    send(req, user, configure).await
}

pub async fn post_request(
    user: &str,
    path: &str,
    body: Option<serde_json::Value>,
    configure: fn(&mut ServiceConfig),
) -> (StatusCode, String) {
    let mut req = TestRequest::post().uri(path);
    if let Some(body) = body {
        req = req.set_json(body);
    }
    send(req, user, configure).await
}

async fn send(mut req: TestRequest, user: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let _ = env_logger::try_init().ok();
    if !user.is_empty() {
        req = req.insert_header((PRINCIPAL_HEADER, user));
    }
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub fn listing_fixture(status: ListingStatus) -> Listing {
    let reserved = status != ListingStatus::Available;
    Listing {
        id: 1,
        seller_id: UserId::from("alice"),
        title: "Thermodynamics textbook".to_string(),
        status,
        reserved_by: reserved.then(|| UserId::from("bob")),
        reserved_at: reserved.then(|| Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()),
        reschedule_requested_by: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
    }
}

pub fn cancellation_fixture(fault: FaultParty, reason: FaultReason) -> CancellationRecord {
    CancellationRecord {
        id: 1,
        listing_id: 1,
        buyer_id: UserId::from("bob"),
        seller_id: UserId::from("alice"),
        cancelled_by: UserId::from("bob"),
        status_at_cancellation: ListingStatus::LocationSelected,
        fault,
        reason,
        details: None,
        kind: RecordKind::Cancellation,
        created_at: Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap(),
    }
}
