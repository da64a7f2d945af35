use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, Utc};
use cm_common::Secret;
use market_engine::{
    db_types::{FaultParty, FaultReason, ListingStatus},
    events::EventProducers,
    traits::{CodeIssue, HandoverApiError, RejectOutcome, RescheduleOutcome},
    HandoverFlowApi,
};
use serde_json::{json, Value};

use super::{
    helpers::{cancellation_fixture, listing_fixture, post_request},
    mocks::MockHandoverBackend,
};
use crate::{
    config::ServerConfig,
    routes::{CancelRoute, ConfirmMeetRoute, DisputeRoute, RejectRescheduleRoute, RescheduleRoute, VerifyOtpRoute},
};

#[actix_web::test]
async fn confirm_meet_reveals_a_fresh_code_exactly_once() {
    let (status, body) = post_request("bob", "/products/1/confirm-meet", None, configure_fresh_code).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["otp"], "481263");
    let expires_in = v["expiresIn"].as_i64().unwrap();
    assert!(expires_in > 0 && expires_in <= 600, "expiresIn was {expires_in}");
}

#[actix_web::test]
async fn confirm_meet_is_idempotent_while_a_code_is_live() {
    let (status, body) = post_request("bob", "/products/1/confirm-meet", None, configure_repeat_code).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["message"], "OTP already generated");
    assert!(v.get("otp").is_none(), "the plaintext must not be re-revealed: {body}");
}

#[actix_web::test]
async fn verify_settles_the_sale() {
    let (status, body) =
        post_request("alice", "/otp/verify", Some(json!({"productId": 1, "otp": "481263"})), configure_verify_ok)
            .await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["success"], true);
}

#[actix_web::test]
async fn wrong_code_reports_attempts_remaining() {
    let (status, body) =
        post_request("alice", "/otp/verify", Some(json!({"productId": 1, "otp": "000000"})), configure_mismatch)
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["attemptsRemaining"], 3);
}

#[actix_web::test]
async fn locked_code_is_rate_limited() {
    let (status, _) =
        post_request("alice", "/otp/verify", Some(json!({"productId": 1, "otp": "000000"})), configure_locked).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[actix_web::test]
async fn expired_code_is_410() {
    let (status, _) =
        post_request("alice", "/otp/verify", Some(json!({"productId": 1, "otp": "481263"})), configure_expired).await;
    assert_eq!(status, StatusCode::GONE);
}

#[actix_web::test]
async fn first_reschedule_call_is_a_request() {
    let (status, body) = post_request("alice", "/products/1/reschedule", None, configure_reschedule_requested).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"requested"}"#);
}

#[actix_web::test]
async fn counterparty_reschedule_call_confirms() {
    let (status, body) = post_request("bob", "/products/1/reschedule", None, configure_reschedule_confirmed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"confirmed"}"#);
}

#[actix_web::test]
async fn buyer_rejecting_sellers_reschedule_cancels() {
    let (status, body) = post_request("bob", "/products/1/reschedule/reject", None, configure_reject_cancelled).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"action":"cancelled"}"#);
}

#[actix_web::test]
async fn cancellation_reports_the_penalised_party() {
    let (status, body) = post_request(
        "bob",
        "/products/1/cancel",
        Some(json!({"reason": "SellerNoShow"})),
        configure_cancel,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["penaltyAppliedTo"], "Seller");
    assert_eq!(v["reason"], "SellerNoShow");
}

#[actix_web::test]
async fn cancellation_after_otp_is_rejected() {
    let (status, body) = post_request("bob", "/products/1/cancel", None, configure_cancel_too_late).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("OtpGenerated"), "body was {body}");
}

#[actix_web::test]
async fn dispute_is_acknowledged() {
    let (status, body) = post_request(
        "bob",
        "/products/1/dispute",
        Some(json!({"reason": "ItemNotAsDescribed", "details": "Cover is torn"})),
        configure_dispute,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Dispute recorded"), "body was {body}");
}

fn install(cfg: &mut ServiceConfig, db: MockHandoverBackend) {
    let api = HandoverFlowApi::new(db, EventProducers::default());
    cfg.service(ConfirmMeetRoute::<MockHandoverBackend>::new())
        .service(VerifyOtpRoute::<MockHandoverBackend>::new())
        .service(RescheduleRoute::<MockHandoverBackend>::new())
        .service(RejectRescheduleRoute::<MockHandoverBackend>::new())
        .service(CancelRoute::<MockHandoverBackend>::new())
        .service(DisputeRoute::<MockHandoverBackend>::new())
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(ServerConfig::default()));
}

fn configure_fresh_code(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_request_exchange_code().returning(|_, _, ttl| {
        Ok(CodeIssue::Issued { code: Secret::new("481263".to_string()), expires_at: Utc::now() + ttl })
    });
    install(cfg, db);
}

fn configure_repeat_code(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_request_exchange_code()
        .returning(|_, _, _| Ok(CodeIssue::AlreadyIssued { expires_at: Utc::now() + Duration::minutes(4) }));
    install(cfg, db);
}

fn configure_verify_ok(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_verify_exchange_code().returning(|_, _, _| Ok(listing_fixture(ListingStatus::Sold)));
    install(cfg, db);
}

fn configure_mismatch(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_verify_exchange_code()
        .returning(|_, _, _| Err(HandoverApiError::CodeMismatch { attempts_remaining: 3 }));
    install(cfg, db);
}

fn configure_locked(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_verify_exchange_code().returning(|_, _, _| Err(HandoverApiError::RateLimited));
    install(cfg, db);
}

fn configure_expired(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_verify_exchange_code().returning(|_, _, _| Err(HandoverApiError::Expired));
    install(cfg, db);
}

fn configure_reschedule_requested(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_request_reschedule().returning(|_, _| Ok(RescheduleOutcome::Requested));
    install(cfg, db);
}

fn configure_reschedule_confirmed(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_request_reschedule().returning(|_, _| Ok(RescheduleOutcome::Confirmed));
    install(cfg, db);
}

fn configure_reject_cancelled(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_reject_reschedule().returning(|_, _| Ok(RejectOutcome::Cancelled));
    install(cfg, db);
}

fn configure_cancel(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_cancel_reservation()
        .returning(|_, _, _| Ok(cancellation_fixture(FaultParty::Seller, FaultReason::SellerNoShow)));
    install(cfg, db);
}

fn configure_cancel_too_late(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_cancel_reservation()
        .returning(|_, _, _| Err(HandoverApiError::invalid_state(ListingStatus::OtpGenerated)));
    install(cfg, db);
}

fn configure_dispute(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_create_dispute()
        .returning(|_, _, _| Ok(cancellation_fixture(FaultParty::Seller, FaultReason::ItemNotAsDescribed)));
    install(cfg, db);
}
