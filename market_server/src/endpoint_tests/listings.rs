use actix_web::{http::StatusCode, web, web::ServiceConfig};
use market_engine::{
    db_types::{Listing, ListingStatus},
    events::EventProducers,
    traits::HandoverApiError,
    HandoverFlowApi,
};
use serde_json::{json, Value};

use super::{
    helpers::{get_request, listing_fixture, post_request},
    mocks::MockHandoverBackend,
};
use crate::routes::{CreateListingRoute, GetProductRoute, ReserveRoute};

#[actix_web::test]
async fn create_listing_without_principal() {
    let (status, body) = post_request("", "/products", Some(json!({"title": "Lab coat"})), configure_create).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No authenticated principal"), "body was {body}");
}

#[actix_web::test]
async fn create_listing_rejects_blank_title() {
    let (status, body) = post_request("alice", "/products", Some(json!({"title": "  "})), configure_create).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("title"), "body was {body}");
}

#[actix_web::test]
async fn create_listing_returns_the_new_listing() {
    let (status, body) =
        post_request("alice", "/products", Some(json!({"title": "Thermodynamics textbook"})), configure_create).await;
    assert_eq!(status, StatusCode::CREATED);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["title"], "Thermodynamics textbook");
    assert_eq!(v["seller_id"], "alice");
    assert_eq!(v["status"], "Available");
    assert_eq!(v["reserved_by"], Value::Null);
}

#[actix_web::test]
async fn get_unknown_product_is_404() {
    let (status, body) = get_request("bob", "/products/99", configure_missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("does not exist"), "body was {body}");
}

#[actix_web::test]
async fn reserve_returns_holder_and_status() {
    let (status, body) = post_request("bob", "/products/1/reserve", None, configure_reserve).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], "Reserved");
    assert_eq!(v["reserved_by"], "bob");
}

#[actix_web::test]
async fn losing_the_reservation_race_is_409() {
    let (status, body) = post_request("carol", "/products/1/reserve", None, configure_reserve_conflict).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Lost the race"), "body was {body}");
}

fn install(cfg: &mut ServiceConfig, db: MockHandoverBackend) {
    let api = HandoverFlowApi::new(db, EventProducers::default());
    cfg.service(CreateListingRoute::<MockHandoverBackend>::new())
        .service(GetProductRoute::<MockHandoverBackend>::new())
        .service(ReserveRoute::<MockHandoverBackend>::new())
        .app_data(web::Data::new(api));
}

fn configure_create(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_insert_listing().returning(|new| {
        Ok(Listing {
            seller_id: new.seller_id,
            title: new.title,
            reserved_by: None,
            reserved_at: None,
            ..listing_fixture(ListingStatus::Available)
        })
    });
    install(cfg, db);
}

fn configure_missing(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_fetch_listing().returning(|_| Ok(None));
    install(cfg, db);
}

fn configure_reserve(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_reserve_listing().returning(|_, buyer| {
        let mut listing = listing_fixture(ListingStatus::Reserved);
        listing.reserved_by = Some(buyer.clone());
        Ok(listing)
    });
    install(cfg, db);
}

fn configure_reserve_conflict(cfg: &mut ServiceConfig) {
    let mut db = MockHandoverBackend::new();
    db.expect_reserve_listing()
        .returning(|id, _| Err(HandoverApiError::Conflict(format!("listing #{id} is already reserved"))));
    install(cfg, db);
}
