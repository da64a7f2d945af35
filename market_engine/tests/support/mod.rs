//! Shared scaffolding for the integration tests: a throwaway database per test and helpers that
//! drive a listing into each protocol state.
#![allow(dead_code)]

use chrono::Duration;
use log::*;
use market_engine::{
    db_types::{Listing, MeetingPlace, NewListing, ProposedLocation, UserId},
    traits::{CodeIssue, HandoverDatabase},
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const SELLER: &str = "alice";
pub const BUYER: &str = "bob";

pub fn seller() -> UserId {
    UserId::from(SELLER)
}

pub fn buyer() -> UserId {
    UserId::from(BUYER)
}

pub fn random_db_path() -> String {
    format!("sqlite://{}/market_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::dotenv().ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    let db = SqliteDatabase::initialize(&url, 5).await.expect("Error preparing test database");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn listed(db: &SqliteDatabase) -> Listing {
    db.insert_listing(NewListing::new(SELLER, "Thermodynamics textbook")).await.expect("Error creating listing")
}

pub async fn reserved(db: &SqliteDatabase) -> Listing {
    let listing = listed(db).await;
    db.reserve_listing(listing.id, &buyer()).await.expect("Error reserving listing")
}

pub fn candidate_set() -> Vec<ProposedLocation> {
    vec![
        ProposedLocation::new(MeetingPlace::LibraryFoyer).at_time("18:00"),
        ProposedLocation::new(MeetingPlace::CampusCafe),
    ]
}

pub async fn location_selected(db: &SqliteDatabase) -> Listing {
    let listing = reserved(db).await;
    db.propose_locations(listing.id, &seller(), &candidate_set()).await.expect("Error proposing locations");
    let (listing, _) =
        db.select_location(listing.id, &buyer(), MeetingPlace::CampusCafe).await.expect("Error selecting location");
    listing
}

/// Drives a listing all the way to `OtpGenerated` and returns the plaintext code.
pub async fn code_issued(db: &SqliteDatabase, ttl: Duration) -> (Listing, String) {
    let listing = location_selected(db).await;
    let issue = db.request_exchange_code(listing.id, &buyer(), ttl).await.expect("Error requesting exchange code");
    let code = match issue {
        CodeIssue::Issued { code, .. } => code.reveal().to_string(),
        CodeIssue::AlreadyIssued { .. } => panic!("A fresh listing cannot already have a code"),
    };
    let listing = db.fetch_listing(listing.id).await.expect("Error fetching listing").expect("Listing vanished");
    (listing, code)
}
