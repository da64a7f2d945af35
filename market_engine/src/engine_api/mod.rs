//! # Handover engine public API
//!
//! The `engine_api` module exposes the programmatic API for the campus market handover engine.
//!
//! * [`handover_flow_api`] drives the product transaction state machine: reservation, location
//!   negotiation, exchange-code issue/verify, reschedule handshake, cancellation and dispute, and
//!   the reconciliation sweep.
//! * [`listing_objects`] holds the serialisable view objects handed to HTTP clients.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements
//! [`crate::traits::HandoverDatabase`]:
//!
//! ```rust,ignore
//! use market_engine::{HandoverFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = HandoverFlowApi::new(db, EventProducers::default());
//! let listing = api.reserve(42, &"buyer-7".into()).await?;
//! ```
pub mod errors;
pub mod handover_flow_api;
pub mod listing_objects;
