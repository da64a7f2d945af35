//! Campus Market Engine
//!
//! The market engine is the core of a peer-to-peer campus marketplace in which a sale completes
//! through a physical handover: a buyer reserves a listing, the pair negotiate a meeting spot, a
//! one-time exchange code proves the handover happened, and the listing settles as sold.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You
//!    should never need to access the database directly; use the public API instead. The exception
//!    is the data types used in the database, which are defined in the `db_types` module and are
//!    public.
//! 2. The engine public API ([`mod@engine_api`]). [`HandoverFlowApi`] drives the transaction state
//!    machine; backends implement the traits in [`mod@traits`] to power it.
//! 3. Events ([`mod@events`]). Collaborators that react to state transitions (trust scoring,
//!    notifications) subscribe here; they are outside the state machine and cannot affect its
//!    correctness.
pub mod db_types;
mod engine_api;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use engine_api::{
    errors::HandoverApiError,
    handover_flow_api::HandoverFlowApi,
    listing_objects,
};
