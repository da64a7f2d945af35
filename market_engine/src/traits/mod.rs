//! Backend traits for the handover engine.
//!
//! A storage backend implements [`HandoverDatabase`] to act as the durable listing store for the
//! state machine. The SQLite implementation lives in [`crate::sqlite`]; the trait exists so that
//! the HTTP layer and its tests can run against mocks.
mod data_objects;
mod handover_database;

pub use data_objects::{CodeIssue, ReconcileSummary, RejectOutcome, RescheduleOutcome};
pub use handover_database::HandoverDatabase;

pub use crate::engine_api::errors::HandoverApiError;
