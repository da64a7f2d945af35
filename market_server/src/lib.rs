//! # Campus Market server
//! This module hosts the HTTP face of the campus marketplace handover protocol. It is responsible
//! for:
//! * Extracting the authenticated caller from each request.
//! * Translating request bodies into engine calls and engine errors into HTTP status codes.
//! * Running the background reconciliation worker.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.
//!
//! ## Routes
//! The state machine is driven through `/products/{id}/...` and `/locations/{id}/...` routes, plus
//! `/otp/verify` for settlement and `/health` for liveness checks. See [routes] for the full set.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod reconciliation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
