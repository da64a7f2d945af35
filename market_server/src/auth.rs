//! Authenticated-principal extraction.
//!
//! Authentication itself is a collaborator concern: an upstream gateway verifies the session and
//! attaches the caller's opaque identifier to the request as the `x-authenticated-user` header.
//! The server only ever compares identifiers, so the extractor does nothing more than read that
//! header and reject requests that arrive without it.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use market_engine::db_types::UserId;

use crate::errors::{AuthError, ServerError};

pub const PRINCIPAL_HEADER: &str = "x-authenticated-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &UserId {
        &self.id
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.headers().get(PRINCIPAL_HEADER) {
            None => Err(ServerError::AuthenticationError(AuthError::MissingPrincipal)),
            Some(value) => match value.to_str() {
                Ok(id) if !id.is_empty() => Ok(AuthenticatedUser { id: UserId::from(id) }),
                Ok(_) => Err(ServerError::AuthenticationError(AuthError::MissingPrincipal)),
                Err(_) => Err(ServerError::AuthenticationError(AuthError::UnreadablePrincipal)),
            },
        };
        ready(result)
    }
}
