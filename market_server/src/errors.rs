use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use market_engine::HandoverApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    HandoverError(HandoverApiError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::HandoverError(e) => match e {
                HandoverApiError::NotFound(_) => StatusCode::NOT_FOUND,
                HandoverApiError::Forbidden(_) => StatusCode::FORBIDDEN,
                HandoverApiError::InvalidState { .. } => StatusCode::BAD_REQUEST,
                HandoverApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                HandoverApiError::Blocked => StatusCode::CONFLICT,
                HandoverApiError::Conflict(_) => StatusCode::CONFLICT,
                HandoverApiError::AlreadyRequested => StatusCode::CONFLICT,
                HandoverApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                HandoverApiError::Expired => StatusCode::GONE,
                HandoverApiError::CodeMismatch { .. } => StatusCode::BAD_REQUEST,
                HandoverApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = serde_json::json!({ "error": self.to_string() });
        // The OTP contract promises the caller the number of attempts they have left.
        if let Self::HandoverError(HandoverApiError::CodeMismatch { attempts_remaining }) = self {
            body["attemptsRemaining"] = serde_json::json!(attempts_remaining);
        }
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

impl From<HandoverApiError> for ServerError {
    fn from(e: HandoverApiError) -> Self {
        Self::HandoverError(e)
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No authenticated principal was attached to the request.")]
    MissingPrincipal,
    #[error("The authenticated principal header is not valid UTF-8.")]
    UnreadablePrincipal,
}
