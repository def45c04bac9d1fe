use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-level error kinds shared by the HTTP layer and its middleware.
///
/// Every outward failure of the conversation service collapses into one of
/// these before it is rendered:
/// ```ignore
/// match store.get_conversation(id).await {
///     Ok(conversation) => Ok(conversation),
///     Err(e) => Err(ServiceError::ServiceUnavailable(e.to_string())),
/// }
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A named user does not exist
    #[error("User not found")]
    UserNotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) | ServiceError::UserNotFound => 404,
            ServiceError::Unauthorized => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::BadRequest(_) => 400,
            ServiceError::Conflict(_) => 409,
            ServiceError::ServiceUnavailable(_) => 503,
            ServiceError::InternalError(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_codes::RESOURCE_NOT_FOUND,
            ServiceError::UserNotFound => error_codes::USER_NOT_FOUND,
            ServiceError::Unauthorized => error_codes::TOKEN_INVALID,
            ServiceError::Forbidden(_) => error_codes::ACTION_FORBIDDEN,
            ServiceError::BadRequest(_) => error_codes::INVALID_INPUT,
            ServiceError::Conflict(_) => error_codes::MEMBERSHIP_CONFLICT,
            ServiceError::ServiceUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
            ServiceError::InternalError(_) => error_codes::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) | ServiceError::UserNotFound => error_types::NOT_FOUND_ERROR,
            ServiceError::Unauthorized => error_types::AUTHENTICATION_ERROR,
            ServiceError::Forbidden(_) => error_types::AUTHORIZATION_ERROR,
            ServiceError::BadRequest(_) => error_types::VALIDATION_ERROR,
            ServiceError::Conflict(_) => error_types::CONFLICT_ERROR,
            ServiceError::ServiceUnavailable(_) => error_types::SERVICE_UNAVAILABLE_ERROR,
            ServiceError::InternalError(_) => error_types::SERVER_ERROR,
        }
    }

    /// Callers may retry only when the backing store was unreachable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ServiceUnavailable(_))
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(
            self.error_type(),
            &self.to_string(),
            self.status_code(),
            self.error_type(),
            self.error_code(),
        )
    }
}

/// Uniform JSON error body returned by every route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,

    /// Human readable explanation
    pub message: String,

    pub status: u16,

    /// One of the constants in [`error_types`]
    pub error_type: String,

    /// One of the constants in [`error_codes`]
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Request id from the `x-request-id` header, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// RFC 3339
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            details: None,
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

pub mod error_codes {
    // Session
    pub const TOKEN_MISSING: &str = "TOKEN_MISSING";
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";

    // Users
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

    // Conversations
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    pub const ACTION_FORBIDDEN: &str = "ACTION_FORBIDDEN";
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const MEMBERSHIP_CONFLICT: &str = "MEMBERSHIP_CONFLICT";

    // System
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
}

pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "service_unavailable_error";
}
