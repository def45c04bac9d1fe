use crate::services::authorization::Denial;
use crate::store::StoreError;
use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use error_types::ServiceError;
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Also returned to non-members so existence is not disclosed
    #[error("not found")]
    NotFound,

    /// A target or peer user that does not exist
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal server error")]
    Internal,
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppError::NotFound,
            StoreError::AlreadyMember(_) | StoreError::NotMember(_) | StoreError::Duplicate(_) => {
                AppError::Conflict(e.to_string())
            }
            StoreError::Empty(_) => AppError::BadRequest(e.to_string()),
            StoreError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}

impl From<Denial> for AppError {
    fn from(d: Denial) -> Self {
        match d {
            Denial::NotFound => AppError::NotFound,
            Denial::Forbidden(reason) => AppError::Forbidden(reason.to_string()),
            Denial::InvalidOperation(reason) => AppError::BadRequest(reason.to_string()),
        }
    }
}

impl From<&AppError> for ServiceError {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::BadRequest(msg) => ServiceError::BadRequest(msg.clone()),
            AppError::Unauthorized => ServiceError::Unauthorized,
            AppError::Forbidden(msg) => ServiceError::Forbidden(msg.clone()),
            AppError::NotFound => ServiceError::NotFound("conversation or user".into()),
            AppError::UserNotFound(_) => ServiceError::UserNotFound,
            AppError::Conflict(msg) => ServiceError::Conflict(msg.clone()),
            AppError::ServiceUnavailable(msg) => ServiceError::ServiceUnavailable(msg.clone()),
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
                ServiceError::InternalError("internal server error".into())
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = ServiceError::from(self).to_response();
        if let AppError::UserNotFound(user_id) = self {
            body = body.with_details(format!("user_id={user_id}"));
        }

        let mut response = HttpResponse::build(ResponseError::status_code(self));
        if self.is_retryable() {
            response.insert_header((header::RETRY_AFTER, "1"));
        }
        response.json(body)
    }
}

impl AppError {
    /// Store outages are safe to retry; every denial is deterministic and is not
    pub fn is_retryable(&self) -> bool {
        ServiceError::from(self).is_retryable()
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound | AppError::UserNotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::ServiceUnavailable(_) => 503,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => 500,
        }
    }
}
