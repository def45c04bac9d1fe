use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    Error, HttpMessage, HttpResponse,
};
use async_trait::async_trait;
use error_types::{error_codes, ServiceError};
use futures::future::{ready, Ready};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::request_id::RequestIdValue;

/// User ID resolved from the session credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid session: {0}")]
    Invalid(String),

    #[error("identity backend unavailable: {0}")]
    Unavailable(String),
}

/// Maps an opaque session token to a stable user id.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Uuid, ResolveError>;
}

/// Session Authentication Middleware
///
/// Resolves `Authorization: Bearer <token>` exactly once per request. Failure
/// short-circuits with 401 before any handler runs.
#[derive(Clone)]
pub struct SessionAuth {
    resolver: Arc<dyn IdentityResolver>,
}

impl SessionAuth {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { resolver }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SessionAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthService {
            service: Rc::new(service),
            resolver: self.resolver.clone(),
        }))
    }
}

pub struct SessionAuthService<S> {
    service: Rc<S>,
    resolver: Arc<dyn IdentityResolver>,
}

fn reject<B>(
    req: ServiceRequest,
    error: ServiceError,
    code: &str,
) -> ServiceResponse<EitherBody<B>> {
    let mut body = error.to_response();
    body.code = code.to_string();
    let request_id = req.extensions().get::<RequestIdValue>().map(|r| r.0.clone());
    if let Some(request_id) = request_id {
        body = body.with_trace_id(request_id);
    }
    let status = StatusCode::from_u16(body.status).unwrap_or(StatusCode::UNAUTHORIZED);
    req.into_response(HttpResponse::build(status).json(body))
        .map_into_right_body()
}

impl<S, B> Service<ServiceRequest> for SessionAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let resolver = self.resolver.clone();

        Box::pin(async move {
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string);

            let token = match header {
                None => {
                    return Ok(reject(
                        req,
                        ServiceError::Unauthorized,
                        error_codes::TOKEN_MISSING,
                    ))
                }
                Some(header) => match header.strip_prefix("Bearer ").map(str::trim) {
                    Some(token) if !token.is_empty() => token.to_string(),
                    _ => {
                        return Ok(reject(
                            req,
                            ServiceError::Unauthorized,
                            error_codes::TOKEN_INVALID,
                        ))
                    }
                },
            };

            let user_id = match resolver.resolve(&token).await {
                Ok(user_id) => user_id,
                Err(ResolveError::Invalid(reason)) => {
                    tracing::warn!(reason = %reason, "session resolution rejected");
                    return Ok(reject(
                        req,
                        ServiceError::Unauthorized,
                        error_codes::TOKEN_INVALID,
                    ));
                }
                Err(ResolveError::Unavailable(reason)) => {
                    tracing::error!(error = %reason, "identity resolver unavailable");
                    return Ok(reject(
                        req,
                        ServiceError::ServiceUnavailable(reason),
                        error_codes::SERVICE_UNAVAILABLE,
                    ));
                }
            };

            req.extensions_mut().insert(UserId(user_id));

            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}

/// FromRequest implementation for UserId
impl actix_web::FromRequest for UserId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<UserId>() {
            Some(user_id) => ready(Ok(*user_id)),
            None => ready(Err(actix_web::error::ErrorUnauthorized(
                "User not authenticated",
            ))),
        }
    }
}
