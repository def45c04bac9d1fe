//! # Actix Middleware Library
//!
//! Middleware shared by the conversation service's HTTP surface
//!
//! ## Modules
//! - `request_id`: `x-request-id` generation and propagation
//! - `logging`: access log lines through `tracing`
//! - `session_auth`: bearer session resolution into a [`UserId`]

pub mod logging;
pub mod request_id;
pub mod session_auth;

pub use logging::Logging;
pub use request_id::{RequestId, RequestIdValue};
pub use session_auth::{IdentityResolver, ResolveError, SessionAuth, UserId};
