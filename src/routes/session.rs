//! Login: exchange a username for a session token

use crate::{error::AppError, models::User, state::AppState};
use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

/// POST /session
/// Find or register the user by name and issue a bearer token.
/// 201 when the user was registered by this call, 200 otherwise.
#[post("/session")]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let username = body.into_inner().username;
    let (user, created) = state.users.find_or_create(username.trim()).await?;
    let token = state.sessions.issue(user.id)?;

    tracing::info!(user_id = %user.id, created, "session issued");

    let response = SessionResponse {
        token,
        token_type: "Bearer",
        expires_in: state.sessions.ttl_seconds(),
        user,
    };
    if created {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}
