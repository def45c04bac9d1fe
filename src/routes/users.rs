//! User search and self-service profile endpoints

use crate::{
    error::AppError, middleware::guards::User, models, services::validation, state::AppState,
};
use actix_web::{get, put, web, HttpResponse};
use serde::{Deserialize, Serialize};

const MAX_SEARCH_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct SearchUsersQuery {
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Serialize)]
pub struct UsersListResponse {
    pub users: Vec<models::User>,
    pub total: usize,
}

#[derive(Deserialize)]
pub struct SetUsernameRequest {
    pub username: String,
}

#[derive(Deserialize)]
pub struct SetPhotoRequest {
    pub photo: String,
}

/// GET /users?username=<prefix>&limit=<n>
#[get("")]
pub async fn search_users(
    state: web::Data<AppState>,
    _user: User,
    query: web::Query<SearchUsersQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = query.limit.clamp(1, MAX_SEARCH_LIMIT);
    let users = state.users.search(&query.username, limit).await?;
    let total = users.len();
    Ok(HttpResponse::Ok().json(UsersListResponse { users, total }))
}

/// PUT /users/me/username
#[put("/me/username")]
pub async fn set_username(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SetUsernameRequest>,
) -> Result<HttpResponse, AppError> {
    let updated = state.users.set_username(user.id, body.username.trim()).await?;
    tracing::info!(user_id = %user.id, "username changed");
    Ok(HttpResponse::Ok().json(updated))
}

/// PUT /users/me/photo
#[put("/me/photo")]
pub async fn set_photo(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SetPhotoRequest>,
) -> Result<HttpResponse, AppError> {
    let photo = validation::photo_ref(&body.photo)?;
    let updated = state.users.set_photo(user.id, photo).await?;
    Ok(HttpResponse::Ok().json(updated))
}
