//! Group management endpoints
//!
//! Authorization happens in the conversation service against a fresh snapshot;
//! these handlers only shape requests and responses.

use crate::{
    error::AppError, middleware::guards::User, models::ConversationView, state::AppState,
    store::Removal,
};
use actix_web::{delete, post, put, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub photo: Option<String>,
    #[serde(default)]
    pub members: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct RephotoRequest {
    pub photo: String,
}

#[derive(Serialize)]
pub struct RemovalResponse {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    /// True when the removed member was the last one
    pub disposed: bool,
}

impl RemovalResponse {
    fn new(conversation_id: Uuid, user_id: Uuid, removal: Removal) -> Self {
        Self {
            conversation_id,
            user_id,
            disposed: removal == Removal::Disposed,
        }
    }
}

// ============================================
// Endpoints
// ============================================

/// POST /conversations/groups
#[post("/groups")]
pub async fn create_group(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<CreateGroupRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let conversation = state
        .conversations
        .create_group(user.id, &body.name, body.photo.as_deref(), body.members)
        .await?;
    Ok(HttpResponse::Created().json(ConversationView::from(conversation)))
}

/// PUT /conversations/{id}/name
#[put("/{id}/name")]
pub async fn rename_group(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
    body: web::Json<RenameRequest>,
) -> Result<HttpResponse, AppError> {
    let conversation = state
        .conversations
        .rename_conversation(user.id, conversation_id.into_inner(), &body.name)
        .await?;
    Ok(HttpResponse::Ok().json(ConversationView::from(conversation)))
}

/// PUT /conversations/{id}/photo
#[put("/{id}/photo")]
pub async fn rephoto_group(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
    body: web::Json<RephotoRequest>,
) -> Result<HttpResponse, AppError> {
    let conversation = state
        .conversations
        .rephoto_conversation(user.id, conversation_id.into_inner(), &body.photo)
        .await?;
    Ok(HttpResponse::Ok().json(ConversationView::from(conversation)))
}

/// POST /conversations/{id}/members/{user_id}
#[post("/{id}/members/{user_id}")]
pub async fn add_member(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (conversation_id, target_user_id) = path.into_inner();
    let conversation = state
        .conversations
        .add_user_to_conversation(user.id, conversation_id, target_user_id)
        .await?;
    Ok(HttpResponse::Created().json(ConversationView::from(conversation)))
}

/// DELETE /conversations/{id}/members/me
/// Leave the group; the last member leaving disposes it
#[delete("/{id}/members/me")]
pub async fn leave_group(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = conversation_id.into_inner();
    let removal = state
        .conversations
        .remove_user_from_conversation(user.id, conversation_id)
        .await?;
    Ok(HttpResponse::Ok().json(RemovalResponse::new(conversation_id, user.id, removal)))
}

/// DELETE /conversations/{id}/members/{user_id}
///
/// Authorization:
/// - removing yourself is always a leave
/// - removing someone else follows REMOVAL_POLICY
#[delete("/{id}/members/{user_id}")]
pub async fn remove_member(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (conversation_id, target_user_id) = path.into_inner();
    let removal = state
        .conversations
        .remove_member(user.id, conversation_id, target_user_id)
        .await?;
    Ok(HttpResponse::Ok().json(RemovalResponse::new(
        conversation_id,
        target_user_id,
        removal,
    )))
}
