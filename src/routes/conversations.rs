//! Conversation listing, lookup and direct conversations

use crate::{
    error::AppError,
    middleware::guards::User,
    models::{Conversation, ConversationView},
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateDirectRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct ConversationsListResponse {
    pub conversations: Vec<ConversationView>,
    pub total: usize,
}

/// POST /conversations/direct
/// 201 with a new conversation, 200 with the pair's existing one
#[post("/direct")]
pub async fn create_direct(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<CreateDirectRequest>,
) -> Result<HttpResponse, AppError> {
    let (conversation, created) = state
        .conversations
        .create_direct(user.id, body.user_id)
        .await?;

    let view = ConversationView::from(conversation);
    if created {
        Ok(HttpResponse::Created().json(view))
    } else {
        Ok(HttpResponse::Ok().json(view))
    }
}

/// GET /conversations
#[get("")]
pub async fn list_conversations(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let mut conversations: Vec<Conversation> = state
        .conversations
        .list_conversations_of_user(user.id)
        .try_collect()
        .await?;
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let conversations: Vec<ConversationView> =
        conversations.into_iter().map(ConversationView::from).collect();
    let total = conversations.len();
    Ok(HttpResponse::Ok().json(ConversationsListResponse {
        conversations,
        total,
    }))
}

/// GET /conversations/{id}
/// Members only; everyone else gets 404
#[get("/{id}")]
pub async fn get_conversation(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation = state
        .conversations
        .get_conversation(user.id, conversation_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ConversationView::from(conversation)))
}
