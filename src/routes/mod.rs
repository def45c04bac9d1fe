pub mod conversations;
pub mod groups;
pub mod session;
pub mod users;

use crate::error::AppError;
use crate::state::AppState;
use actix_middleware::{IdentityResolver, SessionAuth};
use actix_web::{web, HttpResponse};
use std::sync::Arc;

async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound)
}

/// Register every route. Only login and liveness are reachable without a
/// session; `/users` and `/conversations` sit behind `SessionAuth`. Paths
/// outside those prefixes get a plain 404 whether or not a token is sent.
pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let resolver: Arc<dyn IdentityResolver> = state.sessions.clone();

        cfg.app_data(web::Data::new(state))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|_err, _req| {
                AppError::NotFound.into()
            }))
            .route("/liveness", web::get().to(liveness))
            .service(session::login)
            .service(
                web::scope("/users")
                    .wrap(SessionAuth::new(resolver.clone()))
                    .service(users::search_users)
                    .service(users::set_username)
                    .service(users::set_photo),
            )
            .service(
                web::scope("/conversations")
                    .wrap(SessionAuth::new(resolver))
                    // literal segments before `{id}`
                    .service(groups::create_group)
                    .service(conversations::create_direct)
                    .service(conversations::list_conversations)
                    .service(conversations::get_conversation)
                    .service(groups::rename_group)
                    .service(groups::rephoto_group)
                    .service(groups::add_member)
                    .service(groups::leave_group)
                    .service(groups::remove_member),
            )
            .default_service(web::to(not_found));
    }
}
