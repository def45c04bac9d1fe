use actix_web::{App, HttpServer};
use conversation_service::{config, error, logging, routes, state::AppState};

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    let cfg = config::Config::from_env()?;
    logging::init_tracing(cfg.log_format);

    let bind_addr = cfg.bind_addr();
    tracing::info!(
        %bind_addr,
        removal_policy = ?cfg.removal_policy,
        max_group_members = cfg.limits.max_group_members,
        "starting conversation-service"
    );

    let state = AppState::in_memory(&cfg);

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(actix_middleware::RequestId::new())
            .wrap(actix_middleware::Logging)
            .configure(routes::configure(state.clone()))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind {bind_addr}: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run server: {e}")))
}
