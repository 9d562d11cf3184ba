use actix_cors::Cors;
use actix_web::middleware::Condition;
use actix_web::web;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::web::handlers;

// Cross-origin access for a UI served from a separate dev server
pub fn cors(config: &RelayConfig) -> Condition<Cors> {
    Condition::new(config.cors_enabled, Cors::permissive())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| RelayError::InvalidRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .route("/models", web::get().to(handlers::models))
            .route("/chat", web::post().to(handlers::chat))
    )
    .route("/chat-relay", web::post().to(handlers::chat))
    .route("/health", web::get().to(handlers::health_check));
}
