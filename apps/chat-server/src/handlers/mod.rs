//! HTTP handlers and route configuration.

mod health;
mod messages;

use actix_web::{HttpRequest, error, web};

use crate::middleware::error::{AppError, AppResult};

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(health::health_check))
                .route("/messages", web::get().to(messages::list_messages))
                .route("/messages", web::post().to(messages::send_message)),
        );
}

/// Fallback for unknown routes, so every error body has the same shape.
pub async fn not_found(req: HttpRequest) -> AppResult<()> {
    Err(AppError::NotFound(format!("No route for {}", req.path())))
}

fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}
