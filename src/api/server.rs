use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, ResponseError};

use super::handlers::{self, AppState};
use crate::errors::{FieldError, OrderError};

// ============================================================================
// HTTP Server & Error Mapping
// ============================================================================
//
//   NotFound          -> 404
//   Conflict          -> 409
//   ValidationFailed  -> 400
//   Internal          -> 500 (details logged, never returned)
//
// ============================================================================

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Conflict(_) => StatusCode::CONFLICT,
            OrderError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            OrderError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let none: &[FieldError] = &[];
        let (message, fields) = match self {
            OrderError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error while serving request");
                ("internal error".to_string(), none)
            }
            OrderError::ValidationFailed(fields) => ("validation failed".to_string(), fields.as_slice()),
            other => (other.to_string(), none),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": message,
            "fields": fields,
        }))
    }
}

/// Undecodable bodies are reported like any other validation failure
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        OrderError::ValidationFailed(vec![FieldError {
            field: "body".to_string(),
            message: err.to_string(),
        }])
        .into()
    })
}

/// All routes under `<prefix>/v1`
pub fn routes(prefix: &str) -> actix_web::Scope {
    web::scope(&format!("{}/v1", prefix))
        .route("/health", web::get().to(handlers::health))
        .service(
            web::resource("/orders")
                .route(web::get().to(handlers::list_orders))
                .route(web::post().to(handlers::create_order)),
        )
        .service(
            web::resource("/orders/{order_id}")
                .route(web::get().to(handlers::get_order))
                .route(web::head().to(handlers::order_exists))
                .route(web::put().to(handlers::update_order))
                .route(web::delete().to(handlers::delete_order)),
        )
}

pub async fn start_api_server(state: web::Data<AppState>, listen: &str, prefix: &str) -> std::io::Result<()> {
    tracing::info!(addr = %listen, prefix = %prefix, "🚀 Starting order API server");

    let prefix = prefix.to_string();
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config())
            .wrap(middleware::Logger::default())
            .service(routes(&prefix))
    })
    .bind(listen)?
    .run()
    .await
}

// ============================================================================
// Unit Tests
// ============================================================================
