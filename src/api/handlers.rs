use actix_web::{web, HttpResponse, ResponseError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::payload::OrderPayload;
use crate::context::OpContext;
use crate::errors::OrderError;
use crate::health::check_backend;
use crate::metrics::Metrics;
use crate::service::OrderService;
use crate::storage::KvBackend;

// ============================================================================
// HTTP Handlers
// ============================================================================

/// Shared per-worker state, injected through `web::Data`
pub struct AppState {
    pub service: OrderService,
    pub backend: Arc<dyn KvBackend>,
    pub metrics: Option<Arc<Metrics>>,
    pub request_timeout: Duration,
    /// Cancelled on shutdown; in-flight store calls abort with it
    pub shutdown: CancellationToken,
}

impl AppState {
    fn context(&self) -> OpContext {
        OpContext::with_token(self.shutdown.child_token()).timeout(self.request_timeout)
    }

    fn finish(
        &self,
        route: &str,
        result: Result<HttpResponse, OrderError>,
    ) -> Result<HttpResponse, OrderError> {
        if let Some(metrics) = &self.metrics {
            let status = match &result {
                Ok(response) => response.status(),
                Err(e) => e.status_code(),
            };
            metrics.record_http_response(route, status.as_u16());
        }
        result
    }
}

fn message(text: String) -> serde_json::Value {
    serde_json::json!({ "message": text })
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let component = check_backend(state.backend.as_ref(), state.request_timeout).await;
    let body = serde_json::json!({
        "healthy": component.status.is_healthy(),
        "components": [component.clone()],
    });

    if component.status.is_healthy() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn list_orders(state: web::Data<AppState>) -> Result<HttpResponse, OrderError> {
    let result = async {
        let orders = state.service.list(&state.context()).await?;
        Ok::<_, OrderError>(HttpResponse::Ok().json(orders))
    }
    .await;
    state.finish("list_orders", result)
}

pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<OrderPayload>,
) -> Result<HttpResponse, OrderError> {
    let result = async {
        let draft = body.into_inner().into_new_order()?;
        let created = state.service.insert(&state.context(), draft).await?;
        Ok::<_, OrderError>(HttpResponse::Created().json(created))
    }
    .await;
    state.finish("create_order", result)
}

pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, OrderError> {
    let result = async {
        let order = state.service.get(&state.context(), &path).await?;
        Ok::<_, OrderError>(HttpResponse::Ok().json(order))
    }
    .await;
    state.finish("get_order", result)
}

/// HEAD: 200 when the order exists, 404 otherwise, no body
pub async fn order_exists(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, OrderError> {
    let result = async {
        if !state.service.exists(&state.context(), &path).await? {
            return Err(OrderError::not_found(&path));
        }
        Ok::<_, OrderError>(HttpResponse::Ok().finish())
    }
    .await;
    state.finish("order_exists", result)
}

pub async fn update_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<OrderPayload>,
) -> Result<HttpResponse, OrderError> {
    let order_id = path.into_inner();
    let result = async {
        let order = body.into_inner().into_updated_order(&order_id)?;
        state.service.update(&state.context(), order).await?;
        Ok::<_, OrderError>(HttpResponse::Ok().json(message(format!(
            "successfully updated order : {}",
            order_id
        ))))
    }
    .await;
    state.finish("update_order", result)
}

pub async fn delete_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, OrderError> {
    let order_id = path.into_inner();
    let result = async {
        state.service.delete(&state.context(), &order_id).await?;
        Ok::<_, OrderError>(HttpResponse::Ok().json(message(format!(
            "successfully deleted order : {}",
            order_id
        ))))
    }
    .await;
    state.finish("delete_order", result)
}
