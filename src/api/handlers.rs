use super::error_response::{purchase_status_code, ApiError, ErrorResponse};
use crate::application::{Dashboard, InventoryService, RECENT_ORDERS_LIMIT};
use crate::domain::{Order, Product, PurchaseOutcome, PurchaseStatus, RawPurchaseRequest, StrategyKind};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type AppState = Arc<InventoryService>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub message: String,
    pub status: PurchaseStatus,
    pub mode: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub total_orders: usize,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "up".to_string(),
    })
}

pub async fn products(State(service): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(service.products().await?))
}

/// `POST /purchase`, which always runs the gated strategy
pub async fn purchase_default(
    State(service): State<AppState>,
    body: Result<Json<RawPurchaseRequest>, JsonRejection>,
) -> Response {
    run_purchase(&service, StrategyKind::CacheGated, body).await
}

/// `POST /purchase/{mode}`
pub async fn purchase_with_mode(
    State(service): State<AppState>,
    Path(mode): Path<String>,
    body: Result<Json<RawPurchaseRequest>, JsonRejection>,
) -> Response {
    match mode.parse::<StrategyKind>() {
        Ok(kind) => run_purchase(&service, kind, body).await,
        Err(err) => ErrorResponse::new("UNKNOWN_MODE", err.to_string())
            .into_response_with_status(StatusCode::NOT_FOUND),
    }
}

async fn run_purchase(
    service: &InventoryService,
    kind: StrategyKind,
    body: Result<Json<RawPurchaseRequest>, JsonRejection>,
) -> Response {
    let outcome = match body {
        Ok(Json(request)) => service.purchase(kind, request).await,
        Err(rejection) => service.reject_malformed(kind, rejection.body_text()),
    };
    outcome_response(outcome)
}

fn outcome_response(outcome: PurchaseOutcome) -> Response {
    let code = purchase_status_code(outcome.status);
    match &outcome.error {
        None => (
            code,
            Json(PurchaseResponse {
                message: "Purchase successful!".to_string(),
                status: outcome.status,
                mode: outcome.strategy.mode_name().to_string(),
                latency_ms: outcome.latency_ms(),
            }),
        )
            .into_response(),
        Some(error) => {
            ErrorResponse::for_purchase(outcome.strategy, error).into_response_with_status(code)
        }
    }
}

pub async fn stats(State(service): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(service.dashboard().await?))
}

pub async fn orders(State(service): State<AppState>) -> Result<Json<OrdersResponse>, ApiError> {
    let orders = service.recent_orders(RECENT_ORDERS_LIMIT).await?;
    Ok(Json(OrdersResponse {
        total_orders: orders.len(),
        orders,
    }))
}

pub async fn reset(State(service): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    service.reset().await?;
    let capacity = service.config().initial_capacity.units();
    Ok(Json(MessageResponse {
        message: format!("Stock reset to {capacity}, orders cleared, stats reset"),
        stock: Some(capacity),
    }))
}

pub async fn sync_cache(State(service): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    let stock = service.sync_cache().await?;
    Ok(Json(MessageResponse {
        message: "Cache synced with ledger".to_string(),
        stock: Some(stock),
    }))
}
