//! HTTP surface over [`InventoryService`]
//!
//! A thin axum router: every handler is one service call plus status mapping.
//! Purchase routes answer 200 on success, 400 for out-of-stock or invalid
//! input (malformed JSON included) and 500 for infrastructure faults.

pub mod error_response;
pub mod handlers;

use crate::application::InventoryService;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

pub mod paths {
    pub const HEALTH: &str = "/health";
    pub const PRODUCTS: &str = "/products";
    pub const PURCHASE: &str = "/purchase";
    pub const PURCHASE_MODE: &str = "/purchase/{mode}";
    pub const STATS: &str = "/stats";
    pub const ORDERS: &str = "/orders";
    pub const RESET: &str = "/reset";
    pub const SYNC_CACHE: &str = "/sync-redis";
}

pub fn router(service: Arc<InventoryService>) -> Router {
    Router::new()
        .route(paths::HEALTH, get(handlers::health))
        .route(paths::PRODUCTS, get(handlers::products))
        .route(paths::PURCHASE, post(handlers::purchase_default))
        .route(paths::PURCHASE_MODE, post(handlers::purchase_with_mode))
        .route(paths::STATS, get(handlers::stats))
        .route(paths::ORDERS, get(handlers::orders))
        .route(paths::RESET, post(handlers::reset))
        .route(paths::SYNC_CACHE, post(handlers::sync_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Lets the listed dashboard origins call the API from a browser
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}
