//! Where purchase attempts are sent
//!
//! [`InProcessTarget`] calls an [`InventoryService`] directly. [`HttpTarget`]
//! talks to a running API server, so the same load can be replayed against
//! the Postgres-backed deployment.

use async_trait::async_trait;
use flash_sale::application::{Dashboard, InventoryService, ServiceError};
use flash_sale::domain::{PurchaseStatus, RawPurchaseRequest, StrategyKind};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inventory service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Unexpected response from {path}: HTTP {status}")]
    UnexpectedResponse { path: String, status: u16 },
}

/// Authoritative state read back after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub successful_orders: i64,
    pub final_quantity: i64,
}

#[async_trait]
pub trait PurchaseTarget: Send + Sync {
    fn strategy(&self) -> StrategyKind;

    /// One purchase attempt. Transport failures are reported as `Err`.
    async fn purchase(&self, request: RawPurchaseRequest) -> Result<PurchaseStatus, TargetError>;

    async fn reset(&self) -> Result<(), TargetError>;

    async fn observe(&self) -> Result<Observation, TargetError>;
}

pub struct InProcessTarget {
    service: Arc<InventoryService>,
    strategy: StrategyKind,
}

impl InProcessTarget {
    pub fn new(service: Arc<InventoryService>, strategy: StrategyKind) -> Self {
        Self { service, strategy }
    }

    pub fn service(&self) -> &Arc<InventoryService> {
        &self.service
    }
}

#[async_trait]
impl PurchaseTarget for InProcessTarget {
    fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    async fn purchase(&self, request: RawPurchaseRequest) -> Result<PurchaseStatus, TargetError> {
        Ok(self.service.purchase(self.strategy, request).await.status)
    }

    async fn reset(&self) -> Result<(), TargetError> {
        Ok(self.service.reset().await?)
    }

    async fn observe(&self) -> Result<Observation, TargetError> {
        Ok(Observation {
            successful_orders: self.service.successful_orders().await?,
            final_quantity: self.service.stock_level().await?,
        })
    }
}

/// Any purchase response body; success and error bodies both carry `status`
#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<PurchaseStatus>,
}

pub struct HttpTarget {
    client: reqwest::Client,
    base_url: String,
    strategy: StrategyKind,
}

impl HttpTarget {
    pub fn new(base_url: impl Into<String>, strategy: StrategyKind) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            strategy,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn purchase_path(&self) -> String {
        format!("/purchase/{}", self.strategy.route_segment())
    }
}

/// Fallback when a response body has no readable `status`
fn status_from_code(code: reqwest::StatusCode) -> PurchaseStatus {
    if code.is_success() {
        PurchaseStatus::Success
    } else if code.is_client_error() {
        PurchaseStatus::OutOfStock
    } else {
        PurchaseStatus::StoreUnavailable
    }
}

#[async_trait]
impl PurchaseTarget for HttpTarget {
    fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    async fn purchase(&self, request: RawPurchaseRequest) -> Result<PurchaseStatus, TargetError> {
        let response = self
            .client
            .post(self.url(&self.purchase_path()))
            .json(&request)
            .send()
            .await?;
        let code = response.status();
        let body: Option<StatusBody> = response.json().await.ok();

        Ok(body
            .and_then(|body| body.status)
            .unwrap_or_else(|| status_from_code(code)))
    }

    async fn reset(&self) -> Result<(), TargetError> {
        let response = self.client.post(self.url("/reset")).send().await?;
        if !response.status().is_success() {
            return Err(TargetError::UnexpectedResponse {
                path: "/reset".to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn observe(&self) -> Result<Observation, TargetError> {
        let response = self.client.get(self.url("/stats")).send().await?;
        if !response.status().is_success() {
            return Err(TargetError::UnexpectedResponse {
                path: "/stats".to_string(),
                status: response.status().as_u16(),
            });
        }
        let dashboard: Dashboard = response.json().await?;
        Ok(Observation {
            successful_orders: dashboard.order_count,
            final_quantity: dashboard.db_stock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, PurchaseStatus::Success)]
    #[case(400, PurchaseStatus::OutOfStock)]
    #[case(500, PurchaseStatus::StoreUnavailable)]
    fn test_status_from_code(#[case] code: u16, #[case] expected: PurchaseStatus) {
        let code = reqwest::StatusCode::from_u16(code).expect("valid code");
        assert_eq!(status_from_code(code), expected);
    }

    #[test]
    fn test_http_target_builds_mode_path() {
        let target = HttpTarget::new("http://localhost:8080/", StrategyKind::PessimisticLocked);
        assert_eq!(
            target.url(&target.purchase_path()),
            "http://localhost:8080/purchase/postgres"
        );
    }
}
