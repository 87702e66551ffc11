//! JSON bodies for everything other than a successful purchase
//!
//! Purchase rejections and maintenance failures share one shape so the
//! dashboard and the load generator can read `code`/`message` without caring
//! which route produced them.

use crate::application::ServiceError;
use crate::domain::{PurchaseError, PurchaseStatus, StrategyKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error response format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable code for programmatic handling
    pub code: String,
    pub message: String,
    /// Outcome of the purchase attempt, for purchase routes only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PurchaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
            mode: None,
        }
    }

    pub fn for_purchase(kind: StrategyKind, error: &PurchaseError) -> Self {
        let code = match error {
            PurchaseError::Validation(_) => "INVALID_INPUT",
            PurchaseError::OutOfStock => "OUT_OF_STOCK",
            PurchaseError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            PurchaseError::LockAcquisitionFailed(_) => "LOCK_FAILED",
            PurchaseError::CommitFailed(_) => "COMMIT_FAILED",
        };
        Self {
            status: Some(error.status()),
            mode: Some(kind.mode_name().to_string()),
            ..Self::new(code, error.to_string())
        }
    }

    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// HTTP status for a purchase outcome
pub fn purchase_status_code(status: PurchaseStatus) -> StatusCode {
    match status {
        PurchaseStatus::Success => StatusCode::OK,
        PurchaseStatus::OutOfStock | PurchaseStatus::ValidationError => StatusCode::BAD_REQUEST,
        PurchaseStatus::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Failure of a maintenance or read route
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            ServiceError::Ledger(_) => "LEDGER_ERROR",
            ServiceError::Counter(_) => "COUNTER_ERROR",
        };
        tracing::error!(error = %self.0, "Request failed");
        ErrorResponse::new(code, self.0.to_string())
            .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::CounterError;
    use rstest::rstest;

    #[rstest]
    #[case(PurchaseStatus::Success, StatusCode::OK)]
    #[case(PurchaseStatus::OutOfStock, StatusCode::BAD_REQUEST)]
    #[case(PurchaseStatus::ValidationError, StatusCode::BAD_REQUEST)]
    #[case(PurchaseStatus::StoreUnavailable, StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_purchase_status_code(#[case] status: PurchaseStatus, #[case] expected: StatusCode) {
        assert_eq!(purchase_status_code(status), expected);
    }

    #[test]
    fn test_purchase_error_body_carries_mode_and_status() {
        let body = ErrorResponse::for_purchase(
            StrategyKind::PessimisticLocked,
            &PurchaseError::CommitFailed("connection reset".into()),
        );

        assert_eq!(body.code, "COMMIT_FAILED");
        assert_eq!(body.status, Some(PurchaseStatus::StoreUnavailable));
        assert_eq!(body.mode.as_deref(), Some("postgres_lock"));
    }

    #[test]
    fn test_plain_error_omits_purchase_fields() {
        let json = serde_json::to_value(ErrorResponse::new("X", "y")).expect("serialize");
        assert!(json.get("status").is_none());
        assert!(json.get("mode").is_none());
    }

    #[test]
    fn test_service_error_is_internal() {
        let response =
            ApiError(ServiceError::Counter(CounterError::Unavailable("down".into()))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
