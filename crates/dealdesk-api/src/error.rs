//! HTTP error mapping.
//!
//! Core failures arrive as [`DealDeskError`] and are mapped by their
//! [`ErrorKind`]. Server-side failures are logged and replaced by a generic
//! message so internal details never reach the client. Transient failures
//! carry a `Retry-After` header.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use dealdesk_types::{DealDeskError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECS: &str = "1";

/// Error type returned by every handler.
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // ============ 401 Unauthorized ============
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    // ============ 403 Forbidden ============
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ============ Core ============
    #[error(transparent)]
    Desk(#[from] DealDeskError),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Desk(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::NotAuthorized => StatusCode::FORBIDDEN,
                ErrorKind::InvalidState | ErrorKind::InsufficientListingQuantity => {
                    StatusCode::CONFLICT
                }
                ErrorKind::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Upstream => match err {
                    DealDeskError::PriceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::BAD_GATEWAY,
                },
            },
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Desk(err) => err.code(),
        }
    }

    /// Whether the same request may succeed if sent again unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Desk(err) if err.is_retryable())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(code = self.code(), error = %self, "request failed");
            match status {
                StatusCode::BAD_GATEWAY => "Upstream service failed".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: self.code().to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use dealdesk_types::{DealId, ListingId};
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (DealDeskError::SelfDeal, StatusCode::BAD_REQUEST),
            (
                DealDeskError::DealNotFound(DealId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                DealDeskError::not_authorized("seller only"),
                StatusCode::FORBIDDEN,
            ),
            (
                DealDeskError::invalid_state("deal is completed"),
                StatusCode::CONFLICT,
            ),
            (
                DealDeskError::InsufficientListingQuantity {
                    requested: Decimal::TWO,
                    available: Decimal::ONE,
                },
                StatusCode::CONFLICT,
            ),
            (
                DealDeskError::InsufficientFunds {
                    needed: Decimal::TEN,
                    available: Decimal::ZERO,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                DealDeskError::Storage("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DealDeskError::Upstream {
                    reason: "node down".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                DealDeskError::PriceUnavailable {
                    asset: "BTC".into(),
                    fiat: "RUB".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn codes_pass_through() {
        let err = ApiError::from(DealDeskError::ListingNotFound(ListingId::new()));
        assert_eq!(err.code(), "DD_ERR_200");
        assert_eq!(ApiError::Unauthorized("missing".into()).code(), "UNAUTHORIZED");
    }

    #[test]
    fn internal_details_are_hidden() {
        let response =
            ApiError::from(DealDeskError::Internal("ledger torn".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn transient_failures_carry_retry_after() {
        let response = ApiError::from(DealDeskError::PriceUnavailable {
            asset: "BTC".into(),
            fiat: "RUB".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            RETRY_AFTER_SECS
        );

        let response = ApiError::from(DealDeskError::SelfDeal).into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
        assert!(!ApiError::BadRequest("side".into()).is_retryable());
    }
}
