//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use exrates_common::ExchangeError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Error returned by request handlers.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub ExchangeError);

impl ApiError {
    /// Malformed or missing request parameter.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(ExchangeError::InvalidRequest(message.into()))
    }

    /// HTTP status for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            ExchangeError::RateNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, code = self.0.error_code(), "Request failed");
        } else {
            warn!(error = %self.0, code = self.0.error_code(), "Request rejected");
        }

        let body = json!({
            "error": {
                "code": status.canonical_reason().unwrap_or("Unknown"),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exrates_common::Currency;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(ExchangeError::UnsupportedCurrency(Currency::new("XYZ"))).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(ExchangeError::RateNotFound {
                base: Currency::usd(),
                target: Currency::inr(),
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(ExchangeError::Upstream("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
