//! chorely-server/src/error.rs
//!
//! Maps settlement errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use chorely_core::Error;

/// Handler error type. Wraps the core error so `?` works in every handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::Parse(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::Unconfigured(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Storage details stay in the log.
            error!("Request failed: {:?}", self.0);
            "internal error".to_string()
        } else {
            self.0.to_string()
        };

        let mut body = json!({ "error": message });
        if let Error::InsufficientFunds { point_type, required, available } = &self.0 {
            body["point_type"] = json!(point_type);
            body["required"] = json!(required);
            body["available"] = json!(available);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorely_core::models::PointType;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::Validation("x".into()), StatusCode::BAD_REQUEST),
            (Error::Conflict("x".into()), StatusCode::CONFLICT),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                Error::InsufficientFunds { point_type: PointType::Coin, required: 2, available: 1 },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (Error::Unconfigured("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (Error::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
