use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::StoreError;

impl StoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ProductNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientInventory { .. } => StatusCode::CONFLICT,
            Self::InvalidQuantity(_)
            | Self::InvalidStock(_)
            | Self::MalformedRecord { .. }
            | Self::CurrencyMismatch { .. }
            | Self::AmountOverflow(_)
            | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let StoreError::Validation(errors) = &self {
            let details: serde_json::Map<String, serde_json::Value> = errors
                .field_errors()
                .into_iter()
                .map(|(field, errs)| (field.to_string(), json!(errs.iter().map(|e| e.code.to_string()).collect::<Vec<_>>())))
                .collect();
            return (status, Json(json!({ "error": "One or more fields are invalid.", "details": details }))).into_response();
        }
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "An unexpected error occurred.".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
