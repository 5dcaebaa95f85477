use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Quantity must be positive")]
    InvalidQuantity,

    #[error("Quantity {0} is out of range")]
    QuantityOutOfRange(Decimal),

    #[error("Invalid reservation expiration: {0} minutes")]
    InvalidExpiration(i64),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: Decimal, available: Decimal },

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Reservation {0} not found")]
    ReservationNotFound(Uuid),

    #[error("Reservation {0} cannot be consumed by this movement")]
    ReservationMismatch(Uuid),

    #[error("Adjustment request {0} not found")]
    AdjustmentNotFound(Uuid),

    #[error("Adjustment cannot move from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("SKU {0} already exists")]
    SkuAlreadyExists(String),

    #[error("Requester cannot decide their own adjustment")]
    SelfApproval,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Missing permission {0}")]
    Forbidden(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Anything unexpected, with context
    #[error("Internal server error: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

/// Error as seen by the HTTP client: localized message, optional field details.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidQuantity
            | AppError::QuantityOutOfRange(_)
            | AppError::InvalidExpiration(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::SelfApproval => StatusCode::FORBIDDEN,
            AppError::ProductNotFound(_)
            | AppError::ReservationNotFound(_)
            | AppError::AdjustmentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. }
            | AppError::InvalidTransition { .. }
            | AppError::SkuAlreadyExists(_)
            | AppError::ReservationMismatch(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message key in the catalogue plus template parameters.
    fn message_key(&self) -> (&'static str, Vec<(&'static str, String)>) {
        match self {
            AppError::ValidationError(_) => ("validation_failed", vec![]),
            AppError::InvalidQuantity => ("invalid_quantity", vec![]),
            AppError::QuantityOutOfRange(quantity) => (
                "quantity_out_of_range",
                vec![("quantity", quantity.normalize().to_string())],
            ),
            AppError::InvalidExpiration(minutes) => {
                ("invalid_expiration", vec![("minutes", minutes.to_string())])
            }
            AppError::InsufficientStock { requested, available } => (
                "insufficient_stock",
                vec![
                    ("requested", requested.normalize().to_string()),
                    ("available", available.normalize().to_string()),
                ],
            ),
            AppError::ProductNotFound(id) => ("product_not_found", vec![("id", id.to_string())]),
            AppError::ReservationNotFound(id) => {
                ("reservation_not_found", vec![("id", id.to_string())])
            }
            AppError::ReservationMismatch(id) => {
                ("reservation_mismatch", vec![("id", id.to_string())])
            }
            AppError::AdjustmentNotFound(id) => {
                ("adjustment_not_found", vec![("id", id.to_string())])
            }
            AppError::InvalidTransition { from, to } => (
                "invalid_transition",
                vec![("from", from.to_string()), ("to", to.to_string())],
            ),
            AppError::SkuAlreadyExists(sku) => ("sku_exists", vec![("sku", sku.clone())]),
            AppError::SelfApproval => ("self_approval", vec![]),
            AppError::InvalidToken => ("invalid_token", vec![]),
            AppError::Forbidden(slug) => ("forbidden", vec![("permission", slug.to_string())]),
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => ("internal_error", vec![]),
        }
    }

    /// Translates the error for the caller's language.
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Details stay in the logs
            tracing::error!("Internal server error: {}", self);
        }

        let (key, params) = self.message_key();
        let error = i18n.translate(&locale.0, key, &params);

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| match &e.message {
                            Some(m) => m.to_string(),
                            None => e.code.to_string(),
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            _ => None,
        };

        ApiError { status, error, details }
    }
}
