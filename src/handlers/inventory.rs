// src/handlers/inventory.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermInventoryRead, PermInventoryWrite, RequirePermission},
    },
    models::inventory::{
        MovementType, NewProduct, Product, RecordMovement, Reservation, ReserveStock,
        StockMovement, StockOperation, StockSummary,
    },
    services::ledger,
};

// ---
// Custom validation
// ---
fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("Value cannot be negative.".into());
        return Err(err);
    }
    validate_precision(val)
}

fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param("exclusive_min".into(), &0.0);
        err.message = Some("Quantity must be greater than zero.".into());
        return Err(err);
    }
    validate_precision(val)
}

/// Quantities are stored as `NUMERIC(18, 3)`.
pub(crate) fn validate_precision(val: &Decimal) -> Result<(), ValidationError> {
    if !ledger::quantity_in_range(*val) {
        let mut err = ValidationError::new("precision");
        err.add_param("max_scale".into(), &ledger::QUANTITY_SCALE);
        err.message = Some("Use at most 3 decimal places and stay below 10^15.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    #[validate(length(min = 1, max = 64, message = "SKU is required."))]
    pub sku: String,

    #[validate(length(min = 1, max = 200, message = "Name is required."))]
    pub name: String,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub initial_quantity: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub min_stock: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    pub max_stock: Option<Decimal>,
}

impl CreateProductPayload {
    fn validate_consistency(&self) -> Result<(), ValidationError> {
        if self.max_stock.is_some_and(|max| max < self.min_stock) {
            let mut err = ValidationError::new("max_below_min");
            err.message = Some("Maximum stock cannot be below minimum stock.".into());
            return Err(err);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReserveStockPayload {
    pub product_id: Uuid,

    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,

    #[validate(length(max = 500))]
    pub reason: Option<String>,

    /// Defaults to the configured reservation window.
    pub expiration_minutes: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovementPayload {
    pub product_id: Uuid,

    pub movement_type: MovementType,

    /// Magnitude; the movement type decides the sign.
    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,

    #[validate(length(max = 500))]
    pub reason: Option<String>,

    /// Reservation this movement fulfils. It is consumed in the same write.
    pub reservation_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ValidateQuery {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub operation: StockOperation,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PoolQuery {
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReleaseQuery {
    pub reservation_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MovementsQuery {
    /// Newest first. Defaults to 50, capped at 500.
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid: bool,
    /// Stable message key, e.g. `stock_insufficient`.
    pub code: String,
    pub message: String,
    pub available_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub expired_count: u64,
}

// ---
// Products
// ---
#[utoipa::path(
    post,
    path = "/api/inventory/products",
    tag = "Inventory",
    request_body = CreateProductPayload,
    responses(
        (status = 201, description = "Product created with its opening balance", body = Product),
        (status = 400, description = "Invalid data"),
        (status = 409, description = "SKU already exists")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequirePermission<PermInventoryWrite>,
    Json(mut payload): Json<CreateProductPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.sku = payload.sku.trim().to_string();
    payload.name = payload.name.trim().to_string();

    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    payload.validate_consistency().map_err(|e| {
        let mut errors = validator::ValidationErrors::new();
        errors.add("maxStock", e);
        AppError::ValidationError(errors).to_api_error(&locale, &app_state.i18n_store)
    })?;

    let product = app_state
        .inventory_service
        .create_product(NewProduct {
            sku: payload.sku,
            name: payload.name,
            initial_quantity: payload.initial_quantity,
            min_stock: payload.min_stock,
            max_stock: payload.max_stock,
            user_id: user.0.id,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    get,
    path = "/api/inventory/products",
    tag = "Inventory",
    responses(
        (status = 200, description = "All products", body = Vec<Product>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_products(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
) -> Result<impl IntoResponse, ApiError> {
    let products = app_state
        .inventory_service
        .list_products()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(products))
}

#[utoipa::path(
    get,
    path = "/api/inventory/products/{id}",
    tag = "Inventory",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Product not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = app_state
        .inventory_service
        .get_product(product_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(product))
}

#[utoipa::path(
    get,
    path = "/api/inventory/products/{id}/summary",
    tag = "Inventory",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Total, reserved and available stock", body = StockSummary),
        (status = 404, description = "Product not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_stock_summary(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .inventory_service
        .get_stock_summary(product_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/api/inventory/products/{id}/movements",
    tag = "Inventory",
    params(("id" = Uuid, Path, description = "Product ID"), MovementsQuery),
    responses(
        (status = 200, description = "Ledger entries, newest first", body = Vec<StockMovement>),
        (status = 404, description = "Product not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_movements(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<MovementsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = app_state
        .inventory_service
        .list_movements(product_id, query.limit)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(movements))
}

#[utoipa::path(
    get,
    path = "/api/inventory/products/{id}/reservations",
    tag = "Stock Pool",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Reservations of the product, newest first", body = Vec<Reservation>),
        (status = 404, description = "Product not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_reservations(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reservations = app_state
        .inventory_service
        .list_reservations(product_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(reservations))
}

// ---
// Stock pool
// ---
#[utoipa::path(
    get,
    path = "/api/inventory/pool/validate",
    tag = "Stock Pool",
    params(ValidateQuery),
    responses(
        (status = 200, description = "Dry-run result, nothing is written", body = ValidationResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn validate_stock(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
    Query(query): Query<ValidateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .inventory_service
        .validate(query.product_id, query.quantity, query.operation)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let fmt = |value: Option<Decimal>| value.map(|d| d.normalize().to_string()).unwrap_or_default();
    let message = app_state.i18n_store.translate(
        &locale.0,
        result.code,
        &[
            ("available", fmt(result.available_stock)),
            ("max", fmt(result.max_stock)),
            ("quantity", query.quantity.normalize().to_string()),
        ],
    );

    Ok(Json(ValidationResponse {
        valid: result.valid,
        code: result.code.to_string(),
        message,
        available_stock: result.available_stock,
        max_stock: result.max_stock,
    }))
}

#[utoipa::path(
    get,
    path = "/api/inventory/pool/reserve",
    tag = "Stock Pool",
    params(PoolQuery),
    responses(
        (status = 200, description = "Current pool of the product", body = StockSummary),
        (status = 404, description = "Product not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_pool(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
    Query(query): Query<PoolQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .inventory_service
        .get_stock_summary(query.product_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/api/inventory/pool/reserve",
    tag = "Stock Pool",
    request_body = ReserveStockPayload,
    responses(
        (status = 201, description = "Stock held until the reservation expires", body = Reservation),
        (status = 400, description = "Invalid quantity or expiry"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Insufficient available stock")
    ),
    security(("api_jwt" = []))
)]
pub async fn reserve_stock(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequirePermission<PermInventoryWrite>,
    Json(payload): Json<ReserveStockPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let reservation = app_state
        .inventory_service
        .reserve_stock(ReserveStock {
            product_id: payload.product_id,
            quantity: payload.quantity,
            reason: payload.reason,
            user_id: user.0.id,
            expiration_minutes: payload.expiration_minutes,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

#[utoipa::path(
    delete,
    path = "/api/inventory/pool/reserve",
    tag = "Stock Pool",
    params(ReleaseQuery),
    responses(
        (status = 200, description = "Reservation released (no-op if already closed)", body = Reservation),
        (status = 404, description = "Reservation not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn release_reservation(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryWrite>,
    Query(query): Query<ReleaseQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let reservation = app_state
        .inventory_service
        .release_reservation(query.reservation_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(reservation))
}

#[utoipa::path(
    post,
    path = "/api/inventory/pool/cleanup",
    tag = "Stock Pool",
    responses(
        (status = 200, description = "Number of reservations marked expired", body = CleanupResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn cleanup_reservations(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryWrite>,
) -> Result<impl IntoResponse, ApiError> {
    let expired_count = app_state
        .inventory_service
        .cleanup_expired_reservations()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(CleanupResponse { expired_count }))
}

// ---
// Ledger
// ---
#[utoipa::path(
    post,
    path = "/api/inventory/movements",
    tag = "Inventory",
    request_body = RecordMovementPayload,
    responses(
        (status = 201, description = "Movement appended to the ledger", body = StockMovement),
        (status = 400, description = "Invalid quantity or movement type"),
        (status = 404, description = "Product or reservation not found"),
        (status = 409, description = "Insufficient stock or reservation mismatch")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequirePermission<PermInventoryWrite>,
    Json(payload): Json<RecordMovementPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let movement = app_state
        .inventory_service
        .record_movement(RecordMovement {
            product_id: payload.product_id,
            movement_type: payload.movement_type,
            quantity: payload.quantity,
            reason: payload.reason,
            user_id: user.0.id,
            reservation_id: payload.reservation_id,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(movement)))
}
