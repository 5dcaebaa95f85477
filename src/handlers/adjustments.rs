// src/handlers/adjustments.rs

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
    handlers::inventory::validate_precision,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermInventoryApprove, PermInventoryRead, PermInventoryWrite, RequirePermission},
    },
    models::inventory::{
        AdjustmentRequest, AdjustmentStatus, StockMovement, UpdateStock, UpdateStockOutcome,
    },
};

fn validate_non_zero(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_zero() {
        let mut err = ValidationError::new("non_zero");
        err.message = Some("Adjustment quantity cannot be zero.".into());
        return Err(err);
    }
    validate_precision(val)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockPayload {
    pub product_id: Uuid,

    /// Signed correction: positive adds, negative removes.
    #[validate(custom(function = "validate_non_zero"))]
    pub quantity: Decimal,

    #[validate(length(max = 500))]
    pub reason: Option<String>,

    /// Corrections above the approval threshold wait for a manager.
    #[serde(default)]
    pub require_approval: bool,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdjustmentsQuery {
    pub status: Option<AdjustmentStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedAdjustment {
    pub request: AdjustmentRequest,
    pub movement: StockMovement,
}

#[utoipa::path(
    post,
    path = "/api/inventory/adjustments",
    tag = "Adjustments",
    request_body = UpdateStockPayload,
    responses(
        (status = 200, description = "Adjustment applied", body = UpdateStockOutcome),
        (status = 202, description = "Adjustment waiting for approval", body = UpdateStockOutcome),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Insufficient stock")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_stock(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequirePermission<PermInventoryWrite>,
    Json(payload): Json<UpdateStockPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let outcome = app_state
        .inventory_service
        .update_stock(UpdateStock {
            product_id: payload.product_id,
            quantity: payload.quantity,
            reason: payload.reason,
            user_id: user.0.id,
            require_approval: payload.require_approval,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let status = match outcome {
        UpdateStockOutcome::Applied { .. } => StatusCode::OK,
        UpdateStockOutcome::PendingApproval { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/inventory/adjustments",
    tag = "Adjustments",
    params(AdjustmentsQuery),
    responses(
        (status = 200, description = "Adjustment requests, newest first", body = Vec<AdjustmentRequest>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_adjustments(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
    Query(query): Query<AdjustmentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let requests = app_state
        .inventory_service
        .list_adjustments(query.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/api/inventory/adjustments/{id}",
    tag = "Adjustments",
    params(("id" = Uuid, Path, description = "Adjustment request ID")),
    responses(
        (status = 200, description = "Adjustment request", body = AdjustmentRequest),
        (status = 404, description = "Adjustment request not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_adjustment(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let request = app_state
        .inventory_service
        .get_adjustment(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/api/inventory/adjustments/{id}/approve",
    tag = "Adjustments",
    params(("id" = Uuid, Path, description = "Adjustment request ID")),
    request_body(content = DecisionPayload, description = "Optional note"),
    responses(
        (status = 200, description = "Request approved", body = AdjustmentRequest),
        (status = 403, description = "Missing permission or own request"),
        (status = 409, description = "Request is not pending")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_adjustment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequirePermission<PermInventoryApprove>,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.unwrap_or_default();
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let request = app_state
        .inventory_service
        .approve_adjustment(id, user.0.id, payload.note)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/api/inventory/adjustments/{id}/reject",
    tag = "Adjustments",
    params(("id" = Uuid, Path, description = "Adjustment request ID")),
    request_body(content = DecisionPayload, description = "Optional note"),
    responses(
        (status = 200, description = "Request rejected", body = AdjustmentRequest),
        (status = 403, description = "Missing permission or own request"),
        (status = 409, description = "Request is not pending")
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_adjustment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequirePermission<PermInventoryApprove>,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.unwrap_or_default();
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let request = app_state
        .inventory_service
        .reject_adjustment(id, user.0.id, payload.note)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/api/inventory/adjustments/{id}/apply",
    tag = "Adjustments",
    params(("id" = Uuid, Path, description = "Adjustment request ID")),
    responses(
        (status = 200, description = "Adjustment posted to the ledger", body = AppliedAdjustment),
        (status = 409, description = "Request not approved or insufficient stock")
    ),
    security(("api_jwt" = []))
)]
pub async fn apply_adjustment(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (request, movement) = app_state
        .inventory_service
        .apply_adjustment(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(AppliedAdjustment { request, movement }))
}
