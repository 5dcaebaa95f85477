// src/handlers/alerts.rs

use axum::{extract::State, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{PermInventoryRead, RequirePermission},
    },
    models::inventory::StockAlert,
};

#[utoipa::path(
    get,
    path = "/api/inventory/alerts",
    tag = "Alerts",
    responses(
        (status = 200, description = "Products at or below their minimum, most severe first", body = Vec<StockAlert>)
    ),
    security(("api_jwt" = []))
)]
pub async fn check_stock_levels(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermInventoryRead>,
) -> Result<impl IntoResponse, ApiError> {
    let alerts = app_state
        .alert_service
        .check_stock_levels(&locale.0, &app_state.i18n_store)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(alerts))
}
