// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Products & ledger ---
        handlers::inventory::create_product,
        handlers::inventory::list_products,
        handlers::inventory::get_product,
        handlers::inventory::get_stock_summary,
        handlers::inventory::list_movements,
        handlers::inventory::record_movement,

        // --- Stock pool ---
        handlers::inventory::list_reservations,
        handlers::inventory::validate_stock,
        handlers::inventory::get_pool,
        handlers::inventory::reserve_stock,
        handlers::inventory::release_reservation,
        handlers::inventory::cleanup_reservations,

        // --- Adjustments ---
        handlers::adjustments::update_stock,
        handlers::adjustments::list_adjustments,
        handlers::adjustments::get_adjustment,
        handlers::adjustments::approve_adjustment,
        handlers::adjustments::reject_adjustment,
        handlers::adjustments::apply_adjustment,

        // --- Alerts ---
        handlers::alerts::check_stock_levels,
    ),
    components(
        schemas(
            // --- Inventory ---
            models::inventory::Product,
            models::inventory::MovementType,
            models::inventory::StockMovement,
            models::inventory::ReservationStatus,
            models::inventory::Reservation,
            models::inventory::StockSummary,
            models::inventory::StockOperation,
            models::inventory::AdjustmentStatus,
            models::inventory::AdjustmentRequest,
            models::inventory::UpdateStockOutcome,
            models::inventory::AlertSeverity,
            models::inventory::StockAlert,

            // --- RBAC ---
            models::rbac::Role,

            // --- Payloads ---
            handlers::inventory::CreateProductPayload,
            handlers::inventory::ReserveStockPayload,
            handlers::inventory::RecordMovementPayload,
            handlers::inventory::ValidationResponse,
            handlers::inventory::CleanupResponse,
            handlers::adjustments::UpdateStockPayload,
            handlers::adjustments::DecisionPayload,
            handlers::adjustments::AppliedAdjustment,
        )
    ),
    tags(
        (name = "Inventory", description = "Products and the stock movement ledger"),
        (name = "Stock Pool", description = "Reservations and available stock"),
        (name = "Adjustments", description = "Stock corrections and their approval"),
        (name = "Alerts", description = "Low stock warnings")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
