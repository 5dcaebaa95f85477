// src/models/inventory.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- 1. Products ---
// `quantity` is the materialized balance of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(example = "MEAL-10KG")]
    pub sku: String,
    #[schema(example = "Maize meal 10kg")]
    pub name: String,
    pub quantity: Decimal,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub initial_quantity: Decimal,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub user_id: Uuid,
}

// --- 2. Stock movements (ledger) ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "stock_movement_type", rename_all = "SCREAMING_SNAKE_CASE")] // Database
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum MovementType {
    InitialStock,
    Purchase,
    Sale,
    Transfer,
    Return,
    Damage,
    Theft,
    Spillage,
    Breakage,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementDirection {
    Inbound,
    Outbound,
    Signed,
}

impl MovementType {
    pub fn direction(self) -> MovementDirection {
        match self {
            MovementType::InitialStock | MovementType::Purchase | MovementType::Return => {
                MovementDirection::Inbound
            }
            MovementType::Sale
            | MovementType::Transfer
            | MovementType::Damage
            | MovementType::Theft
            | MovementType::Spillage
            | MovementType::Breakage => MovementDirection::Outbound,
            MovementType::Adjustment => MovementDirection::Signed,
        }
    }
}

/// Immutable ledger row. `quantity` is the signed delta.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub before_quantity: Decimal,
    pub after_quantity: Decimal,
    pub reason: Option<String>,
    pub user_id: Uuid,
    /// Reservation consumed or adjustment request applied by this movement.
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A movement that has not been posted yet.
#[derive(Debug, Clone)]
pub struct MovementDraft {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub delta: Decimal,
    pub reason: Option<String>,
    pub user_id: Uuid,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct RecordMovement {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub user_id: Uuid,
    pub reservation_id: Option<Uuid>,
}

// --- 3. Reservations ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "reservation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Released,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub user_id: Uuid,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Holds stock only while active and not past its expiry.
    pub fn is_holding(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct ReserveStock {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub user_id: Uuid,
    pub expiration_minutes: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ReservationDraft {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

// --- 4. Pool summary & validation ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub product_id: Uuid,
    pub total_stock: Decimal,
    pub reserved_stock: Decimal,
    pub available_stock: Decimal,
    pub active_reservation_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Reserve,
    Remove,
    Add,
}

/// Outcome of a dry-run check. `code` is a message catalogue key.
#[derive(Debug, Clone, PartialEq)]
pub struct StockValidation {
    pub valid: bool,
    pub code: &'static str,
    pub available_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
}

// --- 5. Adjustments & approvals ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "adjustment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
}

impl AdjustmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentStatus::Pending => "PENDING",
            AdjustmentStatus::Approved => "APPROVED",
            AdjustmentStatus::Rejected => "REJECTED",
            AdjustmentStatus::Applied => "APPLIED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub requested_by: Uuid,
    pub status: AdjustmentStatus,
    pub decided_by: Option<Uuid>,
    pub decision_note: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub movement_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpdateStock {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub user_id: Uuid,
    pub require_approval: bool,
}

#[derive(Debug, Clone)]
pub struct AdjustmentDecision {
    pub status: AdjustmentStatus,
    pub decided_by: Uuid,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UpdateStockOutcome {
    Applied { movement: StockMovement },
    PendingApproval { request: AdjustmentRequest },
}

// --- 6. Alerts ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: Decimal,
    pub min_stock: Decimal,
    pub severity: AlertSeverity,
    pub message: String,
}
