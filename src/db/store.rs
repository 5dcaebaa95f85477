// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::inventory::{
        AdjustmentDecision, AdjustmentRequest, AdjustmentStatus, MovementDraft, NewProduct,
        Product, Reservation, ReservationDraft, StockMovement, StockSummary,
    },
};

/// Persistence for the stock ledger.
///
/// Every write is atomic. The product balance and its active reservations
/// are checked through `services::ledger` inside one unit of work, so two
/// concurrent callers never spend the same available stock.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Creates the product, recording its opening balance as an
    /// `INITIAL_STOCK` movement when it is positive.
    async fn create_product(&self, new: NewProduct, now: DateTime<Utc>) -> Result<Product, AppError>;

    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError>;

    async fn list_products(&self) -> Result<Vec<Product>, AppError>;

    /// Products with `quantity <= min_stock`.
    async fn low_stock_products(&self) -> Result<Vec<Product>, AppError>;

    async fn stock_summary(
        &self,
        product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<StockSummary>, AppError>;

    async fn create_reservation(
        &self,
        draft: ReservationDraft,
        now: DateTime<Utc>,
    ) -> Result<Reservation, AppError>;

    /// Idempotent: a reservation that is no longer active comes back as is.
    async fn release_reservation(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, AppError>;

    async fn list_reservations(&self, product_id: Uuid) -> Result<Vec<Reservation>, AppError>;

    /// Marks active reservations past `expires_at` as expired. Returns how many changed.
    async fn expire_reservations(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    /// Appends a ledger row and moves the product balance. When
    /// `consume_reservation` is set, that reservation is released first, in
    /// the same unit of work.
    async fn record_movement(
        &self,
        draft: MovementDraft,
        consume_reservation: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<StockMovement, AppError>;

    /// Newest first.
    async fn list_movements(&self, product_id: Uuid, limit: i64) -> Result<Vec<StockMovement>, AppError>;

    async fn create_adjustment_request(
        &self,
        request: AdjustmentRequest,
    ) -> Result<AdjustmentRequest, AppError>;

    async fn find_adjustment_request(&self, id: Uuid) -> Result<Option<AdjustmentRequest>, AppError>;

    async fn list_adjustment_requests(
        &self,
        status: Option<AdjustmentStatus>,
    ) -> Result<Vec<AdjustmentRequest>, AppError>;

    async fn decide_adjustment(
        &self,
        id: Uuid,
        decision: AdjustmentDecision,
        now: DateTime<Utc>,
    ) -> Result<AdjustmentRequest, AppError>;

    async fn apply_adjustment(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(AdjustmentRequest, StockMovement), AppError>;
}
