// src/services/inventory_service.rs

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::InventoryStore,
    models::inventory::{
        AdjustmentDecision, AdjustmentRequest, AdjustmentStatus, MovementDirection, MovementDraft,
        MovementType, NewProduct, Product, RecordMovement, Reservation, ReservationDraft,
        ReserveStock, StockMovement, StockOperation, StockSummary, StockValidation, UpdateStock,
        UpdateStockOutcome,
    },
    services::ledger,
};

/// Longest hold a reservation may ask for (one week).
pub const MAX_RESERVATION_MINUTES: i64 = 7 * 24 * 60;
pub const DEFAULT_MOVEMENT_LIMIT: i64 = 50;
pub const MAX_MOVEMENT_LIMIT: i64 = 500;

/// Tunables for the stock pool.
#[derive(Debug, Clone)]
pub struct StockPolicy {
    /// Adjustments above this magnitude wait for approval when the caller asks for it.
    pub approval_threshold: Decimal,
    pub default_reservation_minutes: i64,
}

impl Default for StockPolicy {
    fn default() -> Self {
        Self {
            approval_threshold: Decimal::from(100),
            default_reservation_minutes: 30,
        }
    }
}

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    policy: StockPolicy,
}

impl InventoryService {
    pub fn new(store: Arc<dyn InventoryStore>, policy: StockPolicy) -> Self {
        Self { store, policy }
    }

    // --- PRODUCTS ---

    pub async fn create_product(&self, new: NewProduct) -> Result<Product, AppError> {
        if new.initial_quantity.is_sign_negative() || new.min_stock.is_sign_negative() {
            return Err(AppError::InvalidQuantity);
        }
        ledger::ensure_in_range(new.initial_quantity)?;
        ledger::ensure_in_range(new.min_stock)?;
        if let Some(max) = new.max_stock {
            ledger::ensure_in_range(max)?;
            if max < new.min_stock {
                let mut errors = validator::ValidationErrors::new();
                let mut err = validator::ValidationError::new("max_below_min");
                err.message = Some("Maximum stock cannot be below minimum stock.".into());
                errors.add("maxStock", err);
                return Err(AppError::ValidationError(errors));
            }
        }
        let product = self.store.create_product(new, Utc::now()).await?;
        tracing::info!(product_id = %product.id, sku = %product.sku, "📦 Product created");
        Ok(product)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        self.store.list_products().await
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<Product, AppError> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or(AppError::ProductNotFound(product_id))
    }

    // --- POOL ---

    pub async fn get_stock_summary(&self, product_id: Uuid) -> Result<StockSummary, AppError> {
        self.store
            .stock_summary(product_id, Utc::now())
            .await?
            .ok_or(AppError::ProductNotFound(product_id))
    }

    /// Dry run of an operation. Unknown products are reported as not available.
    pub async fn validate(
        &self,
        product_id: Uuid,
        quantity: Decimal,
        operation: StockOperation,
    ) -> Result<StockValidation, AppError> {
        let rejected = |code| StockValidation {
            valid: false,
            code,
            available_stock: None,
            max_stock: None,
        };

        if quantity <= Decimal::ZERO {
            return Ok(rejected("invalid_quantity"));
        }
        if !ledger::quantity_in_range(quantity) {
            return Ok(rejected("quantity_out_of_range"));
        }
        let Some(product) = self.store.find_product(product_id).await? else {
            return Ok(rejected("stock_not_available"));
        };
        let Some(summary) = self.store.stock_summary(product_id, Utc::now()).await? else {
            return Ok(rejected("stock_not_available"));
        };

        let (valid, code) = match operation {
            StockOperation::Reserve | StockOperation::Remove => {
                if quantity <= summary.available_stock {
                    (true, "stock_available")
                } else {
                    (false, "stock_insufficient")
                }
            }
            StockOperation::Add => match product.max_stock {
                Some(max) if summary.total_stock.checked_add(quantity).is_none_or(|total| total > max) => {
                    (true, "stock_above_maximum")
                }
                _ => (true, "stock_available"),
            },
        };

        Ok(StockValidation {
            valid,
            code,
            available_stock: Some(summary.available_stock),
            max_stock: product.max_stock,
        })
    }

    pub async fn reserve_stock(&self, request: ReserveStock) -> Result<Reservation, AppError> {
        ledger::ensure_positive(request.quantity)?;

        let minutes = request
            .expiration_minutes
            .unwrap_or(self.policy.default_reservation_minutes);
        if !(1..=MAX_RESERVATION_MINUTES).contains(&minutes) {
            return Err(AppError::InvalidExpiration(minutes));
        }

        let now = Utc::now();
        let draft = ReservationDraft {
            product_id: request.product_id,
            quantity: request.quantity,
            reason: request.reason,
            user_id: request.user_id,
            expires_at: now + Duration::minutes(minutes),
        };

        let reservation = self.store.create_reservation(draft, now).await?;
        tracing::info!(
            reservation_id = %reservation.id,
            product_id = %reservation.product_id,
            quantity = %reservation.quantity,
            "🔒 Stock reserved until {}",
            reservation.expires_at
        );
        Ok(reservation)
    }

    pub async fn release_reservation(&self, reservation_id: Uuid) -> Result<Reservation, AppError> {
        let reservation = self.store.release_reservation(reservation_id, Utc::now()).await?;
        tracing::info!(reservation_id = %reservation.id, status = ?reservation.status, "🔓 Reservation released");
        Ok(reservation)
    }

    pub async fn list_reservations(&self, product_id: Uuid) -> Result<Vec<Reservation>, AppError> {
        self.get_product(product_id).await?;
        self.store.list_reservations(product_id).await
    }

    pub async fn cleanup_expired_reservations(&self) -> Result<u64, AppError> {
        self.store.expire_reservations(Utc::now()).await
    }

    // --- LEDGER ---

    pub async fn record_movement(&self, request: RecordMovement) -> Result<StockMovement, AppError> {
        if request.movement_type.direction() == MovementDirection::Signed
            || request.movement_type == MovementType::InitialStock
        {
            let mut errors = validator::ValidationErrors::new();
            let mut err = validator::ValidationError::new("movement_type");
            err.message = Some("Use stock adjustments for this movement type.".into());
            errors.add("movementType", err);
            return Err(AppError::ValidationError(errors));
        }

        let delta = ledger::signed_delta(request.movement_type, request.quantity)?;
        let draft = MovementDraft {
            product_id: request.product_id,
            movement_type: request.movement_type,
            delta,
            reason: request.reason,
            user_id: request.user_id,
            reference_id: request.reservation_id,
        };

        let movement = self
            .store
            .record_movement(draft, request.reservation_id, Utc::now())
            .await?;
        self.log_movement(&movement);
        Ok(movement)
    }

    pub async fn list_movements(
        &self,
        product_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<StockMovement>, AppError> {
        let limit = limit
            .unwrap_or(DEFAULT_MOVEMENT_LIMIT)
            .clamp(1, MAX_MOVEMENT_LIMIT);
        self.get_product(product_id).await?;
        self.store.list_movements(product_id, limit).await
    }

    // --- ADJUSTMENTS ---

    /// Signed stock correction. Large corrections wait for approval when
    /// `require_approval` is set; nothing touches the balance until applied.
    pub async fn update_stock(&self, request: UpdateStock) -> Result<UpdateStockOutcome, AppError> {
        if request.quantity.is_zero() {
            return Err(AppError::InvalidQuantity);
        }
        ledger::ensure_in_range(request.quantity)?;

        let now = Utc::now();
        if request.require_approval && request.quantity.abs() > self.policy.approval_threshold {
            let pending = self
                .store
                .create_adjustment_request(AdjustmentRequest {
                    id: Uuid::new_v4(),
                    product_id: request.product_id,
                    quantity: request.quantity,
                    reason: request.reason,
                    requested_by: request.user_id,
                    status: AdjustmentStatus::Pending,
                    decided_by: None,
                    decision_note: None,
                    decided_at: None,
                    movement_id: None,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            tracing::info!(
                request_id = %pending.id,
                product_id = %pending.product_id,
                quantity = %pending.quantity,
                "📝 Stock adjustment awaiting approval"
            );
            return Ok(UpdateStockOutcome::PendingApproval { request: pending });
        }

        let draft = MovementDraft {
            product_id: request.product_id,
            movement_type: MovementType::Adjustment,
            delta: request.quantity,
            reason: request.reason,
            user_id: request.user_id,
            reference_id: None,
        };
        let movement = self.store.record_movement(draft, None, now).await?;
        self.log_movement(&movement);
        Ok(UpdateStockOutcome::Applied { movement })
    }

    pub async fn get_adjustment(&self, id: Uuid) -> Result<AdjustmentRequest, AppError> {
        self.store
            .find_adjustment_request(id)
            .await?
            .ok_or(AppError::AdjustmentNotFound(id))
    }

    pub async fn list_adjustments(
        &self,
        status: Option<AdjustmentStatus>,
    ) -> Result<Vec<AdjustmentRequest>, AppError> {
        self.store.list_adjustment_requests(status).await
    }

    pub async fn approve_adjustment(
        &self,
        id: Uuid,
        approver: Uuid,
        note: Option<String>,
    ) -> Result<AdjustmentRequest, AppError> {
        self.decide(id, AdjustmentStatus::Approved, approver, note).await
    }

    pub async fn reject_adjustment(
        &self,
        id: Uuid,
        approver: Uuid,
        note: Option<String>,
    ) -> Result<AdjustmentRequest, AppError> {
        self.decide(id, AdjustmentStatus::Rejected, approver, note).await
    }

    async fn decide(
        &self,
        id: Uuid,
        status: AdjustmentStatus,
        decided_by: Uuid,
        note: Option<String>,
    ) -> Result<AdjustmentRequest, AppError> {
        let decision = AdjustmentDecision { status, decided_by, note };
        let request = self.store.decide_adjustment(id, decision, Utc::now()).await?;
        tracing::info!(request_id = %request.id, decided_by = %decided_by, "✅ Adjustment {}", status.as_str());
        Ok(request)
    }

    pub async fn apply_adjustment(&self, id: Uuid) -> Result<(AdjustmentRequest, StockMovement), AppError> {
        let (request, movement) = self.store.apply_adjustment(id, Utc::now()).await?;
        self.log_movement(&movement);
        Ok((request, movement))
    }

    fn log_movement(&self, movement: &StockMovement) {
        tracing::info!(
            movement_id = %movement.id,
            product_id = %movement.product_id,
            movement_type = ?movement.movement_type,
            "📒 Stock {} -> {}",
            movement.before_quantity,
            movement.after_quantity
        );
    }
}
