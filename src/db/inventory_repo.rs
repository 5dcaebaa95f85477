// src/db/inventory_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::InventoryStore,
    models::inventory::{
        AdjustmentDecision, AdjustmentRequest, AdjustmentStatus, MovementDraft, MovementType,
        NewProduct, Product, Reservation, ReservationDraft, StockMovement, StockSummary,
    },
    services::ledger::{self, StockBalance},
};

#[derive(Clone)]
pub struct PgInventoryRepository {
    pool: PgPool,
}

impl PgInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Row helpers, always run on the caller's transaction
    // ---

    /// Locks the product row for the rest of the transaction.
    async fn lock_product(conn: &mut PgConnection, product_id: Uuid) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .fetch_optional(conn)
            .await?
            .ok_or(AppError::ProductNotFound(product_id))
    }

    async fn balance(
        conn: &mut PgConnection,
        product: &Product,
        now: DateTime<Utc>,
    ) -> Result<StockBalance, AppError> {
        let (reserved, count) = sqlx::query_as::<_, (Decimal, i64)>(
            r#"
            SELECT COALESCE(SUM(quantity), 0), COUNT(*)
            FROM stock_reservations
            WHERE product_id = $1
              AND status = 'active'
              AND expires_at > $2
            "#,
        )
        .bind(product.id)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(StockBalance::new(product.quantity, reserved, count))
    }

    /// Appends the ledger row and moves the materialized balance with it.
    async fn commit_movement(conn: &mut PgConnection, movement: &StockMovement) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements
                (id, product_id, movement_type, quantity, before_quantity, after_quantity,
                 reason, user_id, reference_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(movement.id)
        .bind(movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.before_quantity)
        .bind(movement.after_quantity)
        .bind(&movement.reason)
        .bind(movement.user_id)
        .bind(movement.reference_id)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        sqlx::query("UPDATE products SET quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(movement.product_id)
            .bind(movement.after_quantity)
            .bind(movement.created_at)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn store_reservation_status(
        conn: &mut PgConnection,
        reservation: &Reservation,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE stock_reservations SET status = $2, released_at = $3 WHERE id = $1")
            .bind(reservation.id)
            .bind(reservation.status)
            .bind(reservation.released_at)
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn lock_adjustment(conn: &mut PgConnection, id: Uuid) -> Result<AdjustmentRequest, AppError> {
        sqlx::query_as::<_, AdjustmentRequest>(
            "SELECT * FROM stock_adjustment_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::AdjustmentNotFound(id))
    }

    async fn store_adjustment(conn: &mut PgConnection, request: &AdjustmentRequest) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE stock_adjustment_requests
            SET status = $2, decided_by = $3, decision_note = $4, decided_at = $5,
                movement_id = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(request.status)
        .bind(request.decided_by)
        .bind(&request.decision_note)
        .bind(request.decided_at)
        .bind(request.movement_id)
        .bind(request.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgInventoryRepository {
    async fn create_product(&self, new: NewProduct, now: DateTime<Utc>) -> Result<Product, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Catalogue row with a zero balance
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, sku, name, quantity, min_stock, max_stock, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.sku)
        .bind(&new.name)
        .bind(new.min_stock)
        .bind(new.max_stock)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::SkuAlreadyExists(new.sku.clone());
                }
            }
            e.into()
        })?;

        // 2. Opening balance goes through the ledger
        let product = if new.initial_quantity > Decimal::ZERO {
            let movement = ledger::post_movement(
                &product,
                &StockBalance::new(Decimal::ZERO, Decimal::ZERO, 0),
                MovementDraft {
                    product_id: product.id,
                    movement_type: MovementType::InitialStock,
                    delta: new.initial_quantity,
                    reason: None,
                    user_id: new.user_id,
                    reference_id: None,
                },
                now,
            )?;
            Self::commit_movement(&mut tx, &movement).await?;
            Product { quantity: movement.after_quantity, ..product }
        } else {
            product
        };

        tx.commit().await?;
        Ok(product)
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn low_stock_products(&self) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE quantity <= min_stock ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn stock_summary(
        &self,
        product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<StockSummary>, AppError> {
        // Product and reservations read from one snapshot
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;

        let summary = match product {
            Some(product) => Some(Self::balance(&mut tx, &product, now).await?.summary(product.id)),
            None => None,
        };

        tx.commit().await?;
        Ok(summary)
    }

    async fn create_reservation(
        &self,
        draft: ReservationDraft,
        now: DateTime<Utc>,
    ) -> Result<Reservation, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Lock the product so concurrent reservations queue behind us
        let product = Self::lock_product(&mut tx, draft.product_id).await?;
        let balance = Self::balance(&mut tx, &product, now).await?;

        // 2. Validate against what is actually available
        let reservation = ledger::new_reservation(&balance, draft, now)?;

        // 3. Persist
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO stock_reservations
                (id, product_id, quantity, reason, user_id, status, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.product_id)
        .bind(reservation.quantity)
        .bind(&reservation.reason)
        .bind(reservation.user_id)
        .bind(reservation.status)
        .bind(reservation.expires_at)
        .bind(reservation.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reservation)
    }

    async fn release_reservation(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM stock_reservations WHERE id = $1 FOR UPDATE",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::ReservationNotFound(reservation_id))?;

        let (reservation, changed) = ledger::release(current, now);
        if changed {
            Self::store_reservation_status(&mut tx, &reservation).await?;
        }

        tx.commit().await?;
        Ok(reservation)
    }

    async fn list_reservations(&self, product_id: Uuid) -> Result<Vec<Reservation>, AppError> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM stock_reservations WHERE product_id = $1 ORDER BY created_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn expire_reservations(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE stock_reservations
            SET status = 'expired'
            WHERE status = 'active' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn record_movement(
        &self,
        draft: MovementDraft,
        consume_reservation: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<StockMovement, AppError> {
        let mut tx = self.pool.begin().await?;

        let product = Self::lock_product(&mut tx, draft.product_id).await?;
        let mut balance = Self::balance(&mut tx, &product, now).await?;

        if let Some(reservation_id) = consume_reservation {
            let reservation = sqlx::query_as::<_, Reservation>(
                "SELECT * FROM stock_reservations WHERE id = $1 FOR UPDATE",
            )
            .bind(reservation_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::ReservationNotFound(reservation_id))?;

            ledger::ensure_consumable(&reservation, product.id, now)?;
            balance = balance.without_reservation(&reservation, now);
            let (released, _) = ledger::release(reservation, now);
            Self::store_reservation_status(&mut tx, &released).await?;
        }

        let movement = ledger::post_movement(&product, &balance, draft, now)?;
        Self::commit_movement(&mut tx, &movement).await?;

        // Dropping the transaction on any error above rolls everything back
        tx.commit().await?;
        Ok(movement)
    }

    async fn list_movements(&self, product_id: Uuid, limit: i64) -> Result<Vec<StockMovement>, AppError> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE product_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    async fn create_adjustment_request(
        &self,
        request: AdjustmentRequest,
    ) -> Result<AdjustmentRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        // FK violations would surface as a 500, check the product explicitly
        Self::lock_product(&mut tx, request.product_id).await?;

        let request = sqlx::query_as::<_, AdjustmentRequest>(
            r#"
            INSERT INTO stock_adjustment_requests
                (id, product_id, quantity, reason, requested_by, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.product_id)
        .bind(request.quantity)
        .bind(&request.reason)
        .bind(request.requested_by)
        .bind(request.status)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(request)
    }

    async fn find_adjustment_request(&self, id: Uuid) -> Result<Option<AdjustmentRequest>, AppError> {
        let request = sqlx::query_as::<_, AdjustmentRequest>(
            "SELECT * FROM stock_adjustment_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn list_adjustment_requests(
        &self,
        status: Option<AdjustmentStatus>,
    ) -> Result<Vec<AdjustmentRequest>, AppError> {
        let requests = sqlx::query_as::<_, AdjustmentRequest>(
            r#"
            SELECT * FROM stock_adjustment_requests
            WHERE ($1::adjustment_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn decide_adjustment(
        &self,
        id: Uuid,
        decision: AdjustmentDecision,
        now: DateTime<Utc>,
    ) -> Result<AdjustmentRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        let request = Self::lock_adjustment(&mut tx, id).await?;
        let decided = ledger::decide(request, decision, now)?;
        Self::store_adjustment(&mut tx, &decided).await?;

        tx.commit().await?;
        Ok(decided)
    }

    async fn apply_adjustment(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(AdjustmentRequest, StockMovement), AppError> {
        let mut tx = self.pool.begin().await?;

        // Request first, then product: same lock order as decide_adjustment
        let request = Self::lock_adjustment(&mut tx, id).await?;
        let product = Self::lock_product(&mut tx, request.product_id).await?;
        let balance = Self::balance(&mut tx, &product, now).await?;

        let (applied, movement) = ledger::apply_adjustment(request, &product, &balance, now)?;
        Self::commit_movement(&mut tx, &movement).await?;
        Self::store_adjustment(&mut tx, &applied).await?;

        tx.commit().await?;
        Ok((applied, movement))
    }
}
