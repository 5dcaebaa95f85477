// src/db/memory_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::InventoryStore,
    models::inventory::{
        AdjustmentDecision, AdjustmentRequest, AdjustmentStatus, MovementDraft, MovementType,
        NewProduct, Product, Reservation, ReservationDraft, ReservationStatus, StockMovement,
        StockSummary,
    },
    services::ledger::{self, StockBalance},
};

#[derive(Debug, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    movements: Vec<StockMovement>,
    reservations: HashMap<Uuid, Reservation>,
    adjustments: HashMap<Uuid, AdjustmentRequest>,
}

impl State {
    fn product(&self, product_id: Uuid) -> Result<&Product, AppError> {
        self.products
            .get(&product_id)
            .ok_or(AppError::ProductNotFound(product_id))
    }

    fn balance(&self, product: &Product, now: DateTime<Utc>) -> StockBalance {
        StockBalance::from_reservations(
            product.quantity,
            self.reservations.values().filter(|r| r.product_id == product.id),
            now,
        )
    }

    /// Appends the movement and moves the materialized balance with it.
    fn commit_movement(&mut self, movement: StockMovement) {
        if let Some(product) = self.products.get_mut(&movement.product_id) {
            product.quantity = movement.after_quantity;
            product.updated_at = movement.created_at;
        }
        self.movements.push(movement);
    }
}

/// In-memory ledger store.
///
/// Every operation runs under one mutex, which gives the same
/// read-check-write atomicity the Postgres store gets from row locks.
/// Used by tests and by `STORAGE=memory` for local runs.
#[derive(Debug, Default)]
pub struct InMemoryInventoryRepository {
    state: Mutex<State>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::InternalServerError(anyhow::anyhow!("inventory state lock poisoned")))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryRepository {
    async fn create_product(&self, new: NewProduct, now: DateTime<Utc>) -> Result<Product, AppError> {
        let mut state = self.lock()?;

        if state.products.values().any(|p| p.sku == new.sku) {
            return Err(AppError::SkuAlreadyExists(new.sku));
        }

        let product = Product {
            id: Uuid::new_v4(),
            sku: new.sku,
            name: new.name,
            quantity: Decimal::ZERO,
            min_stock: new.min_stock,
            max_stock: new.max_stock,
            created_at: now,
            updated_at: now,
        };

        let initial = if new.initial_quantity > Decimal::ZERO {
            let balance = StockBalance::new(Decimal::ZERO, Decimal::ZERO, 0);
            Some(ledger::post_movement(
                &product,
                &balance,
                MovementDraft {
                    product_id: product.id,
                    movement_type: MovementType::InitialStock,
                    delta: new.initial_quantity,
                    reason: None,
                    user_id: new.user_id,
                    reference_id: None,
                },
                now,
            )?)
        } else {
            None
        };

        state.products.insert(product.id, product.clone());
        if let Some(movement) = initial {
            state.commit_movement(movement);
        }

        Ok(state.product(product.id)?.clone())
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.lock()?.products.get(&product_id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let mut products: Vec<Product> = self.lock()?.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn low_stock_products(&self) -> Result<Vec<Product>, AppError> {
        let mut products: Vec<Product> = self
            .lock()?
            .products
            .values()
            .filter(|p| p.quantity <= p.min_stock)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn stock_summary(
        &self,
        product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<StockSummary>, AppError> {
        let state = self.lock()?;
        Ok(state
            .products
            .get(&product_id)
            .map(|p| state.balance(p, now).summary(p.id)))
    }

    async fn create_reservation(
        &self,
        draft: ReservationDraft,
        now: DateTime<Utc>,
    ) -> Result<Reservation, AppError> {
        let mut state = self.lock()?;
        let product = state.product(draft.product_id)?;
        let balance = state.balance(product, now);

        let reservation = ledger::new_reservation(&balance, draft, now)?;
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn release_reservation(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, AppError> {
        let mut state = self.lock()?;
        let current = state
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(AppError::ReservationNotFound(reservation_id))?;

        let (reservation, changed) = ledger::release(current, now);
        if changed {
            state.reservations.insert(reservation.id, reservation.clone());
        }
        Ok(reservation)
    }

    async fn list_reservations(&self, product_id: Uuid) -> Result<Vec<Reservation>, AppError> {
        let mut reservations: Vec<Reservation> = self
            .lock()?
            .reservations
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reservations)
    }

    async fn expire_reservations(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.lock()?;
        let mut expired = 0;
        for reservation in state.reservations.values_mut() {
            if reservation.status == ReservationStatus::Active && reservation.expires_at <= now {
                reservation.status = ReservationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn record_movement(
        &self,
        draft: MovementDraft,
        consume_reservation: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<StockMovement, AppError> {
        let mut state = self.lock()?;
        let product = state.product(draft.product_id)?.clone();
        let mut balance = state.balance(&product, now);

        let consumed = match consume_reservation {
            Some(reservation_id) => {
                let reservation = state
                    .reservations
                    .get(&reservation_id)
                    .cloned()
                    .ok_or(AppError::ReservationNotFound(reservation_id))?;
                ledger::ensure_consumable(&reservation, product.id, now)?;
                balance = balance.without_reservation(&reservation, now);
                Some(ledger::release(reservation, now).0)
            }
            None => None,
        };

        let movement = ledger::post_movement(&product, &balance, draft, now)?;

        // Nothing is written until every check has passed
        if let Some(reservation) = consumed {
            state.reservations.insert(reservation.id, reservation);
        }
        state.commit_movement(movement.clone());
        Ok(movement)
    }

    async fn list_movements(&self, product_id: Uuid, limit: i64) -> Result<Vec<StockMovement>, AppError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .lock()?
            .movements
            .iter()
            .rev()
            .filter(|m| m.product_id == product_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_adjustment_request(
        &self,
        request: AdjustmentRequest,
    ) -> Result<AdjustmentRequest, AppError> {
        let mut state = self.lock()?;
        state.product(request.product_id)?;
        state.adjustments.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_adjustment_request(&self, id: Uuid) -> Result<Option<AdjustmentRequest>, AppError> {
        Ok(self.lock()?.adjustments.get(&id).cloned())
    }

    async fn list_adjustment_requests(
        &self,
        status: Option<AdjustmentStatus>,
    ) -> Result<Vec<AdjustmentRequest>, AppError> {
        let mut requests: Vec<AdjustmentRequest> = self
            .lock()?
            .adjustments
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn decide_adjustment(
        &self,
        id: Uuid,
        decision: AdjustmentDecision,
        now: DateTime<Utc>,
    ) -> Result<AdjustmentRequest, AppError> {
        let mut state = self.lock()?;
        let request = state
            .adjustments
            .get(&id)
            .cloned()
            .ok_or(AppError::AdjustmentNotFound(id))?;

        let decided = ledger::decide(request, decision, now)?;
        state.adjustments.insert(id, decided.clone());
        Ok(decided)
    }

    async fn apply_adjustment(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(AdjustmentRequest, StockMovement), AppError> {
        let mut state = self.lock()?;
        let request = state
            .adjustments
            .get(&id)
            .cloned()
            .ok_or(AppError::AdjustmentNotFound(id))?;
        let product = state.product(request.product_id)?.clone();
        let balance = state.balance(&product, now);

        let (applied, movement) = ledger::apply_adjustment(request, &product, &balance, now)?;
        state.adjustments.insert(id, applied.clone());
        state.commit_movement(movement.clone());
        Ok((applied, movement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    async fn seeded(quantity: i64) -> (Arc<InMemoryInventoryRepository>, Product) {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let product = repo
            .create_product(
                NewProduct {
                    sku: "BREAD-WHITE-700".into(),
                    name: "White bread 700g".into(),
                    initial_quantity: Decimal::from(quantity),
                    min_stock: Decimal::from(5),
                    max_stock: None,
                    user_id: Uuid::new_v4(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        (repo, product)
    }

    fn draft(product_id: Uuid, quantity: i64, expires_at: DateTime<Utc>) -> ReservationDraft {
        ReservationDraft {
            product_id,
            quantity: Decimal::from(quantity),
            reason: None,
            user_id: Uuid::new_v4(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn opening_balance_is_a_ledger_entry() {
        let (repo, product) = seeded(25).await;

        assert_eq!(product.quantity, Decimal::from(25));
        let movements = repo.list_movements(product.id, 10).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::InitialStock);
        assert_eq!(movements[0].before_quantity, Decimal::ZERO);
        assert_eq!(movements[0].after_quantity, Decimal::from(25));
    }

    #[tokio::test]
    async fn duplicate_sku_is_rejected() {
        let (repo, product) = seeded(0).await;
        let err = repo
            .create_product(
                NewProduct {
                    sku: product.sku.clone(),
                    name: "Other".into(),
                    initial_quantity: Decimal::ZERO,
                    min_stock: Decimal::ZERO,
                    max_stock: None,
                    user_id: Uuid::new_v4(),
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SkuAlreadyExists(_)));
    }

    #[tokio::test]
    async fn overflowing_purchase_leaves_the_store_usable() {
        let repo = InMemoryInventoryRepository::new();
        let product = repo
            .create_product(
                NewProduct {
                    sku: "SALT-1KG".into(),
                    name: "Coarse salt 1kg".into(),
                    initial_quantity: ledger::MAX_QUANTITY - Decimal::ONE,
                    min_stock: Decimal::ZERO,
                    max_stock: None,
                    user_id: Uuid::new_v4(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        for delta in [Decimal::ONE, Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0)] {
            let purchase = MovementDraft {
                product_id: product.id,
                movement_type: MovementType::Purchase,
                delta,
                reason: None,
                user_id: Uuid::new_v4(),
                reference_id: None,
            };
            let err = repo.record_movement(purchase, None, Utc::now()).await.unwrap_err();
            assert!(matches!(err, AppError::QuantityOutOfRange(_)));
        }

        let stored = repo.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, ledger::MAX_QUANTITY - Decimal::ONE);
        assert_eq!(repo.list_movements(product.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_opening_balance_creates_nothing() {
        let repo = InMemoryInventoryRepository::new();
        let err = repo
            .create_product(
                NewProduct {
                    sku: "SALT-1KG".into(),
                    name: "Coarse salt 1kg".into(),
                    initial_quantity: ledger::MAX_QUANTITY,
                    min_stock: Decimal::ZERO,
                    max_stock: None,
                    user_id: Uuid::new_v4(),
                },
                Utc::now(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::QuantityOutOfRange(_)));
        assert!(repo.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_reservation_writes_nothing() {
        let (repo, product) = seeded(10).await;
        let now = Utc::now();

        let err = repo
            .create_reservation(draft(product.id, 11, now + Duration::minutes(5)), now)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { .. }));
        assert!(repo.list_reservations(product.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_reservations_never_overcommit() {
        let (repo, product) = seeded(100).await;
        let expires_at = Utc::now() + Duration::minutes(30);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create_reservation(draft(product.id, 20, expires_at), Utc::now()).await
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }

        assert_eq!(granted, 5);
        let summary = repo.stock_summary(product.id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(summary.available_stock, Decimal::ZERO);
        assert_eq!(summary.active_reservation_count, 5);
    }

    #[tokio::test]
    async fn sweep_expires_only_overdue_reservations() {
        let (repo, product) = seeded(50).await;
        let now = Utc::now();
        let overdue = repo
            .create_reservation(draft(product.id, 10, now + Duration::minutes(1)), now)
            .await
            .unwrap();
        let live = repo
            .create_reservation(draft(product.id, 10, now + Duration::minutes(60)), now)
            .await
            .unwrap();

        let later = now + Duration::minutes(2);
        assert_eq!(repo.expire_reservations(later).await.unwrap(), 1);
        assert_eq!(repo.expire_reservations(later).await.unwrap(), 0);

        let reservations = repo.list_reservations(product.id).await.unwrap();
        let status_of = |id| reservations.iter().find(|r| r.id == id).unwrap().status;
        assert_eq!(status_of(overdue.id), ReservationStatus::Expired);
        assert_eq!(status_of(live.id), ReservationStatus::Active);

        let summary = repo.stock_summary(product.id, later).await.unwrap().unwrap();
        assert_eq!(summary.available_stock, Decimal::from(40));
    }

    #[tokio::test]
    async fn movement_can_consume_its_reservation() {
        let (repo, product) = seeded(20).await;
        let now = Utc::now();
        let reservation = repo
            .create_reservation(draft(product.id, 20, now + Duration::minutes(30)), now)
            .await
            .unwrap();

        let sale = MovementDraft {
            product_id: product.id,
            movement_type: MovementType::Sale,
            delta: Decimal::from(-20),
            reason: Some("order 1001".into()),
            user_id: Uuid::new_v4(),
            reference_id: Some(reservation.id),
        };

        // without the reservation the stock is fully held
        let err = repo.record_movement(sale.clone(), None, now).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));

        let movement = repo.record_movement(sale, Some(reservation.id), now).await.unwrap();
        assert_eq!(movement.after_quantity, Decimal::ZERO);

        let released = repo.list_reservations(product.id).await.unwrap();
        assert_eq!(released[0].status, ReservationStatus::Released);
    }

    #[tokio::test]
    async fn failed_apply_leaves_request_approved() {
        let (repo, product) = seeded(10).await;
        let now = Utc::now();
        let request = repo
            .create_adjustment_request(AdjustmentRequest {
                id: Uuid::new_v4(),
                product_id: product.id,
                quantity: Decimal::from(-30),
                reason: None,
                requested_by: Uuid::new_v4(),
                status: AdjustmentStatus::Pending,
                decided_by: None,
                decision_note: None,
                decided_at: None,
                movement_id: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        repo.decide_adjustment(
            request.id,
            AdjustmentDecision {
                status: AdjustmentStatus::Approved,
                decided_by: Uuid::new_v4(),
                note: None,
            },
            now,
        )
        .await
        .unwrap();

        let err = repo.apply_adjustment(request.id, now).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));

        let stored = repo.find_adjustment_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AdjustmentStatus::Approved);
        assert_eq!(repo.find_product(product.id).await.unwrap().unwrap().quantity, Decimal::from(10));
    }
}
