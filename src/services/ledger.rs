// src/services/ledger.rs
//
// Balance and state rules shared by every InventoryStore implementation.
// Stores load the locked product row and the active reservations, call into
// here, then persist whatever comes back in the same transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::inventory::{
        AdjustmentDecision, AdjustmentRequest, AdjustmentStatus, MovementDirection, MovementDraft,
        MovementType, Product, Reservation, ReservationDraft, ReservationStatus, StockMovement,
        StockSummary,
    },
};

/// On-hand quantity and the part of it held by active reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockBalance {
    pub on_hand: Decimal,
    pub reserved: Decimal,
    pub active_reservations: i64,
}

impl StockBalance {
    pub fn new(on_hand: Decimal, reserved: Decimal, active_reservations: i64) -> Self {
        Self { on_hand, reserved, active_reservations }
    }

    /// Sums reservations that are still holding stock at `now`.
    pub fn from_reservations<'a>(
        on_hand: Decimal,
        reservations: impl IntoIterator<Item = &'a Reservation>,
        now: DateTime<Utc>,
    ) -> Self {
        let (reserved, count) = reservations
            .into_iter()
            .filter(|r| r.is_holding(now))
            .fold((Decimal::ZERO, 0), |(sum, count), r| (sum + r.quantity, count + 1));
        Self::new(on_hand, reserved, count)
    }

    pub fn available(&self) -> Decimal {
        (self.on_hand - self.reserved).max(Decimal::ZERO)
    }

    pub fn summary(&self, product_id: Uuid) -> StockSummary {
        StockSummary {
            product_id,
            total_stock: self.on_hand,
            reserved_stock: self.reserved,
            available_stock: self.available(),
            active_reservation_count: self.active_reservations,
        }
    }

    pub fn ensure_available(&self, requested: Decimal) -> Result<(), AppError> {
        if requested > self.available() {
            return Err(AppError::InsufficientStock {
                requested,
                available: self.available(),
            });
        }
        Ok(())
    }

    /// Balance once the given reservation no longer holds stock.
    pub fn without_reservation(&self, reservation: &Reservation, now: DateTime<Utc>) -> Self {
        if !reservation.is_holding(now) {
            return *self;
        }
        Self::new(
            self.on_hand,
            self.reserved - reservation.quantity,
            self.active_reservations - 1,
        )
    }
}

/// Decimal places kept by the `NUMERIC(18, 3)` columns.
pub const QUANTITY_SCALE: u32 = 3;

/// Exclusive bound on any stored quantity (10^15).
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// True when `quantity` fits a `NUMERIC(18, 3)` column without rounding.
pub fn quantity_in_range(quantity: Decimal) -> bool {
    quantity.normalize().scale() <= QUANTITY_SCALE && quantity.abs() < MAX_QUANTITY
}

pub fn ensure_in_range(quantity: Decimal) -> Result<(), AppError> {
    if !quantity_in_range(quantity) {
        return Err(AppError::QuantityOutOfRange(quantity));
    }
    Ok(())
}

pub fn ensure_positive(quantity: Decimal) -> Result<(), AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::InvalidQuantity);
    }
    ensure_in_range(quantity)
}

/// Turns a positive quantity into the ledger delta for the movement type.
pub fn signed_delta(movement_type: MovementType, quantity: Decimal) -> Result<Decimal, AppError> {
    match movement_type.direction() {
        MovementDirection::Inbound => {
            ensure_positive(quantity)?;
            Ok(quantity)
        }
        MovementDirection::Outbound => {
            ensure_positive(quantity)?;
            Ok(-quantity)
        }
        MovementDirection::Signed => {
            if quantity.is_zero() {
                return Err(AppError::InvalidQuantity);
            }
            ensure_in_range(quantity)?;
            Ok(quantity)
        }
    }
}

pub fn new_reservation(
    balance: &StockBalance,
    draft: ReservationDraft,
    now: DateTime<Utc>,
) -> Result<Reservation, AppError> {
    ensure_positive(draft.quantity)?;
    balance.ensure_available(draft.quantity)?;

    Ok(Reservation {
        id: Uuid::new_v4(),
        product_id: draft.product_id,
        quantity: draft.quantity,
        reason: draft.reason,
        user_id: draft.user_id,
        status: ReservationStatus::Active,
        expires_at: draft.expires_at,
        created_at: now,
        released_at: None,
    })
}

/// Active -> released. Anything else is returned untouched.
pub fn release(mut reservation: Reservation, now: DateTime<Utc>) -> (Reservation, bool) {
    if reservation.status != ReservationStatus::Active {
        return (reservation, false);
    }
    reservation.status = ReservationStatus::Released;
    reservation.released_at = Some(now);
    (reservation, true)
}

/// Checks that `reservation` can be consumed by a movement on `product_id`.
pub fn ensure_consumable(
    reservation: &Reservation,
    product_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if reservation.product_id != product_id || !reservation.is_holding(now) {
        return Err(AppError::ReservationMismatch(reservation.id));
    }
    Ok(())
}

/// Builds the ledger row for `draft`. Outgoing stock may only come from
/// what is available; reserved units stay untouched.
pub fn post_movement(
    product: &Product,
    balance: &StockBalance,
    draft: MovementDraft,
    now: DateTime<Utc>,
) -> Result<StockMovement, AppError> {
    if draft.delta.is_zero() {
        return Err(AppError::InvalidQuantity);
    }
    ensure_in_range(draft.delta)?;
    if draft.delta.is_sign_negative() {
        balance.ensure_available(-draft.delta)?;
    }

    let before_quantity = product.quantity;
    let after_quantity = before_quantity
        .checked_add(draft.delta)
        .filter(|after| *after < MAX_QUANTITY)
        .ok_or(AppError::QuantityOutOfRange(draft.delta))?;

    Ok(StockMovement {
        id: Uuid::new_v4(),
        product_id: product.id,
        movement_type: draft.movement_type,
        quantity: draft.delta,
        before_quantity,
        after_quantity,
        reason: draft.reason,
        user_id: draft.user_id,
        reference_id: draft.reference_id,
        created_at: now,
    })
}

fn ensure_transition(from: AdjustmentStatus, to: AdjustmentStatus) -> Result<(), AppError> {
    let allowed = matches!(
        (from, to),
        (AdjustmentStatus::Pending, AdjustmentStatus::Approved)
            | (AdjustmentStatus::Pending, AdjustmentStatus::Rejected)
            | (AdjustmentStatus::Approved, AdjustmentStatus::Applied)
    );
    if !allowed {
        return Err(AppError::InvalidTransition { from: from.as_str(), to: to.as_str() });
    }
    Ok(())
}

pub fn decide(
    mut request: AdjustmentRequest,
    decision: AdjustmentDecision,
    now: DateTime<Utc>,
) -> Result<AdjustmentRequest, AppError> {
    ensure_transition(request.status, decision.status)?;
    if decision.status == AdjustmentStatus::Applied {
        return Err(AppError::InvalidTransition {
            from: request.status.as_str(),
            to: decision.status.as_str(),
        });
    }
    if decision.decided_by == request.requested_by {
        return Err(AppError::SelfApproval);
    }

    request.status = decision.status;
    request.decided_by = Some(decision.decided_by);
    request.decision_note = decision.note;
    request.decided_at = Some(now);
    request.updated_at = now;
    Ok(request)
}

/// Posts the movement for an approved request and marks it applied.
pub fn apply_adjustment(
    mut request: AdjustmentRequest,
    product: &Product,
    balance: &StockBalance,
    now: DateTime<Utc>,
) -> Result<(AdjustmentRequest, StockMovement), AppError> {
    ensure_transition(request.status, AdjustmentStatus::Applied)?;

    let movement = post_movement(
        product,
        balance,
        MovementDraft {
            product_id: request.product_id,
            movement_type: MovementType::Adjustment,
            delta: request.quantity,
            reason: request.reason.clone(),
            user_id: request.decided_by.unwrap_or(request.requested_by),
            reference_id: Some(request.id),
        },
        now,
    )?;

    request.status = AdjustmentStatus::Applied;
    request.movement_id = Some(movement.id);
    request.updated_at = now;
    Ok((request, movement))
}
