// src/services/reservation_sweeper.rs

use std::time::Duration;
use tokio::task::JoinHandle;

use crate::services::inventory_service::InventoryService;

/// Background task that marks lapsed reservations as expired.
pub struct ReservationSweeper {
    service: InventoryService,
    interval: Duration,
}

impl ReservationSweeper {
    pub fn new(service: InventoryService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Returns a handle that can be used to abort the task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match self.service.cleanup_expired_reservations().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(expired = count, "🧹 Expired reservations swept");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Reservation sweep failed");
                    }
                }
            }
        })
    }
}
