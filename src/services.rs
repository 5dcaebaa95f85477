pub mod alert_service;
pub mod auth;
pub mod inventory_service;
pub mod ledger;
pub mod reservation_sweeper;
