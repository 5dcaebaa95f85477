pub mod adjustments;
pub mod alerts;
pub mod inventory;
