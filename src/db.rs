pub mod store;
pub use store::InventoryStore;
pub mod inventory_repo;
pub use inventory_repo::PgInventoryRepository;
pub mod memory_repo;
pub use memory_repo::InMemoryInventoryRepository;
