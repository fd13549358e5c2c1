pub mod inventory;
pub mod product;

pub use inventory::{InMemoryInventory, InventoryGateway};
pub use product::Product;
