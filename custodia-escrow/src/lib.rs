pub mod manager;
pub mod models;
pub mod repository;

pub use manager::EscrowManager;
pub use models::{Escrow, EscrowStatus};
pub use repository::EscrowRepository;
