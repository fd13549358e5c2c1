pub mod coordinator;
pub mod dispute;
pub mod models;
pub mod repository;

pub use coordinator::{CreateOrder, OrderCoordinator};
pub use dispute::{Dispute, DisputeOutcome, DisputeResolver, DisputeStatus};
pub use models::{Order, OrderStatus, TransactionRecord, TransactionStatus};
pub use repository::{DisputeRepository, OrderRepository, TransactionRepository};
