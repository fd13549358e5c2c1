pub mod app_config;
pub mod database;
pub mod events;
pub mod memory;
pub mod pg;
pub mod redis_repo;

pub use database::DbClient;
pub use events::EventLog;
pub use memory::MemoryLedger;
pub use pg::PgLedger;
pub use redis_repo::RedisClient;
