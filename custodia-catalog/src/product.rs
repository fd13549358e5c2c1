use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog entry as seen through the Inventory Gateway. Price is in
/// minor currency units; stock is the quantity still available for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(seller_id: Uuid, name: impl Into<String>, price: i64, stock: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            seller_id,
            name: name.into(),
            description: None,
            price,
            stock,
            created_at: Utc::now(),
        }
    }
}
