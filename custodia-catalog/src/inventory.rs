use crate::product::Product;
use async_trait::async_trait;
use custodia_core::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Gateway to the system that owns product stock. Reserve and release
/// must be atomic per product; a read-then-write race on the stock check
/// is the canonical overselling bug and is ruled out by contract, not
/// by caller discipline.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    async fn get_product(&self, product_id: Uuid) -> CoreResult<Product>;

    /// Conditional decrement: succeeds only if stock covers `quantity`.
    async fn reserve(&self, product_id: Uuid, quantity: u32) -> CoreResult<()>;

    /// Restock after a cancellation or a compensating rollback.
    async fn release(&self, product_id: Uuid, quantity: u32) -> CoreResult<()>;
}

/// Reference gateway backed by a single mutex over the product map, so
/// the stock check and the decrement are one critical section.
pub struct InMemoryInventory {
    products: Mutex<HashMap<Uuid, Product>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self {
            products: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, product: Product) {
        self.products.lock().unwrap().insert(product.id, product);
    }
}

impl Default for InMemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventory {
    async fn get_product(&self, product_id: Uuid) -> CoreResult<Product> {
        self.products
            .lock()
            .unwrap()
            .get(&product_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("product {}", product_id)))
    }

    async fn reserve(&self, product_id: Uuid, quantity: u32) -> CoreResult<()> {
        let mut products = self.products.lock().unwrap();
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| CoreError::NotFound(format!("product {}", product_id)))?;

        if product.stock < quantity {
            return Err(CoreError::InsufficientStock {
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity;
        Ok(())
    }

    async fn release(&self, product_id: Uuid, quantity: u32) -> CoreResult<()> {
        let mut products = self.products.lock().unwrap();
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| CoreError::NotFound(format!("product {}", product_id)))?;

        product.stock = product.stock.saturating_add(quantity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reserve_and_release() {
        let inventory = InMemoryInventory::new();
        let product = Product::new(Uuid::new_v4(), "Laptop", 250_000, 5);
        let product_id = product.id;
        inventory.seed(product);

        inventory.reserve(product_id, 3).await.unwrap();
        assert_eq!(inventory.get_product(product_id).await.unwrap().stock, 2);

        inventory.release(product_id, 3).await.unwrap();
        assert_eq!(inventory.get_product(product_id).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_oversell_rejected() {
        let inventory = InMemoryInventory::new();
        let product = Product::new(Uuid::new_v4(), "Laptop", 250_000, 2);
        let product_id = product.id;
        inventory.seed(product);

        let err = inventory.reserve(product_id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                requested: 3,
                available: 2
            }
        ));
        // Failed reservation must not touch stock.
        assert_eq!(inventory.get_product(product_id).await.unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let inventory = InMemoryInventory::new();
        let err = inventory.reserve(Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_reserve_never_oversells() {
        let inventory = Arc::new(InMemoryInventory::new());
        let product = Product::new(Uuid::new_v4(), "Laptop", 250_000, 5);
        let product_id = product.id;
        inventory.seed(product);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let inv = inventory.clone();
            handles.push(tokio::spawn(
                async move { inv.reserve(product_id, 1).await },
            ));
        }

        let mut ok = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(CoreError::InsufficientStock { .. }) => exhausted += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(ok, 5);
        assert_eq!(exhausted, 15);
        assert_eq!(inventory.get_product(product_id).await.unwrap().stock, 0);
    }
}
