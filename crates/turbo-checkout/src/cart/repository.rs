//! Read access to stored carts.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cart::Cart;
use crate::error::Result;
use crate::ids::CartId;

/// Supplies cart snapshots. Checkout only ever reads carts; clearing a cart
/// after an order is placed is the caller's job.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Find a cart by ID.
    async fn find_by_id(&self, id: &CartId) -> Result<Option<Cart>>;
}

/// In-memory cart store.
#[derive(Debug, Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<CartId, Cart>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cart.
    pub async fn insert(&self, cart: Cart) {
        self.carts.write().await.insert(cart.id.clone(), cart);
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn find_by_id(&self, id: &CartId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(id).cloned())
    }
}
