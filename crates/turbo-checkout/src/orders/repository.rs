//! Order storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::ids::{OrderId, UserId};
use crate::orders::{Order, OrderStatus};

/// Narrows a user's order history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on `created_at`.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub date_to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl OrderFilter {
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn paginate(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Whether an order passes the status and date conditions.
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.date_from.map_or(true, |from| order.created_at >= from)
            && self.date_to.map_or(true, |to| order.created_at <= to)
    }

    /// Apply offset and limit to an already filtered, ordered list.
    pub fn page(&self, orders: Vec<Order>) -> Vec<Order> {
        let rest = orders.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => rest.take(limit).collect(),
            None => rest.collect(),
        }
    }
}

/// Persists orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>>;

    async fn find_by_order_number(&self, order_number: &str) -> Result<Option<Order>>;

    /// A user's orders, newest first.
    async fn find_by_user_id(&self, user_id: &UserId, filter: &OrderFilter) -> Result<Vec<Order>>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>>;

    /// Insert or replace an order.
    async fn save(&self, order: &Order) -> Result<()>;
}

/// In-memory order store.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_by_order_number(&self, order_number: &str) -> Result<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| &o.user_id == user_id && filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(filter.page(orders))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn save(&self, order: &Order) -> Result<()> {
        self.orders
            .write()
            .await
            .insert(order.id.clone(), order.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::order::tests::order;
    use chrono::Duration;

    #[tokio::test]
    async fn test_lookups() {
        let repo = InMemoryOrderRepository::new();
        let mut stored = order(OrderStatus::Pending);
        stored.idempotency_key = Some("key-1".to_string());
        repo.save(&stored).await.unwrap();

        assert_eq!(repo.find_by_id(&stored.id).await.unwrap(), Some(stored.clone()));
        assert!(repo
            .find_by_order_number(&stored.order_number)
            .await
            .unwrap()
            .is_some());
        assert!(repo.find_by_idempotency_key("key-1").await.unwrap().is_some());
        assert!(repo.find_by_idempotency_key("key-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_orders_filtered_and_paged() {
        let repo = InMemoryOrderRepository::new();
        let now = Utc::now();
        for (days_ago, status) in [
            (1, OrderStatus::Paid),
            (2, OrderStatus::Pending),
            (3, OrderStatus::Paid),
            (10, OrderStatus::Paid),
        ] {
            let mut o = order(status);
            o.created_at = now - Duration::days(days_ago);
            repo.save(&o).await.unwrap();
        }
        let mut other = order(OrderStatus::Paid);
        other.user_id = UserId::new("someone-else");
        repo.save(&other).await.unwrap();

        let user = UserId::new("user-1");
        let all = repo.find_by_user_id(&user, &OrderFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(all[0].created_at > all[1].created_at);

        let paid = OrderFilter::default().with_status(OrderStatus::Paid);
        assert_eq!(repo.find_by_user_id(&user, &paid).await.unwrap().len(), 3);

        let recent_paid = OrderFilter {
            date_from: Some(now - Duration::days(5)),
            ..paid.clone()
        };
        assert_eq!(repo.find_by_user_id(&user, &recent_paid).await.unwrap().len(), 2);

        let second_page = paid.paginate(2, 2);
        let page = repo.find_by_user_id(&user, &second_page).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].created_at, now - Duration::days(10));
    }
}
