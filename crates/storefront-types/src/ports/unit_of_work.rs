use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepoError;
use crate::domain::identity::AnonymousId;
use crate::domain::inventory::SellableUnit;
use crate::domain::order::{NewOrderItem, Order, OrderItem};

/// Stock counters, reachable only from inside a unit of work.
#[async_trait]
pub trait InventoryLedger: Send {
    /// Looks the unit up regardless of product visibility; stock alone decides.
    async fn find_unit(&mut self, tracking_id: &str) -> Result<Option<SellableUnit>, RepoError>;

    /// Adds `delta` to the size's stock and recomputes the product's total stock.
    /// A result below zero is a `RepoError::Constraint`.
    async fn adjust_stock(
        &mut self,
        tracking_id: &str,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<SellableUnit, RepoError>;
}

#[async_trait]
pub trait OrderLedger: Send {
    async fn find_pending_order(
        &mut self,
        identity: &AnonymousId,
    ) -> Result<Option<Order>, RepoError>;

    /// The order that holds `item_id`, with all of its items.
    async fn find_order_of_item(&mut self, item_id: i64) -> Result<Option<Order>, RepoError>;

    async fn insert_order(
        &mut self,
        identity: &AnonymousId,
        now: DateTime<Utc>,
    ) -> Result<Order, RepoError>;

    async fn insert_item(
        &mut self,
        order_id: i64,
        item: NewOrderItem,
        now: DateTime<Utc>,
    ) -> Result<OrderItem, RepoError>;

    async fn update_item_quantity(
        &mut self,
        item_id: i64,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), RepoError>;

    async fn delete_item(&mut self, item_id: i64) -> Result<bool, RepoError>;

    /// Persists total, status and `updated_at`.
    async fn save_order(&mut self, order: &Order) -> Result<(), RepoError>;

    async fn delete_order(&mut self, order_id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait UnitOfWork: InventoryLedger + OrderLedger {
    async fn commit(self: Box<Self>) -> Result<(), RepoError>;
}
