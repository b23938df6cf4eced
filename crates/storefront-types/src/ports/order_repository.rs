use async_trait::async_trait;

use super::{RepoError, UnitOfWork};
use crate::domain::identity::AnonymousId;
use crate::domain::order::Order;

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    async fn find_pending_order(&self, identity: &AnonymousId) -> Result<Option<Order>, RepoError>;
    async fn get_order(&self, id: i64) -> Result<Option<Order>, RepoError>;

    /// Opens a unit of work over inventory and orders. Dropping it without
    /// calling `commit` discards every write made through it.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError>;
}
