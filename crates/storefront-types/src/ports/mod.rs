pub mod catalog_repository;
pub mod order_repository;
pub mod unit_of_work;

pub use catalog_repository::CatalogRepository;
pub use order_repository::OrderRepository;
pub use unit_of_work::{InventoryLedger, OrderLedger, UnitOfWork};

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("db error: {0}")]
    DbError(String),

    /// A uniqueness, foreign-key or check constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The row changed between read and write.
    #[error("concurrent update: {0}")]
    Conflict(String),
}

/// Everything the HTTP adapter needs from one backing store.
pub trait Store: CatalogRepository + OrderRepository + Clone {}

impl<T> Store for T where T: CatalogRepository + OrderRepository + Clone {}
