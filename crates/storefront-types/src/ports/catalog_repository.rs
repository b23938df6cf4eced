use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepoError;
use crate::domain::catalog::{
    Category, Lookup, LookupKind, NewCategory, NewProduct, NewSize, Product, ProductDetail,
    ProductPatch, ProductQuery, Size,
};

#[async_trait]
pub trait CatalogRepository: Send + Sync + 'static {
    async fn create_category(&self, category: NewCategory) -> Result<Category, RepoError>;
    async fn list_categories(&self) -> Result<Vec<Category>, RepoError>;
    async fn create_size(&self, size: NewSize) -> Result<Size, RepoError>;
    async fn list_sizes(&self) -> Result<Vec<Size>, RepoError>;
    async fn create_lookup(&self, kind: LookupKind, name: String) -> Result<Lookup, RepoError>;
    async fn list_lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>, RepoError>;

    /// Inserts the product with its sizes, images and attribute values in one transaction.
    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<ProductDetail, RepoError>;

    /// Raw row lookup regardless of visibility.
    async fn get_product(&self, id: i64) -> Result<Option<Product>, RepoError>;

    /// Detail of a visible product only.
    async fn find_visible_product(&self, id: i64) -> Result<Option<ProductDetail>, RepoError>;

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<ProductDetail>, RepoError>;

    /// Returns `Ok(None)` when the row does not exist and `RepoError::Conflict`
    /// when it changed after being read.
    async fn update_product(
        &self,
        id: i64,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>, RepoError>;

    async fn soft_delete_product(&self, id: i64, now: DateTime<Utc>) -> Result<bool, RepoError>;
}
