#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a repo feature: `memory` or `sqlite`.");

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storefront_types::domain::catalog::{
    Category, Lookup, LookupKind, NewCategory, NewProduct, NewSize, Product, ProductDetail,
    ProductPatch, ProductQuery, Size,
};
use storefront_types::domain::identity::AnonymousId;
use storefront_types::domain::order::Order;
use storefront_types::ports::{CatalogRepository, OrderRepository, RepoError, UnitOfWork};

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(not(feature = "memory"))]
const DEFAULT_DATABASE_URL: &str = "sqlite://storefront.db";

/// The backing store selected at startup.
#[derive(Clone, Debug)]
pub enum Repo {
    #[cfg(feature = "memory")]
    Memory(memory::InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteRepo),
}

pub async fn build_repo(url: Option<&str>) -> anyhow::Result<Repo> {
    Repo::build_repo(url).await
}

impl Repo {
    /// A database URL selects SQLite when that backend is compiled in. Without
    /// one the in-memory store is used, or the default SQLite file otherwise.
    pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Self> {
        match database_url {
            #[cfg(feature = "sqlite")]
            Some(url) => {
                tracing::info!(url, "using sqlite store");
                Ok(Repo::Sqlite(sqlite::SqliteRepo::new(url).await?))
            }
            #[cfg(not(feature = "sqlite"))]
            Some(url) => {
                tracing::warn!(url, "sqlite support not compiled in, using in-memory store");
                Ok(Self::memory())
            }
            None => Self::fallback().await,
        }
    }

    #[cfg(feature = "memory")]
    fn memory() -> Self {
        Repo::Memory(memory::InMemoryRepo::new())
    }

    #[cfg(feature = "memory")]
    async fn fallback() -> anyhow::Result<Self> {
        tracing::info!("using in-memory store");
        Ok(Self::memory())
    }

    #[cfg(not(feature = "memory"))]
    async fn fallback() -> anyhow::Result<Self> {
        tracing::info!(url = DEFAULT_DATABASE_URL, "using sqlite store");
        Ok(Repo::Sqlite(sqlite::SqliteRepo::new(DEFAULT_DATABASE_URL).await?))
    }
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "memory")]
            Repo::Memory($inner) => $call,
            #[cfg(feature = "sqlite")]
            Repo::Sqlite($inner) => $call,
        }
    };
}

#[async_trait]
impl CatalogRepository for Repo {
    async fn create_category(&self, category: NewCategory) -> Result<Category, RepoError> {
        dispatch!(self, r => r.create_category(category).await)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        dispatch!(self, r => r.list_categories().await)
    }

    async fn create_size(&self, size: NewSize) -> Result<Size, RepoError> {
        dispatch!(self, r => r.create_size(size).await)
    }

    async fn list_sizes(&self) -> Result<Vec<Size>, RepoError> {
        dispatch!(self, r => r.list_sizes().await)
    }

    async fn create_lookup(&self, kind: LookupKind, name: String) -> Result<Lookup, RepoError> {
        dispatch!(self, r => r.create_lookup(kind, name).await)
    }

    async fn list_lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>, RepoError> {
        dispatch!(self, r => r.list_lookups(kind).await)
    }

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<ProductDetail, RepoError> {
        dispatch!(self, r => r.create_product(product, now).await)
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>, RepoError> {
        dispatch!(self, r => r.get_product(id).await)
    }

    async fn find_visible_product(&self, id: i64) -> Result<Option<ProductDetail>, RepoError> {
        dispatch!(self, r => r.find_visible_product(id).await)
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<ProductDetail>, RepoError> {
        dispatch!(self, r => r.list_products(query).await)
    }

    async fn update_product(
        &self,
        id: i64,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>, RepoError> {
        dispatch!(self, r => r.update_product(id, patch, now).await)
    }

    async fn soft_delete_product(&self, id: i64, now: DateTime<Utc>) -> Result<bool, RepoError> {
        dispatch!(self, r => r.soft_delete_product(id, now).await)
    }
}

#[async_trait]
impl OrderRepository for Repo {
    async fn find_pending_order(&self, identity: &AnonymousId) -> Result<Option<Order>, RepoError> {
        dispatch!(self, r => r.find_pending_order(identity).await)
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, RepoError> {
        dispatch!(self, r => r.get_order(id).await)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError> {
        dispatch!(self, r => r.begin().await)
    }
}
