use chrono::Utc;
use storefront_types::domain::catalog::{
    Category, Lookup, LookupKind, NewCategory, NewLookup, NewProduct, NewSize, Page,
    ProductDetail, ProductFilter, ProductPatch, ProductQuery, ProductSort, Size,
};
use storefront_types::ports::{CatalogRepository, RepoError};

use crate::errors::AppError;

pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

fn product_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Product with ID '{id}' not found or is inactive."))
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn get_product(&self, id: i64) -> Result<ProductDetail, AppError> {
        if id <= 0 {
            return Err(AppError::BadRequest("Invalid product ID.".into()));
        }
        self.repo
            .find_visible_product(id)
            .await?
            .ok_or_else(|| product_not_found(id))
    }

    /// `filter` is the positional `categoryId-colorId-materialId-brandId` segment.
    pub async fn list_products(
        &self,
        filter: Option<&str>,
        sort_id: Option<i32>,
        page_index: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<Vec<ProductDetail>, AppError> {
        let query = ProductQuery::listing(
            filter.map(ProductFilter::parse).unwrap_or_default(),
            ProductSort::from_sort_id(sort_id),
            page(page_index, page_size),
        );
        Ok(self.repo.list_products(&query).await?)
    }

    pub async fn featured_products(
        &self,
        page_index: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<Vec<ProductDetail>, AppError> {
        let query = ProductQuery::featured(page(page_index, page_size));
        Ok(self.repo.list_products(&query).await?)
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<ProductDetail, AppError> {
        product.validate()?;
        let created = self
            .repo
            .create_product(product, Utc::now())
            .await
            .map_err(AppError::from_write)?;
        tracing::info!(product_id = created.id, name = %created.name, "product created");
        Ok(created)
    }

    pub async fn update_product(&self, id: i64, patch: ProductPatch) -> Result<(), AppError> {
        if patch.id != id {
            return Err(AppError::BadRequest(
                "Product ID in URL does not match ID in the body.".into(),
            ));
        }
        patch.validate()?;

        match self.repo.update_product(id, &patch, Utc::now()).await {
            Ok(Some(_)) => {
                tracing::info!(product_id = id, "product updated");
                Ok(())
            }
            Ok(None) => {
                tracing::warn!(product_id = id, "update of missing product");
                Err(product_not_found(id))
            }
            Err(RepoError::Conflict(msg)) => {
                // A concurrent delete shows up as a conflict; only a live row is an error.
                if self.repo.get_product(id).await?.is_none() {
                    Err(product_not_found(id))
                } else {
                    Err(AppError::Internal(anyhow::anyhow!(msg)))
                }
            }
            Err(e) => Err(AppError::from_write(e)),
        }
    }

    pub async fn delete_product(&self, id: i64) -> Result<(), AppError> {
        if self.repo.soft_delete_product(id, Utc::now()).await? {
            tracing::info!(product_id = id, "product soft-deleted");
            Ok(())
        } else {
            tracing::warn!(product_id = id, "delete of missing product");
            Err(product_not_found(id))
        }
    }

    pub async fn create_category(&self, category: NewCategory) -> Result<Category, AppError> {
        category.validate()?;
        self.repo
            .create_category(category)
            .await
            .map_err(AppError::from_write)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.repo.list_categories().await?)
    }

    pub async fn create_size(&self, size: NewSize) -> Result<Size, AppError> {
        size.validate()?;
        self.repo.create_size(size).await.map_err(AppError::from_write)
    }

    pub async fn list_sizes(&self) -> Result<Vec<Size>, AppError> {
        Ok(self.repo.list_sizes().await?)
    }

    pub async fn create_lookup(&self, kind: LookupKind, entry: NewLookup) -> Result<Lookup, AppError> {
        entry.validate()?;
        self.repo
            .create_lookup(kind, entry.name)
            .await
            .map_err(AppError::from_write)
    }

    pub async fn list_lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>, AppError> {
        Ok(self.repo.list_lookups(kind).await?)
    }
}

fn page(index: Option<i64>, size: Option<i64>) -> Page {
    Page::new(index.unwrap_or(0), size.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use storefront_repo::memory::InMemoryRepo;
    use storefront_types::domain::catalog::{NewProductSize, Product};

    async fn seeded() -> (CatalogService<InMemoryRepo>, NewProduct) {
        let svc = CatalogService::new(InMemoryRepo::new());
        let category = svc
            .create_category(NewCategory {
                name: "Shoes".into(),
                parent_id: None,
                image_url: None,
            })
            .await
            .unwrap();
        let size = svc
            .create_size(NewSize {
                size_code: 40,
                name: "40".into(),
            })
            .await
            .unwrap();
        let product = NewProduct {
            name: "Runner".into(),
            description: None,
            price: Decimal::new(2500, 2),
            category_id: category.id,
            color_id: None,
            material_id: None,
            brand_id: None,
            main_image_url: None,
            sizes: vec![NewProductSize {
                size_id: size.id,
                stock_quantity: 2,
            }],
            other_image_urls: vec![],
            attributes: vec![],
        };
        (svc, product)
    }

    #[tokio::test]
    async fn create_get_update_delete_product() {
        let (svc, input) = seeded().await;
        let created = svc.create_product(input).await.unwrap();
        let got = svc.get_product(created.id).await.unwrap();
        assert_eq!(got.name, "Runner");

        let patch = ProductPatch {
            id: created.id,
            name: Some("Runner II".into()),
            ..ProductPatch::default()
        };
        svc.update_product(created.id, patch).await.unwrap();
        assert_eq!(svc.get_product(created.id).await.unwrap().name, "Runner II");

        svc.delete_product(created.id).await.unwrap();
        assert!(matches!(
            svc.get_product(created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn validation_and_reference_errors_are_bad_requests() {
        let (svc, input) = seeded().await;
        let mut bad_price = input.clone();
        bad_price.price = Decimal::new(1, 3);
        assert!(matches!(
            svc.create_product(bad_price).await,
            Err(AppError::BadRequest(_))
        ));

        let mut unknown_category = input;
        unknown_category.category_id = 77;
        assert!(matches!(
            svc.create_product(unknown_category).await,
            Err(AppError::BadRequest(_))
        ));

        assert!(matches!(svc.get_product(0).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn update_checks_id_and_existence() {
        let (svc, _) = seeded().await;
        let patch = ProductPatch {
            id: 2,
            ..ProductPatch::default()
        };
        assert!(matches!(
            svc.update_product(1, patch.clone()).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            svc.update_product(2, patch).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(svc.delete_product(9).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn listing_normalizes_paging_and_parses_filter() {
        let (svc, input) = seeded().await;
        let category_id = input.category_id;
        svc.create_product(input).await.unwrap();

        let all = svc
            .list_products(None, Some(99), Some(-1), Some(150))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);

        let filtered = svc
            .list_products(Some(&format!("{}-0-0-0-runner", category_id + 1)), None, None, None)
            .await
            .unwrap();
        assert!(filtered.is_empty());

        assert!(svc.featured_products(None, None).await.unwrap().is_empty());
    }

    /// Every update loses the optimistic check; `survivor` is what a re-read finds.
    struct ConflictingRepo {
        survivor: Option<Product>,
    }

    fn unused<T>() -> Result<T, RepoError> {
        Err(RepoError::DbError("not used by this test".into()))
    }

    #[async_trait::async_trait]
    impl CatalogRepository for ConflictingRepo {
        async fn create_category(&self, _: NewCategory) -> Result<Category, RepoError> {
            unused()
        }
        async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
            unused()
        }
        async fn create_size(&self, _: NewSize) -> Result<Size, RepoError> {
            unused()
        }
        async fn list_sizes(&self) -> Result<Vec<Size>, RepoError> {
            unused()
        }
        async fn create_lookup(&self, _: LookupKind, _: String) -> Result<Lookup, RepoError> {
            unused()
        }
        async fn list_lookups(&self, _: LookupKind) -> Result<Vec<Lookup>, RepoError> {
            unused()
        }
        async fn create_product(
            &self,
            _: NewProduct,
            _: chrono::DateTime<Utc>,
        ) -> Result<ProductDetail, RepoError> {
            unused()
        }
        async fn get_product(&self, _: i64) -> Result<Option<Product>, RepoError> {
            Ok(self.survivor.clone())
        }
        async fn find_visible_product(&self, _: i64) -> Result<Option<ProductDetail>, RepoError> {
            unused()
        }
        async fn list_products(&self, _: &ProductQuery) -> Result<Vec<ProductDetail>, RepoError> {
            unused()
        }
        async fn update_product(
            &self,
            id: i64,
            _: &ProductPatch,
            _: chrono::DateTime<Utc>,
        ) -> Result<Option<Product>, RepoError> {
            Err(RepoError::Conflict(format!("product {id} changed")))
        }
        async fn soft_delete_product(
            &self,
            _: i64,
            _: chrono::DateTime<Utc>,
        ) -> Result<bool, RepoError> {
            unused()
        }
    }

    fn stored_product(id: i64) -> Product {
        let now = Utc::now();
        Product {
            id,
            name: "Runner".into(),
            description: None,
            price: Decimal::new(2500, 2),
            category_id: 1,
            color_id: None,
            material_id: None,
            brand_id: None,
            main_image_url: None,
            total_stock_quantity: 2,
            is_active: true,
            is_hot: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn rename(id: i64) -> ProductPatch {
        ProductPatch {
            id,
            name: Some("Runner II".into()),
            ..ProductPatch::default()
        }
    }

    #[tokio::test]
    async fn conflicting_update_of_vanished_product_is_not_found() {
        let svc = CatalogService::new(ConflictingRepo { survivor: None });
        let res = svc.update_product(3, rename(3)).await;
        assert!(matches!(res, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn conflicting_update_of_live_product_is_internal() {
        let svc = CatalogService::new(ConflictingRepo {
            survivor: Some(stored_product(3)),
        });
        let res = svc.update_product(3, rename(3)).await;
        assert!(matches!(res, Err(AppError::Internal(_))));
    }
}
