#![cfg(feature = "sqlite")]

use chrono::Utc;
use rust_decimal::Decimal;
use std::path::PathBuf;
use storefront_repo::sqlite::SqliteRepo;
use storefront_types::domain::catalog::{
    LookupKind, NewCategory, NewProduct, NewProductAttribute, NewProductSize, NewSize, Page,
    ProductFilter, ProductPatch, ProductQuery, ProductSort,
};
use storefront_types::domain::identity::AnonymousId;
use storefront_types::domain::order::{NewOrderItem, OrderStatus};
use storefront_types::ports::{CatalogRepository, OrderRepository, RepoError};
use uuid::Uuid;

fn temp_db_url() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut path = PathBuf::from(dir.path());
    path.push(format!("storefront-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());
    (dir, url)
}

async fn seed_refs(repo: &SqliteRepo) -> (i64, i64) {
    let category = repo
        .create_category(NewCategory {
            name: "Shoes".into(),
            parent_id: None,
            image_url: None,
        })
        .await
        .unwrap();
    let size = repo
        .create_size(NewSize {
            size_code: 42,
            name: "42".into(),
        })
        .await
        .unwrap();
    (category.id, size.id)
}

fn new_product(name: &str, price: Decimal, category_id: i64, size_id: i64, stock: u32) -> NewProduct {
    NewProduct {
        name: name.into(),
        description: Some("A product".into()),
        price,
        category_id,
        color_id: None,
        material_id: None,
        brand_id: None,
        main_image_url: None,
        sizes: vec![NewProductSize {
            size_id,
            stock_quantity: stock,
        }],
        other_image_urls: vec![],
        attributes: vec![],
    }
}

#[tokio::test]
async fn sqlite_repo_catalog_flow() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let (category_id, size_id) = seed_refs(&repo).await;
    let brand = repo.create_lookup(LookupKind::Brand, "Acme".into()).await.unwrap();
    let attribute = repo
        .create_lookup(LookupKind::Attribute, "Sole".into())
        .await
        .unwrap();
    assert_eq!(repo.list_lookups(LookupKind::Brand).await.unwrap(), vec![brand.clone()]);
    assert!(repo.list_lookups(LookupKind::Color).await.unwrap().is_empty());

    let mut input = new_product("Sneaker", Decimal::new(4999, 2), category_id, size_id, 5);
    input.brand_id = Some(brand.id);
    input.other_image_urls = vec!["https://img/1.png".into(), "https://img/2.png".into()];
    input.attributes = vec![NewProductAttribute {
        attribute_id: attribute.id,
        value: "Rubber".into(),
    }];
    let created = repo.create_product(input, Utc::now()).await.unwrap();

    assert_eq!(created.price, Decimal::new(4999, 2));
    assert_eq!(created.total_stock_quantity, 5);
    assert_eq!(created.brand_name.as_deref(), Some("Acme"));
    assert_eq!(created.sizes[0].tracking_id, format!("SN-{}-{}", created.id, size_id));
    assert_eq!(created.other_images.len(), 2);
    assert_eq!(created.attributes[0].value, "Rubber");

    let fetched = repo.find_visible_product(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);

    let patch = ProductPatch {
        id: created.id,
        price: Some(Decimal::new(3999, 2)),
        is_hot: Some(true),
        ..ProductPatch::default()
    };
    let updated = repo
        .update_product(created.id, &patch, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.price, Decimal::new(3999, 2));

    let featured = repo
        .list_products(&ProductQuery::featured(Page::default()))
        .await
        .unwrap();
    assert_eq!(featured.len(), 1);

    assert!(repo.soft_delete_product(created.id, Utc::now()).await.unwrap());
    assert!(repo.find_visible_product(created.id).await.unwrap().is_none());
    assert!(repo.list_products(&ProductQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_repo_rejects_unknown_references() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let (category_id, size_id) = seed_refs(&repo).await;

    let err = repo
        .create_product(new_product("Ghost", Decimal::ONE, 999, size_id, 1), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Constraint(_)));

    let err = repo
        .create_product(new_product("Ghost", Decimal::ONE, category_id, 999, 1), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Constraint(_)));
    assert!(repo.get_product(1).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_repo_filters_sorts_and_pages() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let (category_id, size_id) = seed_refs(&repo).await;

    let now = Utc::now();
    for (name, cents, stock) in [("Boot", 9000, 3), ("Axe", 1000, 3), ("Empty", 500, 0), ("Cap", 2000, 1)] {
        repo.create_product(new_product(name, Decimal::new(cents, 2), category_id, size_id, stock), now)
            .await
            .unwrap();
    }

    let by_name = repo.list_products(&ProductQuery::default()).await.unwrap();
    let names: Vec<_> = by_name.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Axe", "Boot", "Cap"]);

    let by_price = repo
        .list_products(&ProductQuery::listing(
            ProductFilter::parse(&format!("{category_id}")),
            ProductSort::PriceDesc,
            Page::new(0, 2),
        ))
        .await
        .unwrap();
    let names: Vec<_> = by_price.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Boot", "Cap"]);

    let other_category = repo
        .list_products(&ProductQuery::listing(
            ProductFilter::parse(&format!("{}", category_id + 1)),
            ProductSort::default(),
            Page::default(),
        ))
        .await
        .unwrap();
    assert!(other_category.is_empty());
}

#[tokio::test]
async fn sqlite_unit_of_work_commits_and_rolls_back() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let (category_id, size_id) = seed_refs(&repo).await;
    let product = repo
        .create_product(new_product("Sneaker", Decimal::new(1250, 2), category_id, size_id, 4), Utc::now())
        .await
        .unwrap();
    let tracking_id = product.sizes[0].tracking_id.clone();
    let identity = AnonymousId::generate();

    {
        let mut uow = repo.begin().await.unwrap();
        uow.insert_order(&identity, Utc::now()).await.unwrap();
        uow.adjust_stock(&tracking_id, -2, Utc::now()).await.unwrap();
    }
    assert!(repo.find_pending_order(&identity).await.unwrap().is_none());
    assert_eq!(
        repo.get_product(product.id).await.unwrap().unwrap().total_stock_quantity,
        4
    );

    let mut uow = repo.begin().await.unwrap();
    let mut order = uow.insert_order(&identity, Utc::now()).await.unwrap();
    let unit = uow.find_unit(&tracking_id).await.unwrap().unwrap();
    let item = uow
        .insert_item(
            order.id,
            NewOrderItem {
                tracking_id: tracking_id.clone(),
                quantity: 3,
                unit_price: unit.price,
                product_name: unit.product_name,
            },
            Utc::now(),
        )
        .await
        .unwrap();
    uow.adjust_stock(&tracking_id, -3, Utc::now()).await.unwrap();
    let err = uow.adjust_stock(&tracking_id, -2, Utc::now()).await.unwrap_err();
    assert!(matches!(err, RepoError::Constraint(_)));
    order.items.push(item);
    order.recompute_total();
    uow.save_order(&order).await.unwrap();
    uow.commit().await.unwrap();

    let pending = repo.find_pending_order(&identity).await.unwrap().unwrap();
    assert_eq!(pending.status, OrderStatus::Pending);
    assert_eq!(pending.total_price, Decimal::new(3750, 2));
    assert_eq!(pending.items[0].product_name, "Sneaker");
    assert_eq!(
        repo.get_product(product.id).await.unwrap().unwrap().total_stock_quantity,
        1
    );

    let mut uow = repo.begin().await.unwrap();
    let found = uow.find_order_of_item(pending.items[0].id).await.unwrap().unwrap();
    assert_eq!(found.id, pending.id);
    assert!(uow.delete_order(found.id).await.unwrap());
    uow.commit().await.unwrap();
    assert!(repo.get_order(pending.id).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_repo_allows_one_pending_order_per_identity() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let identity = AnonymousId::generate();

    let mut uow = repo.begin().await.unwrap();
    let mut first = uow.insert_order(&identity, Utc::now()).await.unwrap();
    let err = uow.insert_order(&identity, Utc::now()).await.unwrap_err();
    assert!(matches!(err, RepoError::Constraint(_)));

    first.update_status(OrderStatus::Packed, Utc::now());
    uow.save_order(&first).await.unwrap();
    uow.insert_order(&identity, Utc::now()).await.unwrap();
    uow.commit().await.unwrap();
}
