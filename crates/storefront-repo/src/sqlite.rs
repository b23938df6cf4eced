use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use storefront_types::domain::catalog::{
    AttributeValue, Category, Lookup, LookupKind, NewCategory, NewProduct, NewSize, Product,
    ProductDetail, ProductImage, ProductPatch, ProductQuery, ProductSort, Size, SizeStock,
};
use storefront_types::domain::identity::AnonymousId;
use storefront_types::domain::inventory::{tracking_id_for, SellableUnit};
use storefront_types::domain::order::{NewOrderItem, Order, OrderItem, OrderStatus};
use storefront_types::ports::{
    CatalogRepository, InventoryLedger, OrderLedger, OrderRepository, RepoError, UnitOfWork,
};

#[derive(Clone, Debug)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.description, p.price_cents, p.category_id, \
     p.color_id, p.material_id, p.brand_id, p.main_image_url, p.total_stock_quantity, \
     p.is_active, p.is_hot, p.is_deleted, p.created_at, p.updated_at, \
     c.name AS category_name, b.name AS brand_name, co.name AS color_name, m.name AS material_name \
     FROM products p \
     LEFT JOIN categories c ON c.id = p.category_id \
     LEFT JOIN brands b ON b.id = p.brand_id \
     LEFT JOIN colors co ON co.id = p.color_id \
     LEFT JOIN materials m ON m.id = p.material_id";

const VISIBLE: &str = "p.is_active = 1 AND p.is_deleted = 0";

const UNIT_SELECT: &str = "SELECT ps.tracking_id, ps.product_id, p.name AS product_name, \
     p.price_cents, ps.stock_quantity \
     FROM product_sizes ps JOIN products p ON p.id = ps.product_id \
     WHERE ps.tracking_id = ?";

const ORDER_SELECT: &str = "SELECT id, anonymous_user_id, order_date, total_price_cents, status, \
     created_at, updated_at FROM orders";

fn db_err(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() {
            return RepoError::Constraint(db.message().to_string());
        }
    }
    RepoError::DbError(e.to_string())
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| RepoError::DbError(e.to_string()))?
        .with_timezone(&Utc))
}

fn to_cents(amount: Decimal) -> Result<i64, RepoError> {
    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| RepoError::DbError(format!("amount {amount} out of range")))
}

fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn to_u32(value: i64, column: &str) -> Result<u32, RepoError> {
    u32::try_from(value).map_err(|_| RepoError::DbError(format!("{column} out of range: {value}")))
}

#[derive(FromRow)]
struct DbProduct {
    id: i64,
    name: String,
    description: Option<String>,
    price_cents: i64,
    category_id: i64,
    color_id: Option<i64>,
    material_id: Option<i64>,
    brand_id: Option<i64>,
    main_image_url: Option<String>,
    total_stock_quantity: i64,
    is_active: bool,
    is_hot: bool,
    is_deleted: bool,
    created_at: String,
    updated_at: String,
    category_name: Option<String>,
    brand_name: Option<String>,
    color_name: Option<String>,
    material_name: Option<String>,
}

impl DbProduct {
    fn to_product(&self) -> Result<Product, RepoError> {
        Ok(Product {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: from_cents(self.price_cents),
            category_id: self.category_id,
            color_id: self.color_id,
            material_id: self.material_id,
            brand_id: self.brand_id,
            main_image_url: self.main_image_url.clone(),
            total_stock_quantity: to_u32(self.total_stock_quantity, "total_stock_quantity")?,
            is_active: self.is_active,
            is_hot: self.is_hot,
            is_deleted: self.is_deleted,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbUnit {
    tracking_id: String,
    product_id: i64,
    product_name: String,
    price_cents: i64,
    stock_quantity: i64,
}

impl DbUnit {
    fn into_unit(self) -> Result<SellableUnit, RepoError> {
        Ok(SellableUnit {
            tracking_id: self.tracking_id,
            product_id: self.product_id,
            product_name: self.product_name,
            price: from_cents(self.price_cents),
            stock_quantity: to_u32(self.stock_quantity, "stock_quantity")?,
        })
    }
}

#[derive(FromRow)]
struct DbOrder {
    id: i64,
    anonymous_user_id: String,
    order_date: String,
    total_price_cents: i64,
    status: i64,
    created_at: String,
    updated_at: String,
}

impl DbOrder {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepoError> {
        let status = OrderStatus::from_code(self.status)
            .ok_or_else(|| RepoError::DbError(format!("unknown order status {}", self.status)))?;
        let anonymous_id = AnonymousId::parse(self.anonymous_user_id)
            .map_err(|e| RepoError::DbError(e.to_string()))?;
        Ok(Order {
            id: self.id,
            order_date: parse_ts(&self.order_date)?,
            anonymous_id,
            total_price: from_cents(self.total_price_cents),
            status,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            items,
        })
    }
}

#[derive(FromRow)]
struct DbOrderItem {
    id: i64,
    order_id: i64,
    tracking_id: String,
    quantity: i64,
    unit_price_cents: i64,
    product_name: String,
    created_at: String,
    updated_at: String,
}

impl DbOrderItem {
    fn into_item(self) -> Result<OrderItem, RepoError> {
        Ok(OrderItem {
            id: self.id,
            order_id: self.order_id,
            tracking_id: self.tracking_id,
            quantity: to_u32(self.quantity, "quantity")?,
            unit_price: from_cents(self.unit_price_cents),
            product_name: self.product_name,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

fn order_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => "p.created_at DESC, p.id DESC",
        ProductSort::PriceDesc => "p.price_cents DESC, p.id ASC",
        ProductSort::PriceAsc => "p.price_cents ASC, p.id ASC",
        ProductSort::NameAsc => "p.name ASC, p.id ASC",
        ProductSort::NameDesc => "p.name DESC, p.id ASC",
    }
}

async fn product_detail(
    conn: &mut SqliteConnection,
    row: DbProduct,
) -> Result<ProductDetail, RepoError> {
    let product = row.to_product()?;

    let sizes: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT ps.tracking_id, s.name, ps.stock_quantity FROM product_sizes ps \
         JOIN sizes s ON s.id = ps.size_id WHERE ps.product_id = ? ORDER BY ps.id",
    )
    .bind(product.id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    let images: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, image_url FROM product_images WHERE product_id = ? ORDER BY id")
            .bind(product.id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;

    let attributes: Vec<(String, String)> = sqlx::query_as(
        "SELECT a.name, pa.value FROM product_attributes pa \
         JOIN attributes a ON a.id = pa.attribute_id WHERE pa.product_id = ? ORDER BY pa.id",
    )
    .bind(product.id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(ProductDetail {
        id: product.id,
        name: product.name,
        description: product.description,
        price: product.price,
        main_image_url: product.main_image_url,
        total_stock_quantity: product.total_stock_quantity,
        is_active: product.is_active,
        is_hot: product.is_hot,
        category_name: row.category_name,
        brand_name: row.brand_name,
        color_name: row.color_name,
        material_name: row.material_name,
        sizes: sizes
            .into_iter()
            .map(|(tracking_id, size_name, stock)| {
                Ok(SizeStock {
                    tracking_id,
                    size_name,
                    stock_quantity: to_u32(stock, "stock_quantity")?,
                })
            })
            .collect::<Result<_, RepoError>>()?,
        other_images: images
            .into_iter()
            .map(|(id, image_url)| ProductImage { id, image_url })
            .collect(),
        attributes: attributes
            .into_iter()
            .map(|(attribute_name, value)| AttributeValue {
                attribute_name,
                value,
            })
            .collect(),
        created_at: product.created_at,
    })
}

async fn fetch_product_row(
    conn: &mut SqliteConnection,
    id: i64,
    visible_only: bool,
) -> Result<Option<DbProduct>, RepoError> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(PRODUCT_SELECT);
    qb.push(" WHERE p.id = ").push_bind(id);
    if visible_only {
        qb.push(" AND ").push(VISIBLE);
    }
    qb.build_query_as::<DbProduct>()
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)
}

async fn find_unit(
    conn: &mut SqliteConnection,
    tracking_id: &str,
) -> Result<Option<SellableUnit>, RepoError> {
    let row: Option<DbUnit> = sqlx::query_as(UNIT_SELECT)
        .bind(tracking_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.map(DbUnit::into_unit).transpose()
}

async fn load_items(conn: &mut SqliteConnection, order_id: i64) -> Result<Vec<OrderItem>, RepoError> {
    // Names come from the current product; the stored copy only covers deleted sizes.
    let rows: Vec<DbOrderItem> = sqlx::query_as(
        "SELECT oi.id, oi.order_id, oi.tracking_id, oi.quantity, oi.unit_price_cents, \
         COALESCE(p.name, oi.product_name) AS product_name, oi.created_at, oi.updated_at \
         FROM order_items oi \
         LEFT JOIN product_sizes ps ON ps.tracking_id = oi.tracking_id \
         LEFT JOIN products p ON p.id = ps.product_id \
         WHERE oi.order_id = ? ORDER BY oi.id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    rows.into_iter().map(DbOrderItem::into_item).collect()
}

async fn load_order(conn: &mut SqliteConnection, row: Option<DbOrder>) -> Result<Option<Order>, RepoError> {
    match row {
        Some(row) => {
            let items = load_items(conn, row.id).await?;
            Ok(Some(row.into_order(items)?))
        }
        None => Ok(None),
    }
}

async fn order_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Order>, RepoError> {
    let row: Option<DbOrder> = sqlx::query_as(&format!("{ORDER_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    load_order(conn, row).await
}

async fn pending_order(
    conn: &mut SqliteConnection,
    identity: &AnonymousId,
) -> Result<Option<Order>, RepoError> {
    let row: Option<DbOrder> =
        sqlx::query_as(&format!("{ORDER_SELECT} WHERE anonymous_user_id = ? AND status = ?"))
            .bind(identity.as_str())
            .bind(OrderStatus::Pending.code())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;
    load_order(conn, row).await
}

impl SqliteRepo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // A single connection serializes units of work; SQLite has one writer anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let ddl = include_str!("../migrations/0001_create_store.sql");
        sqlx::query(ddl).execute(&pool).await?;

        tracing::debug!(url = database_url, "sqlite store ready");
        Ok(Self { pool })
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>, RepoError> {
        self.pool.acquire().await.map_err(db_err)
    }
}

#[async_trait]
impl CatalogRepository for SqliteRepo {
    async fn create_category(&self, category: NewCategory) -> Result<Category, RepoError> {
        let res = sqlx::query("INSERT INTO categories (name, parent_id, image_url) VALUES (?, ?, ?)")
            .bind(&category.name)
            .bind(category.parent_id)
            .bind(&category.image_url)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(Category {
            id: res.last_insert_rowid(),
            name: category.name,
            parent_id: category.parent_id,
            image_url: category.image_url,
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        let rows: Vec<(i64, String, Option<i64>, Option<String>)> =
            sqlx::query_as("SELECT id, name, parent_id, image_url FROM categories ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, name, parent_id, image_url)| Category {
                id,
                name,
                parent_id,
                image_url,
            })
            .collect())
    }

    async fn create_size(&self, size: NewSize) -> Result<Size, RepoError> {
        let res = sqlx::query("INSERT INTO sizes (size_code, name) VALUES (?, ?)")
            .bind(size.size_code)
            .bind(&size.name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(Size {
            id: res.last_insert_rowid(),
            size_code: size.size_code,
            name: size.name,
        })
    }

    async fn list_sizes(&self) -> Result<Vec<Size>, RepoError> {
        let rows: Vec<(i64, i32, String)> =
            sqlx::query_as("SELECT id, size_code, name FROM sizes ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, size_code, name)| Size {
                id,
                size_code,
                name,
            })
            .collect())
    }

    async fn create_lookup(&self, kind: LookupKind, name: String) -> Result<Lookup, RepoError> {
        let res = sqlx::query(&format!("INSERT INTO {} (name) VALUES (?)", kind.plural()))
            .bind(&name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(Lookup {
            id: res.last_insert_rowid(),
            name,
        })
    }

    async fn list_lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>, RepoError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as(&format!("SELECT id, name FROM {} ORDER BY id", kind.plural()))
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| Lookup { id, name })
            .collect())
    }

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<ProductDetail, RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let stamp = ts(now);

        let res = sqlx::query(
            "INSERT INTO products (name, description, price_cents, category_id, color_id, \
             material_id, brand_id, main_image_url, total_stock_quantity, is_active, is_hot, \
             is_deleted, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0, 0, ?, ?)",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(to_cents(product.price)?)
        .bind(product.category_id)
        .bind(product.color_id)
        .bind(product.material_id)
        .bind(product.brand_id)
        .bind(&product.main_image_url)
        .bind(i64::from(product.total_stock()))
        .bind(&stamp)
        .bind(&stamp)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let id = res.last_insert_rowid();

        for size in &product.sizes {
            sqlx::query(
                "INSERT INTO product_sizes (tracking_id, product_id, size_id, stock_quantity, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(tracking_id_for(&product.name, id, size.size_id))
            .bind(id)
            .bind(size.size_id)
            .bind(i64::from(size.stock_quantity))
            .bind(&stamp)
            .bind(&stamp)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        for url in &product.other_image_urls {
            sqlx::query("INSERT INTO product_images (product_id, image_url) VALUES (?, ?)")
                .bind(id)
                .bind(url)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        for attr in &product.attributes {
            sqlx::query(
                "INSERT INTO product_attributes (product_id, attribute_id, value) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(attr.attribute_id)
            .bind(&attr.value)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let row = fetch_product_row(&mut tx, id, false)
            .await?
            .ok_or_else(|| RepoError::DbError(format!("product {id} vanished after insert")))?;
        let detail = product_detail(&mut tx, row).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(detail)
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>, RepoError> {
        let mut conn = self.acquire().await?;
        fetch_product_row(&mut conn, id, false)
            .await?
            .map(|row| row.to_product())
            .transpose()
    }

    async fn find_visible_product(&self, id: i64) -> Result<Option<ProductDetail>, RepoError> {
        let mut conn = self.acquire().await?;
        match fetch_product_row(&mut conn, id, true).await? {
            Some(row) => Ok(Some(product_detail(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<ProductDetail>, RepoError> {
        let mut conn = self.acquire().await?;
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(PRODUCT_SELECT);
        qb.push(" WHERE ")
            .push(VISIBLE)
            .push(" AND p.total_stock_quantity > 0");
        if query.featured_only {
            qb.push(" AND p.is_hot = 1");
        }
        let filter = &query.filter;
        if let Some(id) = filter.category_id {
            qb.push(" AND p.category_id = ").push_bind(id);
        }
        if let Some(id) = filter.color_id {
            qb.push(" AND p.color_id = ").push_bind(id);
        }
        if let Some(id) = filter.material_id {
            qb.push(" AND p.material_id = ").push_bind(id);
        }
        if let Some(id) = filter.brand_id {
            qb.push(" AND p.brand_id = ").push_bind(id);
        }
        qb.push(" ORDER BY ").push(order_clause(query.sort));
        qb.push(" LIMIT ")
            .push_bind(i64::from(query.page.size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));

        let rows: Vec<DbProduct> = qb
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;

        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            details.push(product_detail(&mut conn, row).await?);
        }
        Ok(details)
    }

    async fn update_product(
        &self,
        id: i64,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>, RepoError> {
        let mut conn = self.acquire().await?;
        let Some(row) = fetch_product_row(&mut conn, id, false).await? else {
            return Ok(None);
        };
        let read_stamp = row.updated_at.clone();
        let mut product = row.to_product()?;
        product.apply_patch(patch, now);

        let res = sqlx::query(
            "UPDATE products SET name = ?, description = ?, price_cents = ?, category_id = ?, \
             color_id = ?, material_id = ?, brand_id = ?, main_image_url = ?, is_active = ?, \
             is_hot = ?, updated_at = ? WHERE id = ? AND updated_at = ?",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(to_cents(product.price)?)
        .bind(product.category_id)
        .bind(product.color_id)
        .bind(product.material_id)
        .bind(product.brand_id)
        .bind(&product.main_image_url)
        .bind(product.is_active)
        .bind(product.is_hot)
        .bind(ts(now))
        .bind(id)
        .bind(&read_stamp)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(RepoError::Conflict(format!("product {id} changed while updating")));
        }
        Ok(Some(product))
    }

    async fn soft_delete_product(&self, id: i64, now: DateTime<Utc>) -> Result<bool, RepoError> {
        let res = sqlx::query("UPDATE products SET is_deleted = 1, updated_at = ? WHERE id = ?")
            .bind(ts(now))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn find_pending_order(&self, identity: &AnonymousId) -> Result<Option<Order>, RepoError> {
        let mut conn = self.acquire().await?;
        pending_order(&mut conn, identity).await
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, RepoError> {
        let mut conn = self.acquire().await?;
        order_by_id(&mut conn, id).await
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(SqliteUnitOfWork { tx }))
    }
}

pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl InventoryLedger for SqliteUnitOfWork {
    async fn find_unit(&mut self, tracking_id: &str) -> Result<Option<SellableUnit>, RepoError> {
        find_unit(&mut self.tx, tracking_id).await
    }

    async fn adjust_stock(
        &mut self,
        tracking_id: &str,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<SellableUnit, RepoError> {
        let res = sqlx::query(
            "UPDATE product_sizes SET stock_quantity = stock_quantity + ?, updated_at = ? \
             WHERE tracking_id = ?",
        )
        .bind(delta)
        .bind(ts(now))
        .bind(tracking_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(RepoError::Constraint(format!("unknown tracking id {tracking_id}")));
        }

        sqlx::query(
            "UPDATE products SET total_stock_quantity = \
             (SELECT COALESCE(SUM(stock_quantity), 0) FROM product_sizes WHERE product_id = products.id) \
             WHERE id = (SELECT product_id FROM product_sizes WHERE tracking_id = ?)",
        )
        .bind(tracking_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        find_unit(&mut self.tx, tracking_id)
            .await?
            .ok_or_else(|| RepoError::Constraint(format!("unknown tracking id {tracking_id}")))
    }
}

#[async_trait]
impl OrderLedger for SqliteUnitOfWork {
    async fn find_pending_order(
        &mut self,
        identity: &AnonymousId,
    ) -> Result<Option<Order>, RepoError> {
        pending_order(&mut self.tx, identity).await
    }

    async fn find_order_of_item(&mut self, item_id: i64) -> Result<Option<Order>, RepoError> {
        let order_id: Option<i64> =
            sqlx::query_scalar("SELECT order_id FROM order_items WHERE id = ?")
                .bind(item_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db_err)?;
        match order_id {
            Some(order_id) => order_by_id(&mut self.tx, order_id).await,
            None => Ok(None),
        }
    }

    async fn insert_order(
        &mut self,
        identity: &AnonymousId,
        now: DateTime<Utc>,
    ) -> Result<Order, RepoError> {
        let stamp = ts(now);
        let res = sqlx::query(
            "INSERT INTO orders (anonymous_user_id, order_date, total_price_cents, status, \
             created_at, updated_at) VALUES (?, ?, 0, ?, ?, ?)",
        )
        .bind(identity.as_str())
        .bind(&stamp)
        .bind(OrderStatus::Pending.code())
        .bind(&stamp)
        .bind(&stamp)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(Order {
            id: res.last_insert_rowid(),
            order_date: now,
            anonymous_id: identity.clone(),
            total_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        })
    }

    async fn insert_item(
        &mut self,
        order_id: i64,
        item: NewOrderItem,
        now: DateTime<Utc>,
    ) -> Result<OrderItem, RepoError> {
        let stamp = ts(now);
        let res = sqlx::query(
            "INSERT INTO order_items (order_id, tracking_id, quantity, unit_price_cents, \
             product_name, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(&item.tracking_id)
        .bind(i64::from(item.quantity))
        .bind(to_cents(item.unit_price)?)
        .bind(&item.product_name)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(OrderItem {
            id: res.last_insert_rowid(),
            order_id,
            tracking_id: item.tracking_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            product_name: item.product_name,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_item_quantity(
        &mut self,
        item_id: i64,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let res = sqlx::query("UPDATE order_items SET quantity = ?, updated_at = ? WHERE id = ?")
            .bind(i64::from(quantity))
            .bind(ts(now))
            .bind(item_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(RepoError::Constraint(format!("unknown order item {item_id}")));
        }
        Ok(())
    }

    async fn delete_item(&mut self, item_id: i64) -> Result<bool, RepoError> {
        let res = sqlx::query("DELETE FROM order_items WHERE id = ?")
            .bind(item_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn save_order(&mut self, order: &Order) -> Result<(), RepoError> {
        let res = sqlx::query(
            "UPDATE orders SET total_price_cents = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(to_cents(order.total_price)?)
        .bind(order.status.code())
        .bind(ts(order.updated_at))
        .bind(order.id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(RepoError::Constraint(format!("unknown order {}", order.id)));
        }
        Ok(())
    }

    async fn delete_order(&mut self, order_id: i64) -> Result<bool, RepoError> {
        let res = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(order_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(db_err)
    }
}
