use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use storefront_types::domain::catalog::{
    AttributeValue, Category, Lookup, LookupKind, NewCategory, NewProduct, NewSize, Product,
    ProductDetail, ProductImage, ProductPatch, ProductQuery, Size, SizeStock,
};
use storefront_types::domain::identity::AnonymousId;
use storefront_types::domain::inventory::{tracking_id_for, ProductSize, SellableUnit};
use storefront_types::domain::order::{NewOrderItem, Order, OrderItem, OrderStatus};
use storefront_types::ports::{
    CatalogRepository, InventoryLedger, OrderLedger, OrderRepository, RepoError, UnitOfWork,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-local store. A unit of work holds the lock for its whole lifetime and
/// edits a private copy that replaces the shared state on commit.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRepo {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
struct StoredImage {
    product_id: i64,
    image: ProductImage,
}

#[derive(Debug, Clone)]
struct StoredAttribute {
    product_id: i64,
    attribute_id: i64,
    value: String,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sequences: HashMap<&'static str, i64>,
    categories: BTreeMap<i64, Category>,
    sizes: BTreeMap<i64, Size>,
    lookups: HashMap<LookupKind, BTreeMap<i64, Lookup>>,
    products: BTreeMap<i64, Product>,
    product_sizes: BTreeMap<i64, ProductSize>,
    images: Vec<StoredImage>,
    attributes: Vec<StoredAttribute>,
    orders: BTreeMap<i64, Order>,
    items: BTreeMap<i64, OrderItem>,
}

fn constraint(msg: impl Into<String>) -> RepoError {
    RepoError::Constraint(msg.into())
}

impl MemoryState {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }

    fn lookup_exists(&self, kind: LookupKind, id: Option<i64>) -> bool {
        id.map_or(true, |id| {
            self.lookups
                .get(&kind)
                .is_some_and(|table| table.contains_key(&id))
        })
    }

    fn lookup_name(&self, kind: LookupKind, id: Option<i64>) -> Option<String> {
        let id = id?;
        self.lookups.get(&kind)?.get(&id).map(|l| l.name.clone())
    }

    fn check_product_refs(
        &self,
        category_id: i64,
        color_id: Option<i64>,
        material_id: Option<i64>,
        brand_id: Option<i64>,
    ) -> Result<(), RepoError> {
        if !self.categories.contains_key(&category_id) {
            return Err(constraint(format!("unknown category {category_id}")));
        }
        if !self.lookup_exists(LookupKind::Color, color_id)
            || !self.lookup_exists(LookupKind::Material, material_id)
            || !self.lookup_exists(LookupKind::Brand, brand_id)
        {
            return Err(constraint("unknown color, material or brand"));
        }
        Ok(())
    }

    fn product_detail(&self, product: &Product) -> ProductDetail {
        let sizes = self
            .product_sizes
            .values()
            .filter(|ps| ps.product_id == product.id)
            .map(|ps| SizeStock {
                tracking_id: ps.tracking_id.clone(),
                size_name: self
                    .sizes
                    .get(&ps.size_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
                stock_quantity: ps.stock_quantity,
            })
            .collect();
        let other_images = self
            .images
            .iter()
            .filter(|i| i.product_id == product.id)
            .map(|i| i.image.clone())
            .collect();
        let attributes = self
            .attributes
            .iter()
            .filter(|a| a.product_id == product.id)
            .map(|a| AttributeValue {
                attribute_name: self
                    .lookup_name(LookupKind::Attribute, Some(a.attribute_id))
                    .unwrap_or_default(),
                value: a.value.clone(),
            })
            .collect();

        ProductDetail {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            main_image_url: product.main_image_url.clone(),
            total_stock_quantity: product.total_stock_quantity,
            is_active: product.is_active,
            is_hot: product.is_hot,
            category_name: self.categories.get(&product.category_id).map(|c| c.name.clone()),
            brand_name: self.lookup_name(LookupKind::Brand, product.brand_id),
            color_name: self.lookup_name(LookupKind::Color, product.color_id),
            material_name: self.lookup_name(LookupKind::Material, product.material_id),
            sizes,
            other_images,
            attributes,
            created_at: product.created_at,
        }
    }

    fn create_product(
        &mut self,
        new: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<ProductDetail, RepoError> {
        self.check_product_refs(new.category_id, new.color_id, new.material_id, new.brand_id)?;
        if let Some(size) = new.sizes.iter().find(|s| !self.sizes.contains_key(&s.size_id)) {
            return Err(constraint(format!("unknown size {}", size.size_id)));
        }
        if let Some(attr) = new
            .attributes
            .iter()
            .find(|a| !self.lookup_exists(LookupKind::Attribute, Some(a.attribute_id)))
        {
            return Err(constraint(format!("unknown attribute {}", attr.attribute_id)));
        }

        let id = self.next_id("products");
        let total_stock_quantity = new.total_stock();
        for size in &new.sizes {
            let tracking_id = tracking_id_for(&new.name, id, size.size_id);
            if self.product_sizes.values().any(|ps| ps.tracking_id == tracking_id) {
                return Err(constraint(format!("duplicate tracking id {tracking_id}")));
            }
            let size_row = self.next_id("product_sizes");
            self.product_sizes.insert(
                size_row,
                ProductSize {
                    id: size_row,
                    tracking_id,
                    product_id: id,
                    size_id: size.size_id,
                    stock_quantity: size.stock_quantity,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        for url in new.other_image_urls {
            let image_id = self.next_id("product_images");
            self.images.push(StoredImage {
                product_id: id,
                image: ProductImage {
                    id: image_id,
                    image_url: url,
                },
            });
        }
        for attr in new.attributes {
            self.attributes.push(StoredAttribute {
                product_id: id,
                attribute_id: attr.attribute_id,
                value: attr.value,
            });
        }

        let product = Product {
            id,
            name: new.name,
            description: new.description,
            price: new.price,
            category_id: new.category_id,
            color_id: new.color_id,
            material_id: new.material_id,
            brand_id: new.brand_id,
            main_image_url: new.main_image_url,
            total_stock_quantity,
            is_active: true,
            is_hot: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        let detail = self.product_detail(&product);
        self.products.insert(id, product);
        Ok(detail)
    }

    fn find_unit(&self, tracking_id: &str) -> Option<SellableUnit> {
        let size = self
            .product_sizes
            .values()
            .find(|ps| ps.tracking_id == tracking_id)?;
        let product = self.products.get(&size.product_id)?;
        Some(SellableUnit {
            tracking_id: size.tracking_id.clone(),
            product_id: product.id,
            product_name: product.name.clone(),
            price: product.price,
            stock_quantity: size.stock_quantity,
        })
    }

    fn adjust_stock(
        &mut self,
        tracking_id: &str,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<SellableUnit, RepoError> {
        let size = self
            .product_sizes
            .values_mut()
            .find(|ps| ps.tracking_id == tracking_id)
            .ok_or_else(|| constraint(format!("unknown tracking id {tracking_id}")))?;
        let next = i64::from(size.stock_quantity) + delta;
        size.stock_quantity = u32::try_from(next)
            .map_err(|_| constraint(format!("stock for {tracking_id} would become {next}")))?;
        size.updated_at = now;
        let product_id = size.product_id;

        let total: u32 = self
            .product_sizes
            .values()
            .filter(|ps| ps.product_id == product_id)
            .map(|ps| ps.stock_quantity)
            .sum();
        if let Some(product) = self.products.get_mut(&product_id) {
            product.total_stock_quantity = total;
        }

        self.find_unit(tracking_id)
            .ok_or_else(|| constraint(format!("unknown tracking id {tracking_id}")))
    }

    fn assemble_order(&self, order_id: i64) -> Option<Order> {
        let mut order = self.orders.get(&order_id)?.clone();
        order.items = self
            .items
            .values()
            .filter(|it| it.order_id == order_id)
            .map(|it| {
                let mut it = it.clone();
                if let Some(unit) = self.find_unit(&it.tracking_id) {
                    it.product_name = unit.product_name;
                }
                it
            })
            .collect();
        Some(order)
    }

    fn pending_order(&self, identity: &AnonymousId) -> Option<Order> {
        let id = self
            .orders
            .values()
            .find(|o| o.is_pending() && o.is_owned_by(identity))?
            .id;
        self.assemble_order(id)
    }

    fn insert_order(
        &mut self,
        identity: &AnonymousId,
        now: DateTime<Utc>,
    ) -> Result<Order, RepoError> {
        if self
            .orders
            .values()
            .any(|o| o.is_pending() && o.is_owned_by(identity))
        {
            return Err(constraint(format!("{identity} already has a pending order")));
        }
        let id = self.next_id("orders");
        let order = Order {
            id,
            order_date: now,
            anonymous_id: identity.clone(),
            total_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        };
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    fn insert_item(
        &mut self,
        order_id: i64,
        item: NewOrderItem,
        now: DateTime<Utc>,
    ) -> Result<OrderItem, RepoError> {
        if !self.orders.contains_key(&order_id) {
            return Err(constraint(format!("unknown order {order_id}")));
        }
        if self.find_unit(&item.tracking_id).is_none() {
            return Err(constraint(format!("unknown tracking id {}", item.tracking_id)));
        }
        if item.quantity == 0 {
            return Err(constraint("order item quantity must be positive"));
        }
        let id = self.next_id("order_items");
        let row = OrderItem {
            id,
            order_id,
            tracking_id: item.tracking_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            product_name: item.product_name,
            created_at: now,
            updated_at: now,
        };
        self.items.insert(id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepo {
    async fn create_category(&self, category: NewCategory) -> Result<Category, RepoError> {
        let mut state = self.state.lock().await;
        if let Some(parent) = category.parent_id {
            if !state.categories.contains_key(&parent) {
                return Err(constraint(format!("unknown parent category {parent}")));
            }
        }
        let id = state.next_id("categories");
        let row = Category {
            id,
            name: category.name,
            parent_id: category.parent_id,
            image_url: category.image_url,
        };
        state.categories.insert(id, row.clone());
        Ok(row)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        Ok(self.state.lock().await.categories.values().cloned().collect())
    }

    async fn create_size(&self, size: NewSize) -> Result<Size, RepoError> {
        let mut state = self.state.lock().await;
        let id = state.next_id("sizes");
        let row = Size {
            id,
            size_code: size.size_code,
            name: size.name,
        };
        state.sizes.insert(id, row.clone());
        Ok(row)
    }

    async fn list_sizes(&self) -> Result<Vec<Size>, RepoError> {
        Ok(self.state.lock().await.sizes.values().cloned().collect())
    }

    async fn create_lookup(&self, kind: LookupKind, name: String) -> Result<Lookup, RepoError> {
        let mut state = self.state.lock().await;
        let id = state.next_id(kind.plural());
        let row = Lookup { id, name };
        state.lookups.entry(kind).or_default().insert(id, row.clone());
        Ok(row)
    }

    async fn list_lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .lookups
            .get(&kind)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<ProductDetail, RepoError> {
        let mut state = self.state.lock().await;
        // Validate against a copy so a late failure leaves nothing behind.
        let mut working = state.clone();
        let detail = working.create_product(product, now)?;
        *state = working;
        Ok(detail)
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>, RepoError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn find_visible_product(&self, id: i64) -> Result<Option<ProductDetail>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .get(&id)
            .filter(|p| p.is_visible())
            .map(|p| state.product_detail(p)))
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<ProductDetail>, RepoError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Product> = state
            .products
            .values()
            .filter(|p| query.matches(p))
            .collect();
        matching.sort_by(|a, b| query.sort.compare(a, b));
        let offset = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(query.page.size as usize)
            .map(|p| state.product_detail(p))
            .collect())
    }

    async fn update_product(
        &self,
        id: i64,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>, RepoError> {
        let mut state = self.state.lock().await;
        let Some(mut product) = state.products.get(&id).cloned() else {
            return Ok(None);
        };
        product.apply_patch(patch, now);
        state.check_product_refs(
            product.category_id,
            product.color_id,
            product.material_id,
            product.brand_id,
        )?;
        state.products.insert(id, product.clone());
        Ok(Some(product))
    }

    async fn soft_delete_product(&self, id: i64, now: DateTime<Utc>) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        match state.products.get_mut(&id) {
            Some(p) => {
                p.is_deleted = true;
                p.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepo {
    async fn find_pending_order(&self, identity: &AnonymousId) -> Result<Option<Order>, RepoError> {
        Ok(self.state.lock().await.pending_order(identity))
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, RepoError> {
        Ok(self.state.lock().await.assemble_order(id))
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl InventoryLedger for MemoryUnitOfWork {
    async fn find_unit(&mut self, tracking_id: &str) -> Result<Option<SellableUnit>, RepoError> {
        Ok(self.working.find_unit(tracking_id))
    }

    async fn adjust_stock(
        &mut self,
        tracking_id: &str,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<SellableUnit, RepoError> {
        self.working.adjust_stock(tracking_id, delta, now)
    }
}

#[async_trait]
impl OrderLedger for MemoryUnitOfWork {
    async fn find_pending_order(
        &mut self,
        identity: &AnonymousId,
    ) -> Result<Option<Order>, RepoError> {
        Ok(self.working.pending_order(identity))
    }

    async fn find_order_of_item(&mut self, item_id: i64) -> Result<Option<Order>, RepoError> {
        let Some(order_id) = self.working.items.get(&item_id).map(|it| it.order_id) else {
            return Ok(None);
        };
        Ok(self.working.assemble_order(order_id))
    }

    async fn insert_order(
        &mut self,
        identity: &AnonymousId,
        now: DateTime<Utc>,
    ) -> Result<Order, RepoError> {
        self.working.insert_order(identity, now)
    }

    async fn insert_item(
        &mut self,
        order_id: i64,
        item: NewOrderItem,
        now: DateTime<Utc>,
    ) -> Result<OrderItem, RepoError> {
        self.working.insert_item(order_id, item, now)
    }

    async fn update_item_quantity(
        &mut self,
        item_id: i64,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        if quantity == 0 {
            return Err(constraint("order item quantity must be positive"));
        }
        let item = self
            .working
            .items
            .get_mut(&item_id)
            .ok_or_else(|| constraint(format!("unknown order item {item_id}")))?;
        item.quantity = quantity;
        item.updated_at = now;
        Ok(())
    }

    async fn delete_item(&mut self, item_id: i64) -> Result<bool, RepoError> {
        Ok(self.working.items.remove(&item_id).is_some())
    }

    async fn save_order(&mut self, order: &Order) -> Result<(), RepoError> {
        if order.is_pending()
            && self
                .working
                .orders
                .values()
                .any(|o| o.id != order.id && o.is_pending() && o.is_owned_by(&order.anonymous_id))
        {
            return Err(constraint(format!(
                "{} already has a pending order",
                order.anonymous_id
            )));
        }
        let row = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| constraint(format!("unknown order {}", order.id)))?;
        row.total_price = order.total_price;
        row.status = order.status;
        row.updated_at = order.updated_at;
        Ok(())
    }

    async fn delete_order(&mut self, order_id: i64) -> Result<bool, RepoError> {
        self.working.items.retain(|_, it| it.order_id != order_id);
        Ok(self.working.orders.remove(&order_id).is_some())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
