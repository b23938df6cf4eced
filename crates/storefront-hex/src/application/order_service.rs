use chrono::Utc;
use rust_decimal::Decimal;
use storefront_types::domain::identity::AnonymousId;
use storefront_types::domain::order::{
    AddToCart, NewOrderItem, OrderConfirmation, OrderStatus, OrderView,
};
use storefront_types::ports::{OrderRepository, RepoError};

use crate::errors::AppError;

pub const UNAVAILABLE: &str = "Insufficient stock or product not found.";
pub const ITEM_NOT_REMOVABLE: &str = "The order item was not found or cannot be removed.";
pub const NO_ACTIVE_ORDER: &str = "No active order found.";
pub const NOTHING_TO_CHECKOUT: &str = "No active order to checkout.";

/// Cart and checkout. Every mutation runs in one unit of work; returning early
/// drops it and discards the partial writes.
pub struct OrderService<R: OrderRepository> {
    repo: R,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn active_order(&self, identity: &AnonymousId) -> Result<OrderView, AppError> {
        match self.repo.find_pending_order(identity).await? {
            Some(order) => Ok(order.into()),
            None => Err(AppError::NotFound(NO_ACTIVE_ORDER.into())),
        }
    }

    #[tracing::instrument(
        skip(self, identity, request),
        fields(%identity, tracking_id = %request.tracking_id, quantity = request.quantity)
    )]
    pub async fn add_to_cart(
        &self,
        identity: &AnonymousId,
        request: AddToCart,
    ) -> Result<OrderConfirmation, AppError> {
        request.validate()?;
        let now = Utc::now();
        let mut uow = self.repo.begin().await?;

        let unit = match uow.find_unit(&request.tracking_id).await? {
            Some(unit) if unit.can_supply(request.quantity) => unit,
            _ => {
                tracing::warn!("sellable unit missing or short");
                return Err(AppError::Rejected(UNAVAILABLE.into()));
            }
        };

        let mut order = match uow.find_pending_order(identity).await? {
            Some(order) => order,
            None => uow.insert_order(identity, now).await?,
        };

        if let Some(line) = order.item_mut(&unit.tracking_id) {
            line.quantity = line.quantity.saturating_add(request.quantity);
            line.updated_at = now;
            uow.update_item_quantity(line.id, line.quantity, now).await?;
        } else {
            let line = uow
                .insert_item(
                    order.id,
                    NewOrderItem {
                        tracking_id: unit.tracking_id.clone(),
                        quantity: request.quantity,
                        unit_price: unit.price,
                        product_name: unit.product_name.clone(),
                    },
                    now,
                )
                .await?;
            order.items.push(line);
        }

        uow.adjust_stock(&unit.tracking_id, -i64::from(request.quantity), now)
            .await
            .map_err(|e| match e {
                RepoError::Constraint(_) => AppError::Rejected(UNAVAILABLE.into()),
                other => other.into(),
            })?;

        order.recompute_total();
        order.updated_at = now;
        uow.save_order(&order).await?;
        uow.commit().await?;

        tracing::info!(order_id = order.id, total = %order.total_price, "item added to cart");
        Ok(OrderConfirmation::for_order(
            &order,
            "Item added to cart successfully.",
        ))
    }

    #[tracing::instrument(skip(self, identity), fields(%identity))]
    pub async fn remove_item(&self, identity: &AnonymousId, item_id: i64) -> Result<(), AppError> {
        let now = Utc::now();
        let mut uow = self.repo.begin().await?;

        let removable = uow
            .find_order_of_item(item_id)
            .await?
            .filter(|o| o.is_owned_by(identity) && o.is_pending());
        let Some(mut order) = removable else {
            tracing::warn!("order item not removable");
            return Err(AppError::NotFound(ITEM_NOT_REMOVABLE.into()));
        };
        let Some(item) = order.remove_item(item_id) else {
            return Err(AppError::NotFound(ITEM_NOT_REMOVABLE.into()));
        };

        uow.adjust_stock(&item.tracking_id, i64::from(item.quantity), now)
            .await?;
        uow.delete_item(item.id).await?;

        if order.items.is_empty() {
            uow.delete_order(order.id).await?;
        } else {
            order.recompute_total();
            order.updated_at = now;
            uow.save_order(&order).await?;
        }
        uow.commit().await?;

        tracing::info!(order_id = order.id, "order item removed");
        Ok(())
    }

    /// Revalidates every line against current stock and moves the order to `Packed`.
    /// The total is recomputed from current product prices, not the line snapshots.
    #[tracing::instrument(skip(self, identity), fields(%identity))]
    pub async fn checkout(&self, identity: &AnonymousId) -> Result<OrderConfirmation, AppError> {
        let now = Utc::now();
        let mut uow = self.repo.begin().await?;

        let Some(mut order) = uow.find_pending_order(identity).await? else {
            tracing::warn!("checkout without a pending order");
            return Err(AppError::Rejected(NOTHING_TO_CHECKOUT.into()));
        };

        let mut total = Decimal::ZERO;
        for item in &order.items {
            match uow.find_unit(&item.tracking_id).await? {
                Some(unit) if unit.can_supply(item.quantity) => {
                    total += unit.price * Decimal::from(item.quantity);
                }
                _ => {
                    tracing::warn!(order_id = order.id, tracking_id = %item.tracking_id, "checkout short on stock");
                    return Err(AppError::Rejected(format!(
                        "Insufficient stock for {}. Please review your cart.",
                        item.product_name
                    )));
                }
            }
        }

        order.total_price = total;
        order.update_status(OrderStatus::Packed, now);
        uow.save_order(&order).await?;
        uow.commit().await?;

        tracing::info!(order_id = order.id, total = %order.total_price, "order checked out");
        Ok(OrderConfirmation::for_order(
            &order,
            "Your order has been placed successfully.",
        ))
    }

    /// Lookup by id alone; any caller may read any order.
    pub async fn get_order(&self, id: i64) -> Result<OrderView, AppError> {
        if id <= 0 {
            return Err(AppError::BadRequest("Invalid order ID.".into()));
        }
        match self.repo.get_order(id).await? {
            Some(order) => Ok(order.into()),
            None => Err(AppError::NotFound(format!("Order with ID '{id}' not found."))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_repo::memory::InMemoryRepo;
    use storefront_types::domain::catalog::{NewCategory, NewProduct, NewProductSize, NewSize};
    use storefront_types::ports::CatalogRepository;

    async fn product(repo: &InMemoryRepo, name: &str, stock: u32) -> String {
        let category = repo
            .create_category(NewCategory {
                name: format!("{name} category"),
                parent_id: None,
                image_url: None,
            })
            .await
            .unwrap();
        let size = repo
            .create_size(NewSize {
                size_code: 1,
                name: "One".into(),
            })
            .await
            .unwrap();
        let detail = repo
            .create_product(
                NewProduct {
                    name: name.into(),
                    description: None,
                    price: Decimal::new(1000, 2),
                    category_id: category.id,
                    color_id: None,
                    material_id: None,
                    brand_id: None,
                    main_image_url: None,
                    sizes: vec![NewProductSize {
                        size_id: size.id,
                        stock_quantity: stock,
                    }],
                    other_image_urls: vec![],
                    attributes: vec![],
                },
                Utc::now(),
            )
            .await
            .unwrap();
        detail.sizes[0].tracking_id.clone()
    }

    fn add(tracking_id: &str, quantity: u32) -> AddToCart {
        AddToCart {
            tracking_id: tracking_id.into(),
            quantity,
        }
    }

    #[tokio::test]
    async fn add_rejects_invalid_input_and_unknown_units() {
        let svc = OrderService::new(InMemoryRepo::new());
        let me = AnonymousId::generate();
        assert!(matches!(
            svc.add_to_cart(&me, add("", 1)).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            svc.add_to_cart(&me, add("XX-1-1", 0)).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            svc.add_to_cart(&me, add("XX-1-1", 1)).await,
            Err(AppError::Rejected(m)) if m == UNAVAILABLE
        ));
        assert!(matches!(svc.active_order(&me).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn remove_requires_ownership() {
        let repo = InMemoryRepo::new();
        let tracking_id = product(&repo, "Sneaker", 5).await;
        let svc = OrderService::new(repo);
        let owner = AnonymousId::generate();
        svc.add_to_cart(&owner, add(&tracking_id, 1)).await.unwrap();
        let item_id = svc.active_order(&owner).await.unwrap().items[0].id;

        let stranger = AnonymousId::generate();
        assert!(matches!(
            svc.remove_item(&stranger, item_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.remove_item(&owner, item_id + 100).await,
            Err(AppError::NotFound(_))
        ));
        svc.remove_item(&owner, item_id).await.unwrap();
    }

    #[tokio::test]
    async fn checkout_without_cart_is_rejected() {
        let svc = OrderService::new(InMemoryRepo::new());
        let res = svc.checkout(&AnonymousId::generate()).await;
        assert!(matches!(res, Err(AppError::Rejected(m)) if m == NOTHING_TO_CHECKOUT));
    }

    #[tokio::test]
    async fn checked_out_order_is_no_longer_active_or_removable() {
        let repo = InMemoryRepo::new();
        let tracking_id = product(&repo, "Sneaker", 10).await;
        let svc = OrderService::new(repo);
        let me = AnonymousId::generate();
        svc.add_to_cart(&me, add(&tracking_id, 2)).await.unwrap();
        let view = svc.active_order(&me).await.unwrap();

        let confirmation = svc.checkout(&me).await.unwrap();
        assert_eq!(confirmation.status, OrderStatus::Packed);
        assert_eq!(confirmation.total_price, Decimal::new(2000, 2));

        assert!(matches!(svc.active_order(&me).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            svc.remove_item(&me, view.items[0].id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(
            svc.get_order(view.order_id).await.unwrap().status,
            OrderStatus::Packed
        );

        // A new add opens a fresh pending order.
        let next = svc.add_to_cart(&me, add(&tracking_id, 1)).await.unwrap();
        assert_ne!(next.order_id, view.order_id);
    }

    #[tokio::test]
    async fn soft_deleted_product_still_checks_out_on_stock() {
        let repo = InMemoryRepo::new();
        let tracking_id = product(&repo, "Sneaker", 10).await;
        let svc = OrderService::new(repo.clone());
        let me = AnonymousId::generate();
        svc.add_to_cart(&me, add(&tracking_id, 1)).await.unwrap();

        let product_id = repo.list_products(&Default::default()).await.unwrap()[0].id;
        assert!(repo.soft_delete_product(product_id, Utc::now()).await.unwrap());

        let placed = svc.checkout(&me).await.unwrap();
        assert_eq!(placed.status, OrderStatus::Packed);
        assert_eq!(placed.total_price, Decimal::new(1000, 2));
        let stored = repo.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(stored.total_stock_quantity, 9);
    }

    #[tokio::test]
    async fn get_order_validates_id() {
        let svc = OrderService::new(InMemoryRepo::new());
        assert!(matches!(svc.get_order(0).await, Err(AppError::BadRequest(_))));
        assert!(matches!(svc.get_order(5).await, Err(AppError::NotFound(_))));
    }
}
