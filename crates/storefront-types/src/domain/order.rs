use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identity::AnonymousId;
use super::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Dispute,
}

impl OrderStatus {
    /// Persisted integer code.
    pub fn code(self) -> i64 {
        match self {
            OrderStatus::Pending => 1,
            OrderStatus::Processing => 2,
            OrderStatus::Packed => 3,
            OrderStatus::Shipped => 4,
            OrderStatus::Delivered => 5,
            OrderStatus::Cancelled => 6,
            OrderStatus::Returned => 7,
            OrderStatus::Dispute => 8,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => OrderStatus::Pending,
            2 => OrderStatus::Processing,
            3 => OrderStatus::Packed,
            4 => OrderStatus::Shipped,
            5 => OrderStatus::Delivered,
            6 => OrderStatus::Cancelled,
            7 => OrderStatus::Returned,
            8 => OrderStatus::Dispute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub tracking_id: String,
    pub quantity: u32,
    /// Product price captured when the line was created.
    pub unit_price: Decimal,
    pub product_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub tracking_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub product_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub order_date: DateTime<Utc>,
    pub anonymous_id: AnonymousId,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn is_owned_by(&self, identity: &AnonymousId) -> bool {
        &self.anonymous_id == identity
    }

    pub fn item_mut(&mut self, tracking_id: &str) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|it| it.tracking_id == tracking_id)
    }

    pub fn remove_item(&mut self, item_id: i64) -> Option<OrderItem> {
        let pos = self.items.iter().position(|it| it.id == item_id)?;
        Some(self.items.remove(pos))
    }

    /// Sum of line subtotals using each line's price snapshot.
    pub fn recompute_total(&mut self) {
        self.total_price = self.items.iter().map(OrderItem::subtotal).sum();
    }

    pub fn update_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

/// Body of `POST /api/order/add-to-cart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub tracking_id: String,
    pub quantity: u32,
}

impl AddToCart {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tracking_id.trim().is_empty() {
            return Err(ValidationError::new("trackingId is required"));
        }
        if self.quantity == 0 {
            return Err(ValidationError::new("quantity must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub id: i64,
    pub tracking_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub product_name: String,
}

/// Order as returned over the wire; the owning identity is never exposed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: i64,
    pub order_date: DateTime<Utc>,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub items: Vec<OrderItemView>,
}

impl From<Order> for OrderView {
    fn from(o: Order) -> Self {
        Self {
            order_id: o.id,
            order_date: o.order_date,
            total_price: o.total_price,
            status: o.status,
            items: o
                .items
                .into_iter()
                .map(|it| OrderItemView {
                    id: it.id,
                    tracking_id: it.tracking_id,
                    quantity: it.quantity,
                    unit_price: it.unit_price,
                    product_name: it.product_name,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: i64,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub message: String,
}

impl OrderConfirmation {
    pub fn for_order(order: &Order, message: impl Into<String>) -> Self {
        Self {
            order_id: order.id,
            total_price: order.total_price,
            status: order.status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, tracking_id: &str, quantity: u32, cents: i64) -> OrderItem {
        let now = Utc::now();
        OrderItem {
            id,
            order_id: 1,
            tracking_id: tracking_id.into(),
            quantity,
            unit_price: Decimal::new(cents, 2),
            product_name: "Widget".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn order(items: Vec<OrderItem>) -> Order {
        let now = Utc::now();
        Order {
            id: 1,
            order_date: now,
            anonymous_id: AnonymousId::parse("alice").unwrap(),
            total_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            items,
        }
    }

    #[test]
    fn recompute_total_sums_snapshots() {
        let mut o = order(vec![item(1, "A-1-1", 2, 500), item(2, "B-2-1", 1, 250)]);
        o.recompute_total();
        assert_eq!(o.total_price, Decimal::new(1250, 2));

        o.remove_item(1);
        o.recompute_total();
        assert_eq!(o.total_price, Decimal::new(250, 2));
    }

    #[test]
    fn status_codes_round_trip_through_storage_form() {
        for code in 1..=8 {
            let status = OrderStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert!(OrderStatus::from_code(0).is_none());
        assert!(OrderStatus::from_code(9).is_none());
    }

    #[test]
    fn update_status_mutates_timestamp() {
        let mut o = order(vec![]);
        let later = o.updated_at + chrono::Duration::minutes(5);
        o.update_status(OrderStatus::Packed, later);
        assert_eq!(o.status, OrderStatus::Packed);
        assert_eq!(o.updated_at, later);
        assert!(!o.is_pending());
    }

    #[test]
    fn add_to_cart_validation() {
        let ok = AddToCart {
            tracking_id: "SN-1-1".into(),
            quantity: 1,
        };
        assert!(ok.validate().is_ok());
        let zero = AddToCart {
            quantity: 0,
            ..ok.clone()
        };
        assert!(zero.validate().is_err());
        let blank = AddToCart {
            tracking_id: "".into(),
            ..ok
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn view_hides_identity() {
        let mut o = order(vec![item(7, "A-1-1", 3, 1000)]);
        o.recompute_total();
        let json = serde_json::to_value(OrderView::from(o)).unwrap();
        assert!(json.get("anonymousId").is_none());
        assert_eq!(json["orderId"], 1);
        assert_eq!(json["items"][0]["trackingId"], "A-1-1");
        assert_eq!(json["status"], "Pending");
    }
}
