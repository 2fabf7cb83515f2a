//! Orders - line items, the order status machine, and the order store.

mod store;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codes;
use crate::error::{LedgerError, LedgerResult, RecordKind};
use crate::store::Model;

pub use store::OrderStore;

/// A purchased product line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl OrderItem {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        quantity: u32,
    ) -> Self {
        OrderItem {
            product_id: product_id.into(),
            name: name.into(),
            price,
            quantity,
            category: String::new(),
            image: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Sum of `price * quantity` over the items.
pub fn calculate_order_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::line_total).sum()
}

fn validate_items(items: &[OrderItem]) -> LedgerResult<()> {
    if items.is_empty() {
        return Err(LedgerError::validation("order must contain at least one item"));
    }
    for item in items {
        if item.quantity == 0 {
            return Err(LedgerError::validation(format!(
                "item {} has zero quantity",
                item.product_id
            )));
        }
        if item.price.is_sign_negative() {
            return Err(LedgerError::validation(format!(
                "item {} has a negative price",
                item.product_id
            )));
        }
    }
    Ok(())
}

/// Order status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Returned,
    ];

    /// Statuses reachable in one step.
    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Processing, Cancelled],
            Processing => &[Shipped, Completed, Cancelled],
            Shipped => &[Delivered, Returned],
            Delivered => &[Completed, Returned],
            Completed => &[Refunded],
            Cancelled | Refunded | Returned => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Statuses an unpaid order may not enter.
    pub fn requires_payment(self) -> bool {
        matches!(
            self,
            OrderStatus::Processing
                | OrderStatus::Shipped
                | OrderStatus::Delivered
                | OrderStatus::Completed
        )
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for [`OrderStore::create`].
#[derive(Clone, Debug, Default)]
pub struct NewOrder {
    pub items: Vec<OrderItem>,
    pub shipping_address: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub user_id: String,
}

impl NewOrder {
    pub fn new(
        user_id: impl Into<String>,
        shipping_address: impl Into<String>,
        items: Vec<OrderItem>,
    ) -> Self {
        NewOrder {
            items,
            shipping_address: shipping_address.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A customer order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub is_paid: bool,
    pub payment_id: Option<String>,
    pub payment_reference_code: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub user_id: String,
    /// Set when the current `PROCESSING` status came from a recorded payment
    /// rather than an administrative transition.
    #[serde(default)]
    pub advanced_by_payment: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Order {
    /// Validate input and build a fresh `PENDING`, unpaid order.
    pub fn create(input: NewOrder) -> LedgerResult<Order> {
        validate_items(&input.items)?;
        if input.shipping_address.trim().is_empty() {
            return Err(LedgerError::validation("shipping address is required"));
        }
        if input.user_id.trim().is_empty() {
            return Err(LedgerError::validation("user id is required"));
        }

        let now = Utc::now();
        Ok(Order {
            id: codes::generate_order_id(),
            order_number: codes::generate_order_number(),
            total: calculate_order_total(&input.items),
            items: input.items,
            status: OrderStatus::Pending,
            is_paid: false,
            payment_id: None,
            payment_reference_code: None,
            payment_method: input.payment_method,
            shipping_address: input.shipping_address,
            notes: input.notes,
            user_id: input.user_id,
            advanced_by_payment: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Total recomputed from the items, ignoring the stored `total`.
    pub fn recalculated_total(&self) -> Decimal {
        calculate_order_total(&self.items)
    }

    /// Check and apply an administrative status change.
    ///
    /// Returns the previous status.
    pub fn transition_to(&mut self, next: OrderStatus) -> LedgerResult<OrderStatus> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                record: RecordKind::Order,
                id: self.id.clone(),
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        if next.requires_payment() && !self.is_paid {
            return Err(LedgerError::PaymentRequired {
                order_id: self.id.clone(),
                requested: next.as_str(),
            });
        }

        let previous = self.status;
        self.status = next;
        self.advanced_by_payment = false;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Mark paid by the given payment. `PENDING` orders advance to `PROCESSING`.
    ///
    /// Returns false when the order was already paid.
    pub fn apply_payment(&mut self, payment_id: &str, reference_code: &str) -> bool {
        if self.is_paid {
            return false;
        }
        self.is_paid = true;
        self.payment_id = Some(payment_id.to_string());
        self.payment_reference_code = Some(reference_code.to_string());
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::Processing;
            self.advanced_by_payment = true;
        }
        self.updated_at = Utc::now();
        true
    }

    /// Undo [`Order::apply_payment`]. Only a payment-driven `PROCESSING`
    /// goes back to `PENDING`; any other status is kept.
    ///
    /// Returns false when the order was not paid.
    pub fn revoke_payment(&mut self) -> bool {
        if !self.is_paid {
            return false;
        }
        self.is_paid = false;
        self.payment_id = None;
        self.payment_reference_code = None;
        if self.status == OrderStatus::Processing && self.advanced_by_payment {
            self.status = OrderStatus::Pending;
        }
        self.advanced_by_payment = false;
        self.updated_at = Utc::now();
        true
    }

    /// Replace the line items and recompute the total.
    pub fn replace_items(&mut self, items: Vec<OrderItem>) -> LedgerResult<()> {
        if self.status != OrderStatus::Pending || self.is_paid {
            return Err(LedgerError::Conflict(format!(
                "items of order {} are frozen once it is paid or past PENDING",
                self.id
            )));
        }
        validate_items(&items)?;
        self.total = calculate_order_total(&items);
        self.items = items;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Simple predicate filter for [`OrderStore::list`].
#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub user_id: Option<String>,
    pub is_paid: Option<bool>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn paid(mut self, is_paid: bool) -> Self {
        self.is_paid = Some(is_paid);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.as_deref().map_or(true, |id| order.user_id == id)
            && self.is_paid.map_or(true, |paid| order.is_paid == paid)
            && self.status.map_or(true, |status| order.status == status)
    }
}
