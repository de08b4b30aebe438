//! Order aggregate: the order row and its frozen line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use showcase_core::{OrderId, OrderItemId, OrderStatus, ProductId, ValidationError};

use super::common::Pagination;

/// An order with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub comment: Option<String>,
    /// Amount quoted to the customer at checkout. Not recomputed from items.
    pub total_amount: Decimal,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item as it was when the order was placed.
///
/// `product_id` is cleared if the product is deleted later; name and price are
/// never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub engraving: Option<String>,
}

/// Checkout payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub comment: Option<String>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
}

/// One cart line.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub engraving: Option<String>,
}

impl NewOrder {
    /// Boundary validation run before the order reaches the repository.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the phone is blank, there are no items,
    /// or an item has a blank name, a quantity below 1 or a negative price.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.phone.trim().is_empty() {
            return Err(ValidationError::required("phone"));
        }
        if self.items.is_empty() {
            return Err(ValidationError::invalid("items", "order has no items"));
        }
        if self.total_amount.is_sign_negative() {
            return Err(ValidationError::invalid("total_amount", "must not be negative"));
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.product_name.trim().is_empty() {
                return Err(ValidationError::invalid(
                    "items",
                    format!("item {index} has no product name"),
                ));
            }
            if item.quantity < 1 {
                return Err(ValidationError::invalid(
                    "items",
                    format!("item {index} has quantity {}", item.quantity),
                ));
            }
            if item.price.is_sign_negative() {
                return Err(ValidationError::invalid(
                    "items",
                    format!("item {index} has a negative price"),
                ));
            }
        }
        Ok(())
    }

    /// Trim text fields and turn blank optionals into `None`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        self.customer_name = self.customer_name.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.email = clean(self.email);
        self.address = clean(self.address);
        self.comment = clean(self.comment);
        for item in &mut self.items {
            item.product_name = item.product_name.trim().to_string();
            item.engraving = clean(item.engraving.take());
        }
        self
    }
}

/// Listing filter for the admin order list, read from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderFilter {
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(self.page, self.per_page)
    }
}

/// Status change request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}
