use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::{OrderError, ValidationErrors};
use crate::models::{LineItem, Order};

// ============================================================================
// Request Payloads & Field Validation
// ============================================================================
//
// Bodies are decoded leniently (missing fields take their zero value) so that
// every problem is reported at once instead of failing on the first one.
//
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderPayload {
    pub order_id: String,
    pub user_id: String,
    pub line_items: Vec<LineItemPayload>,
    pub order_status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub shipped_at: String,
    pub delivered_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LineItemPayload {
    pub item_id: String,
    pub quantity: i64,
    pub price: f64,
}

impl OrderPayload {
    /// Validate a creation request. The id must be left empty; timestamps
    /// sent by the client are ignored.
    pub fn into_new_order(self) -> Result<Order, OrderError> {
        let mut ve = ValidationErrors::new();
        if !self.order_id.is_empty() {
            ve.add("order_id", "must be empty during creation");
        }
        self.check_fields(&mut ve);
        ve.into_result()?;

        Ok(self.build(String::new(), Utc::now()))
    }

    /// Validate a replacement for the order at `path_id`
    pub fn into_updated_order(self, path_id: &str) -> Result<Order, OrderError> {
        let mut ve = ValidationErrors::new();
        if self.order_id != path_id {
            ve.add("order_id", "does not match the existing order");
        }
        match self.created_at {
            None => ve.add("created_at", "cannot be empty"),
            Some(created_at) if created_at > Utc::now() => {
                ve.add("created_at", "cannot be in the future")
            }
            Some(_) => {}
        }
        self.check_fields(&mut ve);
        ve.into_result()?;

        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let order_id = self.order_id.clone();
        Ok(self.build(order_id, created_at))
    }

    fn check_fields(&self, ve: &mut ValidationErrors) {
        if self.user_id.trim().is_empty() {
            ve.add("user_id", "cannot be empty");
        }
        if self.line_items.is_empty() {
            ve.add("line_items", "cannot be empty");
        }
        if self.order_status.trim().is_empty() {
            ve.add("order_status", "cannot be empty");
        }
        for (i, item) in self.line_items.iter().enumerate() {
            if item.item_id.trim().is_empty() {
                ve.add(format!("line_items[{}].item_id", i), "cannot be empty");
            }
            if item.quantity <= 0 {
                ve.add(format!("line_items[{}].quantity", i), "must be greater than zero");
            }
            if !(item.price.is_finite() && item.price > 0.0) {
                ve.add(format!("line_items[{}].price", i), "must be greater than zero");
            }
        }
    }

    fn build(self, order_id: String, created_at: DateTime<Utc>) -> Order {
        let mut order = Order {
            order_id,
            user_id: self.user_id,
            line_items: self
                .line_items
                .into_iter()
                .map(|item| LineItem::new(item.item_id, item.quantity, item.price))
                .collect(),
            order_status: self.order_status,
            created_at,
            updated_at: created_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
        };
        order.fill_placeholders();
        order
    }
}
