use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

// ============================================================================
// Order Models
// ============================================================================

pub const SHIPPED_PLACEHOLDER: &str = "Will Be Shipped Soon";
pub const DELIVERED_PLACEHOLDER: &str = "Will Be Delivered Soon";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    pub line_items: Vec<LineItem>,
    pub order_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: String,
    pub delivered_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LineItem {
    pub item_id: String,
    pub quantity: i64,
    pub price: f64,
}

impl Order {
    /// Build an unsaved order. Id and timestamps are replaced by the service
    /// on insert.
    #[cfg(test)]
    pub fn new(
        user_id: impl Into<String>,
        line_items: Vec<LineItem>,
        order_status: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let mut order = Self {
            order_id: String::new(),
            user_id: user_id.into(),
            line_items,
            order_status: order_status.into(),
            created_at: now,
            updated_at: now,
            shipped_at: String::new(),
            delivered_at: String::new(),
        };
        order.fill_placeholders();
        order
    }

    /// Default the shipping fields when the caller left them blank
    pub fn fill_placeholders(&mut self) {
        if self.shipped_at.is_empty() {
            self.shipped_at = SHIPPED_PLACEHOLDER.to_string();
        }
        if self.delivered_at.is_empty() {
            self.delivered_at = DELIVERED_PLACEHOLDER.to_string();
        }
    }
}

impl LineItem {
    pub fn new(item_id: impl Into<String>, quantity: i64, price: f64) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
            price,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
