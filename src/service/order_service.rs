use std::sync::Arc;

use crate::context::OpContext;
use crate::errors::{OrderError, ValidationErrors};
use crate::models::Order;
use crate::storage::OrderStore;
use crate::utils::{current_time, generate_order_id};

// ============================================================================
// Order Service
// ============================================================================
//
// Owns identifier and timestamp assignment. Field validation happens before
// this layer is reached; order_status is never inspected.
//
// ============================================================================

#[derive(Clone)]
pub struct OrderService {
    store: Arc<OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self { store }
    }

    /// Assign a fresh id and timestamps, then create the record.
    /// A caller-supplied id is rejected.
    pub async fn insert(&self, ctx: &OpContext, mut order: Order) -> Result<Order, OrderError> {
        let mut ve = ValidationErrors::new();
        if !order.order_id.is_empty() {
            ve.add("order_id", "must be empty during creation");
        }
        ve.into_result()?;

        order.order_id = generate_order_id();
        let now = current_time();
        order.created_at = now;
        order.updated_at = now;
        order.fill_placeholders();

        self.store.insert(ctx, &order).await?;

        tracing::debug!(
            order_id = %order.order_id,
            user_id = %order.user_id,
            item_count = order.line_items.len(),
            "Order created"
        );
        Ok(order)
    }

    /// Refresh `updated_at` and replace the record. Presence is decided by the
    /// conditional write at commit time, so an order deleted concurrently
    /// yields `NotFound`.
    pub async fn update(&self, ctx: &OpContext, mut order: Order) -> Result<(), OrderError> {
        order.updated_at = current_time().max(order.created_at);
        order.fill_placeholders();

        match self.store.update(ctx, &order).await {
            Err(OrderError::NotFound(_)) => {
                tracing::debug!(order_id = %order.order_id, "Update target does not exist");
                Err(OrderError::not_found(&order.order_id))
            }
            other => other,
        }
    }

    pub async fn get(&self, ctx: &OpContext, order_id: &str) -> Result<Order, OrderError> {
        self.store.get(ctx, order_id).await
    }

    pub async fn delete(&self, ctx: &OpContext, order_id: &str) -> Result<(), OrderError> {
        self.store.delete(ctx, order_id).await
    }

    pub async fn exists(&self, ctx: &OpContext, order_id: &str) -> Result<bool, OrderError> {
        self.store.exists(ctx, order_id).await
    }

    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<Order>, OrderError> {
        self.store.list(ctx).await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
