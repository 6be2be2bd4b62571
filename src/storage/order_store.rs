use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::try_join_all;

use super::backend::{Batch, BatchOutcome, Command, KvBackend};
use crate::context::OpContext;
use crate::errors::{OrderError, ValidationErrors};
use crate::metrics::Metrics;
use crate::models::Order;

// ============================================================================
// Order Record Store
// ============================================================================
//
// Key layout:
//   order:<order_id>   JSON-encoded Order, no expiry
//   orders             set of every live primary key
//
// Every mutation that touches both the record and the index is one guarded
// batch, so a record never exists without its index entry and the index
// never references a deleted record.
//
// ============================================================================

pub const ORDER_KEY_PREFIX: &str = "order";
pub const KEY_SEPARATOR: char = ':';
pub const ORDER_INDEX_KEY: &str = "orders";

pub fn order_key(order_id: &str) -> String {
    format!("{}{}{}", ORDER_KEY_PREFIX, KEY_SEPARATOR, order_id)
}

#[derive(Clone)]
pub struct OrderStore {
    backend: Arc<dyn KvBackend>,
    metrics: Option<Arc<Metrics>>,
}

impl OrderStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create-only-if-absent. The record write and the index add succeed or
    /// fail together; an existing key yields `Conflict`.
    pub async fn insert(&self, ctx: &OpContext, order: &Order) -> Result<(), OrderError> {
        self.observe(ctx, "insert", async {
            require_id(order)?;
            let key = order_key(&order.order_id);
            let batch = Batch::new()
                .push(Command::SetIfAbsent { key: key.clone(), value: encode(order)? })
                .push(Command::SetAdd { key: ORDER_INDEX_KEY.to_string(), member: key });

            match self.backend.execute(batch).await? {
                BatchOutcome::Applied => {
                    tracing::info!(order_id = %order.order_id, "Inserted order");
                    Ok(())
                }
                BatchOutcome::Aborted { at: 0 } => Err(OrderError::conflict(&order.order_id)),
                BatchOutcome::Aborted { at } => Err(unexpected_abort("insert", at)),
            }
        })
        .await
    }

    pub async fn get(&self, ctx: &OpContext, order_id: &str) -> Result<Order, OrderError> {
        self.observe(ctx, "get", async {
            match self.backend.get(&order_key(order_id)).await? {
                Some(raw) => decode(order_id, &raw),
                None => Err(OrderError::not_found(order_id)),
            }
        })
        .await
    }

    /// Update-only-if-present. Absence is reported by the conditional write
    /// itself, no separate existence check is made.
    pub async fn update(&self, ctx: &OpContext, order: &Order) -> Result<(), OrderError> {
        self.observe(ctx, "update", async {
            require_id(order)?;
            let batch = Batch::new().push(Command::SetIfPresent {
                key: order_key(&order.order_id),
                value: encode(order)?,
            });

            match self.backend.execute(batch).await? {
                BatchOutcome::Applied => {
                    tracing::info!(order_id = %order.order_id, "Updated order");
                    Ok(())
                }
                BatchOutcome::Aborted { .. } => Err(OrderError::not_found(&order.order_id)),
            }
        })
        .await
    }

    /// Remove the record and its index entry together; absence yields
    /// `NotFound` on every call.
    pub async fn delete(&self, ctx: &OpContext, order_id: &str) -> Result<(), OrderError> {
        self.observe(ctx, "delete", async {
            let key = order_key(order_id);
            let batch = Batch::new()
                .push(Command::DeleteExisting { key: key.clone() })
                .push(Command::SetRemove { key: ORDER_INDEX_KEY.to_string(), member: key });

            match self.backend.execute(batch).await? {
                BatchOutcome::Applied => {
                    tracing::info!(order_id = %order_id, "Deleted order");
                    Ok(())
                }
                BatchOutcome::Aborted { at: 0 } => Err(OrderError::not_found(order_id)),
                BatchOutcome::Aborted { at } => Err(unexpected_abort("delete", at)),
            }
        })
        .await
    }

    /// Advisory only: the answer may be stale by the time the caller acts on it
    pub async fn exists(&self, ctx: &OpContext, order_id: &str) -> Result<bool, OrderError> {
        self.observe(ctx, "exists", async {
            Ok::<_, OrderError>(self.backend.exists(&order_key(order_id)).await?)
        })
        .await
    }

    #[cfg(test)]
    pub async fn is_indexed(&self, ctx: &OpContext, order_id: &str) -> Result<bool, OrderError> {
        self.observe(ctx, "is_indexed", async {
            Ok::<_, OrderError>(self
                .backend
                .is_member(ORDER_INDEX_KEY, &order_key(order_id))
                .await?)
        })
        .await
    }

    /// Every live order, enumerated through the index and sorted by creation
    /// time. Members whose record disappeared between the two reads are
    /// skipped.
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<Order>, OrderError> {
        self.observe(ctx, "list", async {
            let members = self.backend.set_members(ORDER_INDEX_KEY).await?;

            let fetches = members.iter().map(|key| async move {
                let raw = self.backend.get(key).await?;
                Ok::<_, OrderError>(raw.map(|raw| (key, raw)))
            });

            let mut orders = Vec::with_capacity(members.len());
            for (key, raw) in try_join_all(fetches).await?.into_iter().flatten() {
                let order_id = key
                    .strip_prefix(ORDER_KEY_PREFIX)
                    .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
                    .unwrap_or(key.as_str());
                orders.push(decode(order_id, &raw)?);
            }

            orders.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.order_id.cmp(&b.order_id))
            });
            Ok::<_, OrderError>(orders)
        })
        .await
    }

    /// Run a store call under the caller's context and record its outcome
    async fn observe<T, F>(&self, ctx: &OpContext, operation: &str, fut: F) -> Result<T, OrderError>
    where
        F: Future<Output = Result<T, OrderError>>,
    {
        let started = Instant::now();
        let result = ctx.run(operation, fut).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };

        if let Err(OrderError::Internal(message)) = &result {
            tracing::error!(
                operation,
                backend = self.backend.name(),
                error = %message,
                "Order store operation failed"
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_store_operation(operation, outcome, started.elapsed().as_secs_f64());
        }

        result
    }
}

fn require_id(order: &Order) -> Result<(), OrderError> {
    let mut ve = ValidationErrors::new();
    if order.order_id.is_empty() {
        ve.add("order_id", "must be assigned before writing");
    }
    ve.into_result()
}

fn encode(order: &Order) -> Result<String, OrderError> {
    serde_json::to_string(order)
        .map_err(|e| OrderError::internal(format!("failed to encode order: {}", e)))
}

fn decode(order_id: &str, raw: &str) -> Result<Order, OrderError> {
    let order: Order = serde_json::from_str(raw).map_err(|e| {
        OrderError::internal(format!("failed to decode order {}: {}", order_id, e))
    })?;

    if order.order_id != order_id {
        return Err(OrderError::internal(format!(
            "record at {} carries order id {}",
            order_key(order_id),
            order.order_id
        )));
    }
    Ok(order)
}

fn unexpected_abort(operation: &str, at: usize) -> OrderError {
    OrderError::internal(format!("{} batch aborted at unguarded command {}", operation, at))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItem;
    use crate::storage::MemoryBackend;
    use chrono::{Duration, Utc};

    fn store() -> (OrderStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (OrderStore::new(backend.clone()), backend)
    }

    fn order(id: &str) -> Order {
        let mut order = Order::new("u1", vec![LineItem::new("i1", 2, 9.99)], "PLACED");
        order.order_id = id.to_string();
        order
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(order_key("abc"), "order:abc");
        assert_ne!(order_key(""), ORDER_INDEX_KEY);
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let (store, _) = store();
        let ctx = OpContext::background();
        let o = order("o-1");

        store.insert(&ctx, &o).await.unwrap();

        assert_eq!(store.get(&ctx, "o-1").await.unwrap(), o);
        assert!(store.exists(&ctx, "o-1").await.unwrap());
        assert!(store.is_indexed(&ctx, "o-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_existing_is_conflict_and_keeps_original() {
        let (store, _) = store();
        let ctx = OpContext::background();
        let original = order("o-1");
        store.insert(&ctx, &original).await.unwrap();

        let mut duplicate = order("o-1");
        duplicate.order_status = "OVERWRITTEN".to_string();
        let err = store.insert(&ctx, &duplicate).await.unwrap_err();

        assert!(matches!(err, OrderError::Conflict(_)));
        assert_eq!(store.get(&ctx, "o-1").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_insert_without_id_is_rejected() {
        let (store, backend) = store();
        let err = store
            .insert(&OpContext::background(), &order(""))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::ValidationFailed(_)));
        assert_eq!(backend.key_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (store, _) = store();
        let err = store.get(&OpContext::background(), "nope").await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_corrupt_record_is_internal() {
        let (store, backend) = store();
        backend
            .execute(Batch::new().push(Command::SetIfAbsent {
                key: order_key("bad"),
                value: "{not json".to_string(),
            }))
            .await
            .unwrap();

        let err = store.get(&OpContext::background(), "bad").await.unwrap_err();
        assert!(matches!(err, OrderError::Internal(_)));
    }

    #[tokio::test]
    async fn test_get_record_with_foreign_id_is_internal() {
        let (store, backend) = store();
        backend
            .execute(Batch::new().push(Command::SetIfAbsent {
                key: order_key("a"),
                value: serde_json::to_string(&order("b")).unwrap(),
            }))
            .await
            .unwrap();

        let err = store.get(&OpContext::background(), "a").await.unwrap_err();
        assert!(matches!(err, OrderError::Internal(_)));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found_and_writes_nothing() {
        let (store, backend) = store();
        let err = store
            .update(&OpContext::background(), &order("ghost"))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::NotFound(_)));
        assert_eq!(backend.key_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let (store, _) = store();
        let ctx = OpContext::background();
        let mut o = order("o-1");
        store.insert(&ctx, &o).await.unwrap();

        o.order_status = "SHIPPED".to_string();
        o.updated_at = o.updated_at + Duration::seconds(5);
        store.update(&ctx, &o).await.unwrap();

        assert_eq!(store.get(&ctx, "o-1").await.unwrap(), o);
        assert_eq!(store.list(&ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_index_entry() {
        let (store, backend) = store();
        let ctx = OpContext::background();
        let before = backend.set_members(ORDER_INDEX_KEY).await.unwrap();

        store.insert(&ctx, &order("o-1")).await.unwrap();
        store.delete(&ctx, "o-1").await.unwrap();

        assert!(!store.exists(&ctx, "o-1").await.unwrap());
        assert!(!store.is_indexed(&ctx, "o-1").await.unwrap());
        assert_eq!(backend.set_members(ORDER_INDEX_KEY).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found_every_time() {
        let (store, _) = store();
        let ctx = OpContext::background();
        for _ in 0..2 {
            let err = store.delete(&ctx, "o-1").await.unwrap_err();
            assert!(matches!(err, OrderError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_creation_time() {
        let (store, _) = store();
        let ctx = OpContext::background();
        let now = Utc::now();

        for (id, offset) in [("c", 3), ("a", 1), ("b", 2)] {
            let mut o = order(id);
            o.created_at = now + Duration::seconds(offset);
            o.updated_at = o.created_at;
            store.insert(&ctx, &o).await.unwrap();
        }

        let ids: Vec<String> = store
            .list(&ctx)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.order_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_skips_index_members_without_record() {
        let (store, backend) = store();
        let ctx = OpContext::background();
        store.insert(&ctx, &order("live")).await.unwrap();
        backend
            .execute(Batch::new().push(Command::SetAdd {
                key: ORDER_INDEX_KEY.to_string(),
                member: order_key("stale"),
            }))
            .await
            .unwrap();

        let orders = store.list(&ctx).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, "live");
    }

    #[tokio::test]
    async fn test_concurrent_inserts_same_id_exactly_one_wins() {
        let (store, backend) = store();
        let ctx = OpContext::background();

        let attempts = (0..8).map(|n| {
            let store = store.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let mut o = order("contended");
                o.order_status = format!("attempt-{}", n);
                store.insert(&ctx, &o).await
            })
        });

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in attempts.collect::<Vec<_>>() {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(OrderError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(backend.set_members(ORDER_INDEX_KEY).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_leaves_no_partial_state() {
        let (store, backend) = store();
        let ctx = OpContext::background();
        ctx.cancel();

        let err = store.insert(&ctx, &order("o-1")).await.unwrap_err();

        assert!(matches!(err, OrderError::Internal(_)));
        assert_eq!(backend.key_count().await, 0);
        assert!(backend.set_members(ORDER_INDEX_KEY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_record_outcomes() {
        let backend = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let store = OrderStore::new(backend).with_metrics(metrics.clone());
        let ctx = OpContext::background();

        let _ = store.get(&ctx, "missing").await;

        let counter = metrics
            .store_operations
            .with_label_values(&["get", "not_found"])
            .get();
        assert_eq!(counter, 1);
    }
}
