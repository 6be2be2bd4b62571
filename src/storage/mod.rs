// ============================================================================
// Storage - Key-Value Backends and the Order Record Store
// ============================================================================
//
// - backend        - KvBackend trait and the guarded Batch primitive
// - redis_backend  - production backend, batches run as one Lua script
// - memory         - in-process backend with identical semantics
// - order_store    - primary records + secondary index on top of KvBackend
//
// ============================================================================

pub mod backend;
pub mod memory;
pub mod order_store;
pub mod redis_backend;

pub use backend::{BackendError, KvBackend};
#[cfg(test)]
pub use backend::{Batch, BatchOutcome};
pub use memory::MemoryBackend;
pub use order_store::OrderStore;
#[cfg(test)]
pub use order_store::{order_key, ORDER_INDEX_KEY};
pub use redis_backend::RedisBackend;
