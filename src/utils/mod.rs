pub mod ids;
pub mod retry;

pub use ids::{current_time, generate_order_id};
pub use retry::{retry_with_backoff, RetryConfig};
