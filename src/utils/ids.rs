use chrono::{DateTime, Utc};
use uuid::Uuid;

// ============================================================================
// Identifier & Timestamp Generation
// ============================================================================

/// Fresh, globally unique order identifier
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn current_time() -> DateTime<Utc> {
    Utc::now()
}
