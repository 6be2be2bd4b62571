// ============================================================================
// API Boundary - HTTP surface over the order service
// ============================================================================
//
// Decodes requests, runs field validation and maps OrderError variants to
// status codes. Nothing here touches the store directly.
//
// ============================================================================

mod handlers;
mod payload;
mod server;

pub use handlers::AppState;
pub use server::start_api_server;
