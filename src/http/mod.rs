//! HTTP boundary for the routing endpoint
//!
//! - POST /chat - route text to a cached answer/action pair
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ChatRequest, ChatResponse};
pub use routes::create_router;
pub use state::AppState;
