use crate::router::IntentRouter;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<IntentRouter>,
}

impl AppState {
    pub fn new(router: Arc<IntentRouter>) -> Self {
        Self { router }
    }
}
