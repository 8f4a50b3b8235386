//! Shared application state handed to every Axum handler and the
//! WebSocket upgrade, mirroring the teacher's `AppContext` (one `Clone`
//! struct of `Arc`-wrapped services, built once in `main` and threaded
//! through `with_state`).

use std::sync::Arc;

use crate::application::ports::Store;
use crate::application::services::VersionService;
use crate::infrastructure::realtime::{Hub, RateLimiterRegistry};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hub: Hub,
    pub rate_limiter: Arc<RateLimiterRegistry>,
    pub versions: Arc<VersionService>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let hub = Hub::new(store.clone());
        let versions = Arc::new(VersionService::new(store.clone()));
        Self {
            store,
            hub,
            rate_limiter: Arc::new(RateLimiterRegistry::new()),
            versions,
        }
    }
}
