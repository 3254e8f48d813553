pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use services::cache::WorkbookCache;

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub cache: WorkbookCache,
}

impl AppState {
    pub fn new(config: config::Config, cache: WorkbookCache) -> Self {
        Self { config, cache }
    }

    pub fn from_config(config: config::Config) -> Self {
        let cache = WorkbookCache::new(config.cache_capacity);
        Self::new(config, cache)
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::routes())
        .merge(routes::workbooks::routes(state.config.max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
