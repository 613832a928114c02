use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{review_queue::ReviewQueue, storage::StorageSink};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<ReviewQueue>,
    pub storage: Arc<dyn StorageSink>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Arc<dyn StorageSink>) -> Self {
        let queue = ReviewQueue::new(config.review_settings(), Arc::clone(&storage));
        Self {
            queue: Arc::new(queue),
            storage,
            config: Arc::new(config),
        }
    }
}
