use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::store::Store;
use crate::services::llm_provider::CompletionService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    store: Arc<dyn Store>,
    completion: Arc<dyn CompletionService>,
    jwt_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        completion: Arc<dyn CompletionService>,
        jwt_secret: Option<String>,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            store,
            completion,
            jwt_secret: jwt_secret.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    pub fn completion(&self) -> Arc<dyn CompletionService> {
        Arc::clone(&self.completion)
    }

    pub fn jwt_secret(&self) -> Option<&str> {
        self.jwt_secret.as_deref()
    }
}
