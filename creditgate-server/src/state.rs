//! Application State
//!
//! Shared state for the HTTP handlers: the generation orchestrator plus the
//! handful of config values the HTTP layer needs on its own.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use creditgate_core::{GenerationOrchestrator, ModelInvoker, UsageRepository};
use creditgate_types::models::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub orchestrator: GenerationOrchestrator,
    /// Base name of the per-service guest usage cookie
    pub cookie_name: String,
    pub storage: &'static str,
    pub trust_forwarded_for: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new_with_components(
        config: &AppConfig,
        repository: Arc<dyn UsageRepository>,
        invoker: Arc<dyn ModelInvoker>,
        storage: &'static str,
    ) -> Result<Self> {
        let orchestrator = GenerationOrchestrator::from_config(config, repository, invoker)
            .map_err(|e| anyhow::anyhow!("Failed to build orchestrator: {}", e))?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                orchestrator,
                cookie_name: config.guest_token.cookie_name.clone(),
                storage,
                trust_forwarded_for: config.server.trust_forwarded_for,
                started_at: Instant::now(),
            }),
        })
    }

    pub fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.inner.orchestrator
    }

    pub fn trust_forwarded_for(&self) -> bool {
        self.inner.trust_forwarded_for
    }

    /// Guest cookie for one service: `<cookie_name>_<service>`.
    pub fn cookie_name_for(&self, service_id: &str) -> String {
        format!("{}_{}", self.inner.cookie_name, service_id)
    }
}
