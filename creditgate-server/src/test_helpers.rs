//! Test helpers for creditgate-server unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use creditgate_core::quota::PeriodCalendar;
use creditgate_core::{GuestTokenCodec, InMemoryUsageRepository, InvokeError, ModelInvoker};
use creditgate_types::models::AppConfig;
use creditgate_types::{
    CallerIdentity, GeneratedOutput, GenerationPayload, GuestUsage, InvokeMode, MonthlyUsageRecord,
    PlanTier,
};

use crate::state::AppState;

pub const GUEST_SECRET: &str = "server-test-secret";

/// Answers every call with the same reply and counts calls.
pub struct StubInvoker {
    reply: Result<Vec<GeneratedOutput>, InvokeError>,
    calls: AtomicUsize,
}

impl StubInvoker {
    pub fn outputs(n: usize) -> Self {
        let outputs =
            (0..n).map(|i| GeneratedOutput::Text { text: format!("variant {i}") }).collect();
        Self { reply: Ok(outputs), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { reply: Err(InvokeError::fatal("model rejected prompt")), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelInvoker for StubInvoker {
    async fn invoke(
        &self,
        _model_id: &str,
        _payload: &GenerationPayload,
        _mode: InvokeMode,
    ) -> Result<Vec<GeneratedOutput>, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<InMemoryUsageRepository>,
    pub invoker: Arc<StubInvoker>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.guest_token.secret = GUEST_SECRET.to_string();
    config.generation.transient_backoff_ms = 1;
    config.quota.promotional_window_days = 0;
    config
}

/// Create an `AppState` over in-memory storage and a stub model.
pub fn test_app_state(invoker: StubInvoker) -> TestApp {
    test_app_state_with(test_config(), invoker)
}

pub fn test_app_state_with(config: AppConfig, invoker: StubInvoker) -> TestApp {
    let repo = Arc::new(InMemoryUsageRepository::new());
    let invoker = Arc::new(invoker);
    let state = AppState::new_with_components(&config, repo.clone(), invoker.clone(), "memory")
        .expect("failed to create test AppState");
    TestApp { state, repo, invoker }
}

/// Signed guest token for the current period.
pub fn guest_token(count: u32) -> String {
    let codec = GuestTokenCodec::from_secret(GUEST_SECRET.as_bytes()).expect("codec");
    let period = PeriodCalendar::utc().period_of(Utc::now());
    codec.encode(&GuestUsage { period, count }).expect("encode")
}

pub fn seed_user(repo: &InMemoryUsageRepository, user: &str, service: &str, plan: PlanTier, used: u32) {
    let mut record = MonthlyUsageRecord::new(CallerIdentity::user_key(user), service, Utc::now());
    record.plan = plan;
    record.monthly_usage = used;
    repo.insert(record);
}
