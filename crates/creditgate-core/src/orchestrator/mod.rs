//! Generation orchestrator.
//!
//! Linear pipeline, no branching back:
//!
//! ```text
//! RateLimitCheck ─► QuotaCheck ─► ExecuteModel ─► CommitQuota ─► Response
//!      │                │              │
//!      ▼                ▼              ▼
//!  RateLimited    QuotaExceeded   GenerationFailed (nothing committed)
//! ```
//!
//! Quota is committed only after the executor delivered at least one unit,
//! and always for exactly the number of units returned to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use creditgate_types::models::AppConfig;
use creditgate_types::{
    CallerIdentity, GeneratedOutput, GenerationError, GenerationPayload, ModelCandidate,
    UsageSnapshot,
};
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::fallback::{FallbackExecutor, ModelInvoker};
use crate::limiter::{Admission, RateLimiter};
use crate::metrics;
use crate::quota::{QuotaLedger, UsageView};
use crate::repository::UsageRepository;


/// Everything the orchestrator needs for one request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub identity: CallerIdentity,
    pub ip_key: String,
    pub service_id: String,
    pub requested_units: u32,
    pub payload: GenerationPayload,
}

/// Successful (possibly partial) generation after commit.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSuccess {
    pub outputs: Vec<GeneratedOutput>,
    pub model_used: String,
    pub usage: UsageSnapshot,
    /// Units asked for, after the per-request cap
    pub requested: u32,
    /// Units returned and charged
    pub delivered: u32,
    /// Re-issued guest token, when the caller is a guest
    pub guest_token: Option<String>,
}

impl GenerationSuccess {
    pub const fn is_partial(&self) -> bool {
        self.delivered < self.requested
    }
}

/// Rejection from [`GenerationOrchestrator::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after_secs: u64,
}

/// Terminal states of [`GenerationOrchestrator::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    RateLimited { retry_after_secs: u64 },
    QuotaExceeded { usage: UsageSnapshot },
    GenerationFailed { error: GenerationError },
    Succeeded(GenerationSuccess),
}

impl GenerationOutcome {
    /// Metric / log label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::GenerationFailed { .. } => "failed",
            Self::Succeeded(success) if success.is_partial() => "partial",
            Self::Succeeded(_) => "succeeded",
        }
    }
}

pub struct GenerationOrchestrator {
    limiter: Arc<RateLimiter>,
    ledger: Arc<QuotaLedger>,
    executor: Arc<FallbackExecutor>,
    services: BTreeMap<String, Vec<ModelCandidate>>,
    request_timeout: Duration,
}

impl GenerationOrchestrator {
    pub fn new(
        limiter: Arc<RateLimiter>,
        ledger: Arc<QuotaLedger>,
        executor: Arc<FallbackExecutor>,
        services: BTreeMap<String, Vec<ModelCandidate>>,
        request_timeout: Duration,
    ) -> Self {
        Self { limiter, ledger, executor, services, request_timeout }
    }

    /// Wire every component from config.
    pub fn from_config(
        config: &AppConfig,
        repository: Arc<dyn UsageRepository>,
        invoker: Arc<dyn ModelInvoker>,
    ) -> AppResult<Self> {
        let ledger = QuotaLedger::from_config(repository, &config.quota, &config.guest_token)?;
        let executor = FallbackExecutor::new(
            invoker,
            Duration::from_millis(config.generation.transient_backoff_ms),
        );
        Ok(Self::new(
            Arc::new(RateLimiter::new(&config.rate_limit)),
            Arc::new(ledger),
            Arc::new(executor),
            config.generation.services.clone(),
            Duration::from_secs(config.server.request_timeout_secs),
        ))
    }

    pub fn has_service(&self, service_id: &str) -> bool {
        self.services.contains_key(service_id)
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub async fn usage(&self, identity: &CallerIdentity, service_id: &str) -> UsageView {
        self.ledger.usage(identity, service_id).await
    }

    /// Full pipeline, rate limit included.
    pub async fn handle(&self, request: GenerationRequest) -> GenerationOutcome {
        if let Err(RateLimited { retry_after_secs }) =
            self.admit(&request.ip_key, &request.identity, &request.service_id)
        {
            return GenerationOutcome::RateLimited { retry_after_secs };
        }
        self.handle_admitted(request).await
    }

    /// Rate-limit step on its own, for callers that must throttle before
    /// they can build a [`GenerationRequest`]. Follow with [`Self::handle_admitted`].
    pub fn admit(
        &self,
        ip_key: &str,
        identity: &CallerIdentity,
        service_id: &str,
    ) -> Result<(), RateLimited> {
        match self.limiter.admit(ip_key, identity.is_authenticated()) {
            Admission::Allowed { .. } => Ok(()),
            Admission::Denied { retry_after } => {
                info!("Rate limited {} from {} on {}", identity.log_label(), ip_key, service_id);
                metrics::record_request(service_id, "rate_limited");
                Err(RateLimited { retry_after_secs: retry_after.as_secs().max(1) })
            },
        }
    }

    /// Everything after the rate limit: quota, execution, commit.
    pub async fn handle_admitted(&self, request: GenerationRequest) -> GenerationOutcome {
        let service_id = request.service_id.clone();
        let outcome = self.run(request).await;
        metrics::record_request(&service_id, outcome.label());
        outcome
    }

    async fn run(&self, request: GenerationRequest) -> GenerationOutcome {
        let GenerationRequest { identity, ip_key: _, service_id, requested_units, payload } = request;
        let trace_id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let caller = identity.log_label();

        let Some(candidates) = self.services.get(&service_id) else {
            warn!("[{}] No candidates for service {}", trace_id, service_id);
            return GenerationOutcome::GenerationFailed {
                error: GenerationError::NoCandidates { service_id },
            };
        };

        let check = self.ledger.check_remaining(&identity, &service_id, requested_units).await;
        if !check.allowed {
            info!(
                "[{}] Monthly limit reached for {} on {}: used {} of {:?}",
                trace_id, caller, service_id, check.used, check.limit
            );
            return GenerationOutcome::QuotaExceeded { usage: check.snapshot() };
        }
        info!(
            "[{}] Admitted {} on {}: {} of {} requested unit(s){}",
            trace_id,
            caller,
            service_id,
            check.granted_units,
            check.requested_units,
            if check.promotional { " (promotional)" } else { "" }
        );

        let payload = payload.with_units(check.granted_units);
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.request_timeout,
            self.executor.execute(candidates, &payload, &trace_id),
        )
        .await;
        metrics::record_generation_duration(&service_id, started.elapsed());

        let mut execution = match result {
            Ok(Ok(execution)) => execution,
            Ok(Err(error)) => {
                warn!("[{}] Generation failed for {} on {}: {}", trace_id, caller, service_id, error);
                return GenerationOutcome::GenerationFailed { error };
            },
            Err(_) => {
                let after_ms = self.request_timeout.as_millis() as u64;
                warn!("[{}] Generation timed out after {}ms, nothing charged", trace_id, after_ms);
                return GenerationOutcome::GenerationFailed {
                    error: GenerationError::TimedOut { after_ms },
                };
            },
        };

        execution.outputs.truncate(check.granted_units as usize);
        let delivered = execution.delivered();

        let (usage, guest_token) = match self.ledger.commit(&identity, &service_id, delivered).await {
            Ok(receipt) => {
                metrics::record_units_committed(&service_id, delivered);
                let limit = self.ledger.limit_after_commit(&check, &receipt);
                (UsageSnapshot::new(limit, receipt.used), receipt.guest_token)
            },
            Err(e) => {
                error!(
                    "[{}] Commit of {} unit(s) for {} on {} failed, usage not recorded: {}",
                    trace_id, delivered, caller, service_id, e
                );
                metrics::record_commit_failure(&service_id);
                (UsageSnapshot::new(check.limit, check.used.saturating_add(delivered)), None)
            },
        };

        let success = GenerationSuccess {
            outputs: execution.outputs,
            model_used: execution.model_used,
            usage,
            requested: check.requested_units,
            delivered,
            guest_token,
        };
        if success.is_partial() {
            warn!(
                "[{}] Partial delivery from {}: {}/{} unit(s)",
                trace_id, success.model_used, delivered, success.requested
            );
        } else {
            info!("[{}] Delivered {} unit(s) via {}", trace_id, delivered, success.model_used);
        }
        GenerationOutcome::Succeeded(success)
    }
}
