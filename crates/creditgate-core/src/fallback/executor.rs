use std::sync::Arc;
use std::time::Duration;

use creditgate_types::{
    GeneratedOutput, GenerationError, GenerationPayload, InvokeMode, ModelCandidate,
    ModelErrorKind,
};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{InvokeError, ModelInvoker};
use crate::metrics;

/// What to do after a failed call on the current candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Back off, then call the same candidate in the same mode
    RetrySameMode,
    /// Call the same candidate again immediately in plain mode
    Downgrade,
    /// Give up on this candidate
    Advance,
}

/// Per-candidate control state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationAttempt {
    pub candidate_index: usize,
    pub structured_output_attempted: bool,
    pub mode: InvokeMode,
    pub transient_retry_used: bool,
    pub last_error: Option<ModelErrorKind>,
}

impl GenerationAttempt {
    pub fn start(candidate_index: usize, candidate: &ModelCandidate) -> Self {
        let mode = if candidate.supports_structured_output {
            InvokeMode::Enhanced
        } else {
            InvokeMode::Plain
        };
        Self {
            candidate_index,
            structured_output_attempted: candidate.supports_structured_output,
            mode,
            transient_retry_used: false,
            last_error: None,
        }
    }

    /// Decide the next step for `error` without changing state.
    pub fn next_step(&self, error: ModelErrorKind) -> NextStep {
        match error {
            ModelErrorKind::Transient if !self.transient_retry_used => NextStep::RetrySameMode,
            ModelErrorKind::UnsupportedMode if self.mode == InvokeMode::Enhanced => {
                NextStep::Downgrade
            },
            ModelErrorKind::Transient
            | ModelErrorKind::UnsupportedMode
            | ModelErrorKind::Empty
            | ModelErrorKind::Fatal => NextStep::Advance,
        }
    }

    /// Record `error`, spend the matching budget and return the step taken.
    pub fn record_failure(&mut self, error: ModelErrorKind) -> NextStep {
        let step = self.next_step(error);
        self.last_error = Some(error);
        match step {
            NextStep::RetrySameMode => self.transient_retry_used = true,
            NextStep::Downgrade => self.mode = InvokeMode::Plain,
            NextStep::Advance => {},
        }
        step
    }
}

/// Successful (possibly partial) generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSuccess {
    pub outputs: Vec<GeneratedOutput>,
    pub model_used: String,
    pub mode: InvokeMode,
    /// Units the payload asked for
    pub requested: u32,
}

impl ExecutionSuccess {
    pub fn delivered(&self) -> u32 {
        self.outputs.len() as u32
    }

    pub fn is_partial(&self) -> bool {
        self.delivered() < self.requested
    }
}

/// Walks an ordered candidate list with retry / downgrade / advance.
pub struct FallbackExecutor {
    invoker: Arc<dyn ModelInvoker>,
    transient_backoff: Duration,
}

impl FallbackExecutor {
    pub fn new(invoker: Arc<dyn ModelInvoker>, transient_backoff: Duration) -> Self {
        Self { invoker, transient_backoff }
    }

    /// Run the chain. Transient and unsupported-mode failures are absorbed
    /// here; the caller only sees success or exhaustion.
    pub async fn execute(
        &self,
        candidates: &[ModelCandidate],
        payload: &GenerationPayload,
        trace_id: &str,
    ) -> Result<ExecutionSuccess, GenerationError> {
        let total = candidates.len();
        let mut last_error: Option<InvokeError> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            let mut attempt = GenerationAttempt::start(index, candidate);

            loop {
                debug!(
                    "[{}] Candidate {}/{} {} ({} mode)",
                    trace_id,
                    index + 1,
                    total,
                    candidate.model_id,
                    attempt.mode
                );

                let error =
                    match self.invoker.invoke(&candidate.model_id, payload, attempt.mode).await {
                        Ok(mut outputs) if !outputs.is_empty() => {
                            metrics::record_model_attempt(&candidate.model_id, "success");
                            outputs.truncate(payload.units as usize);
                            return Ok(ExecutionSuccess {
                                outputs,
                                model_used: candidate.model_id.clone(),
                                mode: attempt.mode,
                                requested: payload.units,
                            });
                        },
                        Ok(_) => InvokeError::empty("response contained no outputs"),
                        Err(e) => e,
                    };

                metrics::record_model_attempt(&candidate.model_id, error.kind.as_str());

                match attempt.record_failure(error.kind) {
                    NextStep::RetrySameMode => {
                        info!(
                            "[{}] {} transient failure, retrying once in {}ms: {}",
                            trace_id,
                            candidate.model_id,
                            self.transient_backoff.as_millis(),
                            error.message
                        );
                        last_error = Some(error);
                        sleep(self.transient_backoff).await;
                    },
                    NextStep::Downgrade => {
                        info!(
                            "[{}] {} rejected structured output, retrying in plain mode",
                            trace_id, candidate.model_id
                        );
                        last_error = Some(error);
                    },
                    NextStep::Advance => {
                        warn!(
                            "[{}] Giving up on {} after {}: {}",
                            trace_id, candidate.model_id, error.kind, error.message
                        );
                        last_error = Some(error);
                        break;
                    },
                }
            }
        }

        let last = last_error.unwrap_or_else(|| InvokeError::fatal("no candidates configured"));
        Err(GenerationError::AllCandidatesExhausted {
            attempted: total,
            last_error: last.kind,
            message: last.message,
        })
    }
}
