//! Scripted invoker for executor and orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use creditgate_types::{GeneratedOutput, GenerationPayload, InvokeMode};

use super::{InvokeError, ModelInvoker};

type Scripted = Result<Vec<GeneratedOutput>, InvokeError>;

/// Replays a per-model queue of results and records every call.
/// A model with an empty queue fails fatally.
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, InvokeMode)>>,
    delay: Option<Duration>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(self, model_id: &str, results: Vec<Scripted>) -> Self {
        self.scripts.lock().expect("lock").insert(model_id.to_string(), results.into());
        self
    }

    pub fn calls(&self) -> Vec<(String, InvokeMode)> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn calls_to(&self, model_id: &str) -> usize {
        self.calls().iter().filter(|(m, _)| m == model_id).count()
    }
}

pub fn texts(n: usize) -> Vec<GeneratedOutput> {
    (0..n).map(|i| GeneratedOutput::Text { text: format!("output {i}") }).collect()
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        model_id: &str,
        _payload: &GenerationPayload,
        mode: InvokeMode,
    ) -> Result<Vec<GeneratedOutput>, InvokeError> {
        self.calls.lock().expect("lock").push((model_id.to_string(), mode));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.scripts
            .lock()
            .expect("lock")
            .get_mut(model_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(InvokeError::fatal(format!("no script left for {model_id}"))))
    }
}
