//! Model fallback candidates.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// One entry of an ordered fallback list. Order encodes priority: the
/// preferred model first, the broadly available one last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ModelCandidate {
    #[validate(length(min = 1_u64))]
    pub model_id: String,
    #[serde(default)]
    pub supports_structured_output: bool,
}

impl ModelCandidate {
    pub fn structured(model_id: impl Into<String>) -> Self {
        Self { model_id: model_id.into(), supports_structured_output: true }
    }

    pub fn plain(model_id: impl Into<String>) -> Self {
        Self { model_id: model_id.into(), supports_structured_output: false }
    }
}
