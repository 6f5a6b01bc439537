use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One merged retrieval result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub text: String,
    pub meta: Value,
    /// Name of the index that produced the hit
    pub source: String,
}
