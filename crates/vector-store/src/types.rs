use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of a metadata file, parallel to the index row with the same position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub meta: Value,
}

impl MetadataRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, meta: Value) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            meta,
        }
    }
}

/// A resolved index hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreHit {
    pub score: f32,
    pub position: usize,
    pub record: MetadataRecord,
}
