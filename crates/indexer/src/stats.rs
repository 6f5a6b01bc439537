use serde::{Deserialize, Serialize};

/// Per-source outcome of an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub name: String,
    /// Documents written to the index
    pub documents: usize,
    pub time_ms: u64,
}

/// Statistics about an indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub sources: Vec<SourceStats>,

    /// Total documents across all sources
    pub documents: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl IndexStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: SourceStats) {
        self.documents += source.documents;
        self.sources.push(source);
    }

    #[must_use]
    pub fn source(&self, name: &str) -> Option<&SourceStats> {
        self.sources.iter().find(|s| s.name == name)
    }
}
