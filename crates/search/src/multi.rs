use crate::error::{Result, SearchError};
use crate::fusion::MergeStrategy;
use crate::types::SearchHit;
use sememe_vector_store::{Encoder, IndexArtifacts, VectorStore};
use std::sync::Arc;

/// A loaded store and the name its hits are attributed to
#[derive(Debug, Clone)]
struct NamedIndex {
    name: String,
    store: Arc<VectorStore>,
}

/// Searches several indexes with one query embedding and merges the hits.
///
/// Lookups run concurrently, one blocking task per index. A lookup that fails
/// contributes no hits; the search only fails when every lookup fails.
pub struct MultiIndexSearch {
    indexes: Vec<NamedIndex>,
    encoder: Arc<dyn Encoder>,
    strategy: MergeStrategy,
}

impl MultiIndexSearch {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            indexes: Vec::new(),
            encoder,
            strategy: MergeStrategy::default(),
        }
    }

    /// Load `(name, artifacts)` pairs; any unreadable index fails the load
    pub fn load(encoder: Arc<dyn Encoder>, sources: &[(String, IndexArtifacts)]) -> Result<Self> {
        let mut search = Self::new(encoder);
        for (name, artifacts) in sources {
            let store = VectorStore::load(artifacts)?;
            log::info!("Loaded index '{name}' with {} records", store.len());
            search.add_index(name.clone(), store);
        }
        Ok(search)
    }

    #[must_use]
    pub fn with_index(mut self, name: impl Into<String>, store: VectorStore) -> Self {
        self.add_index(name, store);
        self
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn add_index(&mut self, name: impl Into<String>, store: VectorStore) {
        if store.dimension() != self.encoder.dimension() {
            log::warn!(
                "Index dimension {} differs from encoder dimension {}",
                store.dimension(),
                self.encoder.dimension()
            );
        }
        self.indexes.push(NamedIndex {
            name: name.into(),
            store: Arc::new(store),
        });
    }

    #[must_use]
    pub fn index_names(&self) -> Vec<&str> {
        self.indexes.iter().map(|i| i.name.as_str()).collect()
    }

    #[must_use]
    pub const fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Top `top_k` hits across all indexes, highest score first
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if self.indexes.is_empty() {
            return Err(SearchError::NoIndexes);
        }

        let vector = Arc::new(self.encoder.encode_one(query).await?);
        let per_index = self.lookup_all(&vector, top_k).await?;
        let merged = self.strategy.merge(per_index, top_k);
        log::debug!("Query '{query}' returned {} merged hits", merged.len());
        Ok(merged)
    }

    async fn lookup_all(&self, vector: &Arc<Vec<f32>>, top_k: usize) -> Result<Vec<Vec<SearchHit>>> {
        let handles: Vec<_> = self
            .indexes
            .iter()
            .map(|index| {
                let store = Arc::clone(&index.store);
                let vector = Arc::clone(vector);
                let name = index.name.clone();
                tokio::task::spawn_blocking(move || lookup(&store, &name, &vector, top_k))
            })
            .collect();

        let mut per_index = Vec::with_capacity(handles.len());
        let mut failures = 0;
        let mut last_error = String::new();
        for (index, handle) in self.indexes.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(SearchError::Other(format!("lookup task failed: {e}"))),
            };
            match outcome {
                Ok(hits) => per_index.push(hits),
                Err(e) => {
                    log::warn!("Search on index '{}' failed: {e}", index.name);
                    failures += 1;
                    last_error = e.to_string();
                    per_index.push(Vec::new());
                }
            }
        }

        if failures == self.indexes.len() {
            return Err(SearchError::AllIndexesFailed {
                count: failures,
                last: last_error,
            });
        }
        Ok(per_index)
    }
}

fn lookup(store: &VectorStore, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
    let hits = store.search_vector(vector, top_k)?;
    Ok(hits
        .into_iter()
        .map(|hit| SearchHit {
            score: hit.score,
            text: hit.record.text,
            meta: hit.record.meta,
            source: name.to_string(),
        })
        .collect())
}
