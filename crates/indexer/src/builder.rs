use crate::error::Result;
use crate::qa::{qa_documents, read_qa_records};
use crate::stats::{IndexStats, SourceStats};
use crate::terms::{load_synonym_data, term_documents};
use sememe_taxonomy::AnalysisContext;
use sememe_vector_store::{Encoder, IndexArtifacts, MetadataRecord, VectorStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

/// Where a source's documents come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Processed QA records (JSONL)
    Qa { records: PathBuf },
    /// Synonym-data file (JSON object keyed by term)
    Terms { synonyms: PathBuf },
}

/// One index to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: SourceKind,
    #[serde(flatten)]
    pub artifacts: IndexArtifacts,
}

/// Builds index + metadata pairs for data sources
pub struct IndexBuilder<'a> {
    encoder: &'a dyn Encoder,
    context: &'a AnalysisContext,
}

impl<'a> IndexBuilder<'a> {
    #[must_use]
    pub fn new(encoder: &'a dyn Encoder, context: &'a AnalysisContext) -> Self {
        Self { encoder, context }
    }

    /// Documents a source contributes, in index order
    pub fn documents(&self, kind: &SourceKind) -> Result<Vec<MetadataRecord>> {
        match kind {
            SourceKind::Qa { records } => {
                let records = read_qa_records(records)?;
                Ok(qa_documents(self.context, &records))
            }
            SourceKind::Terms { synonyms } => {
                let entries = load_synonym_data(synonyms)?;
                Ok(term_documents(&entries))
            }
        }
    }

    pub async fn build_source(&self, spec: &SourceSpec) -> Result<SourceStats> {
        let start = Instant::now();
        log::info!("Building index '{}'", spec.name);

        let documents = self.documents(&spec.kind)?;
        let count = documents.len();
        let store = VectorStore::build(documents, self.encoder).await?;
        store.save(&spec.artifacts)?;

        let stats = SourceStats {
            name: spec.name.clone(),
            documents: count,
            time_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        log::info!(
            "Index '{}' built: {} documents in {} ms",
            stats.name,
            stats.documents,
            stats.time_ms
        );
        Ok(stats)
    }
}

/// Build every source in order; the first failing source aborts the run
pub async fn run_all_indexing(
    specs: &[SourceSpec],
    encoder: &dyn Encoder,
    context: &AnalysisContext,
) -> Result<IndexStats> {
    let start = Instant::now();
    let builder = IndexBuilder::new(encoder, context);
    let mut stats = IndexStats::new();
    for spec in specs {
        stats.add_source(builder.build_source(spec).await?);
    }
    stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    log::info!(
        "Indexing complete: {} sources, {} documents",
        stats.sources.len(),
        stats.documents
    );
    Ok(stats)
}
