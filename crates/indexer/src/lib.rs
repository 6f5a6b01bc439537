//! # Sememe Indexer
//!
//! Turns data sources into searchable vector indexes.
//!
//! ## Pipeline
//!
//! ```text
//! QA samples {q, path}          synonym data {key: {zh, synonyms, categories}}
//!     │                               │
//!     ├──> sememe analysis            ├──> term documents
//!     │      └─> QA records (JSONL)   │      └─> + region documents
//!     │                               │
//!     └──> augmented questions ───────┴──> Encoder (batch)
//!                                            └─> <name>.index + <name>.meta.jsonl
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sememe_indexer::{run_all_indexing, SourceKind, SourceSpec};
//! use sememe_taxonomy::TaxonomyPipeline;
//! use sememe_vector_store::{EmbeddingConfig, EmbeddingModel, IndexArtifacts};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = TaxonomyPipeline::default();
//!     let run = pipeline.run_file("taxonomy.json", &["Country", "categories", "Taiwan"])?;
//!     let context = run.analysis_context(pipeline.normalizer());
//!     let encoder = EmbeddingModel::new(&EmbeddingConfig::from_env()?)?;
//!
//!     let specs = vec![SourceSpec {
//!         name: "custom".into(),
//!         kind: SourceKind::Terms { synonyms: "synonyms.json".into() },
//!         artifacts: IndexArtifacts::in_dir(Path::new("indexes"), "custom"),
//!     }];
//!     let stats = run_all_indexing(&specs, &encoder, &context).await?;
//!     println!("Indexed {} documents", stats.documents);
//!     Ok(())
//! }
//! ```

mod builder;
mod error;
mod qa;
mod stats;
mod terms;

pub use builder::{run_all_indexing, IndexBuilder, SourceKind, SourceSpec};
pub use error::{IndexerError, Result};
pub use qa::{
    process_qa_file, process_sample, qa_documents, read_qa_records, QaProcessStats, QaRecord,
    QaSample, DEFAULT_QA_BATCH_SIZE, ENTITY_SEPARATOR,
};
pub use stats::{IndexStats, SourceStats};
pub use terms::{load_synonym_data, term_documents, Names, TermEntry};
