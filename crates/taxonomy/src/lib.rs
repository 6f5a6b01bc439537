//! # Sememe Taxonomy
//!
//! Turns a nested geo/climate/weather taxonomy document into flat term records, a
//! synonym map and exclusive per-category term sets.
//!
//! ## Architecture
//!
//! ```text
//! taxonomy.json
//!     │
//!     ├──> Flattener ─────────> TermRecord[] (with category path)
//!     │
//!     ├──> Normalizer ────────> canonical surface forms
//!     │
//!     ├──> Synonym Resolver ──> SynonymMap (surface → canonical)
//!     │
//!     ├──> Classifier ────────> path → identifier → related → clue → suffix
//!     │
//!     └──> Reclassifier ──────> lexical weather corrections + audit log
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sememe_taxonomy::TaxonomyPipeline;
//!
//! fn main() -> sememe_taxonomy::Result<()> {
//!     let pipeline = TaxonomyPipeline::default();
//!     let run = pipeline.run_file("taxonomy.json", &["Country", "categories", "Taiwan"])?;
//!
//!     for (category, terms) in run.export.categories.iter() {
//!         println!("{category}: {} terms", terms.len());
//!     }
//!     Ok(())
//! }
//! ```

mod analysis;
mod classifier;
mod config;
mod error;
mod flatten;
mod normalize;
mod pipeline;
mod reclassify;
mod synonyms;
mod types;

pub use analysis::{
    custom_synonyms_from_records, AnalysisContext, CustomSynonym, FormatStyle, JsonLexicon,
    SememeLexicon, SememeMap, SememeRelation, SentenceAnalysis, SynonymCleanup, TaxonomyLexicon,
};
pub use classifier::{
    ClassificationOutcome, Classifier, Decision, PrefixTable, Rule, TraceEntry,
};
pub use config::{ClassifierConfig, CorrectionRule, KeywordFamily, PrefixRule, Substitution};
pub use error::{Result, TaxonomyError};
pub use flatten::{flatten, flatten_document, load_document, select_subtree, FlatTaxonomy};
pub use normalize::Normalizer;
pub use pipeline::{
    write_json, SynonymDataEntry, TaxonomyExport, TaxonomyPipeline, TaxonomyRun, TaxonomyStats,
};
pub use reclassify::Reclassifier;
pub use synonyms::{build_synonym_map, canonical_term, SynonymBuild, SynonymCollision, SynonymMap};
pub use types::{Category, CategorySet, ReclassifiedTerm, TermRecord};
