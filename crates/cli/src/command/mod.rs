pub(crate) mod answer;
pub(crate) mod classify;
pub(crate) mod index;
pub(crate) mod qa;
pub(crate) mod search;

use crate::config::{AppConfig, TaxonomySection};
use crate::TaxonomyArgs;
use anyhow::{Context as AnyhowContext, Result};
use sememe_search::MultiIndexSearch;
use sememe_taxonomy::{
    custom_synonyms_from_records, AnalysisContext, ClassifierConfig, JsonLexicon,
    TaxonomyPipeline, TaxonomyRun,
};
use sememe_vector_store::{EmbeddingConfig, EmbeddingModel, Encoder};
use std::sync::Arc;

/// Taxonomy settings with command-line overrides applied
fn taxonomy_section(config: &AppConfig, args: &TaxonomyArgs) -> TaxonomySection {
    let mut section = config.taxonomy.clone();
    if let Some(path) = &args.taxonomy {
        section.path = path.clone();
    }
    if let Some(root) = &args.root {
        section.root = root
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
    }
    section
}

pub(crate) fn run_taxonomy(section: &TaxonomySection) -> Result<(TaxonomyPipeline, TaxonomyRun)> {
    let pipeline = match &section.classifier {
        Some(path) => TaxonomyPipeline::new(
            &ClassifierConfig::load(path)
                .with_context(|| format!("Invalid classifier config {}", path.display()))?,
        ),
        None => TaxonomyPipeline::default(),
    };
    let root: Vec<&str> = section.root.iter().map(String::as_str).collect();
    let run = pipeline
        .run_file(&section.path, &root)
        .with_context(|| format!("Failed to process taxonomy {}", section.path.display()))?;
    log::info!(
        "Taxonomy: {} records, {} classified, {} unclassified, {} skipped",
        run.export.stats.records,
        run.export.stats.classified,
        run.export.stats.unclassified,
        run.export.stats.skipped_items
    );
    Ok((pipeline, run))
}

/// Analysis context for sememe tagging, built from the taxonomy and optional lexical files
pub(crate) fn analysis_context(config: &AppConfig, args: &TaxonomyArgs) -> Result<AnalysisContext> {
    let section = taxonomy_section(config, args);
    let (pipeline, run) = run_taxonomy(&section)?;

    let mut context = match &section.lexicon {
        Some(path) => {
            let lexicon = JsonLexicon::load(path)
                .with_context(|| format!("Failed to load lexicon {}", path.display()))?;
            AnalysisContext::new(
                pipeline.normalizer().clone(),
                run.export.synonym_map.clone(),
                Arc::new(lexicon),
            )
            .with_custom_synonyms(custom_synonyms_from_records(&run.records))
        }
        None => run.analysis_context(pipeline.normalizer()),
    };
    if let Some(path) = &section.custom_sememe {
        context
            .load_custom_sememe_data(path)
            .with_context(|| format!("Failed to load custom sememe data {}", path.display()))?;
    }
    Ok(context)
}

pub(crate) fn encoder(embedding: &EmbeddingConfig) -> Result<Arc<dyn Encoder>> {
    log::debug!(
        "Embedding mode {} (pooling {}, dir {})",
        embedding.mode,
        embedding.pooling,
        embedding.model_dir.display()
    );
    let model = EmbeddingModel::new(embedding).context("Failed to initialise encoder")?;
    Ok(Arc::new(model))
}

pub(crate) fn load_search(
    config: &AppConfig,
    embedding: &EmbeddingConfig,
) -> Result<MultiIndexSearch> {
    let indexes = config.query_indexes();
    if indexes.is_empty() {
        anyhow::bail!("No indexes configured; add [[indexes]] or [[sources]] to sememe.toml");
    }
    let search = MultiIndexSearch::load(encoder(embedding)?, &indexes)
        .context("Failed to load indexes")?
        .with_strategy(config.search.merge);
    Ok(search)
}
