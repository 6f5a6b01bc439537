use super::{analysis_context, encoder};
use crate::config::AppConfig;
use crate::{print_stdout, BuildIndexArgs};
use anyhow::{Context as AnyhowContext, Result};
use sememe_indexer::{run_all_indexing, SourceSpec};
use sememe_vector_store::EmbeddingConfig;

pub(crate) async fn run(
    args: BuildIndexArgs,
    config: &AppConfig,
    embedding: &EmbeddingConfig,
) -> Result<()> {
    for name in &args.sources {
        if !config.sources.iter().any(|s| &s.name == name) {
            anyhow::bail!("Unknown source '{name}'");
        }
    }
    let specs: Vec<SourceSpec> = config
        .sources
        .iter()
        .filter(|s| args.sources.is_empty() || args.sources.contains(&s.name))
        .cloned()
        .collect();
    if specs.is_empty() {
        anyhow::bail!("No index sources configured; add [[sources]] to sememe.toml");
    }

    let context = analysis_context(config, &args.taxonomy)?;
    let encoder = encoder(embedding)?;
    let stats = run_all_indexing(&specs, encoder.as_ref(), &context)
        .await
        .context("Indexing failed")?;

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&stats)?)?;
    } else {
        for source in &stats.sources {
            println!(
                "{}: {} documents in {} ms",
                source.name, source.documents, source.time_ms
            );
        }
        println!("Indexed {} documents in {} ms", stats.documents, stats.time_ms);
    }
    Ok(())
}
