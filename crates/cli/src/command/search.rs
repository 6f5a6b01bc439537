use super::load_search;
use crate::config::AppConfig;
use crate::{print_stdout, MergeArg, SearchArgs};
use anyhow::{Context as AnyhowContext, Result};
use sememe_search::{MergeStrategy, SearchHit};
use sememe_vector_store::EmbeddingConfig;
use serde_json::Value;

/// One-line label for a hit: question, term or raw text
pub(crate) fn hit_label(hit: &SearchHit) -> &str {
    ["query", "term"]
        .iter()
        .find_map(|key| hit.meta.get(*key).and_then(Value::as_str))
        .unwrap_or(&hit.text)
        .trim()
}

pub(crate) fn print_hits(hits: &[SearchHit]) {
    for hit in hits {
        println!("[{}] {:.4} {}", hit.source, hit.score, hit_label(hit));
        if let Some(sememe) = hit.meta.get("sememe").and_then(Value::as_str) {
            if !sememe.is_empty() {
                println!("    {sememe}");
            }
        }
    }
}

pub(crate) async fn run(
    args: SearchArgs,
    config: &AppConfig,
    embedding: &EmbeddingConfig,
) -> Result<()> {
    let mut search = load_search(config, embedding)?;
    if let Some(merge) = args.merge {
        search = search.with_strategy(match merge {
            MergeArg::Score => MergeStrategy::Score,
            MergeArg::Rrf => MergeStrategy::reciprocal_rank(),
        });
    }
    let top_k = args.top_k.unwrap_or(config.search.top_k);
    let hits = search
        .search(&args.query, top_k)
        .await
        .context("Search failed")?;

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&hits)?)?;
    } else if hits.is_empty() {
        println!("No results");
    } else {
        print_hits(&hits);
    }
    Ok(())
}
