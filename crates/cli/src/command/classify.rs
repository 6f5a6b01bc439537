use super::{run_taxonomy, taxonomy_section};
use crate::config::AppConfig;
use crate::{print_stdout, ClassifyArgs};
use anyhow::{Context as AnyhowContext, Result};
use sememe_taxonomy::write_json;

pub const EXPORT_FILE: &str = "taxonomy_export.json";
pub const SYNONYM_DATA_FILE: &str = "synonym_data.json";

pub(crate) fn run(args: ClassifyArgs, config: &AppConfig) -> Result<()> {
    let section = taxonomy_section(config, &args.taxonomy);
    let (pipeline, run) = run_taxonomy(&section)?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;
    let export_path = args.out.join(EXPORT_FILE);
    let data_path = args.out.join(SYNONYM_DATA_FILE);
    write_json(&export_path, &run.export)?;
    write_json(&data_path, &run.synonym_data(pipeline.normalizer()))?;
    log::info!(
        "Wrote {} and {}",
        export_path.display(),
        data_path.display()
    );

    let stats = &run.export.stats;
    if args.json {
        print_stdout(&serde_json::to_string_pretty(stats)?)?;
        return Ok(());
    }

    println!(
        "{} records ({} skipped items), {} synonyms, {} collisions",
        stats.records, stats.skipped_items, stats.synonyms, stats.collisions
    );
    for (category, count) in &stats.per_category {
        println!("  {category}: {count}");
    }
    println!("  unclassified: {}", stats.unclassified);
    for entry in &run.export.reclassified {
        println!(
            "  reclassified {} ({}): {} -> {}",
            entry.term,
            entry.keyword,
            entry
                .from
                .as_ref()
                .map_or("unclassified", |c| c.as_str()),
            entry.to
        );
    }
    Ok(())
}
