use super::analysis_context;
use crate::config::AppConfig;
use crate::{print_stdout, ProcessQaArgs};
use anyhow::{Context as AnyhowContext, Result};
use sememe_indexer::process_qa_file;
use serde_json::json;

pub(crate) fn run(args: ProcessQaArgs, config: &AppConfig) -> Result<()> {
    let context = analysis_context(config, &args.taxonomy)?;
    let stats = process_qa_file(
        &context,
        &args.input,
        &args.output,
        &args.base_id,
        args.batch_size,
    )
    .with_context(|| format!("Failed to process {}", args.input.display()))?;

    if args.json {
        let body = json!({
            "samples": stats.samples,
            "records": stats.records,
            "malformed_triples": stats.malformed_triples,
            "output": args.output,
        });
        print_stdout(&serde_json::to_string_pretty(&body)?)?;
    } else {
        println!(
            "{} samples -> {} records ({} malformed triples) in {}",
            stats.samples,
            stats.records,
            stats.malformed_triples,
            args.output.display()
        );
    }
    Ok(())
}
