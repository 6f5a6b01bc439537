//! Question / knowledge-path samples → sememe-annotated records → index documents.

use crate::error::{require_file, IndexerError, Result};
use sememe_taxonomy::{AnalysisContext, FormatStyle, SememeMap, SynonymCleanup};
use sememe_vector_store::MetadataRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Separator between an entity name and its disambiguation suffix
pub const ENTITY_SEPARATOR: &str = " ||| ";

pub const DEFAULT_QA_BATCH_SIZE: usize = 1000;

/// Raw sample: a question and the `[head, relation, tail]` triples answering it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QaSample {
    pub q: String,
    #[serde(default)]
    pub path: Vec<Vec<String>>,
}

/// One processed record per triple of a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRecord {
    pub id: String,
    pub question: String,
    pub question_sememe: Vec<String>,
    pub question_sememe_map: SememeMap,
    pub triple_sentence: String,
    pub head: String,
    pub relation: String,
    pub tail: String,
}

/// Counters for one preprocessing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QaProcessStats {
    pub samples: usize,
    pub records: usize,
    pub malformed_triples: usize,
}

fn entity_name(raw: &str) -> &str {
    raw.split(ENTITY_SEPARATOR).next().unwrap_or(raw)
}

/// Expand one sample into records; triples without three parts are skipped
#[must_use]
pub fn process_sample(
    ctx: &AnalysisContext,
    sample: &QaSample,
    base_id: &str,
    index: usize,
) -> (Vec<QaRecord>, usize) {
    let analysis = ctx.analyze(&sample.q);
    let mut records = Vec::with_capacity(sample.path.len());
    let mut malformed = 0;

    for (path_id, triple) in sample.path.iter().enumerate() {
        let [head, relation, tail] = triple.as_slice() else {
            log::warn!(
                "Sample {index} triple {path_id} has {} parts, expected 3",
                triple.len()
            );
            malformed += 1;
            continue;
        };
        let head = entity_name(head);
        let tail = entity_name(tail);
        records.push(QaRecord {
            id: format!("{base_id}_{index}_{path_id}"),
            question: sample.q.clone(),
            question_sememe: analysis.sememe_tags.clone(),
            question_sememe_map: analysis.sememe_map.clone(),
            triple_sentence: format!("{head} {relation} {tail}"),
            head: head.to_string(),
            relation: relation.clone(),
            tail: tail.to_string(),
        });
    }
    (records, malformed)
}

/// Read a JSON array of samples and write one JSONL line per triple
pub fn process_qa_file(
    ctx: &AnalysisContext,
    input: &Path,
    output: &Path,
    base_id: &str,
    batch_size: usize,
) -> Result<QaProcessStats> {
    require_file(input)?;
    let samples: Vec<QaSample> = serde_json::from_str(&std::fs::read_to_string(input)?)?;
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut stats = QaProcessStats::default();
    let mut writer = BufWriter::new(std::fs::File::create(output)?);
    let batch_size = batch_size.max(1);
    for (batch_no, batch) in samples.chunks(batch_size).enumerate() {
        for (offset, sample) in batch.iter().enumerate() {
            let (records, malformed) =
                process_sample(ctx, sample, base_id, batch_no * batch_size + offset);
            stats.samples += 1;
            stats.malformed_triples += malformed;
            for record in &records {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            stats.records += records.len();
        }
        writer.flush()?;
        log::info!(
            "Batch {batch_no}: {} samples processed, {} records so far",
            stats.samples,
            stats.records
        );
    }
    Ok(stats)
}

pub fn read_qa_records(path: &Path) -> Result<Vec<QaRecord>> {
    require_file(path)?;
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| IndexerError::InvalidRecord {
            path: path.to_path_buf(),
            line: line_no + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Index text is the augmented question; metadata keeps the question and readable sememes
#[must_use]
pub fn qa_documents(ctx: &AnalysisContext, records: &[QaRecord]) -> Vec<MetadataRecord> {
    records
        .iter()
        .map(|record| {
            let sememe = ctx
                .format_sememe_map(
                    &record.question_sememe_map,
                    FormatStyle::Display,
                    SynonymCleanup::default(),
                )
                .join("；");
            MetadataRecord::new(
                record.id.clone(),
                ctx.augmented_query(&record.question, &record.question_sememe_map),
                json!({
                    "query": record.question,
                    "sememe": sememe,
                }),
            )
        })
        .collect()
}
