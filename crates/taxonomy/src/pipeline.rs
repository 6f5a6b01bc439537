//! End-to-end taxonomy processing: flatten, resolve synonyms, classify, correct.

use crate::analysis::{custom_synonyms_from_records, AnalysisContext, TaxonomyLexicon};
use crate::classifier::{ClassificationOutcome, Classifier, Rule, TraceEntry};
use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::flatten::{flatten_document, load_document, select_subtree};
use crate::normalize::Normalizer;
use crate::reclassify::Reclassifier;
use crate::synonyms::{build_synonym_map, canonical_term, SynonymCollision, SynonymMap};
use crate::types::{Category, CategorySet, ReclassifiedTerm, TermRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Counters describing one taxonomy run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyStats {
    pub records: usize,
    pub skipped_items: usize,
    pub overwritten_items: usize,
    pub synonyms: usize,
    pub classified: usize,
    pub unclassified: usize,
    pub reclassified: usize,
    pub collisions: usize,
    pub per_category: BTreeMap<Category, usize>,
}

/// Serializable result of a taxonomy run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyExport {
    pub synonym_map: SynonymMap,
    pub categories: CategorySet,
    pub unclassified: Vec<String>,
    pub reclassified: Vec<ReclassifiedTerm>,
    pub collisions: Vec<SynonymCollision>,
    pub stats: TaxonomyStats,
}

/// One entry of the synonym-data file consumed by the term index source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymDataEntry {
    pub zh: String,
    pub synonyms: Vec<String>,
    /// Category → names of related location terms
    pub categories: BTreeMap<String, Vec<String>>,
}

/// Everything a run produces, including the classified records
#[derive(Debug, Clone)]
pub struct TaxonomyRun {
    pub records: Vec<TermRecord>,
    pub trace: Vec<TraceEntry>,
    pub export: TaxonomyExport,
}

impl TaxonomyRun {
    /// Synonym-data entries keyed by record key
    #[must_use]
    pub fn synonym_data(&self, normalizer: &Normalizer) -> BTreeMap<String, SynonymDataEntry> {
        let location = Category::location();
        let by_key: BTreeMap<&str, &TermRecord> =
            self.records.iter().map(|r| (r.key.as_str(), r)).collect();

        let mut data = BTreeMap::new();
        for record in &self.records {
            let Some(primary) = record.primary_name.clone() else {
                continue;
            };
            if canonical_term(record, normalizer).is_none() {
                continue;
            }

            let mut synonyms: Vec<String> = Vec::new();
            for form in record.surface_forms() {
                if form != primary && !synonyms.iter().any(|s| s == form) {
                    synonyms.push(form.to_string());
                }
            }

            let regions: Vec<String> = record
                .related_ids
                .iter()
                .filter_map(|id| by_key.get(id.as_str()))
                .filter(|related| related.classification.contains(&location))
                .filter_map(|related| related.primary_name.clone())
                .collect();

            let categories = record
                .classification
                .iter()
                .filter(|c| **c != location)
                .map(|c| (c.as_str().to_string(), regions.clone()))
                .collect();

            data.insert(
                record.key.clone(),
                SynonymDataEntry {
                    zh: primary,
                    synonyms,
                    categories,
                },
            );
        }
        data
    }

    /// Analysis context backed by this run's synonym map and classifications
    #[must_use]
    pub fn analysis_context(&self, normalizer: &Normalizer) -> AnalysisContext {
        let lexicon = TaxonomyLexicon::from_records(&self.records, normalizer);
        AnalysisContext::new(
            normalizer.clone(),
            self.export.synonym_map.clone(),
            Arc::new(lexicon),
        )
        .with_custom_synonyms(custom_synonyms_from_records(&self.records))
    }
}

/// Flatten → synonyms → classify → correct
#[derive(Debug, Clone)]
pub struct TaxonomyPipeline {
    classifier: Classifier,
    reclassifier: Reclassifier,
}

impl Default for TaxonomyPipeline {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl TaxonomyPipeline {
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            classifier: Classifier::new(config),
            reclassifier: Reclassifier::new(config),
        }
    }

    #[must_use]
    pub const fn normalizer(&self) -> &Normalizer {
        self.classifier.normalizer()
    }

    /// Load a taxonomy document and process the subtree at `root`
    pub fn run_file(&self, path: impl AsRef<Path>, root: &[&str]) -> Result<TaxonomyRun> {
        let doc = load_document(path)?;
        let subtree = select_subtree(&doc, root)?;
        self.run(subtree)
    }

    pub fn run(&self, doc: &Value) -> Result<TaxonomyRun> {
        let flat = flatten_document(doc)?;
        let skipped_items = flat.skipped();
        let overwritten_items = flat.overwritten();
        let mut records = flat.into_records();

        let synonyms = build_synonym_map(&records, self.normalizer());
        let ClassificationOutcome {
            mut categories,
            classified,
            unclassified,
            mut trace,
            skipped: _,
        } = self.classifier.classify(&mut records);
        let reclassified = self.reclassifier.reclassify(&mut categories, &classified);

        // keep per-record classification in line with the corrected sets
        let corrections: HashMap<&str, &ReclassifiedTerm> = reclassified
            .iter()
            .map(|entry| (entry.term.as_str(), entry))
            .collect();
        for record in &mut records {
            let Some(term) = canonical_term(record, self.normalizer()) else {
                continue;
            };
            if let Some(category) = categories.category_of(&term) {
                if record.classification.first() != Some(category) {
                    record.classification = vec![category.clone()];
                }
            }
            if let Some(correction) = corrections.get(term.as_str()) {
                record.trigger_trace.push(correction.justification());
                trace.push(TraceEntry {
                    key: record.key.clone(),
                    term,
                    category: correction.to.clone(),
                    rule: Rule::Correction,
                    matched: correction.keyword.clone(),
                });
            }
        }

        let stats = TaxonomyStats {
            records: records.len(),
            skipped_items,
            overwritten_items,
            synonyms: synonyms.map.len(),
            classified: classified.len(),
            unclassified: unclassified.len(),
            reclassified: reclassified.len(),
            collisions: synonyms.collisions.len(),
            per_category: categories
                .iter()
                .map(|(category, terms)| (category.clone(), terms.len()))
                .collect(),
        };
        log::info!(
            "Taxonomy run: {} records, {} classified, {} unclassified, {} corrected",
            stats.records,
            stats.classified,
            stats.unclassified,
            stats.reclassified
        );

        Ok(TaxonomyRun {
            records,
            trace,
            export: TaxonomyExport {
                synonym_map: synonyms.map,
                categories,
                unclassified: unclassified.into_iter().collect(),
                reclassified,
                collisions: synonyms.collisions,
                stats,
            },
        })
    }
}

/// Write pretty JSON to `path` atomically, creating parent directories
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "categories": {
                "tw-weather": {
                    "items": [
                        {"id": "rain", "zh": "大雨", "synonyms": ["豪雨"]},
                        {"id": "front", "zh": "冷鋒", "related": ["north"]}
                    ]
                },
                "tw-location": {
                    "items": [
                        {"id": "north", "zh": "臺北市"}
                    ]
                },
                "misc": {
                    "items": [
                        {"id": "mystery", "zh": "某物"}
                    ]
                }
            }
        })
    }

    #[test]
    fn run_produces_consistent_export() {
        let run = TaxonomyPipeline::default().run(&sample()).unwrap();
        let export = &run.export;

        assert_eq!(export.synonym_map.get("豪雨"), Some("大雨"));
        assert!(export.categories.contains(&Category::weather(), "大雨"));
        assert!(export.categories.contains(&Category::location(), "臺北市"));
        assert_eq!(export.unclassified, vec!["某物".to_string()]);
        assert_eq!(export.stats.records, 4);
        assert_eq!(export.stats.classified, 3);
        assert_eq!(export.stats.per_category[&Category::weather()], 2);
    }

    #[test]
    fn synonym_data_lists_related_regions() {
        let pipeline = TaxonomyPipeline::default();
        let run = pipeline.run(&sample()).unwrap();
        let data = run.synonym_data(pipeline.normalizer());

        assert_eq!(data["rain"].zh, "大雨");
        assert_eq!(data["rain"].synonyms, vec!["豪雨".to_string()]);
        assert_eq!(
            data["front"].categories.get("weather"),
            Some(&vec!["臺北市".to_string()])
        );
        assert!(data["north"].categories.is_empty());
    }

    #[test]
    fn analysis_context_uses_run_tables() {
        let pipeline = TaxonomyPipeline::default();
        let run = pipeline.run(&sample()).unwrap();
        let ctx = run.analysis_context(pipeline.normalizer());
        let map = ctx.sememe_map("明天會下豪雨");
        assert_eq!(map.get("豪雨"), Some(&["weather".to_string()][..]));
    }

    #[test]
    fn writes_json_with_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("export.json");
        let run = TaxonomyPipeline::default().run(&sample()).unwrap();
        write_json(&path, &run.export).unwrap();
        let back: TaxonomyExport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.stats, run.export.stats);
        assert!(!path.with_extension("json.tmp").exists());

        // an existing file is replaced whole
        write_json(&path, &json!({"stale": false})).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&std::fs::read_to_string(&path).unwrap()).unwrap(),
            json!({"stale": false})
        );
    }
}
