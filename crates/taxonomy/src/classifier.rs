//! Priority-ordered classification cascade.
//!
//! Each strategy is a pure function `record -> Option<Decision>`; strategies run in
//! `CASCADE` order and the first decision wins.

use crate::config::{ClassifierConfig, PrefixRule};
use crate::normalize::Normalizer;
use crate::synonyms::canonical_term;
use crate::types::{Category, CategorySet, TermRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

/// Prefix → category lookup, ordered longest prefix first
#[derive(Debug, Clone, Default)]
pub struct PrefixTable {
    rules: Vec<(String, Category)>,
}

impl PrefixTable {
    #[must_use]
    pub fn new(rules: &[PrefixRule]) -> Self {
        let mut rules: Vec<(String, Category)> = rules
            .iter()
            .map(|r| (r.prefix.to_lowercase(), r.category.clone()))
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        rules.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });
        rules.dedup_by(|a, b| a.0 == b.0);
        Self { rules }
    }

    /// Longest prefix of `text` (lower-cased) with its category
    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<(&str, &Category)> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|(prefix, _)| lowered.starts_with(prefix.as_str()))
            .map(|(prefix, cat)| (prefix.as_str(), cat))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Which cascade step produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    PathPrefix,
    IdentifierPrefix,
    RelatedIdentifier,
    SemanticClue,
    Suffix,
    /// Corrective pass after the cascade
    Correction,
}

impl Rule {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PathPrefix => "path_prefix",
            Self::IdentifierPrefix => "identifier_prefix",
            Self::RelatedIdentifier => "related_identifier",
            Self::SemanticClue => "semantic_clue",
            Self::Suffix => "suffix",
            Self::Correction => "correction",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one successful strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub category: Category,
    pub rule: Rule,
    /// The value that triggered the rule
    pub matched: String,
    /// The prefix, keyword or suffix it matched against
    pub pattern: String,
}

impl Decision {
    fn new(category: &Category, rule: Rule, matched: &str, pattern: &str) -> Self {
        Self {
            category: category.clone(),
            rule,
            matched: matched.to_string(),
            pattern: pattern.to_string(),
        }
    }

    /// Human-readable justification stored in `TermRecord::trigger_trace`
    #[must_use]
    pub fn justification(&self) -> String {
        format!(
            "{} '{}' matched '{}' -> {}",
            self.rule, self.matched, self.pattern, self.category
        )
    }
}

/// One classification decision, for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub key: String,
    pub term: String,
    pub category: Category,
    pub rule: Rule,
    pub matched: String,
}

/// Result of one classification pass
#[derive(Debug, Clone, Default)]
pub struct ClassificationOutcome {
    pub categories: CategorySet,
    pub classified: BTreeSet<String>,
    pub unclassified: BTreeSet<String>,
    pub trace: Vec<TraceEntry>,
    /// Records skipped because their primary name normalizes to nothing
    pub skipped: usize,
}

type Strategy = fn(&Classifier, &TermRecord) -> Option<Decision>;

const CASCADE: [Strategy; 5] = [
    Classifier::by_path_prefix,
    Classifier::by_identifier_prefix,
    Classifier::by_related_identifier,
    Classifier::by_semantic_clue,
    Classifier::by_suffix,
];

/// Assigns each canonical term to exactly one category
#[derive(Debug, Clone)]
pub struct Classifier {
    normalizer: Normalizer,
    prefixes: PrefixTable,
    families: Vec<(Category, Vec<String>)>,
    suffixes: Vec<String>,
    suffix_category: Category,
    categories: BTreeSet<Category>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl Classifier {
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        let normalizer = Normalizer::from_config(config);
        let families = config
            .keyword_families
            .iter()
            .map(|family| {
                let keywords = family
                    .keywords
                    .iter()
                    .map(|k| normalizer.normalize(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                (family.category.clone(), keywords)
            })
            .collect();
        let suffixes = config
            .location_suffixes
            .iter()
            .map(|s| normalizer.normalize(s))
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            prefixes: PrefixTable::new(&config.prefix_rules),
            families,
            suffixes,
            suffix_category: config.suffix_category.clone(),
            categories: config.categories(),
            normalizer,
        }
    }

    #[must_use]
    pub const fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    #[must_use]
    pub const fn prefix_table(&self) -> &PrefixTable {
        &self.prefixes
    }

    /// Run the cascade for one record without mutating it
    #[must_use]
    pub fn decide(&self, record: &TermRecord) -> Option<Decision> {
        CASCADE.iter().find_map(|strategy| strategy(self, record))
    }

    /// Classify every record in place and collect the per-category term sets
    pub fn classify(&self, records: &mut [TermRecord]) -> ClassificationOutcome {
        let mut outcome = ClassificationOutcome {
            categories: CategorySet::with_categories(self.categories.iter().cloned()),
            ..ClassificationOutcome::default()
        };

        for record in records.iter_mut() {
            let Some(term) = canonical_term(record, &self.normalizer) else {
                outcome.skipped += 1;
                continue;
            };
            record.classification.clear();
            record.trigger_trace.clear();

            match self.decide(record) {
                Some(decision) => {
                    log::debug!("{} ({}): {}", term, record.key, decision.justification());
                    record.classification.push(decision.category.clone());
                    record.trigger_trace.push(decision.justification());
                    if let Some(previous) = outcome.categories.assign(&term, &decision.category) {
                        log::debug!(
                            "Term '{term}' reassigned from {previous} to {} by record {}",
                            decision.category,
                            record.key
                        );
                    }
                    outcome.unclassified.remove(&term);
                    outcome.classified.insert(term.clone());
                    outcome.trace.push(TraceEntry {
                        key: record.key.clone(),
                        term,
                        category: decision.category,
                        rule: decision.rule,
                        matched: decision.matched,
                    });
                }
                None => {
                    if !outcome.classified.contains(&term) {
                        outcome.unclassified.insert(term);
                    }
                }
            }
        }

        log::info!(
            "Classified {} terms, {} unclassified, {} records skipped",
            outcome.classified.len(),
            outcome.unclassified.len(),
            outcome.skipped
        );
        outcome
    }

    fn by_path_prefix(&self, record: &TermRecord) -> Option<Decision> {
        record.category_path.iter().find_map(|entry| {
            self.prefixes
                .lookup(entry)
                .map(|(prefix, cat)| Decision::new(cat, Rule::PathPrefix, entry, prefix))
        })
    }

    fn by_identifier_prefix(&self, record: &TermRecord) -> Option<Decision> {
        // a name standing in for a missing id is not an identifier
        if !record.explicit_id {
            return None;
        }
        self.prefixes
            .lookup(&record.key)
            .map(|(prefix, cat)| Decision::new(cat, Rule::IdentifierPrefix, &record.key, prefix))
    }

    fn by_related_identifier(&self, record: &TermRecord) -> Option<Decision> {
        record.related_ids.iter().find_map(|id| {
            self.prefixes
                .lookup(id)
                .map(|(prefix, cat)| Decision::new(cat, Rule::RelatedIdentifier, id, prefix))
        })
    }

    fn by_semantic_clue(&self, record: &TermRecord) -> Option<Decision> {
        let clues = record
            .alt_name
            .iter()
            .chain(record.linked_names.iter())
            .chain(record.tags.iter())
            .chain(record.concept_hints.iter());

        for clue in clues {
            let normalized = self.normalizer.normalize(clue);
            if normalized.is_empty() {
                continue;
            }
            for (category, keywords) in &self.families {
                if let Some(keyword) = keywords.iter().find(|k| normalized.contains(k.as_str())) {
                    return Some(Decision::new(category, Rule::SemanticClue, clue, keyword));
                }
            }
        }
        None
    }

    fn by_suffix(&self, record: &TermRecord) -> Option<Decision> {
        let name = record.primary_name.as_deref()?;
        let normalized = self.normalizer.normalize(name);
        let last = normalized.graphemes(true).next_back()?;
        self.suffixes
            .iter()
            .find(|suffix| suffix.as_str() == last)
            .map(|suffix| Decision::new(&self.suffix_category, Rule::Suffix, name, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rules(pairs: &[(&str, &str)]) -> Vec<PrefixRule> {
        pairs
            .iter()
            .map(|(prefix, cat)| PrefixRule {
                prefix: (*prefix).to_string(),
                category: Category::new(*cat),
            })
            .collect()
    }

    #[test]
    fn prefix_table_prefers_longest_prefix() {
        let table = PrefixTable::new(&rules(&[("tw", "location"), ("tw-weather", "weather")]));
        assert_eq!(
            table.lookup("TW-Weather-rain"),
            Some(("tw-weather", &Category::weather()))
        );
        assert_eq!(table.lookup("tw-x"), Some(("tw", &Category::location())));
        assert_eq!(table.lookup("jp-x"), None);
    }

    #[test]
    fn path_prefix_beats_semantic_clue() {
        let classifier = Classifier::default();
        let record = TermRecord::new("x")
            .primary_name("季風雨")
            .path(["Country", "Taiwan", "tw-weather-category"])
            .tag("季風氣候");
        let decision = classifier.decide(&record).unwrap();
        assert_eq!(decision.rule, Rule::PathPrefix);
        assert_eq!(decision.category, Category::weather());
    }

    #[test]
    fn cascade_falls_through_in_order() {
        let classifier = Classifier::default();

        let by_id = TermRecord::new("tw-climate-07").primary_name("聖嬰現象");
        assert_eq!(
            classifier.decide(&by_id).map(|d| d.rule),
            Some(Rule::IdentifierPrefix)
        );

        let by_related = TermRecord::new("x1")
            .primary_name("玉山")
            .related("tw-geo-mountain-01");
        let decision = classifier.decide(&by_related).unwrap();
        assert_eq!(decision.rule, Rule::RelatedIdentifier);
        assert_eq!(decision.category, Category::geo_feature());

        let by_clue = TermRecord::new("x2")
            .primary_name("焚風")
            .concept_hint("天氣現象");
        assert_eq!(
            classifier.decide(&by_clue).map(|d| (d.rule, d.category)),
            Some((Rule::SemanticClue, Category::weather()))
        );

        let by_suffix = TermRecord::new("x3").primary_name("新竹市");
        assert_eq!(
            classifier.decide(&by_suffix).map(|d| (d.rule, d.category)),
            Some((Rule::Suffix, Category::location()))
        );

        let nothing = TermRecord::new("x4").primary_name("其他");
        assert_eq!(classifier.decide(&nothing), None);
    }

    #[test]
    fn name_keys_skip_identifier_prefixes() {
        let classifier = Classifier::default();
        let record = TermRecord::keyed_by_name("里程數").primary_name("里程數");
        assert_eq!(classifier.decide(&record), None);

        let with_id = TermRecord::new("里程數").primary_name("里程數");
        assert_eq!(
            classifier.decide(&with_id).map(|d| d.rule),
            Some(Rule::IdentifierPrefix)
        );
    }

    #[test]
    fn semantic_keyword_families_follow_priority() {
        let classifier = Classifier::default();
        // contains both a climate and a weather keyword
        let record = TermRecord::new("x").primary_name("某詞").tag("季風降雨");
        assert_eq!(
            classifier.decide(&record).map(|d| d.category),
            Some(Category::climate())
        );
    }

    #[test]
    fn first_matching_clue_wins() {
        let classifier = Classifier::default();
        let record = TermRecord::new("x")
            .primary_name("某詞")
            .tag("typhoon season")
            .concept_hint("氣候");
        let decision = classifier.decide(&record).unwrap();
        assert_eq!(decision.matched, "typhoon season");
        assert_eq!(decision.category, Category::weather());
    }

    #[test]
    fn classify_records_trace_and_sets() {
        let classifier = Classifier::default();
        let mut records = vec![
            TermRecord::new("tw-weather-rain-01")
                .primary_name("大雨")
                .path(["Country", "Taiwan", "tw-weather-rain-category"]),
            TermRecord::new("x").primary_name("其他"),
            TermRecord::new("y").alt_name("no primary"),
        ];
        let outcome = classifier.classify(&mut records);

        assert!(outcome.categories.contains(&Category::weather(), "大雨"));
        assert_eq!(records[0].classification, vec![Category::weather()]);
        assert_eq!(records[0].trigger_trace.len(), 1);
        assert!(records[0].trigger_trace[0].starts_with("path_prefix"));
        assert!(outcome.unclassified.contains("其他"));
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.trace.len(), 1);
    }

    #[test]
    fn shared_canonical_term_stays_exclusive() {
        let classifier = Classifier::default();
        let mut records = vec![
            TermRecord::new("tw-climate-1").primary_name("雨季"),
            TermRecord::new("tw-weather-1").primary_name("雨季"),
            TermRecord::new("z").primary_name("雨季"),
        ];
        let outcome = classifier.classify(&mut records);
        assert_eq!(outcome.categories.category_of("雨季"), Some(&Category::weather()));
        assert_eq!(outcome.categories.len(), 1);
        assert!(!outcome.unclassified.contains("雨季"));
    }
}
