use crate::config::{ClassifierConfig, CorrectionRule};
use crate::normalize::Normalizer;
use crate::types::{CategorySet, ReclassifiedTerm};
use std::collections::BTreeSet;

/// Final lexical override pass fixing known cascade mistakes.
///
/// Rules are tried in order; the first rule whose keyword occurs in a term and whose
/// exclusion list does not name it decides the target. Running the pass again moves
/// nothing.
#[derive(Debug, Clone)]
pub struct Reclassifier {
    rules: Vec<CorrectionRule>,
}

impl Default for Reclassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl Reclassifier {
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        let normalizer = Normalizer::from_config(config);
        let rules = config
            .corrections
            .iter()
            .map(|rule| CorrectionRule {
                target: rule.target.clone(),
                keywords: rule.keywords.iter().map(|k| normalizer.normalize(k)).collect(),
                exclusions: rule
                    .exclusions
                    .iter()
                    .map(|k| normalizer.normalize(k))
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    /// Move matching terms and return the audit log
    pub fn reclassify(
        &self,
        categories: &mut CategorySet,
        classified: &BTreeSet<String>,
    ) -> Vec<ReclassifiedTerm> {
        let mut log_entries = Vec::new();
        for term in classified {
            let Some((rule, keyword)) = self.rules.iter().find_map(|rule| {
                if rule.exclusions.iter().any(|e| e == term) {
                    return None;
                }
                rule.keywords
                    .iter()
                    .find(|k| term.contains(k.as_str()))
                    .map(|k| (rule, k))
            }) else {
                continue;
            };

            let current = categories.category_of(term).cloned();
            if current.as_ref() == Some(&rule.target) {
                continue;
            }
            categories.assign(term, &rule.target);
            log::info!(
                "Reclassified '{term}': {} -> {} (keyword '{keyword}')",
                current.as_ref().map_or("none", |c| c.as_str()),
                rule.target
            );
            log_entries.push(ReclassifiedTerm::new(
                term.clone(),
                current,
                rule.target.clone(),
                keyword.clone(),
            ));
        }
        log_entries
    }
}
