use crate::normalize::Normalizer;
use crate::types::TermRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized surface form → normalized canonical term
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynonymMap {
    entries: BTreeMap<String, String>,
}

/// A surface form claimed by two different canonical terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymCollision {
    pub surface: String,
    pub previous: String,
    pub current: String,
    pub record_key: String,
}

impl SynonymMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping, returning the previous canonical target if it differed
    pub fn insert(&mut self, surface: String, canonical: String) -> Option<String> {
        match self.entries.insert(surface, canonical.clone()) {
            Some(prev) if prev != canonical => Some(prev),
            _ => None,
        }
    }

    #[must_use]
    pub fn get(&self, surface: &str) -> Option<&str> {
        self.entries.get(surface).map(String::as_str)
    }

    /// Canonical form of `word`, or `word` itself when unknown
    #[must_use]
    pub fn resolve<'a>(&'a self, word: &'a str) -> &'a str {
        self.get(word).unwrap_or(word)
    }

    #[must_use]
    pub fn contains(&self, surface: &str) -> bool {
        self.entries.contains_key(surface)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for SynonymMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Synonym map plus every collision that was resolved by last-write-wins
#[derive(Debug, Clone, Default)]
pub struct SynonymBuild {
    pub map: SynonymMap,
    pub collisions: Vec<SynonymCollision>,
}

/// Canonical term of a record: its normalized primary name, if non-empty
#[must_use]
pub fn canonical_term(record: &TermRecord, normalizer: &Normalizer) -> Option<String> {
    let name = record.primary_name.as_deref()?;
    let canonical = normalizer.normalize(name);
    (!canonical.is_empty()).then_some(canonical)
}

/// Map every surface form of every record to the record's canonical term.
///
/// Collisions across records keep the later mapping and are logged as warnings.
#[must_use]
pub fn build_synonym_map(records: &[TermRecord], normalizer: &Normalizer) -> SynonymBuild {
    let mut build = SynonymBuild::default();
    for record in records {
        let Some(canonical) = canonical_term(record, normalizer) else {
            continue;
        };
        for form in record.surface_forms() {
            let surface = normalizer.normalize(form);
            if surface.is_empty() {
                continue;
            }
            if let Some(previous) = build.map.insert(surface.clone(), canonical.clone()) {
                log::warn!(
                    "Synonym collision: '{surface}' mapped to '{previous}', now '{canonical}' (record {})",
                    record.key
                );
                build.collisions.push(SynonymCollision {
                    surface,
                    previous,
                    current: canonical.clone(),
                    record_key: record.key.clone(),
                });
            }
        }
    }
    log::info!(
        "Synonym map built: {} entries, {} collisions",
        build.map.len(),
        build.collisions.len()
    );
    build
}
