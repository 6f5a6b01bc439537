//! Sentence-level semantic tagging used to augment retrieval text.
//!
//! All tables live in an explicit [`AnalysisContext`] built by the caller; nothing here
//! touches process-wide state.

use crate::error::Result;
use crate::normalize::Normalizer;
use crate::synonyms::{canonical_term, SynonymMap};
use crate::types::TermRecord;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Source of sememes (atomic meaning units) for words
pub trait SememeLexicon: Send + Sync {
    /// Sememes of `word`; `None` or an empty list means the word is unknown
    fn sememes(&self, word: &str) -> Option<Vec<String>>;

    /// Words the lexicon knows, used for segmentation
    fn words(&self) -> Vec<String>;
}

/// Word → sememe list loaded from a JSON object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonLexicon {
    entries: HashMap<String, Vec<String>>,
}

impl JsonLexicon {
    #[must_use]
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        Self { entries }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl SememeLexicon for JsonLexicon {
    fn sememes(&self, word: &str) -> Option<Vec<String>> {
        self.entries.get(word).cloned()
    }

    fn words(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Lexicon derived from classified taxonomy records.
///
/// A canonical term's sememes are its concept hints, or its assigned categories when it
/// has no hints.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyLexicon {
    entries: HashMap<String, Vec<String>>,
}

impl TaxonomyLexicon {
    #[must_use]
    pub fn from_records(records: &[TermRecord], normalizer: &Normalizer) -> Self {
        let mut entries = HashMap::new();
        for record in records {
            let Some(term) = canonical_term(record, normalizer) else {
                continue;
            };
            let sememes: Vec<String> = if record.concept_hints.is_empty() {
                record
                    .classification
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect()
            } else {
                record.concept_hints.clone()
            };
            if !sememes.is_empty() {
                entries.insert(term, sememes);
            }
        }
        Self { entries }
    }
}

impl SememeLexicon for TaxonomyLexicon {
    fn sememes(&self, word: &str) -> Option<Vec<String>> {
        self.entries.get(word).cloned()
    }

    fn words(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Main name and aliases of a custom sememe synonym entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomSynonym {
    pub zh: Option<String>,
    pub synonyms: Vec<String>,
}

/// Related sememes of one sememe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SememeRelation {
    pub related_to: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CustomSememeData {
    synonyms: BTreeMap<String, CustomSynonym>,
    sememe_relations: BTreeMap<String, SememeRelation>,
}

/// Custom synonym table keyed by record key, as the QA preprocessing uses it
#[must_use]
pub fn custom_synonyms_from_records(records: &[TermRecord]) -> BTreeMap<String, CustomSynonym> {
    records
        .iter()
        .map(|record| {
            let mut synonyms: Vec<String> = record.synonyms.iter().cloned().collect();
            for name in &record.linked_names {
                if !synonyms.contains(name) {
                    synonyms.push(name.clone());
                }
            }
            (
                record.key.clone(),
                CustomSynonym {
                    zh: record.primary_name.clone(),
                    synonyms,
                },
            )
        })
        .collect()
}

/// Ordered word → sememes mapping for one sentence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SememeMap {
    entries: Vec<(String, Vec<String>)>,
}

impl SememeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, keeping the first position of `word`
    pub fn insert(&mut self, word: String, sememes: Vec<String>) {
        if let Some(slot) = self.entries.iter_mut().find(|(w, _)| *w == word) {
            slot.1 = sememes;
        } else {
            self.entries.push((word, sememes));
        }
    }

    #[must_use]
    pub fn get(&self, word: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(w, _)| w == word)
            .map(|(_, s)| s.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(w, s)| (w.as_str(), s.as_slice()))
    }

    /// Sorted union of every sememe
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let tags: BTreeSet<&String> = self.entries.iter().flat_map(|(_, s)| s).collect();
        tags.into_iter().cloned().collect()
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

impl Serialize for SememeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (word, sememes) in &self.entries {
            map.serialize_entry(word, sememes)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SememeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SememeMapVisitor;

        impl<'de> Visitor<'de> for SememeMapVisitor {
            type Value = SememeMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of word to sememe list")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut out = SememeMap::new();
                while let Some((word, sememes)) = access.next_entry::<String, Vec<String>>()? {
                    out.insert(word, sememes);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(SememeMapVisitor)
    }
}

/// Full analysis of one sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceAnalysis {
    pub input: String,
    pub sememe_tags: Vec<String>,
    pub sememe_map: SememeMap,
}

/// Rendering style for [`AnalysisContext::format_sememe_map`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStyle {
    /// One human-readable line per word
    Display,
    /// Bare synonym lists, suitable for embedding text
    Vector,
}

/// Synonym list post-processing
#[derive(Debug, Clone, Copy)]
pub struct SynonymCleanup {
    pub dedupe: bool,
    pub sort: bool,
}

impl Default for SynonymCleanup {
    fn default() -> Self {
        Self {
            dedupe: true,
            sort: true,
        }
    }
}

impl SynonymCleanup {
    fn apply(self, mut synonyms: Vec<String>) -> Vec<String> {
        if self.dedupe {
            let mut seen = HashSet::new();
            synonyms.retain(|s| seen.insert(s.clone()));
        }
        if self.sort {
            synonyms.sort();
        }
        synonyms
    }
}

/// Tables injected into sentence analysis
#[derive(Clone)]
pub struct AnalysisContext {
    normalizer: Normalizer,
    synonym_map: SynonymMap,
    custom_synonyms: BTreeMap<String, CustomSynonym>,
    relations: BTreeMap<String, SememeRelation>,
    lexicon: Arc<dyn SememeLexicon>,
    vocabulary: HashSet<String>,
    max_word_chars: usize,
}

impl fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("synonyms", &self.synonym_map.len())
            .field("custom_synonyms", &self.custom_synonyms.len())
            .field("relations", &self.relations.len())
            .field("vocabulary", &self.vocabulary.len())
            .finish()
    }
}

impl AnalysisContext {
    #[must_use]
    pub fn new(
        normalizer: Normalizer,
        synonym_map: SynonymMap,
        lexicon: Arc<dyn SememeLexicon>,
    ) -> Self {
        let mut ctx = Self {
            normalizer,
            synonym_map,
            custom_synonyms: BTreeMap::new(),
            relations: BTreeMap::new(),
            lexicon,
            vocabulary: HashSet::new(),
            max_word_chars: 1,
        };
        ctx.rebuild_vocabulary();
        ctx
    }

    #[must_use]
    pub fn with_custom_synonyms(mut self, synonyms: BTreeMap<String, CustomSynonym>) -> Self {
        self.custom_synonyms = synonyms;
        self
    }

    #[must_use]
    pub fn with_relations(mut self, relations: BTreeMap<String, SememeRelation>) -> Self {
        self.relations = relations;
        self
    }

    /// Replace custom synonyms and relations from `{synonyms, sememe_relations}` JSON
    pub fn load_custom_sememe_data(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let data: CustomSememeData = serde_json::from_str(&raw)?;
        log::info!(
            "Loaded {} custom sememe synonyms and {} relations",
            data.synonyms.len(),
            data.sememe_relations.len()
        );
        self.custom_synonyms = data.synonyms;
        self.relations = data.sememe_relations;
        Ok(())
    }

    #[must_use]
    pub const fn synonym_map(&self) -> &SynonymMap {
        &self.synonym_map
    }

    fn rebuild_vocabulary(&mut self) {
        let mut vocabulary: HashSet<String> = self.synonym_map.keys().map(String::from).collect();
        vocabulary.extend(
            self.lexicon
                .words()
                .iter()
                .map(|w| self.normalizer.normalize(w))
                .filter(|w| !w.is_empty()),
        );
        self.max_word_chars = vocabulary
            .iter()
            .map(|w| w.chars().count())
            .max()
            .unwrap_or(1)
            .max(1);
        self.vocabulary = vocabulary;
    }

    /// Split a sentence into words by forward maximum matching against the vocabulary.
    ///
    /// Unknown ASCII runs stay whole, other unknown characters become single-character
    /// words; whitespace and punctuation are dropped.
    #[must_use]
    pub fn segment(&self, sentence: &str) -> Vec<String> {
        let chars: Vec<char> = sentence.chars().collect();
        let mut words = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            if !chars[i].is_alphanumeric() {
                i += 1;
                continue;
            }

            let longest = (i + 1..=chars.len().min(i + self.max_word_chars))
                .rev()
                .find(|&end| {
                    let candidate: String = chars[i..end].iter().collect();
                    self.vocabulary.contains(&self.normalizer.normalize(&candidate))
                });

            let end = match longest {
                Some(end) => end,
                None if chars[i].is_ascii_alphanumeric() => {
                    let run = chars[i..]
                        .iter()
                        .take_while(|c| c.is_ascii_alphanumeric())
                        .count();
                    i + run
                }
                None => i + 1,
            };
            words.push(chars[i..end].iter().collect());
            i = end;
        }
        words
    }

    /// Sememes of one word after synonym resolution
    #[must_use]
    pub fn word_sememes(&self, word: &str) -> Option<Vec<String>> {
        let normalized = self.normalizer.normalize(word);
        let canonical = self.synonym_map.resolve(&normalized);
        self.lexicon
            .sememes(canonical)
            .or_else(|| self.lexicon.sememes(word))
            .filter(|s| !s.is_empty())
    }

    /// Word → sememes for a sentence.
    ///
    /// A word without sememes is merged with the following word when the pair has them.
    #[must_use]
    pub fn sememe_map(&self, sentence: &str) -> SememeMap {
        let words = self.segment(sentence);
        let mut map = SememeMap::new();
        let mut i = 0;
        while i < words.len() {
            let word = &words[i];
            match self.word_sememes(word) {
                Some(sememes) => {
                    map.insert(word.clone(), sememes);
                    i += 1;
                }
                None => {
                    if let Some(next) = words.get(i + 1) {
                        let combined = format!("{word}{next}");
                        if let Some(sememes) = self.word_sememes(&combined) {
                            map.insert(combined, sememes);
                            i += 2;
                            continue;
                        }
                    }
                    map.insert(word.clone(), Vec::new());
                    i += 1;
                }
            }
        }
        map
    }

    /// Sorted sememe tags of a sentence
    #[must_use]
    pub fn sememe_tags(&self, sentence: &str) -> Vec<String> {
        self.sememe_map(sentence).tags()
    }

    #[must_use]
    pub fn analyze(&self, sentence: &str) -> SentenceAnalysis {
        let sememe_map = self.sememe_map(sentence);
        SentenceAnalysis {
            input: sentence.to_string(),
            sememe_tags: sememe_map.tags(),
            sememe_map,
        }
    }

    /// One descriptive sentence per word that carries sememes
    #[must_use]
    pub fn pseudo_text(&self, sentence: &str) -> String {
        self.sememe_map(sentence)
            .iter()
            .filter(|(_, sememes)| !sememes.is_empty())
            .map(|(word, sememes)| format!("「{word}」的語義包含{}。", sememes.join("、")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Main name followed by aliases for a sememe, or the sememe name alone
    #[must_use]
    pub fn custom_synonyms(&self, sememe: &str) -> Vec<String> {
        let key = sememe.split('|').next().unwrap_or(sememe);
        let entry = self.custom_synonyms.get(key).or_else(|| {
            self.custom_synonyms
                .values()
                .find(|entry| entry.synonyms.iter().any(|s| s == key))
        });
        match entry {
            Some(entry) => {
                let main = entry.zh.clone().unwrap_or_else(|| key.to_string());
                std::iter::once(main)
                    .chain(entry.synonyms.iter().cloned())
                    .collect()
            }
            None => vec![key.to_string()],
        }
    }

    /// Render a sememe map with custom synonyms expanded
    #[must_use]
    pub fn format_sememe_map(
        &self,
        map: &SememeMap,
        style: FormatStyle,
        cleanup: SynonymCleanup,
    ) -> Vec<String> {
        map.iter()
            .filter(|(_, sememes)| !sememes.is_empty())
            .map(|(word, sememes)| {
                let groups: Vec<Vec<String>> = sememes
                    .iter()
                    .map(|s| cleanup.apply(self.custom_synonyms(s)))
                    .collect();
                match style {
                    FormatStyle::Vector => groups.concat().join("、"),
                    FormatStyle::Display => {
                        let enhanced: Vec<String> = groups.iter().map(|g| g.join("、")).collect();
                        format!("「{word}」對應語意：{{{{{}}}}}", enhanced.join(", "))
                    }
                }
            })
            .collect()
    }

    /// `"[Q] {question} [SEP] {description}"` with expanded sememe synonyms
    #[must_use]
    pub fn augmented_query(&self, question: &str, map: &SememeMap) -> String {
        let cleanup = SynonymCleanup::default();
        let description = map
            .iter()
            .filter(|(_, sememes)| !sememes.is_empty())
            .map(|(word, sememes)| {
                let expanded = cleanup.apply(
                    sememes
                        .iter()
                        .flat_map(|s| self.custom_synonyms(s))
                        .collect(),
                );
                format!("{word} 含有語意「{}」", expanded.join("、"))
            })
            .collect::<Vec<_>>()
            .join("；");
        format!("[Q] {question} [SEP] {description}")
    }

    /// Sememes related to `name` in either direction, sorted
    #[must_use]
    pub fn related_sememes(&self, name: &str) -> Vec<String> {
        let Some(entry) = self.relations.get(name) else {
            return Vec::new();
        };
        let mut related: BTreeSet<String> = entry.related_to.iter().cloned().collect();
        related.extend(
            self.relations
                .iter()
                .filter(|(_, rel)| rel.related_to.iter().any(|r| r == name))
                .map(|(key, _)| key.clone()),
        );
        related.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lexicon(pairs: &[(&str, &[&str])]) -> Arc<dyn SememeLexicon> {
        Arc::new(JsonLexicon::new(
            pairs
                .iter()
                .map(|(w, s)| {
                    (
                        (*w).to_string(),
                        s.iter().map(|x| (*x).to_string()).collect(),
                    )
                })
                .collect(),
        ))
    }

    fn context() -> AnalysisContext {
        let synonyms: SynonymMap = [("豪雨", "大雨"), ("大雨", "大雨")]
            .iter()
            .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
            .collect();
        AnalysisContext::new(
            Normalizer::default(),
            synonyms,
            lexicon(&[
                ("大雨", &["weather|天氣", "rain|降雨"]),
                ("臺北", &["place|地方"]),
                ("明天", &["time|時間"]),
            ]),
        )
    }

    #[test]
    fn segments_by_longest_vocabulary_match() {
        let ctx = context();
        assert_eq!(
            ctx.segment("明天台北會下豪雨嗎？"),
            vec!["明天", "台北", "會", "下", "豪雨", "嗎"]
        );
        assert_eq!(ctx.segment("GPS 定位"), vec!["GPS", "定", "位"]);
    }

    #[test]
    fn sememe_map_resolves_synonyms() {
        let ctx = context();
        let map = ctx.sememe_map("明天下豪雨");
        assert_eq!(
            map.get("豪雨"),
            Some(&["weather|天氣".to_string(), "rain|降雨".to_string()][..])
        );
        assert_eq!(map.get("下"), Some(&[][..]));
        assert_eq!(
            ctx.sememe_tags("明天下豪雨"),
            vec!["rain|降雨", "time|時間", "weather|天氣"]
        );
    }

    #[test]
    fn unknown_word_combines_with_next() {
        let ctx = AnalysisContext::new(
            Normalizer::default(),
            SynonymMap::new(),
            lexicon(&[("霧", &[]), ("霧峰", &["place|地方"])]),
        );
        // the vocabulary knows 霧峰, so segmentation already yields it whole
        assert_eq!(ctx.segment("霧峰"), vec!["霧峰"]);

        let ctx = AnalysisContext::new(
            Normalizer::default(),
            SynonymMap::new(),
            lexicon(&[("x", &[]), ("ab", &["pair"])]),
        );
        let map = ctx.sememe_map("a b");
        assert_eq!(map.get("ab"), Some(&["pair".to_string()][..]));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn custom_synonyms_resolve_by_key_or_alias() {
        let mut custom = BTreeMap::new();
        custom.insert(
            "rain".to_string(),
            CustomSynonym {
                zh: Some("雨".to_string()),
                synonyms: vec!["降雨".to_string(), "下雨".to_string()],
            },
        );
        let ctx = context().with_custom_synonyms(custom);
        assert_eq!(ctx.custom_synonyms("rain|降雨"), vec!["雨", "降雨", "下雨"]);
        assert_eq!(ctx.custom_synonyms("下雨"), vec!["雨", "降雨", "下雨"]);
        assert_eq!(ctx.custom_synonyms("time|時間"), vec!["time"]);
    }

    #[test]
    fn augmented_query_and_formatting() {
        let ctx = context();
        let map = ctx.sememe_map("豪雨");
        assert_eq!(
            ctx.augmented_query("會下豪雨嗎", &map),
            "[Q] 會下豪雨嗎 [SEP] 豪雨 含有語意「rain、weather」"
        );
        assert_eq!(
            ctx.format_sememe_map(&map, FormatStyle::Display, SynonymCleanup::default()),
            vec!["「豪雨」對應語意：{{weather, rain}}"]
        );
        assert_eq!(
            ctx.format_sememe_map(&map, FormatStyle::Vector, SynonymCleanup::default()),
            vec!["weather、rain"]
        );
        assert_eq!(
            ctx.pseudo_text("豪雨"),
            "「豪雨」的語義包含weather|天氣、rain|降雨。"
        );
    }

    #[test]
    fn related_sememes_are_symmetric() {
        let mut relations = BTreeMap::new();
        relations.insert(
            "rain".to_string(),
            SememeRelation {
                related_to: vec!["cloud".to_string()],
            },
        );
        relations.insert(
            "flood".to_string(),
            SememeRelation {
                related_to: vec!["rain".to_string()],
            },
        );
        let ctx = context().with_relations(relations);
        assert_eq!(ctx.related_sememes("rain"), vec!["cloud", "flood"]);
        assert!(ctx.related_sememes("cloud").is_empty());
    }

    #[test]
    fn sememe_map_serializes_in_order() {
        let ctx = context();
        let map = ctx.sememe_map("明天豪雨");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"明天":["time|時間"],"豪雨":["weather|天氣","rain|降雨"]}"#
        );
        let back: SememeMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
