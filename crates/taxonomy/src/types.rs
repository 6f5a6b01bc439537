use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A category tag.
///
/// The built-in tags form a closed set; prefix rules loaded from configuration may
/// introduce additional tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub const GEO_FEATURE: &'static str = "geo_feature";
    pub const CLIMATE: &'static str = "climate";
    pub const WEATHER: &'static str = "weather";
    pub const LOCATION: &'static str = "location";

    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn geo_feature() -> Self {
        Self::new(Self::GEO_FEATURE)
    }

    #[must_use]
    pub fn climate() -> Self {
        Self::new(Self::CLIMATE)
    }

    #[must_use]
    pub fn weather() -> Self {
        Self::new(Self::WEATHER)
    }

    #[must_use]
    pub fn location() -> Self {
        Self::new(Self::LOCATION)
    }

    /// The built-in closed set, in classifier priority order
    #[must_use]
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::geo_feature(),
            Self::climate(),
            Self::weather(),
            Self::location(),
        ]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One taxonomy entry after flattening
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRecord {
    /// Stable identifier (explicit id, else primary name, else alternate name)
    pub key: String,

    /// `key` came from the entry's own `id` field rather than a name fallback
    #[serde(default)]
    pub explicit_id: bool,

    /// Primary surface form
    pub primary_name: Option<String>,

    /// Cross-lingual counterpart
    pub alt_name: Option<String>,

    /// Declared synonyms and extra primary names
    pub synonyms: BTreeSet<String>,

    /// Names linked from other languages/resources
    pub linked_names: Vec<String>,

    /// Grouping labels from the taxonomy root to this entry
    pub category_path: Vec<String>,

    /// Identifiers of linked entries
    pub related_ids: BTreeSet<String>,

    /// Free-form semantic tags
    pub tags: Vec<String>,

    /// Concept hints, including concept parent/related references
    pub concept_hints: Vec<String>,

    /// Assigned categories (empty until classified)
    pub classification: Vec<Category>,

    /// One justification per classification decision
    pub trigger_trace: Vec<String>,
}

impl TermRecord {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            explicit_id: true,
            ..Self::default()
        }
    }

    /// Record keyed by one of its names because the entry carried no `id`
    #[must_use]
    pub fn keyed_by_name(key: impl Into<String>) -> Self {
        Self {
            explicit_id: false,
            ..Self::new(key)
        }
    }

    #[must_use]
    pub fn primary_name(mut self, name: impl Into<String>) -> Self {
        self.primary_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn alt_name(mut self, name: impl Into<String>) -> Self {
        self.alt_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn synonym(mut self, synonym: impl Into<String>) -> Self {
        self.synonyms.insert(synonym.into());
        self
    }

    #[must_use]
    pub fn path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_path = path.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn related(mut self, id: impl Into<String>) -> Self {
        self.related_ids.insert(id.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn concept_hint(mut self, hint: impl Into<String>) -> Self {
        self.concept_hints.push(hint.into());
        self
    }

    /// Every non-empty surface form: primary name, synonyms, alternate and linked names
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> {
        self.primary_name
            .iter()
            .map(String::as_str)
            .chain(self.synonyms.iter().map(String::as_str))
            .chain(self.alt_name.iter().map(String::as_str))
            .chain(self.linked_names.iter().map(String::as_str))
            .filter(|s| !s.is_empty())
    }
}

/// Category tag → canonical terms. A term belongs to at most one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySet {
    sets: BTreeMap<Category, BTreeSet<String>>,
}

impl CategorySet {
    /// Create a set with an empty bucket for every given category
    #[must_use]
    pub fn with_categories<I: IntoIterator<Item = Category>>(categories: I) -> Self {
        Self {
            sets: categories
                .into_iter()
                .map(|cat| (cat, BTreeSet::new()))
                .collect(),
        }
    }

    /// Put `term` into `category`, removing it from any other category first.
    ///
    /// Returns the category the term was moved out of, if any.
    pub fn assign(&mut self, term: &str, category: &Category) -> Option<Category> {
        let previous = self.category_of(term).cloned();
        if let Some(prev) = &previous {
            if prev == category {
                return None;
            }
            if let Some(terms) = self.sets.get_mut(prev) {
                terms.remove(term);
            }
        }
        self.sets
            .entry(category.clone())
            .or_default()
            .insert(term.to_string());
        previous
    }

    /// Category currently holding `term`
    #[must_use]
    pub fn category_of(&self, term: &str) -> Option<&Category> {
        self.sets
            .iter()
            .find(|(_, terms)| terms.contains(term))
            .map(|(cat, _)| cat)
    }

    #[must_use]
    pub fn terms(&self, category: &Category) -> Option<&BTreeSet<String>> {
        self.sets.get(category)
    }

    #[must_use]
    pub fn contains(&self, category: &Category, term: &str) -> bool {
        self.sets
            .get(category)
            .is_some_and(|terms| terms.contains(term))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Category, &BTreeSet<String>)> {
        self.sets.iter()
    }

    /// Total number of classified terms
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One entry of the corrective-pass audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclassifiedTerm {
    pub term: String,
    pub from: Option<Category>,
    pub to: Category,
    /// Correction keyword found in the term
    pub keyword: String,
}

impl ReclassifiedTerm {
    #[must_use]
    pub fn new(
        term: impl Into<String>,
        from: Option<Category>,
        to: Category,
        keyword: impl Into<String>,
    ) -> Self {
        Self {
            term: term.into(),
            from,
            to,
            keyword: keyword.into(),
        }
    }

    /// Trace line in the same shape as the cascade's justifications
    #[must_use]
    pub fn justification(&self) -> String {
        format!(
            "correction '{}' matched '{}' -> {}",
            self.term, self.keyword, self.to
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_moves_term_between_categories() {
        let mut set = CategorySet::with_categories(Category::builtin());
        assert_eq!(set.assign("冷鋒", &Category::climate()), None);
        assert_eq!(
            set.assign("冷鋒", &Category::weather()),
            Some(Category::climate())
        );
        assert!(!set.contains(&Category::climate(), "冷鋒"));
        assert!(set.contains(&Category::weather(), "冷鋒"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn assign_same_category_is_noop() {
        let mut set = CategorySet::default();
        set.assign("大雨", &Category::weather());
        assert_eq!(set.assign("大雨", &Category::weather()), None);
        assert_eq!(set.category_of("大雨"), Some(&Category::weather()));
    }

    #[test]
    fn surface_forms_skip_empty_names() {
        let record = TermRecord::new("x")
            .primary_name("大雨")
            .alt_name("")
            .synonym("豪雨");
        let forms: Vec<&str> = record.surface_forms().collect();
        assert_eq!(forms, vec!["大雨", "豪雨"]);
    }
}
