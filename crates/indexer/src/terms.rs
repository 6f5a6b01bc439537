//! Synonym-data entries → term documents plus per-region location documents.

use crate::error::{require_file, Result};
use sememe_vector_store::MetadataRecord;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Names {
    One(String),
    Many(Vec<String>),
}

/// One synonym-data entry; `zh` may hold a single name or a list of names
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TermEntry {
    pub zh: Option<Names>,
    pub synonyms: Vec<String>,
    pub categories: BTreeMap<String, Vec<String>>,
}

impl TermEntry {
    /// Standard name and the full list of names, falling back to `key`
    #[must_use]
    pub fn names(&self, key: &str) -> (String, Vec<String>) {
        let names: Vec<String> = match &self.zh {
            Some(Names::One(name)) if !name.is_empty() => vec![name.clone()],
            Some(Names::Many(names)) if !names.is_empty() => names.clone(),
            _ => vec![key.to_string()],
        };
        (names[0].clone(), names)
    }
}

/// Load entries in file order
pub fn load_synonym_data(path: &Path) -> Result<Vec<(String, TermEntry)>> {
    require_file(path)?;
    let raw: Map<String, Value> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let mut entries = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let entry: TermEntry = serde_json::from_value(value)?;
        entries.push((key, entry));
    }
    Ok(entries)
}

/// One document per entry and one per listed region city
#[must_use]
pub fn term_documents(entries: &[(String, TermEntry)]) -> Vec<MetadataRecord> {
    let mut docs = Vec::new();
    for (i, (key, entry)) in entries.iter().enumerate() {
        let (standard, mut parts) = entry.names(key);
        parts.extend(entry.synonyms.iter().cloned());
        let description = format!("{}。這些是相關語義擴展資訊。", parts.join("、"));

        docs.push(MetadataRecord::new(
            format!("custom_{i}"),
            format!("[Q] {standard} [SEP] {description}"),
            json!({
                "term": standard,
                "synonyms": entry.synonyms,
                "categories": entry.categories,
                "is_location": false,
            }),
        ));

        for cities in entry.categories.values() {
            for city in cities {
                docs.push(MetadataRecord::new(
                    format!("city_{i}_{city}"),
                    format!("[Q] {city} [SEP] {standard}地區"),
                    json!({
                        "term": city,
                        "synonyms": [],
                        "categories": {},
                        "is_location": true,
                    }),
                ));
            }
        }
    }
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entries_and_regions_become_documents() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("synonyms.json");
        std::fs::write(
            &path,
            r#"{
                "rain": {"zh": "大雨", "synonyms": ["豪雨"], "categories": {"weather": ["臺北市", "基隆市"]}},
                "front": {"zh": ["冷鋒", "冷鋒面"]},
                "bare": {}
            }"#,
        )
        .unwrap();

        let entries = load_synonym_data(&path).unwrap();
        assert_eq!(
            entries.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            vec!["rain", "front", "bare"]
        );

        let docs = term_documents(&entries);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["custom_0", "city_0_臺北市", "city_0_基隆市", "custom_1", "custom_2"]
        );
        assert_eq!(
            docs[0].text,
            "[Q] 大雨 [SEP] 大雨、豪雨。這些是相關語義擴展資訊。"
        );
        assert_eq!(docs[0].meta["is_location"], false);
        assert_eq!(docs[1].text, "[Q] 臺北市 [SEP] 大雨地區");
        assert_eq!(docs[1].meta["is_location"], true);
        assert_eq!(
            docs[3].text,
            "[Q] 冷鋒 [SEP] 冷鋒、冷鋒面。這些是相關語義擴展資訊。"
        );
        assert_eq!(docs[4].text, "[Q] bare [SEP] bare。這些是相關語義擴展資訊。");
    }
}
