use crate::error::{Result, TaxonomyError};
use crate::types::TermRecord;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

const ITEMS: &str = "items";
const CATEGORIES: &str = "categories";
const SUBCATEGORIES: &str = "subcategories";
const GROUPING_MARKERS: [&str; 3] = [ITEMS, CATEGORIES, SUBCATEGORIES];

/// Flattened taxonomy: records in first-seen order, keyed by `TermRecord::key`.
///
/// A later record with a colliding key replaces the earlier one in place.
#[derive(Debug, Clone, Default)]
pub struct FlatTaxonomy {
    records: Vec<TermRecord>,
    positions: HashMap<String, usize>,
    skipped: usize,
    overwritten: usize,
}

impl FlatTaxonomy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, last write wins
    pub fn insert(&mut self, record: TermRecord) {
        if let Some(&pos) = self.positions.get(&record.key) {
            log::debug!("Taxonomy key '{}' redefined; keeping the later entry", record.key);
            self.records[pos] = record;
            self.overwritten += 1;
            return;
        }
        self.positions.insert(record.key.clone(), self.records.len());
        self.records.push(record);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TermRecord> {
        self.positions.get(key).map(|&pos| &self.records[pos])
    }

    #[must_use]
    pub fn records(&self) -> &[TermRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [TermRecord] {
        &mut self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<TermRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Items dropped because no key could be derived
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Items that replaced an earlier item with the same key
    #[must_use]
    pub const fn overwritten(&self) -> usize {
        self.overwritten
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLinked {
    zh: Option<OneOrMany>,
    en: Option<OneOrMany>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConcept {
    parent: Option<String>,
    related: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawItem {
    id: Option<Value>,
    zh: Option<OneOrMany>,
    en: Option<String>,
    synonyms: Vec<String>,
    linked_sememe: Option<Value>,
    #[serde(alias = "related_ids")]
    related: Vec<String>,
    tags: Vec<String>,
    #[serde(alias = "sememes")]
    concept_hints: Vec<String>,
    concept: Option<RawConcept>,
}

fn non_empty(values: impl IntoIterator<Item = String>) -> Vec<String> {
    values
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl RawItem {
    /// `Ok(None)` when no key can be derived
    fn into_record(self, path: &[String]) -> serde_json::Result<Option<TermRecord>> {
        // linked_sememe that is not an object carries no names
        let linked = match self.linked_sememe {
            Some(value @ Value::Object(_)) => serde_json::from_value::<RawLinked>(value)?,
            _ => RawLinked::default(),
        };
        let linked_zh = non_empty(linked.zh.map(OneOrMany::into_vec).unwrap_or_default());
        let linked_en = non_empty(linked.en.map(OneOrMany::into_vec).unwrap_or_default());

        let mut names = non_empty(self.zh.map(OneOrMany::into_vec).unwrap_or_default());
        if names.is_empty() {
            if let Some(first) = linked_zh.first() {
                names.push(first.clone());
            }
        }
        let alt_name = self.en.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let id = match self.id {
            Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let mut record = match (id, names.first().or(alt_name.as_ref())) {
            (Some(id), _) => TermRecord::new(id),
            (None, Some(name)) => TermRecord::keyed_by_name(name.clone()),
            (None, None) => return Ok(None),
        };
        let mut names = names.into_iter();
        record.primary_name = names.next();
        record.synonyms.extend(names);
        record.synonyms.extend(non_empty(self.synonyms));
        record.alt_name = alt_name;

        for name in linked_zh.into_iter().chain(linked_en) {
            if !record.linked_names.contains(&name) {
                record.linked_names.push(name);
            }
        }

        record.category_path = path.to_vec();
        record.related_ids.extend(non_empty(self.related));
        record.tags = non_empty(self.tags);
        record.concept_hints = non_empty(self.concept_hints);
        if let Some(concept) = self.concept {
            record.concept_hints.extend(non_empty(concept.parent));
            record.concept_hints.extend(non_empty(concept.related));
        }
        Ok(Some(record))
    }
}

/// Load a taxonomy document from a JSON file
pub fn load_document(path: impl AsRef<Path>) -> Result<Value> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let value: Value = serde_json::from_str(&raw)?;
    Ok(value)
}

/// Descend into `doc` following object keys, e.g. `["Country", "categories", "Taiwan"]`
pub fn select_subtree<'a>(doc: &'a Value, keys: &[&str]) -> Result<&'a Value> {
    let mut node = doc;
    for (depth, key) in keys.iter().enumerate() {
        node = node
            .get(*key)
            .ok_or_else(|| TaxonomyError::NodeNotFound(keys[..=depth].join("/")))?;
    }
    Ok(node)
}

/// Flatten a whole taxonomy document; the top level must be an object
pub fn flatten_document(doc: &Value) -> Result<FlatTaxonomy> {
    if !doc.is_object() {
        return Err(TaxonomyError::malformed("/", "taxonomy root must be an object"));
    }
    let flat = flatten(doc, &[])?;
    log::info!(
        "Flattened taxonomy: {} records ({} skipped without key, {} overwritten)",
        flat.len(),
        flat.skipped(),
        flat.overwritten()
    );
    Ok(flat)
}

/// Recursively flatten `node`, whose grouping labels from the root are `path`.
///
/// A node that is not an object yields no records.
pub fn flatten(node: &Value, path: &[String]) -> Result<FlatTaxonomy> {
    let mut out = FlatTaxonomy::new();
    let mut path = path.to_vec();
    walk(node, &mut path, &mut out)?;
    Ok(out)
}

fn location(path: &[String]) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.join("/")
    }
}

fn is_group(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| GROUPING_MARKERS.iter().any(|m| obj.contains_key(*m)))
}

fn walk(node: &Value, path: &mut Vec<String>, out: &mut FlatTaxonomy) -> Result<()> {
    let Some(obj) = node.as_object() else {
        return Ok(());
    };

    if let Some(items) = obj.get(ITEMS) {
        read_items(items, path, out)?;
    }

    for (field, value) in obj {
        match field.as_str() {
            ITEMS => {}
            CATEGORIES | SUBCATEGORIES => walk_groups(field, value, path, out)?,
            _ if is_group(value) => {
                path.push(field.clone());
                walk(value, path, out)?;
                path.pop();
            }
            _ => {}
        }
    }
    Ok(())
}

fn walk_groups(
    field: &str,
    value: &Value,
    path: &mut Vec<String>,
    out: &mut FlatTaxonomy,
) -> Result<()> {
    let groups: &Map<String, Value> = match value {
        Value::Object(groups) => groups,
        Value::Null => return Ok(()),
        _ => {
            return Err(TaxonomyError::malformed(
                location(path),
                format!("'{field}' must be an object"),
            ))
        }
    };
    for (label, child) in groups {
        path.push(label.clone());
        walk(child, path, out)?;
        path.pop();
    }
    Ok(())
}

fn read_items(items: &Value, path: &[String], out: &mut FlatTaxonomy) -> Result<()> {
    let items = match items {
        Value::Array(items) => items,
        Value::Null => return Ok(()),
        _ => {
            return Err(TaxonomyError::malformed(
                location(path),
                "'items' must be an array",
            ))
        }
    };

    for (idx, item) in items.iter().enumerate() {
        if !item.is_object() {
            return Err(TaxonomyError::malformed(
                format!("{}[{idx}]", location(path)),
                "item must be an object",
            ));
        }
        let malformed = |e: serde_json::Error| {
            TaxonomyError::malformed(format!("{}[{idx}]", location(path)), e.to_string())
        };
        let raw: RawItem = serde_json::from_value(item.clone()).map_err(malformed)?;
        match raw.into_record(path).map_err(malformed)? {
            Some(record) => out.insert(record),
            None => out.skipped += 1,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn flattens_nested_categories_with_paths() {
        let doc = json!({
            "categories": {
                "Country": {
                    "categories": {
                        "Taiwan": {
                            "items": [{"id": "tw-city-01", "zh": "臺北市"}],
                            "subcategories": {
                                "tw-weather-rain-category": {
                                    "items": [{"id": "tw-weather-rain-01", "zh": "大雨", "synonyms": ["豪雨"]}]
                                }
                            }
                        }
                    }
                }
            }
        });
        let flat = flatten_document(&doc).unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(
            flat.get("tw-city-01").unwrap().category_path,
            vec!["Country", "Taiwan"]
        );
        let rain = flat.get("tw-weather-rain-01").unwrap();
        assert_eq!(
            rain.category_path,
            vec!["Country", "Taiwan", "tw-weather-rain-category"]
        );
        assert!(rain.synonyms.contains("豪雨"));
    }

    #[test]
    fn recurses_into_arbitrary_group_fields() {
        let doc = json!({
            "regions": {"north": {"items": [{"zh": "基隆市"}]}},
            "note": {"text": "ignored"},
        });
        let flat = flatten_document(&doc).unwrap();
        // "regions" itself holds no marker, so only direct marker-bearing fields recurse
        assert!(flat.is_empty());

        let doc = json!({ "north": {"items": [{"zh": "基隆市"}]} });
        let flat = flatten_document(&doc).unwrap();
        assert_eq!(flat.get("基隆市").unwrap().category_path, vec!["north"]);
    }

    #[test]
    fn key_falls_back_to_names_and_skips_unaddressable_items() {
        let doc = json!({
            "items": [
                {"zh": "霧"},
                {"en": "Fog Bank"},
                {"synonyms": ["orphan"]},
                {"linked_sememe": {"zh": ["雷雨"], "en": "thunderstorm"}}
            ]
        });
        let flat = flatten_document(&doc).unwrap();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat.skipped(), 1);
        assert!(flat.get("Fog Bank").is_some());
        let thunder = flat.get("雷雨").unwrap();
        assert_eq!(thunder.primary_name.as_deref(), Some("雷雨"));
        assert_eq!(thunder.linked_names, vec!["雷雨", "thunderstorm"]);
        assert!(!thunder.explicit_id);
    }

    #[test]
    fn explicit_ids_are_flagged() {
        let doc = json!({"items": [{"id": "tw-weather-fog-01", "zh": "霧"}, {"zh": "里程數"}]});
        let flat = flatten_document(&doc).unwrap();
        assert!(flat.get("tw-weather-fog-01").unwrap().explicit_id);
        assert!(!flat.get("里程數").unwrap().explicit_id);
    }

    #[test]
    fn mistyped_linked_names_fail_the_load() {
        let doc = json!({"items": [{"id": "x", "linked_sememe": {"zh": 3}}]});
        let err = flatten_document(&doc).unwrap_err();
        assert!(matches!(err, TaxonomyError::Malformed { ref path, .. } if path == "/[0]"));

        // a non-object linked_sememe carries no names and is accepted
        let doc = json!({"items": [{"id": "x", "linked_sememe": "雷雨"}]});
        assert!(flatten_document(&doc).unwrap().get("x").unwrap().linked_names.is_empty());
    }

    #[test]
    fn later_key_overwrites_in_place() {
        let doc = json!({
            "items": [{"id": "a", "zh": "一"}, {"id": "b", "zh": "二"}, {"id": "a", "zh": "三"}]
        });
        let flat = flatten_document(&doc).unwrap();
        let names: Vec<_> = flat
            .records()
            .iter()
            .map(|r| r.primary_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["三", "二"]);
        assert_eq!(flat.overwritten(), 1);
    }

    #[test]
    fn multiple_primary_names_become_synonyms() {
        let doc = json!({"items": [{"id": "x", "zh": ["颱風", "台風"], "concept": {"parent": "天氣", "related": ["暴風"]}}]});
        let flat = flatten_document(&doc).unwrap();
        let record = flat.get("x").unwrap();
        assert_eq!(record.primary_name.as_deref(), Some("颱風"));
        assert!(record.synonyms.contains("台風"));
        assert_eq!(record.concept_hints, vec!["天氣", "暴風"]);
    }

    #[test]
    fn non_object_node_is_noop() {
        assert!(flatten(&json!([1, 2, 3]), &[]).unwrap().is_empty());
        assert!(flatten(&json!("text"), &[]).unwrap().is_empty());
    }

    #[test]
    fn malformed_structure_fails_load() {
        assert!(flatten_document(&json!([])).is_err());
        assert!(flatten_document(&json!({"items": {"id": "x"}})).is_err());
        assert!(flatten_document(&json!({"items": ["x"]})).is_err());
        assert!(flatten_document(&json!({"items": [{"id": "x", "synonyms": 3}]})).is_err());
        assert!(flatten_document(&json!({"categories": [1]})).is_err());
    }

    #[test]
    fn select_subtree_reports_missing_path() {
        let doc = json!({"Country": {"categories": {"Taiwan": {"items": []}}}});
        assert!(select_subtree(&doc, &["Country", "categories", "Taiwan"]).is_ok());
        let err = select_subtree(&doc, &["Country", "Japan"]).unwrap_err();
        assert!(err.to_string().contains("Country/Japan"));
    }
}
