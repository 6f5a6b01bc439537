//! `sememe.toml`: taxonomy input, index sources, retrieval and generation settings.

use crate::generation::GenerationConfig;
use crate::multi_turn::MultiTurnConfig;
use anyhow::{Context as AnyhowContext, Result};
use sememe_indexer::SourceSpec;
use sememe_search::MergeStrategy;
use sememe_vector_store::IndexArtifacts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "sememe.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub taxonomy: TaxonomySection,
    /// Data sources built by `build-index`
    pub sources: Vec<SourceSpec>,
    /// Indexes queried by `search`, `ask` and `chat`; defaults to the built sources
    pub indexes: Vec<IndexEntry>,
    pub search: SearchSection,
    pub generation: GenerationConfig,
    pub multi_turn: MultiTurnConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomySection {
    pub path: PathBuf,
    /// Key path of the subtree to load, e.g. `["Country", "categories", "Taiwan"]`
    pub root: Vec<String>,
    /// TOML file extending the built-in classifier tables
    pub classifier: Option<PathBuf>,
    /// Word → sememes JSON used instead of the taxonomy-derived lexicon
    pub lexicon: Option<PathBuf>,
    /// `{synonyms, sememe_relations}` JSON
    pub custom_sememe: Option<PathBuf>,
}

impl Default for TaxonomySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("taxonomy.json"),
            root: Vec::new(),
            classifier: None,
            lexicon: None,
            custom_sememe: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    #[serde(flatten)]
    pub artifacts: IndexArtifacts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub top_k: usize,
    pub merge: MergeStrategy,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            top_k: 5,
            merge: MergeStrategy::Score,
        }
    }
}

impl AppConfig {
    /// Explicit paths must exist; the default file is optional
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            log::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }
        Ok(config)
    }

    /// Indexes to query: the `indexes` table, else every configured source
    #[must_use]
    pub fn query_indexes(&self) -> Vec<(String, IndexArtifacts)> {
        if self.indexes.is_empty() {
            self.sources
                .iter()
                .map(|s| (s.name.clone(), s.artifacts.clone()))
                .collect()
        } else {
            self.indexes
                .iter()
                .map(|i| (i.name.clone(), i.artifacts.clone()))
                .collect()
        }
    }

    fn resolve_relative(&mut self, base: &Path) {
        if base.as_os_str().is_empty() {
            return;
        }
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.taxonomy.path);
        for path in [
            &mut self.taxonomy.classifier,
            &mut self.taxonomy.lexicon,
            &mut self.taxonomy.custom_sememe,
        ]
        .into_iter()
        .flatten()
        {
            join(path);
        }
        for source in &mut self.sources {
            match &mut source.kind {
                sememe_indexer::SourceKind::Qa { records } => join(records),
                sememe_indexer::SourceKind::Terms { synonyms } => join(synonyms),
            }
            join(&mut source.artifacts.index_path);
            join(&mut source.artifacts.metadata_path);
        }
        for index in &mut self.indexes {
            join(&mut index.artifacts.index_path);
            join(&mut index.artifacts.metadata_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sememe_indexer::SourceKind;

    #[test]
    fn missing_default_file_gives_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.multi_turn.max_turns, 3);
        assert!(config.query_indexes().is_empty());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&temp.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sememe.toml");
        std::fs::write(
            &path,
            r#"
[taxonomy]
path = "data/taxonomy.json"
root = ["Country", "categories", "Taiwan"]

[[sources]]
name = "custom"
kind = "terms"
synonyms = "data/synonyms.json"
index_path = "out/custom.index"
metadata_path = "out/custom.meta.jsonl"

[search]
top_k = 8
merge = { kind = "reciprocal_rank", k = 30.0 }

[generation]
model = "local-model"
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.taxonomy.path, temp.path().join("data/taxonomy.json"));
        assert_eq!(config.taxonomy.root, vec!["Country", "categories", "Taiwan"]);
        assert_eq!(
            config.sources[0].kind,
            SourceKind::Terms {
                synonyms: temp.path().join("data/synonyms.json")
            }
        );
        assert_eq!(config.search.top_k, 8);
        assert_eq!(config.search.merge, MergeStrategy::ReciprocalRank { k: 30.0 });
        assert_eq!(config.generation.model, "local-model");
        assert_eq!(config.generation.timeout_secs, 5);

        let indexes = config.query_indexes();
        assert_eq!(indexes[0].0, "custom");
        assert_eq!(
            indexes[0].1.index_path,
            temp.path().join("out/custom.index")
        );
    }
}
