use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const INDEX_EXTENSION: &str = "index";
pub const METADATA_EXTENSION: &str = "meta.jsonl";

/// Index file plus its parallel metadata file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexArtifacts {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl IndexArtifacts {
    #[must_use]
    pub fn new(index_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    /// `<dir>/<name>.index` and `<dir>/<name>.meta.jsonl`
    #[must_use]
    pub fn in_dir(dir: &Path, name: &str) -> Self {
        Self {
            index_path: dir.join(format!("{name}.{INDEX_EXTENSION}")),
            metadata_path: dir.join(format!("{name}.{METADATA_EXTENSION}")),
        }
    }

    #[must_use]
    pub fn exist(&self) -> bool {
        self.index_path.is_file() && self.metadata_path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_artifacts_after_source() {
        let artifacts = IndexArtifacts::in_dir(Path::new("out"), "nlpcc");
        assert_eq!(artifacts.index_path, PathBuf::from("out/nlpcc.index"));
        assert_eq!(artifacts.metadata_path, PathBuf::from("out/nlpcc.meta.jsonl"));
        assert!(!artifacts.exist());
    }
}
