use crate::embeddings::Encoder;
use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatIndex;
use crate::metadata::{read_metadata, write_metadata};
use crate::paths::IndexArtifacts;
use crate::types::{MetadataRecord, StoreHit};
use serde_json::Value;

/// Similarity index plus the metadata records parallel to its rows
#[derive(Debug, Clone)]
pub struct VectorStore {
    index: FlatIndex,
    records: Vec<MetadataRecord>,
}

impl VectorStore {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            index: FlatIndex::new(dimension),
            records: Vec::new(),
        }
    }

    /// Encode every record's text and append it
    pub async fn build(records: Vec<MetadataRecord>, encoder: &dyn Encoder) -> Result<Self> {
        let mut store = Self::new(encoder.dimension());
        store.extend(records, encoder).await?;
        Ok(store)
    }

    /// Build from parallel text / id / metadata sequences
    pub async fn build_from_parts(
        texts: Vec<String>,
        ids: Vec<String>,
        metas: Vec<Value>,
        encoder: &dyn Encoder,
    ) -> Result<Self> {
        if texts.len() != ids.len() || texts.len() != metas.len() {
            return Err(VectorStoreError::LengthMismatch {
                texts: texts.len(),
                ids: ids.len(),
                metas: metas.len(),
            });
        }
        let records = texts
            .into_iter()
            .zip(ids)
            .zip(metas)
            .map(|((text, id), meta)| MetadataRecord::new(id, text, meta))
            .collect();
        Self::build(records, encoder).await
    }

    pub async fn extend(&mut self, records: Vec<MetadataRecord>, encoder: &dyn Encoder) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = encoder.encode(&texts).await?;
        if vectors.len() != records.len() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Encoder returned {} vectors for {} texts",
                vectors.len(),
                records.len()
            )));
        }
        for (record, vector) in records.into_iter().zip(vectors) {
            self.push(record, &vector)?;
        }
        log::debug!("Vector store now holds {} records", self.len());
        Ok(())
    }

    /// Append one record with its precomputed vector
    pub fn push(&mut self, record: MetadataRecord, vector: &[f32]) -> Result<()> {
        self.index.add(vector)?;
        self.records.push(record);
        Ok(())
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    #[must_use]
    pub const fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn save(&self, artifacts: &IndexArtifacts) -> Result<()> {
        log::info!(
            "Saving {} vectors to {}",
            self.len(),
            artifacts.index_path.display()
        );
        self.index.save(&artifacts.index_path)?;
        write_metadata(&artifacts.metadata_path, &self.records)?;
        Ok(())
    }

    pub fn load(artifacts: &IndexArtifacts) -> Result<Self> {
        let index = FlatIndex::load(&artifacts.index_path)?;
        let records = read_metadata(&artifacts.metadata_path)?;
        if index.len() != records.len() {
            log::warn!(
                "Index {} has {} vectors but metadata {} has {} records; unmatched hits are skipped",
                artifacts.index_path.display(),
                index.len(),
                artifacts.metadata_path.display(),
                records.len()
            );
        }
        log::debug!(
            "Loaded {} vectors from {}",
            index.len(),
            artifacts.index_path.display()
        );
        Ok(Self { index, records })
    }

    /// Top `k` records for a query vector.
    ///
    /// Hit ids that are negative or have no metadata record are dropped.
    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<StoreHit>> {
        let hits = self.index.search(query, k)?;
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let Ok(position) = usize::try_from(hit.id) else {
                continue;
            };
            let Some(record) = self.records.get(position) else {
                log::warn!(
                    "Index returned id {position} but only {} metadata records exist",
                    self.records.len()
                );
                continue;
            };
            out.push(StoreHit {
                score: hit.score,
                position,
                record: record.clone(),
            });
        }
        Ok(out)
    }

    pub async fn search(&self, query: &str, encoder: &dyn Encoder, k: usize) -> Result<Vec<StoreHit>> {
        let vector = encoder.encode_one(query).await?;
        self.search_vector(&vector, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingConfig, EmbeddingModel};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn stub() -> EmbeddingModel {
        EmbeddingModel::new(&EmbeddingConfig::stub(32)).unwrap()
    }

    #[tokio::test]
    async fn exact_text_is_the_top_hit() {
        let encoder = stub();
        let store = VectorStore::build_from_parts(
            vec!["大雨".into(), "冷鋒".into(), "玉山".into()],
            vec!["a".into(), "b".into(), "c".into()],
            vec![json!({}), json!({"k": 1}), json!(null)],
            &encoder,
        )
        .await
        .unwrap();

        let hits = store.search("冷鋒", &encoder, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "b");
        assert_eq!(hits[0].position, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn mismatched_parts_are_rejected() {
        let encoder = stub();
        let err = VectorStore::build_from_parts(
            vec!["a".into()],
            vec![],
            vec![json!({})],
            &encoder,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::LengthMismatch {
                texts: 1,
                ids: 0,
                metas: 1
            }
        ));
    }

    #[test]
    fn orphan_ids_are_skipped() {
        let mut store = VectorStore::new(2);
        store
            .push(MetadataRecord::new("only", "x", json!({})), &[1.0, 0.0])
            .unwrap();
        // a vector without metadata, as left behind by a truncated metadata file
        let mut orphaned = store.clone();
        orphaned.index.add(&[0.0, 1.0]).unwrap();

        let hits = orphaned.search_vector(&[0.0, 1.0], 4).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "only");
    }

    #[test]
    fn unbounded_k_returns_every_record() {
        let mut store = VectorStore::new(2);
        store
            .push(MetadataRecord::new("a", "x", json!({})), &[1.0, 0.0])
            .unwrap();
        store
            .push(MetadataRecord::new("b", "y", json!({})), &[0.0, 1.0])
            .unwrap();

        let hits = store.search_vector(&[1.0, 0.0], usize::MAX).unwrap();
        assert_eq!(
            hits.iter().map(|h| h.record.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn saved_store_loads_back() {
        let temp = TempDir::new().unwrap();
        let artifacts = IndexArtifacts::in_dir(temp.path(), "custom");
        let encoder = stub();
        let store = VectorStore::build(
            vec![
                MetadataRecord::new("custom_0", "[Q] 大雨 [SEP] 大雨、豪雨", json!({"term": "大雨"})),
                MetadataRecord::new("custom_1", "[Q] 冷鋒 [SEP] 冷鋒", json!({"term": "冷鋒"})),
            ],
            &encoder,
        )
        .await
        .unwrap();
        store.save(&artifacts).unwrap();

        let loaded = VectorStore::load(&artifacts).unwrap();
        assert_eq!(loaded.records(), store.records());
        assert_eq!(loaded.index(), store.index());
        let hits = loaded
            .search("[Q] 冷鋒 [SEP] 冷鋒", &encoder, 1)
            .await
            .unwrap();
        assert_eq!(hits[0].record.id, "custom_1");
    }
}
