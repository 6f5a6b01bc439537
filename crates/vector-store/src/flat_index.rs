use crate::error::{Result, VectorStoreError};
use ndarray::{ArrayView1, ArrayView2};
use std::path::Path;

const INDEX_MAGIC: &[u8; 4] = b"SIX1";
const HEADER_LEN: usize = 16;

/// One slot of a similarity query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub score: f32,
    /// Insertion position
    pub id: i64,
}

/// Exhaustive inner-product index over unit-normalized vectors.
///
/// Rows are addressed by insertion position. A query for `k` hits returns at most
/// `min(k, len)` hits.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append one vector; its id is the previous length
    pub fn add(&mut self, vector: &[f32]) -> Result<i64> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let id = i64::try_from(self.len())
            .map_err(|_| VectorStoreError::IndexError("index is full".to_string()))?;
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    pub fn add_all<'a>(&mut self, vectors: impl IntoIterator<Item = &'a Vec<f32>>) -> Result<()> {
        for vector in vectors {
            self.add(vector)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Top `k` rows by inner product with `query`; ties keep insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if query.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut ranked: Vec<IndexHit> = if self.is_empty() {
            Vec::new()
        } else {
            let rows = ArrayView2::from_shape((self.len(), self.dimension), &self.data)
                .map_err(|e| VectorStoreError::IndexError(format!("Bad index shape: {e}")))?;
            let scores = rows.dot(&ArrayView1::from(query));
            scores
                .iter()
                .enumerate()
                .map(|(id, score)| IndexHit {
                    score: *score,
                    id: id as i64,
                })
                .collect()
        };

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Write the index atomically: header, then little-endian `f32` rows
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(INDEX_MAGIC);
        let dim = u32::try_from(self.dimension)
            .map_err(|_| VectorStoreError::IndexError("dimension too large".to_string()))?;
        bytes.extend_from_slice(&dim.to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes).map_err(|reason| VectorStoreError::corrupt(path, reason))
    }

    fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != INDEX_MAGIC {
            return Err("missing index header".to_string());
        }
        let dim = u32::from_le_bytes(
            bytes[4..8]
                .try_into()
                .map_err(|_| "truncated dimension".to_string())?,
        ) as usize;
        let count = u64::from_le_bytes(
            bytes[8..16]
                .try_into()
                .map_err(|_| "truncated count".to_string())?,
        );
        let count = usize::try_from(count).map_err(|_| "vector count overflows".to_string())?;
        let expected = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| "vector count overflows".to_string())?;
        if bytes.len() != expected {
            return Err(format!(
                "expected {expected} bytes for {count} vectors of dimension {dim}, found {}",
                bytes.len()
            ));
        }

        let data = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self {
            dimension: dim,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample() -> FlatIndex {
        let mut index = FlatIndex::new(3);
        index.add(&[1.0, 0.0, 0.0]).unwrap();
        index.add(&[0.6, 0.8, 0.0]).unwrap();
        index.add(&[0.0, 1.0, 0.0]).unwrap();
        index
    }

    #[test]
    fn search_ranks_by_inner_product() {
        let index = sample();
        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(
            hits.iter().map(|h| h.id).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn oversized_k_returns_every_row() {
        let index = sample();
        let hits = index.search(&[0.0, 1.0, 0.0], 5).unwrap();
        assert_eq!(
            hits.iter().map(|h| h.id).collect::<Vec<_>>(),
            vec![2, 1, 0]
        );

        let hits = index.search(&[0.0, 1.0, 0.0], usize::MAX).unwrap();
        assert_eq!(hits.len(), index.len());

        let empty = FlatIndex::new(3);
        assert!(empty.search(&[1.0, 0.0, 0.0], usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = FlatIndex::new(2);
        index.add(&[0.0, 1.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[1].id, 2);
    }

    #[test]
    fn dimension_is_enforced() {
        let mut index = FlatIndex::new(3);
        assert!(index.add(&[1.0, 0.0]).is_err());
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn save_and_load_preserve_vectors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("qa.index");
        let index = sample();
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.vector(1), Some(&[0.6f32, 0.8, 0.0][..]));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn truncated_files_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.index");
        sample().save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

        let err = FlatIndex::load(&path).unwrap_err();
        assert!(matches!(err, VectorStoreError::CorruptIndex { .. }), "{err}");
    }
}
