//! # Sememe Vector Store
//!
//! Sentence encoding and exhaustive inner-product search over unit-normalized vectors.
//!
//! ## Features
//!
//! - **ONNX Runtime encoder** with CLS or masked-mean pooling
//! - **Deterministic stub encoder** for tests and offline runs
//! - **Flat inner-product index** persisted as a compact binary file
//! - **Line-delimited metadata** kept parallel to index rows
//!
//! ## Architecture
//!
//! ```text
//! MetadataRecord[] {id, text, meta}
//!     │
//!     ├──> Encoder (ONNX / stub)
//!     │      └─> unit vectors [dim]
//!     │
//!     ├──> FlatIndex (inner product)
//!     │      └─> <name>.index
//!     │
//!     └──> Metadata
//!            └─> <name>.meta.jsonl
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sememe_vector_store::{EmbeddingConfig, EmbeddingModel, IndexArtifacts, VectorStore};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> sememe_vector_store::Result<()> {
//!     let encoder = EmbeddingModel::new(&EmbeddingConfig::from_env()?)?;
//!     let store = VectorStore::load(&IndexArtifacts::in_dir(Path::new("indexes"), "custom"))?;
//!
//!     for hit in store.search("明天會下大雨嗎", &encoder, 5).await? {
//!         println!("{:.3} {}", hit.score, hit.record.text);
//!     }
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
mod flat_index;
mod metadata;
mod paths;
mod store;
mod types;

pub use embeddings::{
    normalize, EmbeddingConfig, EmbeddingMode, EmbeddingModel, Encoder, Pooling,
    DEFAULT_BATCH_SIZE, DEFAULT_DIMENSION, DEFAULT_MAX_LENGTH, ENV_EMBEDDING_MODE, ENV_MODEL_DIR,
    ENV_POOLING, ENV_USE_CUDA, MODEL_FILE_NAME, TOKENIZER_FILE_NAME,
};
pub use error::{Result, VectorStoreError};
pub use flat_index::{FlatIndex, IndexHit};
pub use metadata::{read_metadata, write_metadata};
pub use paths::{IndexArtifacts, INDEX_EXTENSION, METADATA_EXTENSION};
pub use store::VectorStore;
pub use types::{MetadataRecord, StoreHit};
