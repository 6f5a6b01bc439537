//! # Sememe Search
//!
//! Multi-index retrieval: one query embedding, independent per-index lookups,
//! a deterministic merge.
//!
//! ```text
//! query ──> Encoder ──> vector
//!                         ├──> index_0 top-k ─┐
//!                         ├──> index_1 top-k ─┼──> merge (score | RRF) ──> global top-k
//!                         └──> index_n top-k ─┘
//! ```

mod error;
mod fusion;
mod multi;
mod types;

pub use error::{Result, SearchError};
pub use fusion::{MergeStrategy, DEFAULT_RRF_K};
pub use multi::MultiIndexSearch;
pub use types::SearchHit;
