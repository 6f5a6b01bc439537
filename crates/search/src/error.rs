use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] sememe_vector_store::VectorStoreError),

    #[error("Empty query")]
    EmptyQuery,

    #[error("No indexes configured")]
    NoIndexes,

    #[error("All {count} indexes failed; last error: {last}")]
    AllIndexesFailed { count: usize, last: String },

    #[error("{0}")]
    Other(String),
}
