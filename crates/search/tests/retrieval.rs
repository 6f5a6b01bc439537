use sememe_search::{MergeStrategy, MultiIndexSearch};
use sememe_vector_store::{
    EmbeddingConfig, EmbeddingModel, Encoder, IndexArtifacts, MetadataRecord, VectorStore,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn save_index(
    dir: &std::path::Path,
    name: &str,
    texts: &[&str],
    encoder: &dyn Encoder,
) -> IndexArtifacts {
    let records = texts
        .iter()
        .enumerate()
        .map(|(i, text)| MetadataRecord::new(format!("{name}_{i}"), *text, json!({"query": text})))
        .collect();
    let store = VectorStore::build(records, encoder).await.expect("build store");
    let artifacts = IndexArtifacts::in_dir(dir, name);
    store.save(&artifacts).expect("save store");
    artifacts
}

#[tokio::test]
async fn persisted_indexes_are_searched_together() {
    let temp = TempDir::new().expect("tempdir");
    let encoder: Arc<dyn Encoder> =
        Arc::new(EmbeddingModel::new(&EmbeddingConfig::stub(32)).expect("stub encoder"));

    let nlpcc = save_index(
        temp.path(),
        "nlpcc",
        &["[Q] 颱風什麼時候來", "[Q] 明天會下雨嗎"],
        encoder.as_ref(),
    )
    .await;
    let custom = save_index(
        temp.path(),
        "custom",
        &["[Q] 大雨 [SEP] 大雨、豪雨", "[Q] 臺北市 [SEP] 大雨地區"],
        encoder.as_ref(),
    )
    .await;

    let search = MultiIndexSearch::load(
        Arc::clone(&encoder),
        &[("nlpcc".to_string(), nlpcc), ("custom".to_string(), custom)],
    )
    .expect("load indexes");
    assert_eq!(search.index_names(), vec!["nlpcc", "custom"]);

    let hits = search
        .search("[Q] 臺北市 [SEP] 大雨地區", 2)
        .await
        .expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].source, "custom");
    assert_eq!(hits[0].meta["query"], "[Q] 臺北市 [SEP] 大雨地區");
    assert!(hits[0].score >= hits[1].score);

    let fused = search
        .with_strategy(MergeStrategy::reciprocal_rank())
        .search("[Q] 臺北市 [SEP] 大雨地區", 4)
        .await
        .expect("fused search");
    assert_eq!(fused.len(), 4);
}

#[tokio::test]
async fn missing_index_fails_the_load() {
    let temp = TempDir::new().expect("tempdir");
    let encoder: Arc<dyn Encoder> =
        Arc::new(EmbeddingModel::new(&EmbeddingConfig::stub(8)).expect("stub encoder"));
    let result = MultiIndexSearch::load(
        encoder,
        &[("absent".to_string(), IndexArtifacts::in_dir(temp.path(), "absent"))],
    );
    assert!(result.is_err());
}
