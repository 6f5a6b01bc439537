//! Retrieval-augmented question answering over several turns.

use crate::generation::{GenerationError, Generator};
use crate::prompt::{follow_up_query, turn_prompt, PromptMode, MULTI_TURN_SYSTEM_PROMPT};
use sememe_search::{MultiIndexSearch, SearchHit};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTurnConfig {
    pub max_turns: usize,
    pub top_k: usize,
    /// An answer containing any of these ends the conversation
    pub stop_words: Vec<String>,
    /// Ask a follow-up built from the previous answer
    pub dynamic_next_query: bool,
    pub mode: PromptMode,
}

impl Default for MultiTurnConfig {
    fn default() -> Self {
        Self {
            max_turns: 3,
            top_k: 5,
            stop_words: vec![
                "無法回答".to_string(),
                "缺少資料".to_string(),
                "無相關資訊".to_string(),
            ],
            dynamic_next_query: true,
            mode: PromptMode::Standard,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub turn: usize,
    pub query: String,
    pub answer: String,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    MaxTurns,
    StopWord { word: String },
    /// Follow-up questions are disabled
    SingleTurn,
    SearchFailed { error: String },
    GenerationFailed { error: GenerationError },
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub turns: Vec<Turn>,
    pub stop: StopReason,
}

pub struct MultiTurnSession<'a> {
    search: &'a MultiIndexSearch,
    generator: &'a dyn Generator,
    config: MultiTurnConfig,
}

impl<'a> MultiTurnSession<'a> {
    pub fn new(
        search: &'a MultiIndexSearch,
        generator: &'a dyn Generator,
        config: MultiTurnConfig,
    ) -> Self {
        Self {
            search,
            generator,
            config,
        }
    }

    pub async fn run(&self, initial_query: &str) -> Conversation {
        let mut turns = Vec::new();
        let mut query = initial_query.to_string();

        for turn in 1..=self.config.max_turns {
            log::info!("Turn {turn}: {query}");
            let hits = match self.search.search(&query, self.config.top_k).await {
                Ok(hits) => hits,
                Err(e) => {
                    log::warn!("Search failed on turn {turn}: {e}");
                    return Conversation {
                        turns,
                        stop: StopReason::SearchFailed {
                            error: e.to_string(),
                        },
                    };
                }
            };

            let prompt = turn_prompt(&query, &hits, self.config.mode);
            let answer = match self.generator.generate(MULTI_TURN_SYSTEM_PROMPT, &prompt).await {
                Ok(answer) => answer,
                Err(error) => {
                    log::warn!("Generation failed on turn {turn}: {error}");
                    return Conversation {
                        turns,
                        stop: StopReason::GenerationFailed { error },
                    };
                }
            };
            log::debug!("Turn {turn} answer: {answer}");

            let stop_word = self
                .config
                .stop_words
                .iter()
                .find(|word| !word.is_empty() && answer.contains(word.as_str()))
                .cloned();
            let next_query = follow_up_query(&answer);
            turns.push(Turn {
                turn,
                query,
                answer,
                hits,
            });

            if let Some(word) = stop_word {
                log::info!("Stop word '{word}' found, ending conversation");
                return Conversation {
                    turns,
                    stop: StopReason::StopWord { word },
                };
            }
            if !self.config.dynamic_next_query {
                return Conversation {
                    turns,
                    stop: StopReason::SingleTurn,
                };
            }
            query = next_query;
        }

        Conversation {
            turns,
            stop: StopReason::MaxTurns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use sememe_vector_store::{EmbeddingConfig, EmbeddingModel, MetadataRecord, VectorStore};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted answers and records every prompt it receives
    struct ScriptedGenerator {
        answers: Mutex<VecDeque<Result<String, GenerationError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(answers: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, _system: &str, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("更多資訊".to_string()))
        }
    }

    async fn search() -> MultiIndexSearch {
        let encoder = Arc::new(EmbeddingModel::new(&EmbeddingConfig::stub(16)).unwrap());
        let store = VectorStore::build(
            vec![MetadataRecord::new(
                "nlpcc_0_0",
                "[Q] 颱風什麼時候來",
                json!({"query": "颱風什麼時候來", "sememe": "「颱風」對應語意：{{weather}}"}),
            )],
            encoder.as_ref(),
        )
        .await
        .unwrap();
        MultiIndexSearch::new(encoder).with_index("nlpcc", store)
    }

    #[tokio::test]
    async fn follow_ups_run_until_max_turns() {
        let search = search().await;
        let generator = ScriptedGenerator::new(vec![Ok("七月".into()), Ok("臺灣東部".into())]);
        let config = MultiTurnConfig {
            max_turns: 2,
            ..MultiTurnConfig::default()
        };
        let conversation = MultiTurnSession::new(&search, &generator, config)
            .run("颱風什麼時候來")
            .await;

        assert_eq!(conversation.stop, StopReason::MaxTurns);
        let queries: Vec<&str> = conversation.turns.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(
            queries,
            vec![
                "颱風什麼時候來",
                "根據你的回答「七月」，請補充更多細節、地點或時間背景。"
            ]
        );
        assert_eq!(conversation.turns[0].hits[0].source, "nlpcc");
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("- 問句：颱風什麼時候來"));
    }

    #[tokio::test]
    async fn stop_word_ends_early() {
        let search = search().await;
        let generator = ScriptedGenerator::new(vec![Ok("資料不足，無法回答。".into())]);
        let conversation = MultiTurnSession::new(&search, &generator, MultiTurnConfig::default())
            .run("颱風什麼時候來")
            .await;
        assert_eq!(conversation.turns.len(), 1);
        assert_eq!(
            conversation.stop,
            StopReason::StopWord {
                word: "無法回答".to_string()
            }
        );
    }

    #[tokio::test]
    async fn typed_generation_failure_stops_without_a_turn() {
        let search = search().await;
        let generator = ScriptedGenerator::new(vec![
            Ok("七月".into()),
            Err(GenerationError::Timeout { secs: 60 }),
        ]);
        let conversation = MultiTurnSession::new(&search, &generator, MultiTurnConfig::default())
            .run("颱風什麼時候來")
            .await;
        assert_eq!(conversation.turns.len(), 1);
        assert_eq!(
            conversation.stop,
            StopReason::GenerationFailed {
                error: GenerationError::Timeout { secs: 60 }
            }
        );
    }

    #[tokio::test]
    async fn search_failure_and_single_turn_modes() {
        let encoder = Arc::new(EmbeddingModel::new(&EmbeddingConfig::stub(16)).unwrap());
        let empty = MultiIndexSearch::new(encoder);
        let generator = ScriptedGenerator::new(vec![]);
        let conversation = MultiTurnSession::new(&empty, &generator, MultiTurnConfig::default())
            .run("颱風")
            .await;
        assert!(conversation.turns.is_empty());
        assert!(matches!(conversation.stop, StopReason::SearchFailed { .. }));

        let search = search().await;
        let config = MultiTurnConfig {
            dynamic_next_query: false,
            ..MultiTurnConfig::default()
        };
        let conversation = MultiTurnSession::new(&search, &generator, config)
            .run("颱風")
            .await;
        assert_eq!(conversation.turns.len(), 1);
        assert_eq!(conversation.stop, StopReason::SingleTurn);
    }
}
