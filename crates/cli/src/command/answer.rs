use super::load_search;
use super::search::print_hits;
use crate::config::AppConfig;
use crate::generation::{ChatCompletionsClient, Generator};
use crate::multi_turn::{MultiTurnConfig, MultiTurnSession, StopReason};
use crate::prompt::{answer_prompt, ANSWER_SYSTEM_PROMPT};
use crate::{print_stdout, AskArgs, ChatArgs};
use anyhow::{Context as AnyhowContext, Result};
use sememe_vector_store::EmbeddingConfig;
use serde_json::json;
use std::io::BufRead;

pub(crate) async fn run_ask(
    args: AskArgs,
    config: &AppConfig,
    embedding: &EmbeddingConfig,
) -> Result<()> {
    let search = load_search(config, embedding)?;
    let generator = ChatCompletionsClient::new(config.generation.clone())?;

    let top_k = args.top_k.unwrap_or(config.search.top_k);
    let hits = search
        .search(&args.query, top_k)
        .await
        .context("Search failed")?;
    let prompt = answer_prompt(&args.query, &hits, args.mode);
    if args.show_prompt {
        eprintln!("{prompt}");
    }

    let answer = generator.generate(ANSWER_SYSTEM_PROMPT, &prompt).await;
    if args.json {
        let body = match &answer {
            Ok(text) => json!({"query": args.query, "hits": hits, "answer": text}),
            Err(e) => json!({"query": args.query, "hits": hits, "error": e}),
        };
        print_stdout(&serde_json::to_string_pretty(&body)?)?;
    } else {
        print_hits(&hits);
        if let Ok(text) = &answer {
            println!("\n{text}");
        }
    }
    answer.context("Generation failed")?;
    Ok(())
}

pub(crate) async fn run_chat(
    args: ChatArgs,
    config: &AppConfig,
    embedding: &EmbeddingConfig,
) -> Result<()> {
    let query = match args.query {
        Some(query) => query,
        None => read_question()?,
    };
    if query.trim().is_empty() {
        anyhow::bail!("Empty question");
    }

    let session_config = MultiTurnConfig {
        max_turns: args.max_turns.unwrap_or(config.multi_turn.max_turns),
        top_k: args.top_k.unwrap_or(config.multi_turn.top_k),
        mode: args.mode.unwrap_or(config.multi_turn.mode),
        dynamic_next_query: config.multi_turn.dynamic_next_query && !args.no_follow_up,
        stop_words: config.multi_turn.stop_words.clone(),
    };

    let search = load_search(config, embedding)?;
    let generator = ChatCompletionsClient::new(config.generation.clone())?;
    let conversation = MultiTurnSession::new(&search, &generator, session_config)
        .run(&query)
        .await;

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&conversation)?)?;
    } else {
        for turn in &conversation.turns {
            println!("Turn {}: {}", turn.turn, turn.query);
            print_hits(&turn.hits);
            println!("\n{}\n", turn.answer);
        }
    }

    match conversation.stop {
        StopReason::SearchFailed { error } => Err(anyhow::anyhow!("Search failed: {error}")),
        StopReason::GenerationFailed { error } if conversation.turns.is_empty() => {
            Err(anyhow::Error::new(error).context("Generation failed"))
        }
        stop => {
            log::info!("Conversation ended: {stop:?}");
            Ok(())
        }
    }
}

fn read_question() -> Result<String> {
    eprintln!("Question:");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read question from stdin")?;
    Ok(line.trim().to_string())
}
