//! Prompt text for single-shot and multi-turn answering.

use clap::ValueEnum;
use sememe_search::SearchHit;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ANSWER_SYSTEM_PROMPT: &str = "你是一個中文語意問答專家，擅長根據語義線索推理。";
pub const MULTI_TURN_SYSTEM_PROMPT: &str = "你是中文語意問答專家，擅長整合語意描述與知識線索。";

/// How retrieved hits are rendered into the prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Question and sememe description per hit
    #[default]
    Standard,
    /// Raw indexed text per hit
    Flat,
}

fn meta_str<'a>(meta: &'a Value, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(Value::as_str)
}

#[must_use]
pub fn context_block(hits: &[SearchHit], mode: PromptMode) -> String {
    let parts: Vec<String> = hits
        .iter()
        .map(|hit| match mode {
            PromptMode::Standard => format!(
                "- 問句：{}\n  語義：{}",
                meta_str(&hit.meta, "query").unwrap_or(&hit.text),
                meta_str(&hit.meta, "sememe").unwrap_or_default()
            ),
            PromptMode::Flat => hit.text.clone(),
        })
        .collect();
    parts.join("\n\n")
}

/// Single-shot answer prompt
#[must_use]
pub fn answer_prompt(query: &str, hits: &[SearchHit], mode: PromptMode) -> String {
    format!(
        "您是一位專業的中文問答助理，請根據以下檢索到的語意資訊，準確且詳盡地回答原始問題：\n\n\
         【語意資訊】：{}\n\n\
         原始問題：{query}\n\n\
         請以清晰、自然且具專業度的中文，撰寫完整回答。若相關資訊不足，亦請明確說明不足處。",
        context_block(hits, mode)
    )
}

/// Per-turn prompt for the multi-turn loop
#[must_use]
pub fn turn_prompt(query: &str, hits: &[SearchHit], mode: PromptMode) -> String {
    format!(
        "你是一位中文語意理解與問答助理，請根據下列檢索資料回答問題。\n\n\
         請注意：\n\
         - 優先根據檢索資料直接作答。\n\
         - 若資料無明確答案，請合理推論並標註「（推論）」。\n\
         - 回答避免重複資料或編造事實。\n\
         - 如遇不確定處，簡要說明原因。\n\n\
         檢索結果：\n{}\n\n\
         問題：\n{query}\n\n\
         請根據上述內容作答：",
        context_block(hits, mode)
    )
}

/// Follow-up question derived from the previous answer
#[must_use]
pub fn follow_up_query(answer: &str) -> String {
    format!("根據你的回答「{answer}」，請補充更多細節、地點或時間背景。")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn hits() -> Vec<SearchHit> {
        vec![
            SearchHit {
                score: 0.9,
                text: "[Q] 颱風什麼時候來 [SEP] 颱風 含有語意「weather」".into(),
                meta: json!({"query": "颱風什麼時候來", "sememe": "「颱風」對應語意：{{weather}}"}),
                source: "nlpcc".into(),
            },
            SearchHit {
                score: 0.5,
                text: "[Q] 大雨 [SEP] 大雨、豪雨。這些是相關語義擴展資訊。".into(),
                meta: json!({"term": "大雨", "is_location": false}),
                source: "custom".into(),
            },
        ]
    }

    #[test]
    fn standard_mode_uses_question_and_sememe() {
        assert_eq!(
            context_block(&hits(), PromptMode::Standard),
            "- 問句：颱風什麼時候來\n  語義：「颱風」對應語意：{{weather}}\n\n\
             - 問句：[Q] 大雨 [SEP] 大雨、豪雨。這些是相關語義擴展資訊。\n  語義："
        );
    }

    #[test]
    fn flat_mode_uses_hit_text() {
        let block = context_block(&hits(), PromptMode::Flat);
        assert_eq!(block.split("\n\n").count(), 2);
        assert!(block.starts_with("[Q] 颱風什麼時候來"));
    }

    #[test]
    fn prompts_carry_query_and_context() {
        let prompt = answer_prompt("明天會下雨嗎", &hits(), PromptMode::Flat);
        assert!(prompt.contains("原始問題：明天會下雨嗎"));
        assert!(prompt.contains("【語意資訊】：[Q] 颱風什麼時候來"));

        let prompt = turn_prompt("明天會下雨嗎", &[], PromptMode::Standard);
        assert!(prompt.contains("問題：\n明天會下雨嗎"));
        assert_eq!(
            follow_up_query("會"),
            "根據你的回答「會」，請補充更多細節、地點或時間背景。"
        );
    }
}
