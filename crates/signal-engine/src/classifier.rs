use std::sync::Arc;

use finnews_core::{strip_think_block, NewsItem};
use llm_gateway::InferenceGateway;

use crate::prompts::relevance_prompt;

/// Titles containing any of these skip the model entirely.
const BYPASS_KEYWORDS: &[&str] = &[
    "A股", "股市", "人民币", "央行", "美联储", "利好", "利空", "GDP", "CPI", "监管",
    "芯片", "半导体", "财报", "增持", "回购", "AI", "金融", "算力", "沪指", "板块",
    "概念股", "股票", "涨停", "跌停", "回调", "反弹", "市场情绪",
];

const AFFIRMATIVE_WORDS: &[&str] = &["yes", "true", "y"];
const AFFIRMATIVE_CJK: &[&str] = &["是", "相关"];
const NEGATION: char = '不';

const RELEVANCE_MAX_TOKENS: u32 = 5;

/// True if the title carries an unambiguous finance/macro/policy keyword.
pub fn keyword_bypass(title: &str) -> bool {
    BYPASS_KEYWORDS.iter().any(|k| title.contains(k))
}

/// Loose yes/no reading of a relevance answer.
///
/// Latin tokens must match whole words; CJK markers count unless directly
/// negated ("不是", "不相关").
pub fn is_affirmative(response: &str) -> bool {
    let text = strip_think_block(response).trim().to_lowercase();
    if text.is_empty() {
        return false;
    }

    let latin = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| AFFIRMATIVE_WORDS.contains(&token));

    latin || AFFIRMATIVE_CJK.iter().any(|marker| contains_unnegated(&text, marker))
}

fn contains_unnegated(text: &str, marker: &str) -> bool {
    text.match_indices(marker)
        .any(|(idx, _)| !text[..idx].ends_with(NEGATION))
}

/// Fast-path relevance filter.
pub struct Classifier {
    gateway: Arc<InferenceGateway>,
    temperature: f32,
}

impl Classifier {
    pub fn new(gateway: Arc<InferenceGateway>, temperature: f32) -> Self {
        Self {
            gateway,
            temperature,
        }
    }

    /// One shot, no retries. An empty or unreadable answer counts as noise.
    pub async fn is_relevant(&self, item: &NewsItem) -> bool {
        if keyword_bypass(&item.title) {
            tracing::info!("Keyword bypass: {}", preview(&item.title));
            return true;
        }

        let answer = self
            .gateway
            .infer(&relevance_prompt(&item.title), self.temperature, RELEVANCE_MAX_TOKENS)
            .await;
        let relevant = is_affirmative(&answer);

        tracing::info!(
            "Relevance answer '{}' -> {} | {}",
            answer.trim(),
            if relevant { "relevant" } else { "noise" },
            preview(&item.title)
        );
        relevant
    }
}

fn preview(title: &str) -> String {
    title.chars().take(30).collect()
}
