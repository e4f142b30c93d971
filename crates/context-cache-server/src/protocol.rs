//! Request/response shapes for the three operations spec.md §6 exposes to
//! the external agent server: `search_kb`, `search_conversations`,
//! `show_conversation`.

use serde::{Deserialize, Serialize};

fn default_limit() -> usize {
    context_cache_core::config::DEFAULT_RESULT_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    SearchKb {
        query: String,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    SearchConversations {
        query: String,
        #[serde(default = "default_limit")]
        limit: usize,
        after: Option<String>,
        before: Option<String>,
        #[serde(default)]
        format: ResultFormat,
    },
    ShowConversation {
        path: String,
        start_exchange: Option<usize>,
        end_exchange: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    #[default]
    Markdown,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct KbHit {
    pub path: String,
    pub position: i64,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    KbHits(Vec<KbHit>),
    Text(String),
    Error { error: String },
}
