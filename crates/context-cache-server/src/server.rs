//! Newline-delimited JSON stdio server loop.
//!
//! One request object per line on stdin, one response object per line on
//! stdout. The loop itself never panics on a malformed line or an
//! operation error — both are surfaced as a `{"error": "..."}` response
//! line so a misbehaving caller doesn't take down the process (matching
//! spec.md §7's fatal-vs-recoverable split: only whole-run setup errors,
//! not per-request ones, are fatal).

use std::io::{BufRead, Write};
use std::path::Path;

use context_cache_core::Config;
use context_cache_db::Store;
use context_cache_search::Embedder;

use crate::error::{ServerError, ServerResult};
use crate::protocol::{KbHit, Request, ResultFormat, Response};

pub struct Server {
    store: Store,
    embedder: Box<dyn Embedder>,
    config: Config,
}

impl Server {
    #[must_use]
    pub fn new(store: Store, embedder: Box<dyn Embedder>, config: Config) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Runs the request/response loop over `stdin`/`stdout` until EOF.
    pub fn run_stdio(&mut self) -> std::io::Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_line(&line);
            let serialized = serde_json::to_string(&response)
                .unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}"));
            writeln!(out, "{serialized}")?;
            out.flush()?;
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Response {
        let request: Request = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(err) => {
                return Response::Error {
                    error: format!("unrecognized request: {err}"),
                }
            }
        };

        match self.dispatch(request) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "request failed");
                Response::Error {
                    error: err.to_string(),
                }
            }
        }
    }

    fn dispatch(&mut self, request: Request) -> ServerResult<Response> {
        match request {
            Request::SearchKb { query, limit } => self.search_kb(&query, limit),
            Request::SearchConversations {
                query,
                limit,
                after,
                before,
                format,
            } => self.search_conversations(&query, limit, after.as_deref(), before.as_deref(), format),
            Request::ShowConversation {
                path,
                start_exchange,
                end_exchange,
            } => Ok(self.show_conversation(&path, start_exchange, end_exchange)),
        }
    }

    fn search_kb(&mut self, query: &str, limit: usize) -> ServerResult<Response> {
        let query_vector = self.embedder.embed(query)?;
        let hits = context_cache_search::search_kb(
            self.store.connection(),
            query,
            &query_vector,
            limit,
            self.config.rrf_k,
        )?;
        Ok(Response::KbHits(
            hits.into_iter()
                .map(|h| KbHit {
                    path: h.source_path,
                    position: h.position,
                    text: h.text,
                    score: h.score,
                })
                .collect(),
        ))
    }

    fn search_conversations(
        &mut self,
        query: &str,
        limit: usize,
        after: Option<&str>,
        before: Option<&str>,
        format: ResultFormat,
    ) -> ServerResult<Response> {
        let after = parse_bound(after)?;
        let before = parse_bound(before)?;
        let hits =
            context_cache_search::search_conversations(self.store.connection(), query, after, before, limit)?;

        let text = match format {
            ResultFormat::Json => serde_json::to_string_pretty(&hits_as_json(&hits))
                .unwrap_or_else(|_| "[]".to_string()),
            ResultFormat::Markdown => render_conversation_hits_markdown(&hits),
        };
        Ok(Response::Text(text))
    }

    fn show_conversation(
        &self,
        path: &str,
        start_exchange: Option<usize>,
        end_exchange: Option<usize>,
    ) -> Response {
        let text = context_cache_search::display::render(Path::new(path), start_exchange, end_exchange);
        Response::Text(text)
    }
}

fn parse_bound(value: Option<&str>) -> ServerResult<Option<chrono::NaiveDateTime>> {
    match value {
        None => Ok(None),
        Some(s) => chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
            })
            .map(Some)
            .map_err(|e| ServerError::InvalidInput(format!("invalid timestamp {s}: {e}"))),
    }
}

fn hits_as_json(hits: &[context_cache_search::ConversationHit]) -> serde_json::Value {
    serde_json::json!(hits
        .iter()
        .map(|h| serde_json::json!({
            "conversation_id": h.conversation_id,
            "session_id": h.session_id,
            "timestamp": h.timestamp.to_string(),
            "source_tag": h.source_tag,
            "position": h.position,
            "user_text": h.user_text,
            "assistant_text": h.assistant_text,
            "score": h.score,
            "archive_pointer": h.archive_pointer,
        }))
        .collect::<Vec<_>>())
}

fn render_conversation_hits_markdown(hits: &[context_cache_search::ConversationHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "## {} ({}, {})\n\n**User:** {}\n\n**Assistant:** {}\n\n",
            hit.conversation_id, hit.source_tag, hit.timestamp, hit.user_text, hit.assistant_text
        ));
    }
    out
}
