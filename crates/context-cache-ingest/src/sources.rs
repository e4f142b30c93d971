//! Conversation source adapters (spec.md §4.6, §6, §9 "Polymorphism over
//! conversation sources").
//!
//! The Conversation Indexer is polymorphic over a shared capability set:
//! enumerate current source-artifact pointers, and parse one artifact into
//! a canonical `Conversation` + ordered `Exchange`s. Two concrete adapters
//! implement it; their parsing logic is deliberately kept separate rather
//! than intermixed (spec.md §9).

use chrono::NaiveDateTime;
use context_cache_core::models::{Conversation, Exchange, SourceTag};
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::PathBuf;

use crate::error::{IngestError, IngestResult};

/// A provider-specific collaborator that enumerates its current artifacts
/// and parses one artifact into a canonical shape.
pub trait ConversationSource {
    fn source_tag(&self) -> SourceTag;
    /// Current artifact pointers: archive paths or session identifiers,
    /// depending on the adapter.
    fn current_artifacts(&self) -> IngestResult<Vec<String>>;
    fn parse(&self, artifact: &str) -> IngestResult<(Conversation, Vec<Exchange>)>;
}

fn conversation_id(source_tag: &SourceTag, session_id: &str) -> String {
    format!("{}:{session_id}", source_tag.as_str())
}

// =============================================================================
// JsonlSource: line-delimited event-log archives (spec.md §6)
// =============================================================================

/// Parses line-delimited conversation archives from a directory tree.
/// Grounded on the teacher pack's `egemengol-zed-chat-export::importer`
/// module's "parse an upstream chat format into a canonical shape" idiom,
/// adapted to this spec's JSONL record kinds (`session.start`,
/// `user.message`, `assistant.message`, `tool.call`/`tool.invoke`) rather
/// than Zed's zstd-compressed thread blobs.
pub struct JsonlSource {
    root: PathBuf,
    source_tag: SourceTag,
}

impl JsonlSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, source_tag: SourceTag) -> Self {
        Self {
            root: root.into(),
            source_tag,
        }
    }
}

impl ConversationSource for JsonlSource {
    fn source_tag(&self) -> SourceTag {
        self.source_tag.clone()
    }

    fn current_artifacts(&self) -> IngestResult<Vec<String>> {
        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(".jsonl")
            {
                paths.push(entry.path().to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(paths)
    }

    fn parse(&self, artifact: &str) -> IngestResult<(Conversation, Vec<Exchange>)> {
        let contents = std::fs::read_to_string(artifact)?;
        parse_jsonl_archive(&contents, self.source_tag.clone(), artifact)
    }
}

struct InProgressExchange {
    user_text: String,
    assistant_lines: Vec<String>,
    tools: Vec<String>,
}

fn parse_jsonl_archive(
    contents: &str,
    source_tag: SourceTag,
    archive_pointer: &str,
) -> IngestResult<(Conversation, Vec<Exchange>)> {
    // Resolve the conversation identity up front, the way display.rs's
    // parser only needs session metadata at render time, not mid-parse —
    // here the identity is needed mid-parse (every flushed Exchange carries
    // `conversation_id`/`timestamp`), so it must be known before the main
    // loop rather than filled in after it.
    let (session_id, client_version, start_timestamp) = scan_session_start(contents)?;
    let conversation_id = conversation_id(&source_tag, &session_id);
    let timestamp = start_timestamp
        .as_deref()
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map(|dt| dt.naive_utc())
        .unwrap_or_default();

    let mut exchanges: Vec<Exchange> = Vec::new();
    let mut current: Option<InProgressExchange> = None;

    let flush = |exchanges: &mut Vec<Exchange>, current: &mut Option<InProgressExchange>| {
        if let Some(ex) = current.take() {
            if !ex.user_text.is_empty() && !ex.assistant_lines.is_empty() {
                let position = exchanges.len() as i64;
                exchanges.push(Exchange {
                    id: format!("{conversation_id}:{position}"),
                    conversation_id: conversation_id.clone(),
                    position,
                    timestamp,
                    user_text: ex.user_text,
                    assistant_text: ex.assistant_lines.join("\n"),
                    tool_calls: if ex.tools.is_empty() {
                        None
                    } else {
                        Some(ex.tools)
                    },
                    parent_turn_id: None,
                    embedding: None,
                });
            }
        }
    };

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(line)
            .map_err(|e| IngestError::Parse(format!("malformed jsonl record: {e}")))?;
        let kind = record.get("kind").and_then(Value::as_str).unwrap_or("");

        match kind {
            "user.message" => {
                // Flush whatever exchange is already in progress before
                // starting the next one, or every exchange but the last in
                // a multi-turn archive is silently dropped.
                flush(&mut exchanges, &mut current);
                if let Some(content) = record.get("content").and_then(Value::as_str) {
                    current = Some(InProgressExchange {
                        user_text: content.to_string(),
                        assistant_lines: Vec::new(),
                        tools: Vec::new(),
                    });
                }
            }
            "assistant.message" => {
                if let Some(ex) = current.as_mut() {
                    if let Some(content) = record.get("content").and_then(Value::as_str) {
                        ex.assistant_lines.push(content.to_string());
                    }
                    if let Some(requests) = record.get("tool_requests").and_then(Value::as_array) {
                        for t in requests {
                            if let Some(name) = t
                                .get("name")
                                .or_else(|| t.get("tool"))
                                .and_then(Value::as_str)
                            {
                                ex.tools.push(name.to_string());
                            }
                        }
                    }
                }
            }
            "tool.call" | "tool.invoke" => {
                if let Some(ex) = current.as_mut() {
                    if let Some(name) = record.get("name").and_then(Value::as_str) {
                        ex.tools.push(name.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    // Emit whatever exchange is still open; archives never close the last
    // exchange with an explicit terminator record.
    flush(&mut exchanges, &mut current);

    let conversation = Conversation {
        id: conversation_id,
        session_id,
        source_tag,
        indexed_at: timestamp,
        archive_pointer: archive_pointer.to_string(),
        exchange_count: exchanges.len() as i64,
        fingerprint: String::new(),
        client_version,
        working_directory: None,
    };

    Ok((conversation, exchanges))
}

/// Pre-scans for the archive's `session.start` record, returning
/// `(session_id, client_version, timestamp)`. Runs before the main parse
/// loop so the conversation identity is known when the first Exchange is
/// flushed, rather than only after the loop completes.
fn scan_session_start(contents: &str) -> IngestResult<(String, Option<String>, Option<String>)> {
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(line)
            .map_err(|e| IngestError::Parse(format!("malformed jsonl record: {e}")))?;
        if record.get("kind").and_then(Value::as_str) == Some("session.start") {
            let session_id = record
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| IngestError::Parse("missing session.start record".to_string()))?;
            let client_version = record
                .get("client_version")
                .and_then(Value::as_str)
                .map(str::to_string);
            let timestamp = record.get("timestamp").and_then(Value::as_str).map(str::to_string);
            return Ok((session_id, client_version, timestamp));
        }
    }
    Err(IngestError::Parse("missing session.start record".to_string()))
}

// =============================================================================
// ForeignDbSource: read-only session/message/part database (spec.md §6)
// =============================================================================

/// Reads conversations from a sibling embedded database exposing
/// `session`/`message`/`part` tables (the shape this spec's OpenCode
/// adapter targets). Opens a read-only connection, mirroring the
/// teacher pack's `egemengol-zed-chat-export` discipline of never writing
/// to the source database (`Connection::open_with_flags` with
/// `SQLITE_OPEN_READ_ONLY`).
pub struct ForeignDbSource {
    db_path: PathBuf,
    source_tag: SourceTag,
}

impl ForeignDbSource {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>, source_tag: SourceTag) -> Self {
        Self {
            db_path: db_path.into(),
            source_tag,
        }
    }

    fn open_read_only(&self) -> IngestResult<Connection> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| IngestError::Parse(format!("failed to open {}: {e}", self.db_path.display())))
    }
}

impl ConversationSource for ForeignDbSource {
    fn source_tag(&self) -> SourceTag {
        self.source_tag.clone()
    }

    fn current_artifacts(&self) -> IngestResult<Vec<String>> {
        let conn = self.open_read_only()?;
        let mut stmt = conn
            .prepare("SELECT id FROM session")
            .map_err(|e| IngestError::Parse(format!("reading session table: {e}")))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| IngestError::Parse(format!("reading session table: {e}")))?;
        let mut out = Vec::new();
        for id in ids {
            out.push(id.map_err(|e| IngestError::Parse(e.to_string()))?);
        }
        Ok(out)
    }

    fn parse(&self, artifact: &str) -> IngestResult<(Conversation, Vec<Exchange>)> {
        let conn = self.open_read_only()?;
        parse_foreign_session(&conn, artifact, self.source_tag.clone())
    }
}

fn parse_foreign_session(
    conn: &Connection,
    session_id: &str,
    source_tag: SourceTag,
) -> IngestResult<(Conversation, Vec<Exchange>)> {
    let mut message_stmt = conn
        .prepare(
            "SELECT id, payload FROM message WHERE session_id = ?1 ORDER BY created_at ASC",
        )
        .map_err(|e| IngestError::Parse(e.to_string()))?;
    let messages: Vec<(String, Value)> = message_stmt
        .query_map(rusqlite::params![session_id], |row| {
            let id: String = row.get(0)?;
            let payload: String = row.get(1)?;
            Ok((id, payload))
        })
        .map_err(|e| IngestError::Parse(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| IngestError::Parse(e.to_string()))?
        .into_iter()
        .map(|(id, payload)| {
            let value: Value = serde_json::from_str(&payload)
                .map_err(|e| IngestError::Parse(format!("message {id} payload: {e}")))?;
            Ok((id, value))
        })
        .collect::<IngestResult<Vec<_>>>()?;

    let mut exchanges = Vec::new();
    let mut pending_user: Option<String> = None;
    let mut earliest_timestamp: Option<NaiveDateTime> = None;

    for (message_id, payload) in &messages {
        let role = payload.get("role").and_then(Value::as_str).unwrap_or("");
        let created_ms = payload
            .get("time")
            .and_then(|t| t.get("created"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let timestamp = chrono::DateTime::from_timestamp_millis(created_ms)
            .map(|dt| dt.naive_utc())
            .unwrap_or_default();
        if earliest_timestamp.is_none() {
            earliest_timestamp = Some(timestamp);
        }

        let parts = fetch_parts(conn, message_id)?;
        let text: String = parts
            .iter()
            .filter_map(|p| {
                if p.get("type").and_then(Value::as_str) == Some("text") {
                    p.get("text").and_then(Value::as_str)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let tool_names: Vec<String> = parts
            .iter()
            .filter(|p| p.get("type").and_then(Value::as_str) == Some("tool-call"))
            .filter_map(|p| p.get("tool").and_then(Value::as_str).map(str::to_string))
            .collect();

        match role {
            "user" => {
                pending_user = Some(text);
            }
            "assistant" => {
                if let Some(user_text) = pending_user.take() {
                    let position = exchanges.len() as i64;
                    let conversation_id = conversation_id(&source_tag, session_id);
                    exchanges.push(Exchange {
                        id: format!("{conversation_id}:{position}"),
                        conversation_id,
                        position,
                        timestamp,
                        user_text,
                        assistant_text: text,
                        tool_calls: if tool_names.is_empty() {
                            None
                        } else {
                            Some(tool_names)
                        },
                        parent_turn_id: None,
                        embedding: None,
                    });
                }
            }
            _ => {}
        }
    }

    let conversation_id = conversation_id(&source_tag, session_id);
    let conversation = Conversation {
        id: conversation_id,
        session_id: session_id.to_string(),
        source_tag,
        indexed_at: earliest_timestamp.unwrap_or_default(),
        archive_pointer: session_id.to_string(),
        exchange_count: exchanges.len() as i64,
        fingerprint: String::new(),
        client_version: None,
        working_directory: None,
    };

    Ok((conversation, exchanges))
}

fn fetch_parts(conn: &Connection, message_id: &str) -> IngestResult<Vec<Value>> {
    let mut stmt = conn
        .prepare("SELECT payload FROM part WHERE message_id = ?1 ORDER BY created_at ASC")
        .map_err(|e| IngestError::Parse(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![message_id], |row| row.get::<_, String>(0))
        .map_err(|e| IngestError::Parse(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        let payload = row.map_err(|e| IngestError::Parse(e.to_string()))?;
        out.push(
            serde_json::from_str(&payload)
                .map_err(|e| IngestError::Parse(format!("part payload: {e}")))?,
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonl_source_parses_single_exchange() {
        let archive = "{\"kind\":\"session.start\",\"session_id\":\"s1\",\"timestamp\":\"2024-06-01T00:00:00Z\"}\n\
             {\"kind\":\"user.message\",\"content\":\"hello\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"hi there\"}\n";
        let (conversation, exchanges) =
            parse_jsonl_archive(archive, SourceTag::ClaudeCode, "/tmp/a.jsonl").unwrap();

        assert_eq!(conversation.session_id, "s1");
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].user_text, "hello");
        assert_eq!(exchanges[0].assistant_text, "hi there");
    }

    #[test]
    fn jsonl_source_requires_session_start() {
        let archive = "{\"kind\":\"user.message\",\"content\":\"hi\"}\n";
        let result = parse_jsonl_archive(archive, SourceTag::ClaudeCode, "/tmp/a.jsonl");
        assert!(result.is_err());
    }

    #[test]
    fn jsonl_source_keeps_every_exchange_in_a_multi_turn_archive() {
        let archive = "{\"kind\":\"session.start\",\"session_id\":\"s1\"}\n\
             {\"kind\":\"user.message\",\"content\":\"one\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"a-one\"}\n\
             {\"kind\":\"user.message\",\"content\":\"two\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"a-two\"}\n\
             {\"kind\":\"user.message\",\"content\":\"three\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"a-three\"}\n";
        let (_, exchanges) =
            parse_jsonl_archive(archive, SourceTag::ClaudeCode, "/tmp/a.jsonl").unwrap();

        assert_eq!(exchanges.len(), 3);
        assert_eq!(exchanges[0].user_text, "one");
        assert_eq!(exchanges[1].user_text, "two");
        assert_eq!(exchanges[2].user_text, "three");
        assert_eq!(exchanges[0].position, 0);
        assert_eq!(exchanges[1].position, 1);
        assert_eq!(exchanges[2].position, 2);
    }

    #[test]
    fn jsonl_source_accumulates_tool_names() {
        let archive = "{\"kind\":\"session.start\",\"session_id\":\"s1\"}\n\
             {\"kind\":\"user.message\",\"content\":\"run tests\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"ok\",\"tool_requests\":[{\"name\":\"bash\"}]}\n\
             {\"kind\":\"tool.call\",\"name\":\"pytest\"}\n";
        let (_, exchanges) =
            parse_jsonl_archive(archive, SourceTag::ClaudeCode, "/tmp/a.jsonl").unwrap();
        assert_eq!(
            exchanges[0].tool_calls,
            Some(vec!["bash".to_string(), "pytest".to_string()])
        );
    }
}
