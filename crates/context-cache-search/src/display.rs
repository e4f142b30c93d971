//! Display (spec.md §4.12): parses a line-delimited conversation archive
//! directly, bypassing the Store, and renders a human-readable transcript.
//!
//! Deliberate (spec.md §9 design notes): the store's canonical Exchange
//! record drops formatting detail the archive still carries, so this path
//! never routes through `context-cache-db`.

use std::path::Path;

use serde_json::Value;

struct DisplayExchange {
    user_text: String,
    assistant_text: String,
    tool_names: Vec<String>,
}

/// Parses the archive at `path` and renders exchanges in
/// `[start_exchange, end_exchange]` (1-indexed, inclusive; `None` means
/// unbounded on that side) as a human-readable text document.
///
/// Per spec.md §4.12, a missing file returns a one-line error message
/// rather than raising.
#[must_use]
pub fn render(path: &Path, start_exchange: Option<usize>, end_exchange: Option<usize>) -> String {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) => return format!("error: could not read {}: {err}", path.display()),
    };

    match parse_and_render(&contents, start_exchange, end_exchange) {
        Ok(text) => text,
        Err(err) => format!("error: {err}"),
    }
}

fn parse_and_render(
    contents: &str,
    start_exchange: Option<usize>,
    end_exchange: Option<usize>,
) -> Result<String, String> {
    let mut session_id = None;
    let mut client_version = None;
    let mut start_timestamp = None;
    let mut exchanges: Vec<DisplayExchange> = Vec::new();

    let mut in_progress_user: Option<String> = None;
    let mut in_progress_assistant: Vec<String> = Vec::new();
    let mut in_progress_tools: Vec<String> = Vec::new();

    let flush = |exchanges: &mut Vec<DisplayExchange>,
                 user: &mut Option<String>,
                 assistant: &mut Vec<String>,
                 tools: &mut Vec<String>| {
        if let Some(u) = user.take() {
            if !u.is_empty() && !assistant.is_empty() {
                exchanges.push(DisplayExchange {
                    user_text: u,
                    assistant_text: assistant.join("\n"),
                    tool_names: std::mem::take(tools),
                });
            }
        }
        assistant.clear();
        tools.clear();
    };

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(line)
            .map_err(|e| format!("malformed record: {e}"))?;
        let kind = record.get("kind").and_then(Value::as_str).unwrap_or("");

        match kind {
            "session.start" => {
                session_id = record
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                client_version = record
                    .get("client_version")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                start_timestamp = record
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            "user.message" => {
                flush(
                    &mut exchanges,
                    &mut in_progress_user,
                    &mut in_progress_assistant,
                    &mut in_progress_tools,
                );
                in_progress_user = record
                    .get("content")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            "assistant.message" => {
                if let Some(content) = record.get("content").and_then(Value::as_str) {
                    in_progress_assistant.push(content.to_string());
                }
                if let Some(tool_requests) = record.get("tool_requests").and_then(Value::as_array) {
                    for t in tool_requests {
                        if let Some(name) = t
                            .get("name")
                            .or_else(|| t.get("tool"))
                            .and_then(Value::as_str)
                        {
                            in_progress_tools.push(name.to_string());
                        }
                    }
                }
            }
            "tool.call" | "tool.invoke" => {
                if let Some(name) = record.get("name").and_then(Value::as_str) {
                    in_progress_tools.push(name.to_string());
                }
            }
            _ => {}
        }
    }
    flush(
        &mut exchanges,
        &mut in_progress_user,
        &mut in_progress_assistant,
        &mut in_progress_tools,
    );

    let session_id = session_id.ok_or_else(|| "missing session.start record".to_string())?;

    let start = start_exchange.unwrap_or(1).max(1);
    let end = end_exchange.unwrap_or(exchanges.len());

    let mut out = String::new();
    out.push_str(&format!("Session: {session_id}\n"));
    if let Some(v) = &client_version {
        out.push_str(&format!("Client version: {v}\n"));
    }
    if let Some(t) = &start_timestamp {
        out.push_str(&format!("Started: {t}\n"));
    }
    out.push_str(&format!("Exchanges: {}\n\n", exchanges.len()));

    for (i, exchange) in exchanges.iter().enumerate() {
        let position = i + 1;
        if position < start || position > end {
            continue;
        }
        out.push_str(&format!("--- Exchange {position} ---\n"));
        out.push_str("User:\n");
        out.push_str(&exchange.user_text);
        out.push_str("\n\nAssistant:\n");
        out.push_str(&exchange.assistant_text);
        out.push('\n');
        if !exchange.tool_names.is_empty() {
            out.push_str(&format!("Tools used: {}\n", exchange.tool_names.join(", ")));
        }
        out.push('\n');
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_archive(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn renders_session_metadata_and_exchange() {
        let file = write_archive(&[
            r#"{"kind":"session.start","session_id":"s1","client_version":"1.0.0","timestamp":"2024-01-01T00:00:00Z"}"#,
            r#"{"kind":"user.message","content":"hello"}"#,
            r#"{"kind":"assistant.message","content":"hi there"}"#,
        ]);
        let text = render(file.path(), None, None);
        assert!(text.contains("Session: s1"));
        assert!(text.contains("Exchange 1"));
        assert!(text.contains("hello"));
        assert!(text.contains("hi there"));
    }

    #[test]
    fn missing_file_returns_one_line_error() {
        let text = render(Path::new("/nonexistent/path.jsonl"), None, None);
        assert!(text.starts_with("error:"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn missing_session_start_is_parse_error() {
        let file = write_archive(&[r#"{"kind":"user.message","content":"hi"}"#]);
        let text = render(file.path(), None, None);
        assert!(text.starts_with("error:"));
    }

    #[test]
    fn exchange_range_bounds_are_respected() {
        let file = write_archive(&[
            r#"{"kind":"session.start","session_id":"s1"}"#,
            r#"{"kind":"user.message","content":"one"}"#,
            r#"{"kind":"assistant.message","content":"a-one"}"#,
            r#"{"kind":"user.message","content":"two"}"#,
            r#"{"kind":"assistant.message","content":"a-two"}"#,
        ]);
        let text = render(file.path(), Some(2), Some(2));
        assert!(!text.contains("Exchange 1 "));
        assert!(text.contains("Exchange 2"));
        assert!(text.contains("two"));
    }
}
