//! Domain models for Context Cache.
//!
//! These mirror the `SQLite` tables defined in `context-cache-db::schema`.
//! Timestamps use `chrono::NaiveDateTime` in UTC for storage compatibility.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// =============================================================================
// File / Fragment
// =============================================================================

/// A Markdown source artifact under the note root.
///
/// # Constraints
/// - `path`: unique, relative to the note root.
/// - `fingerprint`: lowercase hex SHA-256 of the file's contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: Option<i64>,
    pub path: String,
    pub fingerprint: String,
    pub first_indexed_at: NaiveDateTime,
    pub last_updated_at: NaiveDateTime,
}

/// A unit of retrieval: a contiguous, overlapping text window extracted
/// from a `File`.
///
/// # Constraints
/// - `(file_id, position)` is unique.
/// - `embedding` absent ⇒ ineligible for the vector ranker, still visible
///   to the lexical ranker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub id: Option<i64>,
    pub file_id: i64,
    pub position: i64,
    pub text: String,
    pub original_text: String,
    pub embedding: Option<Vec<f32>>,
}

// =============================================================================
// Conversation / Exchange
// =============================================================================

/// The enumerated provider label identifying which upstream tool produced
/// a captured conversation.
///
/// `Other` keeps the vocabulary open for providers this workspace doesn't
/// ship an adapter for yet, the way the teacher crate keeps one string
/// escape hatch on enums that mirror external, versioned vocabularies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    ClaudeCode,
    Zed,
    OpenCode,
    Other(String),
}

impl SourceTag {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClaudeCode => "claude_code",
            Self::Zed => "zed",
            Self::OpenCode => "opencode",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for SourceTag {
    fn from(value: &str) -> Self {
        match value {
            "claude_code" => Self::ClaudeCode,
            "zed" => Self::Zed,
            "opencode" => Self::OpenCode,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A captured agent session.
///
/// # Constraints
/// - `session_id`: unique within the store, carried forward from source.
/// - `archive_pointer`: archive path (line-delimited provider) or foreign
///   database session identifier (foreign-database provider). Used for
///   delete-detection against the current source artifact list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub session_id: String,
    pub source_tag: SourceTag,
    pub indexed_at: NaiveDateTime,
    pub archive_pointer: String,
    pub exchange_count: i64,
    pub fingerprint: String,
    pub client_version: Option<String>,
    pub working_directory: Option<String>,
}

/// One user-turn + assistant-turn pair within a `Conversation`.
///
/// # Constraints
/// - `(conversation_id, position)` is unique; positions are contiguous
///   from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub id: String,
    pub conversation_id: String,
    pub position: i64,
    pub timestamp: NaiveDateTime,
    pub user_text: String,
    pub assistant_text: String,
    pub tool_calls: Option<Vec<String>>,
    pub parent_turn_id: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tag_round_trips_known_variants() {
        for tag in [SourceTag::ClaudeCode, SourceTag::Zed, SourceTag::OpenCode] {
            let s = tag.as_str().to_string();
            assert_eq!(SourceTag::from(s.as_str()), tag);
        }
    }

    #[test]
    fn source_tag_preserves_unknown_variants() {
        let tag = SourceTag::from("cursor");
        assert_eq!(tag, SourceTag::Other("cursor".to_string()));
        assert_eq!(tag.as_str(), "cursor");
    }
}
