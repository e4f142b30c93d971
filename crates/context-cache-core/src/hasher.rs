//! Stable content fingerprints used for change detection (not cryptographic
//! security, despite using a cryptographic digest function for convenience).

use sha2::{Digest, Sha256};

use crate::models::{Exchange, SourceTag};

/// Hash of a file's contents, read as text, returned as lowercase hex.
#[must_use]
pub fn hash_file_contents(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonical-payload hash of a parsed conversation.
///
/// Deliberately omits timestamps and tool-call lists (spec.md §4.3) so that
/// re-exports that change only wall-clock metadata or tool-argument capture
/// don't trigger re-embedding. Field order is fixed so the same logical
/// conversation always hashes the same way regardless of in-memory
/// representation order.
#[must_use]
pub fn hash_conversation_payload(
    conversation_id: &str,
    session_id: &str,
    source_tag: &SourceTag,
    exchanges: &[Exchange],
) -> String {
    let mut canonical = String::new();
    canonical.push_str(conversation_id);
    canonical.push('\0');
    canonical.push_str(session_id);
    canonical.push('\0');
    canonical.push_str(source_tag.as_str());
    for exchange in exchanges {
        canonical.push('\0');
        canonical.push_str(&exchange.position.to_string());
        canonical.push('\0');
        canonical.push_str(&exchange.user_text);
        canonical.push('\0');
        canonical.push_str(&exchange.assistant_text);
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
