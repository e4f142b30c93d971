//! Conversation Indexer (spec.md §4.6): reconciles the Store against the
//! current artifact list reported by a [`ConversationSource`].

use context_cache_core::hash_conversation_payload;
use context_cache_db::{queries, Store};
use context_cache_search::Embedder;

use crate::error::IngestResult;
use crate::sources::ConversationSource;
use crate::summary::IngestSummary;

/// Reconciles the Store with `source`'s current artifacts. If `embedder`
/// is supplied, each Exchange is embedded from the string
/// `"User: {u}\n\nAssistant: {a}\n\nTools used: {t}"` (tools suffix
/// omitted when the exchange used no tools) and persisted with it.
pub fn run(
    store: &mut Store,
    source: &dyn ConversationSource,
    embedder: Option<&dyn Embedder>,
) -> IngestResult<IngestSummary> {
    let mut summary = IngestSummary::default();
    let source_tag = source.source_tag();
    let current_artifacts = source.current_artifacts()?;

    let stale_ids: Vec<String> = {
        let existing = queries::list_conversations_by_source(store.connection(), &source_tag)?;
        existing
            .into_iter()
            .filter(|c| !current_artifacts.contains(&c.archive_pointer))
            .map(|c| c.id)
            .collect()
    };

    for id in stale_ids {
        match store.transaction(|tx| queries::delete_conversation(tx, &id)) {
            Ok(()) => summary.deleted += 1,
            Err(err) => summary.errors.push(format!("delete conversation {id}: {err}")),
        }
    }

    for artifact in &current_artifacts {
        summary.processed += 1;
        if let Err(err) = index_one_artifact(store, source, artifact, embedder, &mut summary) {
            if err.is_store_busy() {
                summary.errors.push(format!("store busy, skipping {artifact}: {err}"));
            } else {
                summary.errors.push(format!("{artifact}: {err}"));
            }
        }
    }

    Ok(summary)
}

fn index_one_artifact(
    store: &mut Store,
    source: &dyn ConversationSource,
    artifact: &str,
    embedder: Option<&dyn Embedder>,
    summary: &mut IngestSummary,
) -> IngestResult<()> {
    let (mut conversation, exchanges) = source.parse(artifact)?;
    let fingerprint = hash_conversation_payload(
        &conversation.id,
        &conversation.session_id,
        &conversation.source_tag,
        &exchanges,
    );

    let existing = queries::get_conversation(store.connection(), &conversation.id)?;
    if let Some(existing) = &existing {
        if existing.fingerprint == fingerprint {
            summary.skipped += 1;
            return Ok(());
        }
    }

    let mut embedded_exchanges = Vec::with_capacity(exchanges.len());
    for mut exchange in exchanges {
        if let Some(embedder) = embedder {
            let tools_suffix = exchange
                .tool_calls
                .as_ref()
                .filter(|t| !t.is_empty())
                .map(|t| format!("\n\nTools used: {}", t.join(", ")))
                .unwrap_or_default();
            let input = format!(
                "User: {}\n\nAssistant: {}{tools_suffix}",
                exchange.user_text, exchange.assistant_text
            );
            exchange.embedding = Some(embedder.embed(&input)?);
        }
        embedded_exchanges.push(exchange);
    }

    conversation.fingerprint = fingerprint;
    conversation.exchange_count = embedded_exchanges.len() as i64;
    let is_update = existing.is_some();

    store.transaction(|tx| {
        queries::delete_exchanges_of_conversation(tx, &conversation.id)?;
        queries::upsert_conversation(tx, &conversation)?;
        for exchange in &embedded_exchanges {
            queries::insert_exchange(tx, exchange)?;
        }
        Ok(())
    })?;

    if is_update {
        summary.updated += 1;
    } else {
        summary.added += 1;
    }
    summary.new_units += embedded_exchanges.len();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::JsonlSource;
    use context_cache_core::models::SourceTag;
    use context_cache_search::StaticEmbedder;
    use std::fs;

    #[test]
    fn s5_conversation_replace_shrink() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("session.jsonl");
        fs::write(
            &archive_path,
            "{\"kind\":\"session.start\",\"session_id\":\"s1\"}\n\
             {\"kind\":\"user.message\",\"content\":\"one\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"a-one\"}\n\
             {\"kind\":\"user.message\",\"content\":\"two\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"a-two\"}\n\
             {\"kind\":\"user.message\",\"content\":\"three\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"a-three\"}\n",
        )
        .unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let source = JsonlSource::new(dir.path(), SourceTag::ClaudeCode);
        let embedder = StaticEmbedder::new(4);
        let summary = run(&mut store, &source, Some(&embedder)).unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.new_units, 3);

        fs::write(
            &archive_path,
            "{\"kind\":\"session.start\",\"session_id\":\"s1\"}\n\
             {\"kind\":\"user.message\",\"content\":\"only one now\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"ok\"}\n",
        )
        .unwrap();

        let summary = run(&mut store, &source, Some(&embedder)).unwrap();
        assert_eq!(summary.updated, 1);

        let conversation_id = format!("{}:s1", SourceTag::ClaudeCode.as_str());
        let conversation = queries::get_conversation(store.connection(), &conversation_id)
            .unwrap()
            .unwrap();
        assert_eq!(conversation.exchange_count, 1);

        let exchanges =
            queries::list_exchanges_of_conversation(store.connection(), &conversation_id).unwrap();
        assert_eq!(exchanges.len(), 1);
    }

    #[test]
    fn skip_unchanged_conversation_second_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("session.jsonl"),
            "{\"kind\":\"session.start\",\"session_id\":\"s1\"}\n\
             {\"kind\":\"user.message\",\"content\":\"hi\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"hello\"}\n",
        )
        .unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let source = JsonlSource::new(dir.path(), SourceTag::ClaudeCode);
        run(&mut store, &source, None).unwrap();
        let second = run(&mut store, &source, None).unwrap();

        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 1);
    }

    #[test]
    fn delete_detection_removes_conversation_and_exchanges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        fs::write(
            &path,
            "{\"kind\":\"session.start\",\"session_id\":\"s1\"}\n\
             {\"kind\":\"user.message\",\"content\":\"hi\"}\n\
             {\"kind\":\"assistant.message\",\"content\":\"hello\"}\n",
        )
        .unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let source = JsonlSource::new(dir.path(), SourceTag::ClaudeCode);
        run(&mut store, &source, None).unwrap();

        fs::remove_file(&path).unwrap();
        let summary = run(&mut store, &source, None).unwrap();
        assert_eq!(summary.deleted, 1);

        let conversation_id = format!("{}:s1", SourceTag::ClaudeCode.as_str());
        assert!(queries::get_conversation(store.connection(), &conversation_id)
            .unwrap()
            .is_none());
        assert!(queries::list_exchanges_of_conversation(store.connection(), &conversation_id)
            .unwrap()
            .is_empty());
    }
}
