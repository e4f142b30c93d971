//! Note Indexer (spec.md §4.5): reconciles the Store with the on-disk
//! Markdown tree.

use std::collections::HashSet;
use std::path::Path;

use context_cache_core::{fragment_text, hash_file_contents};
use context_cache_db::{queries, Store};
use context_cache_search::Embedder;
use walkdir::WalkDir;

use crate::error::IngestResult;
use crate::summary::IngestSummary;

const MARKDOWN_SUFFIX: &str = ".md";

/// Walks `root` recursively, reconciles the Store against the discovered
/// Markdown files, and returns a summary. Per-file errors are captured in
/// the summary and do not halt the run.
pub fn run(
    store: &mut Store,
    root: &Path,
    embedder: &dyn Embedder,
    chunk_len: usize,
    chunk_overlap: usize,
) -> IngestResult<IngestSummary> {
    let mut summary = IngestSummary::default();

    let on_disk: Vec<(String, std::path::PathBuf)> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(MARKDOWN_SUFFIX))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            Some((relative.to_string_lossy().replace('\\', "/"), entry.path().to_path_buf()))
        })
        .collect();

    let current_paths: HashSet<&str> = on_disk.iter().map(|(rel, _)| rel.as_str()).collect();

    let stale_file_ids: Vec<i64> = {
        let existing = queries::list_files(store.connection())?;
        existing
            .into_iter()
            .filter(|f| !current_paths.contains(f.path.as_str()))
            .filter_map(|f| f.id)
            .collect()
    };

    for file_id in stale_file_ids {
        match store.transaction(|tx| queries::delete_file(tx, file_id)) {
            Ok(()) => summary.deleted += 1,
            Err(err) => summary.errors.push(format!("delete file {file_id}: {err}")),
        }
    }

    for (relative_path, absolute_path) in &on_disk {
        summary.processed += 1;
        if let Err(err) = index_one_file(
            store,
            relative_path,
            absolute_path,
            embedder,
            chunk_len,
            chunk_overlap,
            &mut summary,
        ) {
            if err.is_store_busy() {
                summary
                    .errors
                    .push(format!("store busy, skipping {relative_path}: {err}"));
            } else {
                summary.errors.push(format!("{relative_path}: {err}"));
            }
        }
    }

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn index_one_file(
    store: &mut Store,
    relative_path: &str,
    absolute_path: &Path,
    embedder: &dyn Embedder,
    chunk_len: usize,
    chunk_overlap: usize,
    summary: &mut IngestSummary,
) -> IngestResult<()> {
    let contents = std::fs::read_to_string(absolute_path)?;
    let fingerprint = hash_file_contents(&contents);

    let existing = queries::get_file_by_path(store.connection(), relative_path)?;

    let (file_id, should_write_fragments, is_update) = match existing {
        Some(file) if file.fingerprint == fingerprint => {
            summary.skipped += 1;
            (file.id.expect("stored file always has an id"), false, false)
        }
        Some(file) => (file.id.expect("stored file always has an id"), true, true),
        None => (0, true, false),
    };

    if !should_write_fragments {
        return Ok(());
    }

    let chunks = fragment_text(&contents, chunk_len, chunk_overlap);
    let mut embedded_chunks = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let vector = embedder.embed(chunk)?;
        embedded_chunks.push((chunk.clone(), vector));
    }

    store.transaction(|tx| {
        let file_id = if is_update {
            queries::delete_fragments_of_file(tx, file_id)?;
            queries::update_file_fingerprint(tx, file_id, &fingerprint)?;
            file_id
        } else {
            queries::insert_file(tx, relative_path, &fingerprint)?
        };

        for (position, (chunk, vector)) in embedded_chunks.iter().enumerate() {
            queries::insert_fragment(
                tx,
                file_id,
                position as i64,
                chunk,
                chunk,
                Some(vector),
            )?;
        }
        Ok(())
    })?;

    if is_update {
        summary.updated += 1;
    } else {
        summary.added += 1;
    }
    summary.new_units += chunks.len();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_cache_search::StaticEmbedder;
    use std::fs;

    #[test]
    fn s1_single_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test.md"),
            "TypeScript is a typed superset of JavaScript.",
        )
        .unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let embedder = StaticEmbedder::new(4);
        let summary = run(&mut store, dir.path(), &embedder, 500, 50).unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(summary.new_units, 1);
        assert!(summary.errors.is_empty());

        let files = queries::list_files(store.connection()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn skip_unchanged_second_run_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "hello world").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let embedder = StaticEmbedder::new(4);
        run(&mut store, dir.path(), &embedder, 500, 50).unwrap();
        let second = run(&mut store, dir.path(), &embedder, 500, 50).unwrap();

        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.skipped, 1);
    }

    #[test]
    fn s2_delete_detection() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "content a").unwrap();
        fs::write(dir.path().join("b.md"), "content b").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let embedder = StaticEmbedder::new(4);
        run(&mut store, dir.path(), &embedder, 500, 50).unwrap();

        fs::remove_file(dir.path().join("a.md")).unwrap();
        let summary = run(&mut store, dir.path(), &embedder, 500, 50).unwrap();

        assert_eq!(summary.deleted, 1);
        assert!(queries::get_file_by_path(store.connection(), "a.md")
            .unwrap()
            .is_none());
        assert!(queries::get_file_by_path(store.connection(), "b.md")
            .unwrap()
            .is_some());
    }

    #[test]
    fn s3_change_reindex() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("c.md"), "short content").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let embedder = StaticEmbedder::new(4);
        run(&mut store, dir.path(), &embedder, 500, 50).unwrap();

        fs::write(
            dir.path().join("c.md"),
            "a substantially different and longer piece of content",
        )
        .unwrap();
        let summary = run(&mut store, dir.path(), &embedder, 500, 50).unwrap();

        assert_eq!(summary.updated, 1);

        let file = queries::get_file_by_path(store.connection(), "c.md")
            .unwrap()
            .unwrap();
        let fragments = queries::fragments_with_embeddings(store.connection()).unwrap();
        assert_eq!(fragments.len(), 1);

        let fts_count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM fragments_fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fts_count as usize, fragments.len());
        let _ = file;
    }
}
