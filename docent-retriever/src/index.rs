//! Exact linear-scan cosine similarity index.
//!
//! `VectorIndex` keeps every entry in memory (`chunk_id → VectorEntry`) and
//! persists the full entry set through a [`SnapshotStore`] after each
//! mutation batch. Search scans every stored vector; exact by contract, not
//! as a limitation. The `add`/`search`/`remove`/`rebuild` surface is stable
//! enough to swap in an approximate structure later without touching callers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::{Result, RetrieverError};
use crate::snapshot::{IndexSnapshot, SnapshotStore, VectorEntry};

/// Cosine similarity between two vectors, clamped to `[-1, 1]`.
///
/// Returns `0.0` for mismatched lengths or zero-norm input instead of
/// failing; callers use this to compare arbitrary vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// One search result. `rank` is the 0-based position after sorting.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk_id: String,
    pub similarity: f32,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub vectors: usize,
    pub dimension: Option<usize>,
}

/// Result of an `add` batch: entries accepted vs. skipped (empty vector or
/// dimension mismatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddOutcome {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Default)]
struct IndexState {
    entries: HashMap<String, VectorEntry>,
    /// Locked by the first accepted insert; `None` while empty.
    dimension: Option<usize>,
}

impl IndexState {
    /// Apply the shared acceptance rules. Returns false when the entry was
    /// skipped; never fails, so one bad vector cannot abort a batch.
    fn insert(&mut self, entry: VectorEntry) -> bool {
        if entry.vector.is_empty() {
            warn!(chunk_id = %entry.chunk_id, "skipping entry with empty vector");
            return false;
        }
        match self.dimension {
            None => self.dimension = Some(entry.vector.len()),
            Some(dim) if dim != entry.vector.len() => {
                warn!(
                    chunk_id = %entry.chunk_id,
                    expected = dim,
                    actual = entry.vector.len(),
                    "skipping entry with mismatched dimension"
                );
                return false;
            }
            Some(_) => {}
        }
        self.entries.insert(entry.chunk_id.clone(), entry);
        true
    }
}

/// In-memory vector index with snapshot persistence.
///
/// Mutations (`add`, `remove`, `rebuild`) are serialized through an async
/// mutex so two batches can never interleave their snapshot writes; `search`
/// and `stats` only take the read lock and run concurrently with mutations.
pub struct VectorIndex {
    state: RwLock<IndexState>,
    store: Arc<dyn SnapshotStore>,
    mutation: Mutex<()>,
}

impl VectorIndex {
    /// Open the index from `store`. A missing snapshot starts empty; a
    /// snapshot that fails to load is logged and discarded rather than
    /// refusing to start.
    pub async fn open(store: Arc<dyn SnapshotStore>) -> Self {
        let state = match store.load().await {
            Ok(Some(snapshot)) => {
                let mut state = IndexState {
                    entries: HashMap::with_capacity(snapshot.entries.len()),
                    dimension: snapshot.dimension,
                };
                for entry in snapshot.entries {
                    state.insert(entry);
                }
                info!(
                    vectors = state.entries.len(),
                    dimension = ?state.dimension,
                    "loaded index snapshot"
                );
                state
            }
            Ok(None) => IndexState::default(),
            Err(e) => {
                warn!(error = %e, "failed to load index snapshot, starting empty");
                IndexState::default()
            }
        };
        Self {
            state: RwLock::new(state),
            store,
            mutation: Mutex::new(()),
        }
    }

    /// Add a batch of entries. The first accepted entry into an empty index
    /// locks the dimension; later entries with a different length are
    /// skipped and counted. Re-adding a `chunk_id` overwrites. The whole
    /// entry set is persisted once after the batch.
    pub async fn add(&self, entries: Vec<VectorEntry>) -> Result<AddOutcome> {
        let _guard = self.mutation.lock().await;
        let mut outcome = AddOutcome::default();
        {
            let mut state = self.state.write().await;
            for entry in entries {
                if state.insert(entry) {
                    outcome.added += 1;
                } else {
                    outcome.skipped += 1;
                }
            }
        }
        self.persist().await?;
        Ok(outcome)
    }

    /// Top-`k` entries by cosine similarity to `query`, optionally dropping
    /// hits below `threshold`. An empty index yields an empty list; a query
    /// whose length differs from the locked dimension is an error.
    pub async fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        let state = self.state.read().await;
        if state.entries.is_empty() {
            return Ok(Vec::new());
        }
        let Some(dimension) = state.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RetrieverError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(&VectorEntry, f32)> = state
            .entries
            .values()
            .map(|entry| (entry, cosine_similarity(query, &entry.vector)))
            .filter(|(_, similarity)| threshold.is_none_or(|t| *similarity >= t))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (entry, similarity))| SearchHit {
                chunk_id: entry.chunk_id.clone(),
                similarity,
                rank,
            })
            .collect())
    }

    /// Remove one entry. Returns whether it existed; removing an absent id
    /// is a no-op and does not rewrite the snapshot.
    pub async fn remove(&self, chunk_id: &str) -> Result<bool> {
        let _guard = self.mutation.lock().await;
        let removed = self.state.write().await.entries.remove(chunk_id).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Atomically replace the entire contents with `entries`. The new state
    /// is built off to the side and swapped in under the write lock, so
    /// concurrent searches observe either the old or the new index, never a
    /// partial one. Returns the number of entries accepted.
    pub async fn rebuild(&self, entries: Vec<VectorEntry>) -> Result<usize> {
        let _guard = self.mutation.lock().await;
        let mut fresh = IndexState::default();
        let mut skipped = 0usize;
        for entry in entries {
            if !fresh.insert(entry) {
                skipped += 1;
            }
        }
        let count = fresh.entries.len();
        *self.state.write().await = fresh;
        self.persist().await?;
        info!(vectors = count, skipped, "index rebuilt");
        Ok(count)
    }

    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        IndexStats {
            vectors: state.entries.len(),
            dimension: state.dimension,
        }
    }

    /// Look up a stored entry by chunk id.
    pub async fn entry(&self, chunk_id: &str) -> Option<VectorEntry> {
        self.state.read().await.entries.get(chunk_id).cloned()
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = {
            let state = self.state.read().await;
            IndexSnapshot {
                dimension: state.dimension,
                saved_at: Utc::now(),
                entries: state.entries.values().cloned().collect(),
            }
        };
        self.store.save(&snapshot).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FileSnapshotStore;
    use tempfile::{TempDir, tempdir};

    async fn open_index(dir: &TempDir) -> VectorIndex {
        let store = Arc::new(FileSnapshotStore::new(dir.path().join("index.json")));
        VectorIndex::open(store).await
    }

    fn entry(id: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry::new(id, vector)
    }

    #[test]
    fn cosine_similarity_bounds_and_defaults() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), -1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        // Mismatched lengths and zero vectors are 0, never an error.
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);

        let a = [0.3f32, -0.7, 2.5, 0.01];
        let b = [1.1f32, 0.4, -0.2, 3.0];
        let s = cosine_similarity(&a, &b);
        assert!((-1.0..=1.0).contains(&s));
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn re_adding_same_chunk_id_overwrites() -> Result<()> {
        let dir = tempdir().unwrap();
        let index = open_index(&dir).await;

        let batch = vec![entry("c1", vec![1.0, 0.0]), entry("c2", vec![0.0, 1.0])];
        index.add(batch.clone()).await?;
        index.add(batch).await?;
        assert_eq!(index.stats().await.vectors, 2);

        // Overwrite changes the stored vector, not the count.
        index.add(vec![entry("c1", vec![0.5, 0.5])]).await?;
        assert_eq!(index.stats().await.vectors, 2);
        let stored = index.entry("c1").await.expect("c1 present");
        assert_eq!(stored.vector, vec![0.5, 0.5]);
        Ok(())
    }

    #[tokio::test]
    async fn first_insert_locks_dimension() -> Result<()> {
        let dir = tempdir().unwrap();
        let index = open_index(&dir).await;
        assert_eq!(index.stats().await.dimension, None);

        let outcome = index
            .add(vec![
                entry("a", vec![1.0, 2.0, 3.0]),
                entry("bad", vec![1.0]),
                entry("empty", vec![]),
                entry("b", vec![4.0, 5.0, 6.0]),
            ])
            .await?;
        assert_eq!(outcome, AddOutcome { added: 2, skipped: 2 });

        let stats = index.stats().await;
        assert_eq!(stats.dimension, Some(3));
        assert_eq!(stats.vectors, 2);

        // Mismatched query errors; matched query works.
        assert!(matches!(
            index.search(&[1.0, 2.0], 5, None).await,
            Err(RetrieverError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert_eq!(index.search(&[1.0, 2.0, 3.0], 5, None).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn search_orders_and_truncates() -> Result<()> {
        let dir = tempdir().unwrap();
        let index = open_index(&dir).await;
        index
            .add(vec![
                entry("east", vec![1.0, 0.0]),
                entry("north", vec![0.0, 1.0]),
                entry("northeast", vec![1.0, 1.0]),
                entry("west", vec![-1.0, 0.0]),
            ])
            .await?;

        let hits = index.search(&[1.0, 0.0], 3, None).await?;
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk_id, "east");
        assert_eq!(hits[1].chunk_id, "northeast");
        for (i, hit) in hits.iter().enumerate() {
            assert_eq!(hit.rank, i);
        }
        for pair in hits.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }

        // Threshold drops the orthogonal and opposite vectors.
        let hits = index.search(&[1.0, 0.0], 10, Some(0.5)).await?;
        assert_eq!(hits.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_searches_empty() -> Result<()> {
        let dir = tempdir().unwrap();
        let index = open_index(&dir).await;
        assert!(index.search(&[1.0, 2.0], 5, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn remove_is_noop_for_absent_id() -> Result<()> {
        let dir = tempdir().unwrap();
        let index = open_index(&dir).await;
        index.add(vec![entry("keep", vec![1.0]), entry("drop", vec![2.0])]).await?;

        assert!(index.remove("drop").await?);
        assert!(!index.remove("drop").await?);
        assert!(!index.remove("never-existed").await?);
        assert_eq!(index.stats().await.vectors, 1);
        Ok(())
    }

    #[tokio::test]
    async fn rebuild_replaces_contents_atomically() -> Result<()> {
        let dir = tempdir().unwrap();
        let index = open_index(&dir).await;
        index
            .add(vec![entry("old1", vec![1.0, 0.0]), entry("old2", vec![0.0, 1.0])])
            .await?;

        // New entries have a different dimension; rebuild re-locks it.
        let count = index
            .rebuild(vec![
                entry("new1", vec![1.0, 0.0, 0.0]),
                entry("new2", vec![0.0, 1.0, 0.0]),
                entry("new3", vec![0.0, 0.0, 1.0]),
            ])
            .await?;
        assert_eq!(count, 3);

        let stats = index.stats().await;
        assert_eq!(stats.vectors, 3);
        assert_eq!(stats.dimension, Some(3));
        assert!(index.entry("old1").await.is_none());

        // Rebuild to empty clears the dimension lock too.
        assert_eq!(index.rebuild(Vec::new()).await?, 0);
        assert_eq!(index.stats().await, IndexStats { vectors: 0, dimension: None });
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() -> Result<()> {
        let dir = tempdir().unwrap();
        {
            let index = open_index(&dir).await;
            index
                .add(vec![entry("persisted", vec![0.1, 0.2, 0.3])])
                .await?;
        }

        let reopened = open_index(&dir).await;
        let stats = reopened.stats().await;
        assert_eq!(stats.vectors, 1);
        assert_eq!(stats.dimension, Some(3));
        let stored = reopened.entry("persisted").await.expect("entry persisted");
        assert_eq!(stored.vector, vec![0.1, 0.2, 0.3]);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_empty() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        tokio::fs::write(&path, b"not a snapshot").await.unwrap();

        let index = VectorIndex::open(Arc::new(FileSnapshotStore::new(&path))).await;
        assert_eq!(index.stats().await.vectors, 0);

        // And the index is usable afterwards.
        index.add(vec![entry("fresh", vec![1.0])]).await?;
        assert_eq!(index.stats().await.vectors, 1);
        Ok(())
    }
}
