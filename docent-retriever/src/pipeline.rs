//! Indexing pipeline: chunk records in, ranked search results out.
//!
//! Glues the embedding provider, the vector index, and the chunk store
//! together. Indexing embeds chunks in fixed-size batches with a cooperative
//! yield in between; searching over-fetches from the index and joins every
//! hit back to chunk metadata, silently dropping entries whose chunk has
//! since been deleted.

use std::cmp::Ordering;
use std::sync::Arc;

use docent_embed::EmbeddingProvider;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::index::VectorIndex;
use crate::scheduler::RebuildTarget;
use crate::snapshot::VectorEntry;
use crate::store::{ChunkRecord, ChunkStore};

/// Chunks embedded per provider call during indexing and rebuilds.
pub const EMBED_BATCH_SIZE: usize = 50;

/// Raw hits fetched per requested result, to compensate for hits lost to
/// the document filter and stale-entry drops.
const OVERFETCH_FACTOR: usize = 2;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    /// Minimum similarity; `None` keeps everything.
    pub threshold: Option<f32>,
    /// Restrict results to these documents.
    pub document_ids: Option<Vec<String>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: Some(0.3),
            document_ids: None,
        }
    }
}

/// A search hit joined with its chunk metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: i64,
    pub content: String,
    pub similarity: f32,
}

/// Partial-success accounting for an indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexOutcome {
    pub indexed: usize,
    pub skipped: usize,
}

pub struct IndexingPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    chunks: ChunkStore,
}

impl IndexingPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        chunks: ChunkStore,
    ) -> Self {
        Self {
            embedder,
            index,
            chunks,
        }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Embed `records` and add them to the index. Embedding failures skip
    /// the offending chunk and keep going; the outcome carries the split.
    pub async fn index_chunks(&self, records: &[ChunkRecord]) -> Result<IndexOutcome> {
        let mut outcome = IndexOutcome::default();
        for batch in records.chunks(EMBED_BATCH_SIZE) {
            let entries = self.embed_batch(batch, &mut outcome.skipped).await;
            if !entries.is_empty() {
                let added = self.index.add(entries).await?;
                outcome.indexed += added.added;
                outcome.skipped += added.skipped;
            }
            // Bound burstiness when indexing large document sets.
            tokio::task::yield_now().await;
        }
        Ok(outcome)
    }

    /// Embed the query, over-fetch candidates, join them against the chunk
    /// store, filter, and return the top results sorted by similarity.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<RankedResult>> {
        let query_vector = self.embedder.embed_text(query).await?;
        let fetch = options.top_k.saturating_mul(OVERFETCH_FACTOR).max(1);
        let hits = self
            .index
            .search(&query_vector, fetch, options.threshold)
            .await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(chunk) = self.chunks.get_chunk(&hit.chunk_id).await? else {
                // Stale index entry: the chunk was deleted or superseded and
                // the index has not been rebuilt yet.
                debug!(chunk_id = %hit.chunk_id, "dropping stale search hit");
                continue;
            };
            if let Some(ids) = &options.document_ids {
                if !ids.contains(&chunk.document_id) {
                    continue;
                }
            }
            results.push(RankedResult {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                document_name: chunk.document_name,
                chunk_index: chunk.chunk_index,
                content: chunk.content,
                similarity: hit.similarity,
            });
        }
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(options.top_k);
        Ok(results)
    }

    /// Re-embed every chunk of every ready document and atomically replace
    /// the index contents. Returns the number of indexed vectors.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let records = self.chunks.get_all_chunks().await?;
        info!(chunks = records.len(), "rebuilding vector index");

        let mut skipped = 0usize;
        let mut entries = Vec::with_capacity(records.len());
        for batch in records.chunks(EMBED_BATCH_SIZE) {
            entries.extend(self.embed_batch(batch, &mut skipped).await);
            tokio::task::yield_now().await;
        }
        if skipped > 0 {
            warn!(skipped, "chunks skipped during rebuild");
        }
        self.index.rebuild(entries).await
    }

    async fn embed_batch(
        &self,
        batch: &[ChunkRecord],
        skipped: &mut usize,
    ) -> Vec<VectorEntry> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        match self.embedder.embed_texts(&texts).await {
            Ok(result) if result.len() == batch.len() => batch
                .iter()
                .zip(result.embeddings)
                .map(|(chunk, vector)| entry_for(chunk, vector))
                .collect(),
            Ok(result) => {
                warn!(
                    expected = batch.len(),
                    got = result.len(),
                    "batch embedding count mismatch, retrying per chunk"
                );
                self.embed_singly(batch, skipped).await
            }
            Err(e) => {
                warn!(error = %e, "batch embedding failed, retrying per chunk");
                self.embed_singly(batch, skipped).await
            }
        }
    }

    /// Per-chunk fallback so one bad chunk only costs itself.
    async fn embed_singly(
        &self,
        batch: &[ChunkRecord],
        skipped: &mut usize,
    ) -> Vec<VectorEntry> {
        let mut entries = Vec::with_capacity(batch.len());
        for chunk in batch {
            match self.embedder.embed_text(&chunk.content).await {
                Ok(vector) => entries.push(entry_for(chunk, vector)),
                Err(e) => {
                    error!(chunk_id = %chunk.id, error = %e, "embedding failed, skipping chunk");
                    *skipped += 1;
                }
            }
        }
        entries
    }
}

fn entry_for(chunk: &ChunkRecord, vector: Vec<f32>) -> VectorEntry {
    VectorEntry::new(chunk.id.clone(), vector).with_aux(serde_json::json!({
        "document_id": chunk.document_id,
        "document_name": chunk.document_name,
        "chunk_index": chunk.chunk_index,
    }))
}

#[async_trait::async_trait]
impl RebuildTarget for IndexingPipeline {
    async fn rebuild_all(&self) -> Result<usize> {
        self.rebuild_index().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FileSnapshotStore;
    use crate::store::DocumentStatus;
    use docent_chunk::TextChunk;
    use docent_embed::HashedEmbeddingProvider;
    use tempfile::TempDir;

    const DIM: usize = 64;

    async fn pipeline(dir: &TempDir) -> Result<IndexingPipeline> {
        let chunks = ChunkStore::open_memory().await?;
        let store = Arc::new(FileSnapshotStore::new(dir.path().join("index.json")));
        let index = Arc::new(VectorIndex::open(store).await);
        let embedder = Arc::new(HashedEmbeddingProvider::new(DIM));
        Ok(IndexingPipeline::new(embedder, index, chunks))
    }

    /// Embedder whose batch endpoint is down and whose single-text endpoint
    /// rejects texts containing `reject`.
    struct FlakyEmbedder {
        inner: HashedEmbeddingProvider,
        reject: &'static str,
    }

    impl FlakyEmbedder {
        fn new(reject: &'static str) -> Arc<Self> {
            Arc::new(Self {
                inner: HashedEmbeddingProvider::new(DIM),
                reject,
            })
        }
    }

    #[async_trait::async_trait]
    impl docent_embed::EmbeddingProvider for FlakyEmbedder {
        async fn embed_text(
            &self,
            text: &str,
        ) -> std::result::Result<Vec<f32>, docent_embed::EmbedError> {
            if text.contains(self.reject) {
                return Err(docent_embed::EmbedError::Api {
                    status: 500,
                    snippet: "model choked".into(),
                });
            }
            self.inner.embed_text(text).await
        }

        async fn embed_texts(
            &self,
            _texts: &[String],
        ) -> std::result::Result<docent_embed::EmbeddingResult, docent_embed::EmbedError> {
            Err(docent_embed::EmbedError::Api {
                status: 500,
                snippet: "batch endpoint down".into(),
            })
        }

        fn embedding_dimension(&self) -> usize {
            self.inner.embedding_dimension()
        }

        fn provider_name(&self) -> &str {
            "flaky"
        }
    }

    async fn add_document(
        p: &IndexingPipeline,
        id: &str,
        name: &str,
        texts: &[&str],
    ) -> Result<Vec<ChunkRecord>> {
        p.chunk_store().upsert_document(id, name).await?;
        let chunks: Vec<TextChunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextChunk {
                index: i,
                text: t.to_string(),
                start_offset: i * 100,
                end_offset: (i + 1) * 100,
                is_complete: i == texts.len() - 1,
            })
            .collect();
        let records = p.chunk_store().replace_document_chunks(id, &chunks).await?;
        p.chunk_store().set_document_status(id, DocumentStatus::Ready).await?;
        Ok(records)
    }

    #[tokio::test]
    async fn indexing_zero_chunks_is_fine() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir).await?;
        let outcome = p.index_chunks(&[]).await?;
        assert_eq!(outcome, IndexOutcome::default());
        assert!(p.search("anything", &SearchOptions::default()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn indexed_chunks_are_searchable_with_metadata() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir).await?;
        let records = add_document(
            &p,
            "d1",
            "faq.txt",
            &["resetting your password takes two minutes", "unrelated text about llamas"],
        )
        .await?;
        let outcome = p.index_chunks(&records).await?;
        assert_eq!(outcome, IndexOutcome { indexed: 2, skipped: 0 });

        let options = SearchOptions {
            top_k: 1,
            threshold: None,
            document_ids: None,
        };
        let results = p.search("resetting your password takes two minutes", &options).await?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "d1");
        assert_eq!(results[0].document_name, "faq.txt");
        assert_eq!(results[0].content, "resetting your password takes two minutes");
        assert!(results[0].similarity > 0.99);
        Ok(())
    }

    #[tokio::test]
    async fn document_filter_restricts_results() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir).await?;
        let a = add_document(&p, "a", "a.txt", &["shared topic sentence"]).await?;
        let b = add_document(&p, "b", "b.txt", &["shared topic sentence"]).await?;
        p.index_chunks(&a).await?;
        p.index_chunks(&b).await?;

        let options = SearchOptions {
            top_k: 5,
            threshold: None,
            document_ids: Some(vec!["b".to_string()]),
        };
        let results = p.search("shared topic sentence", &options).await?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "b");
        Ok(())
    }

    #[tokio::test]
    async fn stale_entries_are_dropped_silently() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir).await?;
        let keep = add_document(&p, "keep", "keep.txt", &["a sentence that stays"]).await?;
        let gone = add_document(&p, "gone", "gone.txt", &["a sentence that goes"]).await?;
        p.index_chunks(&keep).await?;
        p.index_chunks(&gone).await?;

        // Delete the document but do not rebuild: the index still holds its
        // vector, and search must filter it rather than error.
        p.chunk_store().delete_document("gone").await?;
        assert_eq!(p.index().stats().await.vectors, 2);

        let options = SearchOptions {
            top_k: 5,
            threshold: None,
            document_ids: None,
        };
        let results = p.search("a sentence", &options).await?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "keep");
        Ok(())
    }

    #[tokio::test]
    async fn rebuild_reflects_current_documents_exactly() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir).await?;
        let a = add_document(&p, "a", "a.txt", &["first doc text"]).await?;
        let b = add_document(&p, "b", "b.txt", &["second doc text"]).await?;
        p.index_chunks(&a).await?;
        p.index_chunks(&b).await?;

        p.chunk_store().delete_document("a").await?;
        let rebuilt = p.rebuild_index().await?;
        assert_eq!(rebuilt, 1);
        assert_eq!(p.index().stats().await.vectors, 1);

        // Rebuild over an empty document set leaves a valid empty index.
        p.chunk_store().delete_document("b").await?;
        assert_eq!(p.rebuild_index().await?, 0);
        assert!(p.search("anything", &SearchOptions::default()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_batch_falls_back_per_chunk_and_skips_bad_ones() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let chunks = ChunkStore::open_memory().await?;
        let store = Arc::new(FileSnapshotStore::new(dir.path().join("index.json")));
        let index = Arc::new(VectorIndex::open(store).await);
        let p = IndexingPipeline::new(FlakyEmbedder::new("poison"), index, chunks);

        let records = add_document(
            &p,
            "d1",
            "mixed.txt",
            &["a healthy first chunk", "this poison chunk fails", "a healthy third chunk"],
        )
        .await?;

        // The batch call fails outright; the per-chunk fallback indexes the
        // two good chunks and counts the bad one.
        let outcome = p.index_chunks(&records).await?;
        assert_eq!(outcome, IndexOutcome { indexed: 2, skipped: 1 });
        assert_eq!(p.index().stats().await.vectors, 2);

        let options = SearchOptions {
            top_k: 5,
            threshold: None,
            document_ids: None,
        };
        let results = p.search("a healthy first chunk", &options).await?;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.content.contains("poison")));

        // A full rebuild goes through the same fallback and accounting.
        assert_eq!(p.rebuild_index().await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn reindexing_same_records_does_not_duplicate() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir).await?;
        let records = add_document(&p, "d", "d.txt", &["alpha", "beta", "gamma"]).await?;
        p.index_chunks(&records).await?;
        p.index_chunks(&records).await?;
        assert_eq!(p.index().stats().await.vectors, 3);
        Ok(())
    }
}
