//! SQLite-backed chunk metadata store.
//!
//! Documents and their chunks live here; the vector index only holds chunk
//! ids and vectors, and every search hit is joined back against this store.
//! Each chunk version gets a fresh uuid on insert, so reprocessing a document
//! strands the old ids in the index (filtered at search time) instead of
//! silently aliasing new content.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use docent_chunk::TextChunk;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, RetrieverError};

/// Lifecycle of a document. Only `Ready` documents contribute chunks to a
/// full rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "ready" => Self::Ready,
            "failed" => Self::Failed,
            _ => Self::Processing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

/// A stored chunk joined with its document's name.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: i64,
    pub content: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Chunk metadata store over a SQLite pool. Cheap to clone.
#[derive(Clone)]
pub struct ChunkStore {
    pool: SqlitePool,
}

impl ChunkStore {
    /// Open (creating if missing) a store at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.create_tables().await?;
        info!(path = %path.display(), "chunk store opened");
        Ok(store)
    }

    /// Open an in-memory store. One connection only, so the database lives
    /// as long as the pool.
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'processing',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                metadata TEXT NOT NULL DEFAULT 'null',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert or update a document. Status resets to `Processing` on update,
    /// matching the start of a reprocess cycle.
    pub async fn upsert_document(&self, id: &str, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, name, status, created_at)
            VALUES (?, ?, 'processing', ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                status = 'processing'
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_document_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        let result = sqlx::query("UPDATE documents SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RetrieverError::InvalidInput(format!(
                "unknown document '{id}'"
            )));
        }
        Ok(())
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT id, name, status, created_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| document_from_row(&r)).transpose()
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, status, created_at FROM documents ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }

    /// Delete a document and all of its chunks in one transaction. Returns
    /// whether the document existed. Index entries for the deleted chunks
    /// stay behind until the next rebuild; search filters them out.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace every chunk of `document_id` with `chunks`, transactionally.
    /// Old rows are deleted and each new chunk gets a fresh uuid, so from
    /// any reader's perspective the swap is atomic and old chunk ids simply
    /// stop resolving.
    pub async fn replace_document_chunks(
        &self,
        document_id: &str,
        chunks: &[TextChunk],
    ) -> Result<Vec<ChunkRecord>> {
        let Some(document) = self.get_document(document_id).await? else {
            return Err(RetrieverError::InvalidInput(format!(
                "unknown document '{document_id}'"
            )));
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = Uuid::new_v4().to_string();
            let metadata = serde_json::json!({ "is_complete": chunk.is_complete });
            sqlx::query(
                r#"
                INSERT INTO chunks
                    (id, document_id, chunk_index, content, start_offset, end_offset, metadata, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(document_id)
            .bind(chunk.index as i64)
            .bind(&chunk.text)
            .bind(chunk.start_offset as i64)
            .bind(chunk.end_offset as i64)
            .bind(metadata.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            records.push(ChunkRecord {
                id,
                document_id: document_id.to_string(),
                document_name: document.name.clone(),
                chunk_index: chunk.index as i64,
                content: chunk.text.clone(),
                start_offset: chunk.start_offset as i64,
                end_offset: chunk.end_offset as i64,
                metadata,
            });
        }
        tx.commit().await?;
        debug!(document_id, chunks = records.len(), "document chunks replaced");
        Ok(records)
    }

    pub async fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRecord>> {
        let row = sqlx::query(
            r#"
            SELECT c.id, c.document_id, d.name AS document_name, c.chunk_index,
                   c.content, c.start_offset, c.end_offset, c.metadata
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE c.id = ?
            "#,
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| chunk_from_row(&r)).transpose()
    }

    pub async fn get_chunks_by_document(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, d.name AS document_name, c.chunk_index,
                   c.content, c.start_offset, c.end_offset, c.metadata
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE c.document_id = ?
            ORDER BY c.chunk_index
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(chunk_from_row).collect()
    }

    /// Every chunk belonging to a `Ready` document, the input to a full
    /// index rebuild.
    pub async fn get_all_chunks(&self) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, d.name AS document_name, c.chunk_index,
                   c.content, c.start_offset, c.end_offset, c.metadata
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.status = 'ready'
            ORDER BY c.document_id, c.chunk_index
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(chunk_from_row).collect()
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats {
            documents: documents as usize,
            chunks: chunks as usize,
        })
    }
}

fn document_from_row(row: &SqliteRow) -> Result<DocumentRecord> {
    let status: String = row.try_get("status")?;
    Ok(DocumentRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: DocumentStatus::parse(&status),
        created_at: row.try_get("created_at")?,
    })
}

fn chunk_from_row(row: &SqliteRow) -> Result<ChunkRecord> {
    let metadata: String = row.try_get("metadata")?;
    Ok(ChunkRecord {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        document_name: row.try_get("document_name")?,
        chunk_index: row.try_get("chunk_index")?,
        content: row.try_get("content")?,
        start_offset: row.try_get("start_offset")?,
        end_offset: row.try_get("end_offset")?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str, start: usize, end: usize) -> TextChunk {
        TextChunk {
            index,
            text: text.to_string(),
            start_offset: start,
            end_offset: end,
            is_complete: false,
        }
    }

    #[tokio::test]
    async fn upsert_and_status_lifecycle() -> Result<()> {
        let store = ChunkStore::open_memory().await?;
        store.upsert_document("d1", "manual.txt").await?;

        let doc = store.get_document("d1").await?.expect("document exists");
        assert_eq!(doc.name, "manual.txt");
        assert_eq!(doc.status, DocumentStatus::Processing);

        store.set_document_status("d1", DocumentStatus::Ready).await?;
        let doc = store.get_document("d1").await?.expect("document exists");
        assert_eq!(doc.status, DocumentStatus::Ready);

        store.set_document_status("d1", DocumentStatus::Failed).await?;
        let doc = store.get_document("d1").await?.expect("document exists");
        assert_eq!(doc.status, DocumentStatus::Failed);

        // Re-upserting for reprocessing drops the document back to processing.
        store.upsert_document("d1", "manual-v2.txt").await?;
        let doc = store.get_document("d1").await?.expect("document exists");
        assert_eq!(doc.name, "manual-v2.txt");
        assert_eq!(doc.status, DocumentStatus::Processing);

        assert!(matches!(
            store.set_document_status("ghost", DocumentStatus::Ready).await,
            Err(RetrieverError::InvalidInput(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn replace_chunks_supersedes_old_ids() -> Result<()> {
        let store = ChunkStore::open_memory().await?;
        store.upsert_document("d1", "notes.txt").await?;

        let first = store
            .replace_document_chunks("d1", &[chunk(0, "v1 alpha", 0, 8), chunk(1, "v1 beta", 8, 15)])
            .await?;
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].document_name, "notes.txt");

        let second = store
            .replace_document_chunks("d1", &[chunk(0, "v2 alpha", 0, 8)])
            .await?;
        assert_eq!(second.len(), 1);
        // Fresh ids every version.
        assert!(first.iter().all(|old| old.id != second[0].id));

        // Old ids no longer resolve; new one does.
        assert!(store.get_chunk(&first[0].id).await?.is_none());
        let got = store.get_chunk(&second[0].id).await?.expect("chunk exists");
        assert_eq!(got.content, "v2 alpha");

        assert_eq!(store.get_chunks_by_document("d1").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn replace_chunks_requires_known_document() -> Result<()> {
        let store = ChunkStore::open_memory().await?;
        assert!(matches!(
            store.replace_document_chunks("nope", &[]).await,
            Err(RetrieverError::InvalidInput(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn get_all_chunks_only_covers_ready_documents() -> Result<()> {
        let store = ChunkStore::open_memory().await?;
        store.upsert_document("ready", "a.txt").await?;
        store.upsert_document("pending", "b.txt").await?;
        store
            .replace_document_chunks("ready", &[chunk(0, "indexed", 0, 7)])
            .await?;
        store
            .replace_document_chunks("pending", &[chunk(0, "not yet", 0, 7)])
            .await?;
        store.set_document_status("ready", DocumentStatus::Ready).await?;

        let all = store.get_all_chunks().await?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].document_id, "ready");
        Ok(())
    }

    #[tokio::test]
    async fn delete_document_removes_chunks() -> Result<()> {
        let store = ChunkStore::open_memory().await?;
        store.upsert_document("d1", "a.txt").await?;
        let records = store
            .replace_document_chunks("d1", &[chunk(0, "gone soon", 0, 9)])
            .await?;

        assert!(store.delete_document("d1").await?);
        assert!(!store.delete_document("d1").await?);
        assert!(store.get_chunk(&records[0].id).await?.is_none());
        assert_eq!(store.stats().await?, StoreStats { documents: 0, chunks: 0 });
        Ok(())
    }

    #[tokio::test]
    async fn open_creates_database_on_disk() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.db");
        let store = ChunkStore::open(&path).await?;
        store.upsert_document("d1", "persisted.txt").await?;
        assert!(path.exists());
        store.close().await;
        Ok(())
    }
}
