//! Sqlite persistence for the vector index.
//!
//! One row per chunk, embedding stored as a little-endian f32 BLOB.
//! Rebuilds never touch the live file in place: the new index is written
//! to a `.tmp` sibling and renamed over the old one, so a concurrent
//! reader loads either the previous or the new snapshot.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::AgentError;
use crate::rag::index::{Chunk, IndexEntry, VectorIndex};

#[derive(Debug)]
pub struct IndexStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl IndexStore {
    /// Open an existing index file. Fails with `IndexIo` when the file is
    /// missing or not a readable database.
    pub async fn open(db_path: &Path) -> Result<Self, AgentError> {
        Self::connect(db_path, false).await
    }

    /// Create (or truncate into) a fresh index file, typically the `.tmp`
    /// sibling of the live index.
    pub async fn create(db_path: &Path) -> Result<Self, AgentError> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|err| AgentError::IndexIo(format!("failed to clear {}: {}", db_path.display(), err)))?;
        }
        let store = Self::connect(db_path, true).await?;
        store.init_schema().await?;
        Ok(store)
    }

    async fn connect(db_path: &Path, create: bool) -> Result<Self, AgentError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|err| AgentError::IndexIo(format!("cannot open index {}: {}", db_path.display(), err)))?;

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    async fn init_schema(&self) -> Result<(), AgentError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(index_io)?;

        Ok(())
    }

    pub async fn count(&self) -> Result<usize, AgentError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(index_io)?;
        Ok(count as usize)
    }

    pub async fn insert_batch(&self, entries: &[IndexEntry]) -> Result<(), AgentError> {
        let mut tx = self.pool.begin().await.map_err(index_io)?;

        for entry in entries {
            let blob = serialize_embedding(&entry.embedding);
            sqlx::query(
                "INSERT OR REPLACE INTO chunks (chunk_id, content, source, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&entry.chunk.id)
            .bind(&entry.chunk.content)
            .bind(&entry.chunk.source)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(index_io)?;
        }

        tx.commit().await.map_err(index_io)?;
        Ok(())
    }

    /// Load every stored (chunk, embedding) pair into a fresh in-memory
    /// index, in insertion order.
    pub async fn load(&self) -> Result<VectorIndex, AgentError> {
        let rows = sqlx::query("SELECT chunk_id, content, source, embedding FROM chunks ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(index_io)?;

        let entries = rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                IndexEntry {
                    chunk: Chunk {
                        id: row.get("chunk_id"),
                        content: row.get("content"),
                        source: row.get("source"),
                    },
                    embedding: deserialize_embedding(&blob),
                }
            })
            .collect();

        Ok(VectorIndex::new(entries))
    }

    /// Close the pool so the database file can be renamed safely.
    pub async fn close(self) {
        self.pool.close().await;
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Atomically replace the live index file with a freshly built one.
pub fn swap_into_place(tmp: &Path, live: &Path) -> Result<(), AgentError> {
    for suffix in ["-wal", "-shm"] {
        let sidecar = sidecar_path(live, suffix);
        if sidecar.exists() {
            let _ = std::fs::remove_file(&sidecar);
        }
    }

    std::fs::rename(tmp, live).map_err(|err| {
        AgentError::IndexIo(format!(
            "failed to swap index {} -> {}: {}",
            tmp.display(),
            live.display(),
            err
        ))
    })
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn index_io<E: std::fmt::Display>(err: E) -> AgentError {
    AgentError::IndexIo(err.to_string())
}
