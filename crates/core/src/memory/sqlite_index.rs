//! # SQLite Thought Index
//!
//! Persistent embedding store keyed by chunk id. Similarity search is a
//! brute-force cosine scan, which is fine at the scale of a single run's
//! output.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{IndexHit, ThoughtIndex};
use crate::workspace::{cosine_similarity, ThoughtChunk};

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// SQLite-backed [`ThoughtIndex`]
pub struct SqliteThoughtIndex {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteThoughtIndex {
    /// Open or create the index at `.synapse/thoughts.db`
    pub fn open() -> Result<Self> {
        Self::open_at(".synapse/thoughts.db")
    }

    /// Open the index at a specific path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path.as_ref()).context("Failed to open thought index")?;
        Self::from_connection(conn)
    }

    /// Non-persistent index, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory index")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let index = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        index.run_migrations()?;
        Ok(index)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < SCHEMA_VERSION {
            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS thoughts (
                    id TEXT PRIMARY KEY,
                    content TEXT NOT NULL,
                    source_id TEXT NOT NULL,
                    embedding_json TEXT NOT NULL,
                    dimensions INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
                [],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    /// Stored content for a chunk id
    #[cfg(test)]
    fn content(&self, id: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT content FROM thoughts WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

impl ThoughtIndex for SqliteThoughtIndex {
    fn upsert(&self, chunk: &ThoughtChunk) -> Result<()> {
        let Some(embedding) = chunk.embedding.as_ref() else {
            anyhow::bail!("chunk {} has no embedding to index", chunk.id);
        };
        let embedding_json = serde_json::to_string(embedding)?;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO thoughts
                (id, content, source_id, embedding_json, dimensions, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                chunk.id,
                chunk.content,
                chunk.source_id,
                embedding_json,
                embedding.len() as i64,
                chunk.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to index thought")?;
        Ok(())
    }

    fn query(&self, embedding: &[f32], limit: usize) -> Result<Vec<IndexHit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, embedding_json FROM thoughts WHERE dimensions = ?1",
        )?;

        let rows = stmt
            .query_map(params![embedding.len() as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read indexed thoughts")?;

        let mut hits = Vec::with_capacity(rows.len());
        for (chunk_id, source_id, json) in rows {
            let stored: Vec<f32> = serde_json::from_str(&json)
                .with_context(|| format!("Corrupt embedding for {}", chunk_id))?;
            let score = cosine_similarity(embedding, &stored)?;
            hits.push(IndexHit {
                chunk_id,
                source_id,
                score,
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM thoughts", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded(content: &str, embedding: Vec<f32>) -> ThoughtChunk {
        ThoughtChunk::new(content, Some(embedding), 1.0, "agent", vec![])
    }

    #[test]
    fn test_upsert_and_query_ranks_by_similarity() {
        let index = SqliteThoughtIndex::open_in_memory().unwrap();
        let near = embedded("near", vec![1.0, 0.1]);
        let far = embedded("far", vec![0.0, 1.0]);
        index.upsert(&near).unwrap();
        index.upsert(&far).unwrap();

        let hits = index.query(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, near.id);
        assert!(hits[0].score > hits[1].score);

        assert_eq!(index.query(&[1.0, 0.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let index = SqliteThoughtIndex::open_in_memory().unwrap();
        let chunk = embedded("v1", vec![1.0]);
        index.upsert(&chunk).unwrap();
        index.upsert(&chunk).unwrap();
        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(index.content(&chunk.id).unwrap().as_deref(), Some("v1"));
    }

    #[test]
    fn test_upsert_requires_embedding() {
        let index = SqliteThoughtIndex::open_in_memory().unwrap();
        let chunk = ThoughtChunk::user_prompt("no vector", 1.0);
        assert!(index.upsert(&chunk).is_err());
        assert_eq!(index.len().unwrap(), 0);
    }

    #[test]
    fn test_query_skips_other_dimensions() {
        let index = SqliteThoughtIndex::open_in_memory().unwrap();
        index.upsert(&embedded("2d", vec![1.0, 0.0])).unwrap();
        index.upsert(&embedded("3d", vec![1.0, 0.0, 0.0])).unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(index.content(&hits[0].chunk_id).unwrap().as_deref(), Some("3d"));
    }

    #[test]
    fn test_reopen_on_disk_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("thoughts.db");
        let chunk = embedded("persisted", vec![0.3, 0.4]);
        {
            let index = SqliteThoughtIndex::open_at(&path).unwrap();
            index.upsert(&chunk).unwrap();
        }

        let index = SqliteThoughtIndex::open_at(&path).unwrap();
        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(index.content(&chunk.id).unwrap().as_deref(), Some("persisted"));
    }
}
