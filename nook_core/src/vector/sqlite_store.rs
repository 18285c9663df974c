//! SQLite-backed `VectorStore` (spec.md §4.5).
//!
//! Grounded on the teacher's `SqliteVectorStorage` (`Arc<Mutex<Connection>>`,
//! brute-force in-process cosine similarity over a serialized vector column)
//! but reshaped around the four tables spec.md names: `block_vectors`,
//! `vec_blocks`, `external_block_contents`, `index_meta`. No vector
//! virtual-table extension is assumed to be compiled in, so `vec_blocks`
//! stores embeddings as a `BLOB` of little-endian `f32`s and similarity is
//! computed in Rust — the same tradeoff the teacher's own implementation
//! makes (see DESIGN.md).

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

use super::types::{ChunkVector, ExternalContent, ExternalKind};

/// Restricts a similarity query to a subset of the index.
#[derive(Debug, Clone)]
pub enum SearchFilter {
    /// Only chunks belonging to this document.
    DocId(String),
    /// Only chunks whose id starts with this prefix — used for "search
    /// inside this bookmark/file/folder" (`{docId}_{blockId}_`).
    IdPrefix(String),
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub doc_id: String,
    pub source_block_id: String,
    pub content: String,
    pub block_type: String,
    pub heading_context: String,
    pub distance: f32,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub indexed_docs: usize,
    pub indexed_bookmarks: usize,
    pub indexed_files: usize,
    pub indexed_folders: usize,
    pub total_docs: usize,
    pub last_index_time: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct VectorStore {
    conn: Mutex<Connection>,
}

impl VectorStore {
    /// Open (creating if absent) the vector database at `path`, verifying
    /// the stored dimension matches `expected_dimension`. Opening with a
    /// mismatched dimension is a hard error (spec.md invariant: "Dimension
    /// lock") — no row is written in that case.
    pub fn bootstrap(path: &std::path::Path, expected_dimension: usize, model: &str, provider: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        let recorded: Option<i64> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'dimension'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|v| v.parse().unwrap_or(-1));

        match recorded {
            Some(found) if found as usize != expected_dimension => {
                return Err(Error::DimensionMismatch {
                    expected: expected_dimension,
                    found: found as usize,
                });
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO index_meta (key, value) VALUES ('dimension', ?1)",
                    params![expected_dimension.to_string()],
                )?;
                conn.execute(
                    "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('model', ?1)",
                    params![model],
                )?;
                conn.execute(
                    "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('provider', ?1)",
                    params![provider],
                )?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn bootstrap_in_memory(expected_dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        conn.execute(
            "INSERT INTO index_meta (key, value) VALUES ('dimension', ?1)",
            params![expected_dimension.to_string()],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS block_vectors (
                id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                source_block_id TEXT NOT NULL,
                content TEXT NOT NULL,
                block_type TEXT NOT NULL,
                heading_context TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_block_vectors_doc ON block_vectors(doc_id);
            CREATE INDEX IF NOT EXISTS idx_block_vectors_source ON block_vectors(doc_id, source_block_id);

            CREATE TABLE IF NOT EXISTS vec_blocks (
                id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS external_block_contents (
                id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                block_id TEXT NOT NULL,
                block_type TEXT NOT NULL,
                url TEXT,
                file_path TEXT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                extracted_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_external_doc ON external_block_contents(doc_id);

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Insert or replace a chunk in a single transaction spanning both
    /// `block_vectors` and `vec_blocks`, so readers never observe one table
    /// updated without the other.
    pub fn upsert(&self, chunk: &ChunkVector) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO block_vectors (id, doc_id, source_block_id, content, block_type, heading_context, fingerprint, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                doc_id = excluded.doc_id,
                source_block_id = excluded.source_block_id,
                content = excluded.content,
                block_type = excluded.block_type,
                heading_context = excluded.heading_context,
                fingerprint = excluded.fingerprint,
                updated_at = excluded.updated_at",
            params![
                chunk.id,
                chunk.doc_id,
                chunk.source_block_id,
                chunk.content,
                chunk.block_type,
                chunk.heading_context,
                chunk.fingerprint,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        tx.execute(
            "INSERT INTO vec_blocks (id, embedding) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET embedding = excluded.embedding",
            params![chunk.id, encode_embedding(&chunk.embedding)],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Every stored embedding for a document, used by the Searcher to
    /// assemble a representative per-document vector for the graph and
    /// `vectors()` surfaces.
    pub fn doc_embeddings(&self, doc_id: &str) -> Result<Vec<Vec<f32>>> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stmt = conn.prepare(
            "SELECT vb.embedding FROM block_vectors bv JOIN vec_blocks vb ON bv.id = vb.id
             WHERE bv.doc_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![doc_id], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.iter().map(|blob| decode_embedding(blob)).collect())
    }

    /// Existing chunk ids and fingerprints for a document, used by the
    /// Indexer to compute `toRemove`/`toEmbed` diffs.
    pub fn existing_fingerprints(&self, doc_id: &str) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stmt = conn.prepare(
            "SELECT id, fingerprint FROM block_vectors WHERE doc_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![doc_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Existing chunk id, fingerprint, source block id and block type for a
    /// document — the superset `existing_fingerprints` exposes plus the
    /// per-row source-block/type needed to map a pruned chunk id back to
    /// the block it came from (used to detect removed external blocks).
    pub fn existing_blocks(&self, doc_id: &str) -> Result<Vec<(String, String, String, String)>> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stmt = conn.prepare(
            "SELECT id, fingerprint, source_block_id, block_type FROM block_vectors WHERE doc_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![doc_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_by_doc_id(&self, doc_id: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tx = conn.transaction()?;
        delete_ids_matching(&tx, "doc_id = ?1", params![doc_id])?;
        tx.execute(
            "DELETE FROM external_block_contents WHERE doc_id = ?1",
            params![doc_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete the chunks in `ids` (the `existing \ desired` diff computed by
    /// the Indexer). This is the only pruning path used during re-index —
    /// external kinds not visited this pass are simply absent from `ids`,
    /// never blanket-deleted by type.
    pub fn delete_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute("DELETE FROM block_vectors WHERE id = ?1", params![id])?;
            tx.execute("DELETE FROM vec_blocks WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove every chunk sourced from `block_id` within `doc_id`, plus any
    /// external-content row for that block (spec.md §4.5).
    pub fn delete_by_source_block(&self, doc_id: &str, block_id: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tx = conn.transaction()?;
        delete_ids_matching(
            &tx,
            "doc_id = ?1 AND source_block_id = ?2",
            params![doc_id, block_id],
        )?;
        tx.execute(
            "DELETE FROM external_block_contents WHERE doc_id = ?1 AND block_id = ?2",
            params![doc_id, block_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete every row for `doc_id` whose `block_type` names an external
    /// kind (`bookmark`/`file`/`folder`) and is not in `kinds` — a
    /// type-scoped safety net, never the primary pruning path (spec.md
    /// §4.6's "Critical safety rules": normal re-index pruning uses the
    /// `existing \ desired` diff via `delete_ids`, not a type exclusion).
    /// Plain block types (`paragraph`, `heading`, ...) are never touched.
    pub fn delete_by_doc_id_except(&self, doc_id: &str, kinds: &[ExternalKind]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tx = conn.transaction()?;

        let external_types = [
            ExternalKind::Bookmark.as_str(),
            ExternalKind::File.as_str(),
            ExternalKind::Folder.as_str(),
        ];
        let kept: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();

        let mut bind: Vec<String> = vec![doc_id.to_string()];
        bind.extend(external_types.iter().map(|s| s.to_string()));
        let type_placeholders = (2..2 + external_types.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let clause = if kept.is_empty() {
            format!("doc_id = ?1 AND block_type IN ({type_placeholders})")
        } else {
            let kept_start = bind.len() + 1;
            bind.extend(kept.iter().map(|s| s.to_string()));
            let kept_placeholders = (kept_start..kept_start + kept.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "doc_id = ?1 AND block_type IN ({type_placeholders}) AND block_type NOT IN ({kept_placeholders})"
            )
        };

        delete_ids_matching(&tx, &clause, rusqlite::params_from_iter(bind.iter()))?;

        let ext_clause = if kept.is_empty() {
            "doc_id = ?1".to_string()
        } else {
            let kept_placeholders = (2..2 + kept.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("doc_id = ?1 AND block_type NOT IN ({kept_placeholders})")
        };
        let mut ext_bind: Vec<String> = vec![doc_id.to_string()];
        ext_bind.extend(kept.iter().map(|s| s.to_string()));
        tx.execute(
            &format!("DELETE FROM external_block_contents WHERE {ext_clause}"),
            rusqlite::params_from_iter(ext_bind.iter()),
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn put_external_content(&self, content: &ExternalContent) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute(
            "INSERT INTO external_block_contents (id, doc_id, block_id, block_type, url, file_path, title, content, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                block_type = excluded.block_type,
                url = excluded.url,
                file_path = excluded.file_path,
                title = excluded.title,
                content = excluded.content,
                extracted_at = excluded.extracted_at",
            params![
                content.id,
                content.doc_id,
                content.block_id,
                content.block_type.as_str(),
                content.url,
                content.file_path,
                content.title,
                content.content,
                content.extracted_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Every external-content row across the whole store, used by the
    /// Searcher to add one graph node per bookmark/file/folder.
    pub fn all_external_contents(&self) -> Result<Vec<ExternalContent>> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stmt = conn.prepare(
            "SELECT id, doc_id, block_id, block_type, url, file_path, title, content, extracted_at
             FROM external_block_contents",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let block_type: String = row.get(3)?;
                let extracted_at: String = row.get(8)?;
                Ok(ExternalContent {
                    id: row.get(0)?,
                    doc_id: row.get(1)?,
                    block_id: row.get(2)?,
                    block_type: parse_external_kind(&block_type),
                    url: row.get(4)?,
                    file_path: row.get(5)?,
                    title: row.get(6)?,
                    content: row.get(7)?,
                    extracted_at: chrono::DateTime::parse_from_rfc3339(&extracted_at)
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                        .unwrap_or_else(|_| chrono::Utc::now()),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_external_content(&self, doc_id: &str, block_id: &str) -> Result<Option<ExternalContent>> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.query_row(
            "SELECT id, doc_id, block_id, block_type, url, file_path, title, content, extracted_at
             FROM external_block_contents WHERE doc_id = ?1 AND block_id = ?2",
            params![doc_id, block_id],
            |row| {
                let block_type: String = row.get(3)?;
                let extracted_at: String = row.get(8)?;
                Ok(ExternalContent {
                    id: row.get(0)?,
                    doc_id: row.get(1)?,
                    block_id: row.get(2)?,
                    block_type: parse_external_kind(&block_type),
                    url: row.get(4)?,
                    file_path: row.get(5)?,
                    title: row.get(6)?,
                    content: row.get(7)?,
                    extracted_at: chrono::DateTime::parse_from_rfc3339(&extracted_at)
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                        .unwrap_or_else(|_| chrono::Utc::now()),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Brute-force cosine-similarity search over every vector (acceptable at
    /// the scale a single-user local knowledge base reaches; see DESIGN.md).
    pub fn search_by_vector(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let (where_clause, bind): (&str, Vec<String>) = match filter {
            None => ("1=1", vec![]),
            Some(SearchFilter::DocId(doc_id)) => ("bv.doc_id = ?1", vec![doc_id.clone()]),
            Some(SearchFilter::IdPrefix(prefix)) => {
                ("bv.id LIKE ?1", vec![format!("{prefix}%")])
            }
        };
        let sql = format!(
            "SELECT bv.id, bv.doc_id, bv.source_block_id, bv.content, bv.block_type, bv.heading_context, vb.embedding
             FROM block_vectors bv JOIN vec_blocks vb ON bv.id = vb.id
             WHERE {where_clause}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bind.iter()), |row| {
            let embedding_blob: Vec<u8> = row.get(6)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                decode_embedding(&embedding_blob),
            ))
        })?;

        let mut scored: Vec<SearchHit> = Vec::new();
        for row in rows {
            let (id, doc_id, source_block_id, content, block_type, heading_context, embedding) = row?;
            let distance = 1.0 - cosine_similarity(query, &embedding);
            scored.push(SearchHit {
                id,
                doc_id,
                source_block_id,
                content,
                block_type,
                heading_context,
                distance,
            });
        }
        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    pub fn stats(&self, total_docs: usize) -> Result<IndexStats> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let indexed_docs: usize = conn.query_row(
            "SELECT COUNT(DISTINCT doc_id) FROM block_vectors",
            [],
            |row| row.get(0),
        )?;
        let mut stats = IndexStats {
            indexed_docs,
            total_docs,
            ..Default::default()
        };
        for (kind, field) in [
            ("bookmark", &mut stats.indexed_bookmarks),
            ("file", &mut stats.indexed_files),
            ("folder", &mut stats.indexed_folders),
        ] {
            *field = conn.query_row(
                "SELECT COUNT(*) FROM external_block_contents WHERE block_type = ?1",
                params![kind],
                |row| row.get(0),
            )?;
        }
        let last: Option<String> = conn
            .query_row(
                "SELECT MAX(updated_at) FROM block_vectors",
                [],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        stats.last_index_time = last.and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc))
        });
        Ok(stats)
    }
}

fn delete_ids_matching(
    tx: &rusqlite::Transaction<'_>,
    clause: &str,
    bind: impl rusqlite::Params,
) -> Result<()> {
    let ids: Vec<String> = {
        let mut stmt = tx.prepare(&format!("SELECT id FROM block_vectors WHERE {clause}"))?;
        stmt.query_map(bind, |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    for id in &ids {
        tx.execute("DELETE FROM block_vectors WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM vec_blocks WHERE id = ?1", params![id])?;
    }
    Ok(())
}

fn parse_external_kind(s: &str) -> ExternalKind {
    match s {
        "file" => ExternalKind::File,
        "folder" => ExternalKind::Folder,
        _ => ExternalKind::Bookmark,
    }
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::plain_chunk_id;

    fn chunk(id: &str, doc_id: &str, block_id: &str, embedding: Vec<f32>) -> ChunkVector {
        ChunkVector {
            id: id.to_string(),
            doc_id: doc_id.to_string(),
            source_block_id: block_id.to_string(),
            block_type: "paragraph".to_string(),
            heading_context: String::new(),
            content: "hello world".to_string(),
            fingerprint: "fp1".to_string(),
            embedding,
        }
    }

    #[test]
    fn upsert_then_search_returns_it() {
        let store = VectorStore::bootstrap_in_memory(3).unwrap();
        let id = plain_chunk_id("b1", None);
        store.upsert(&chunk(&id, "d1", "b1", vec![1.0, 0.0, 0.0])).unwrap();
        let hits = store.search_by_vector(&[1.0, 0.0, 0.0], 5, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert!(hits[0].distance < 1e-4);
    }

    #[test]
    fn delete_ids_removes_both_tables() {
        let store = VectorStore::bootstrap_in_memory(3).unwrap();
        store.upsert(&chunk("b1", "d1", "b1", vec![1.0, 0.0, 0.0])).unwrap();
        store.delete_ids(&["b1".to_string()]).unwrap();
        let hits = store.search_by_vector(&[1.0, 0.0, 0.0], 5, None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn delete_by_doc_id_removes_only_that_document() {
        let store = VectorStore::bootstrap_in_memory(3).unwrap();
        store.upsert(&chunk("b1", "d1", "b1", vec![1.0, 0.0, 0.0])).unwrap();
        store.upsert(&chunk("b2", "d2", "b2", vec![0.0, 1.0, 0.0])).unwrap();
        store.delete_by_doc_id("d1").unwrap();
        let remaining = store.existing_fingerprints("d2").unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(store.existing_fingerprints("d1").unwrap().is_empty());
    }

    fn external_chunk(id: &str, doc_id: &str, block_id: &str, kind: &str) -> ChunkVector {
        ChunkVector {
            id: id.to_string(),
            doc_id: doc_id.to_string(),
            source_block_id: block_id.to_string(),
            block_type: kind.to_string(),
            heading_context: String::new(),
            content: "external body".to_string(),
            fingerprint: "fp1".to_string(),
            embedding: vec![1.0, 0.0, 0.0],
        }
    }

    #[test]
    fn delete_by_doc_id_except_keeps_listed_kinds_and_plain_chunks() {
        let store = VectorStore::bootstrap_in_memory(3).unwrap();
        store.upsert(&chunk("p1", "d1", "blk1", vec![1.0, 0.0, 0.0])).unwrap();
        store
            .upsert(&external_chunk("bm1", "d1", "bm_blk", "bookmark"))
            .unwrap();
        store
            .upsert(&external_chunk("f1", "d1", "file_blk", "file"))
            .unwrap();

        store
            .delete_by_doc_id_except("d1", &[ExternalKind::Bookmark])
            .unwrap();

        let remaining: std::collections::HashSet<String> = store
            .existing_fingerprints("d1")
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert!(remaining.contains("p1"), "plain chunk must never be removed by kind exclusion");
        assert!(remaining.contains("bm1"), "kept external kind must survive");
        assert!(!remaining.contains("f1"), "unkept external kind must be pruned");
    }

    #[test]
    fn delete_by_doc_id_except_is_a_no_op_when_kinds_cover_everything_present() {
        let store = VectorStore::bootstrap_in_memory(3).unwrap();
        store
            .upsert(&external_chunk("bm1", "d1", "bm_blk", "bookmark"))
            .unwrap();
        store
            .delete_by_doc_id_except("d1", &[ExternalKind::Bookmark, ExternalKind::File, ExternalKind::Folder])
            .unwrap();
        assert_eq!(store.existing_fingerprints("d1").unwrap().len(), 1);
    }

    #[test]
    fn bootstrap_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.db");
        VectorStore::bootstrap(&path, 3, "m", "ollama").unwrap();
        let err = VectorStore::bootstrap(&path, 4, "m", "ollama").unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 4, found: 3 }));
    }

    #[test]
    fn search_filter_by_doc_id() {
        let store = VectorStore::bootstrap_in_memory(2).unwrap();
        store.upsert(&chunk("b1", "d1", "b1", vec![1.0, 0.0])).unwrap();
        store.upsert(&chunk("b2", "d2", "b2", vec![1.0, 0.0])).unwrap();
        let hits = store
            .search_by_vector(&[1.0, 0.0], 10, Some(&SearchFilter::DocId("d1".to_string())))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "d1");
    }
}
