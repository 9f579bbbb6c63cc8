//! Write and read paths for user memories.
//!
//! The free functions ([`insert_memory`], [`search_memories`], [`list_memories`])
//! operate on a borrowed connection. [`MemoryStore`] is the shared async handle:
//! every operation opens its own connection on the blocking pool and drops it on
//! return, so concurrent sessions never share a connection.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use crate::db;
use crate::error::{GatewayError, GatewayResult};
use crate::memory::types::{AddOutcome, MemoryMetadata, MemoryRecord};

/// Insert a memory unless an identical `(user_id, text)` row exists.
///
/// Relies on the unique index from schema v2: the insert is a no-op on
/// conflict and the existing id is returned with `deduped = true`.
pub fn insert_memory(
    conn: &Connection,
    user_id: &str,
    text: &str,
    metadata: Option<&MemoryMetadata>,
) -> GatewayResult<AddOutcome> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GatewayError::validation("text is required for memory_add"));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    let metadata_json = metadata
        .filter(|m| !m.is_empty())
        .map(|m| serde_json::to_string(m))
        .transpose()?;

    let inserted = conn.execute(
        "INSERT INTO memories (id, user_id, text, metadata, created_at) VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(user_id, text) DO NOTHING",
        params![id, user_id, text, metadata_json, now],
    )?;

    if inserted == 1 {
        return Ok(AddOutcome { id, deduped: false });
    }

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM memories WHERE user_id = ?1 AND text = ?2 LIMIT 1",
            params![user_id, text],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            tracing::debug!(id = %id, user_id, "memory deduplicated");
            Ok(AddOutcome { id, deduped: true })
        }
        None => Err(GatewayError::Storage(
            "insert ignored but no existing row found".into(),
        )),
    }
}

/// Records for `user_id` whose text contains `query`, newest first, at most `limit`.
///
/// Matching is an exact byte-wise substring test, so it is case-sensitive and
/// `%` or `_` in the query have no special meaning.
pub fn search_memories(
    conn: &Connection,
    user_id: &str,
    query: &str,
    limit: usize,
) -> GatewayResult<Vec<MemoryRecord>> {
    if query.is_empty() {
        return Err(GatewayError::validation("query is required for memory search"));
    }

    let mut stmt = conn.prepare(
        "SELECT id, user_id, text, metadata, created_at FROM memories \
         WHERE user_id = ?1 AND instr(text, ?2) > 0 \
         ORDER BY created_at DESC, rowid DESC LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(params![user_id, query, limit as i64], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All records for `user_id`, newest first.
pub fn list_memories(conn: &Connection, user_id: &str) -> GatewayResult<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, text, metadata, created_at FROM memories \
         WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of stored records for `user_id`.
pub fn count_memories(conn: &Connection, user_id: &str) -> GatewayResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let id: String = row.get(0)?;
    let metadata_json: Option<String> = row.get(3)?;
    let metadata = metadata_json.and_then(|raw| match serde_json::from_str(&raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "ignoring unreadable memory metadata");
            None
        }
    });
    Ok(MemoryRecord {
        id,
        user_id: row.get(1)?,
        text: row.get(2)?,
        metadata,
        created_at: row.get(4)?,
    })
}

/// Shared handle to the on-disk memory store.
///
/// Cheap to clone; holds only the database path.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    /// Initialize (schema + migrations) the database at `path` and return a handle.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        // Initialization connection is dropped immediately; operations open their own.
        db::open_database(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn add(
        &self,
        user_id: &str,
        text: &str,
        metadata: Option<MemoryMetadata>,
    ) -> GatewayResult<AddOutcome> {
        if text.trim().is_empty() {
            return Err(GatewayError::validation("text is required for memory_add"));
        }
        let user_id = user_id.to_string();
        let text = text.to_string();
        let outcome = self
            .with_connection(move |conn| insert_memory(conn, &user_id, &text, metadata.as_ref()))
            .await?;
        tracing::info!(id = %outcome.id, deduped = outcome.deduped, "memory stored");
        Ok(outcome)
    }

    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> GatewayResult<Vec<MemoryRecord>> {
        if query.is_empty() {
            return Err(GatewayError::validation("query is required for memory search"));
        }
        let user_id = user_id.to_string();
        let query = query.to_string();
        self.with_connection(move |conn| search_memories(conn, &user_id, &query, limit))
            .await
    }

    pub async fn list(&self, user_id: &str) -> GatewayResult<Vec<MemoryRecord>> {
        let user_id = user_id.to_string();
        self.with_connection(move |conn| list_memories(conn, &user_id))
            .await
    }

    pub async fn count(&self, user_id: &str) -> GatewayResult<usize> {
        let user_id = user_id.to_string();
        self.with_connection(move |conn| count_memories(conn, &user_id))
            .await
    }

    /// Run `op` on a fresh connection on the blocking pool. The connection
    /// lives only for the closure, so it is closed on success and failure alike.
    async fn with_connection<T, F>(&self, op: F) -> GatewayResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> GatewayResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db::connect(&path).map_err(|e| {
                GatewayError::Storage(format!("failed to open {}: {e}", path.display()))
            })?;
            op(&conn)
        })
        .await?
    }
}
