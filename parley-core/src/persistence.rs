//! SQLite conversation log.
//!
//! One row per remembered conversation participation:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS conversation_memories (
//!     id              INTEGER PRIMARY KEY AUTOINCREMENT,
//!     agent_id        TEXT NOT NULL,
//!     conversation_id TEXT NOT NULL,
//!     recorded_at     TEXT NOT NULL
//! );
//! ```
//!
//! Timestamps are stored as RFC 3339 strings.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::collab::MemoryStore;
use crate::config::PersistenceConfig;
use crate::error::{ParleyError, Result};
use crate::memory::ConversationMemory;
use crate::types::{AgentId, ConversationId};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS conversation_memories (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        agent_id        TEXT NOT NULL,
        conversation_id TEXT NOT NULL,
        recorded_at     TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_memories_agent ON conversation_memories(agent_id);
    CREATE INDEX IF NOT EXISTS idx_memories_conversation ON conversation_memories(conversation_id);";

/// Handle to an open SQLite database of [`ConversationMemory`] rows.
///
/// # Usage
///
/// ```no_run
/// # use parley_core::persistence::ConversationLog;
/// # use parley_core::config::PersistenceConfig;
/// # use parley_core::types::{AgentId, ConversationId};
/// let log = ConversationLog::open("conversations.db", &PersistenceConfig::default())?;
/// let agent = AgentId::new();
/// log.record(agent, ConversationId::new(), chrono::Utc::now())?;
/// assert_eq!(log.memories_for(agent)?.len(), 1);
/// # Ok::<(), parley_core::error::ParleyError>(())
/// ```
pub struct ConversationLog {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for ConversationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationLog")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl ConversationLog {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Conversation log opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Append one memory row.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Database`] on SQLite failures.
    pub fn record(
        &self,
        agent: AgentId,
        conversation: ConversationId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let start = Instant::now();
        self.conn.lock().execute(
            "INSERT INTO conversation_memories (agent_id, conversation_id, recorded_at)
             VALUES (?1, ?2, ?3)",
            params![agent.0.to_string(), conversation.0.to_string(), at.to_rfc3339()],
        )?;

        debug!(
            agent = %agent,
            conversation = %conversation,
            elapsed_us = start.elapsed().as_micros(),
            "Recorded conversation memory"
        );
        Ok(())
    }

    /// All memories held by `agent`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Database`] on SQLite failures. Malformed rows
    /// are skipped with a warning rather than failing the query.
    pub fn memories_for(&self, agent: AgentId) -> Result<Vec<ConversationMemory>> {
        self.query(
            "SELECT agent_id, conversation_id, recorded_at FROM conversation_memories
             WHERE agent_id = ?1 ORDER BY id",
            &agent.0.to_string(),
        )
    }

    /// Every agent that remembers `conversation`, in recording order.
    ///
    /// # Errors
    ///
    /// Same as [`ConversationLog::memories_for`].
    pub fn participants(&self, conversation: ConversationId) -> Result<Vec<AgentId>> {
        Ok(self
            .query(
                "SELECT agent_id, conversation_id, recorded_at FROM conversation_memories
                 WHERE conversation_id = ?1 ORDER BY id",
                &conversation.0.to_string(),
            )?
            .into_iter()
            .map(|m| m.agent)
            .collect())
    }

    fn query(&self, sql: &str, key: &str) -> Result<Vec<ConversationMemory>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut memories = Vec::new();
        for row in rows {
            let (agent, conversation, recorded_at) = row?;
            match parse_row(&agent, &conversation, &recorded_at) {
                Ok(memory) => memories.push(memory),
                Err(e) => warn!(agent = %agent, error = %e, "Skipping malformed memory row"),
            }
        }
        Ok(memories)
    }

    /// Total number of stored memory rows.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Database`] on SQLite failures.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM conversation_memories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Run SQLite's integrity check.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Database`] on SQLite failures.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Path of the backing database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn parse_row(agent: &str, conversation: &str, recorded_at: &str) -> Result<ConversationMemory> {
    let bad = |e: &dyn std::fmt::Display| ParleyError::Serialization(e.to_string());
    Ok(ConversationMemory {
        agent: AgentId(uuid::Uuid::parse_str(agent).map_err(|e| bad(&e))?),
        conversation: ConversationId(uuid::Uuid::parse_str(conversation).map_err(|e| bad(&e))?),
        recorded_at: DateTime::parse_from_rfc3339(recorded_at)
            .map_err(|e| bad(&e))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl MemoryStore for ConversationLog {
    async fn record_conversation(
        &self,
        agent: AgentId,
        conversation: ConversationId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.record(agent, conversation, at)
    }
}
