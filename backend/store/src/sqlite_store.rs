/// SQLite-backed saved-chat store.
///
/// Each chat is one row holding the full JSON document, with the id and
/// timestamp lifted into columns for lookup and ordering.
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info};

use homh_core::{HomhError, SavedChat};

use crate::store::ChatStore;

const MEMORY_URL: &str = ":memory:";
const URL_SCHEME: &str = "sqlite://";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS chats (
        id         TEXT PRIMARY KEY,
        timestamp  INTEGER NOT NULL,
        document   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_chats_timestamp ON chats(timestamp);";

pub struct SqliteChatStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteChatStore {
    /// Open the store named by a `DATABASE_URL`.
    ///
    /// Accepts `sqlite://<path>`, a plain file path, or `:memory:`.
    pub fn open(url: &str) -> Result<Self> {
        let target = url.strip_prefix(URL_SCHEME).unwrap_or(url).trim();
        if target.is_empty() {
            return Err(HomhError::Config(format!("database URL `{url}` names no file")).into());
        }
        if target == MEMORY_URL {
            return Self::in_memory();
        }
        Self::open_path(target)
    }

    /// Create or open a database file.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open chat database at {:?}", path.as_ref()))?;
        conn.execute_batch(&format!("PRAGMA journal_mode=WAL;\n{SCHEMA}"))
            .context("Failed to initialize chats schema")?;
        info!(path = ?path.as_ref(), "Chat store opened");
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize chats schema")?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }
}

fn closed() -> anyhow::Error {
    HomhError::Storage("chat store is closed".to_string()).into()
}

fn decode(document: &str) -> Result<SavedChat> {
    serde_json::from_str(document).context("Stored chat document is not valid JSON")
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn save(&self, mut chat: SavedChat) -> Result<SavedChat> {
        if chat.id.trim().is_empty() {
            chat.id = uuid::Uuid::new_v4().to_string();
        }
        if chat.timestamp == 0 {
            chat.timestamp = chrono::Utc::now().timestamp_millis();
        }
        let document = serde_json::to_string(&chat)?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(closed)?;
        conn.execute(
            "INSERT INTO chats (id, timestamp, document) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET timestamp = excluded.timestamp, document = excluded.document",
            params![chat.id, chat.timestamp, document],
        )
        .context("Failed to save chat")?;
        debug!(chat_id = %chat.id, messages = chat.messages.len(), "Saved chat");
        Ok(chat)
    }

    async fn list(&self, limit: usize) -> Result<Vec<SavedChat>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(closed)?;
        let mut stmt = conn.prepare(
            "SELECT document FROM chats ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
        )?;
        let documents = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        documents.iter().map(|doc| decode(doc)).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<SavedChat>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(closed)?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM chats WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        document.as_deref().map(decode).transpose()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(closed)?;
        let removed = conn.execute("DELETE FROM chats WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(HomhError::NotFound(format!("chat `{id}`")).into());
        }
        debug!(chat_id = %id, "Deleted chat");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| e)
                .context("Failed to close chat database")?;
            info!("Chat store closed");
        }
        Ok(())
    }
}
