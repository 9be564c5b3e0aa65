use crate::config::Config;
use crate::error::PipelineError;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

pub mod schema;

pub type MessageId = i64;

/// One `(author, text)` pair as fed to the summarizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub author: String,
    pub text: String,
}

/// A message selected for an incremental summary window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMessage {
    pub id: MessageId,
    pub author: String,
    pub text: String,
}

impl From<WindowMessage> for ChatLine {
    fn from(msg: WindowMessage) -> Self {
        ChatLine {
            author: msg.author,
            text: msg.text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: MessageId,
    pub conversation_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
}

impl StoredMessage {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S").ok()?;
        Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
    }
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        if config.database_url != ":memory:" {
            if let Some(parent) = Path::new(&config.database_url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(Self::open(&config.database_url)?)
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn execute_init(&self) -> Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.lock_conn();
        conn.execute_batch(schema::SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs a synchronous database call on the blocking pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> std::result::Result<T, PipelineError>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        let value = tokio::task::spawn_blocking(move || f(&db)).await??;
        Ok(value)
    }

    // --- Messages ---

    pub fn append_message(
        &self,
        conversation_id: i64,
        author_id: i64,
        author_name: &str,
        text: &str,
    ) -> Result<MessageId> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO messages (conversation_id, author_id, author_name, text)
             VALUES (?1, ?2, ?3, ?4)",
            (conversation_id, author_id, author_name, text),
        )?;
        let id = conn.last_insert_rowid();
        debug!(
            "Database: Saved message {} from {} in conversation {}",
            id, author_id, conversation_id
        );
        Ok(id)
    }

    /// Most recent `limit` messages, oldest first.
    pub fn recent_messages(&self, conversation_id: i64, limit: usize) -> Result<Vec<ChatLine>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT author_name, text FROM (
                SELECT id, author_name, text FROM messages
                WHERE conversation_id = ?1
                ORDER BY id DESC
                LIMIT ?2
             ) ORDER BY id ASC",
        )?;
        let rows = stmt.query_map((conversation_id, limit as i64), |row| {
            Ok(ChatLine {
                author: row.get(0)?,
                text: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    pub fn messages_since(&self, conversation_id: i64, after_id: MessageId) -> Result<Vec<WindowMessage>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, author_name, text FROM messages
             WHERE conversation_id = ?1 AND id > ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map((conversation_id, after_id), |row| {
            Ok(WindowMessage {
                id: row.get(0)?,
                author: row.get(1)?,
                text: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn count_messages_since(&self, conversation_id: i64, after_id: MessageId) -> Result<i64> {
        let conn = self.lock_conn();
        conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND id > ?2",
            (conversation_id, after_id),
            |row| row.get(0),
        )
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<StoredMessage>> {
        let conn = self.lock_conn();
        conn.query_row(
            "SELECT id, conversation_id, author_id, author_name, text, created_at
             FROM messages WHERE id = ?1",
            [id],
            |row| {
                Ok(StoredMessage {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    author_id: row.get(2)?,
                    author_name: row.get(3)?,
                    text: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()
    }

    // --- Bookmarks ---

    pub fn get_bookmark(&self, conversation_id: i64) -> Result<MessageId> {
        let conn = self.lock_conn();
        let id = conn
            .query_row(
                "SELECT last_summarized_id FROM bookmarks WHERE conversation_id = ?1",
                [conversation_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.unwrap_or(0))
    }

    /// Blind upsert; callers own monotonicity.
    pub fn set_bookmark(&self, conversation_id: i64, last_summarized_id: MessageId) -> Result<()> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO bookmarks (conversation_id, last_summarized_id, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(conversation_id) DO UPDATE SET
                last_summarized_id = ?2, updated_at = CURRENT_TIMESTAMP",
            (conversation_id, last_summarized_id),
        )?;
        Ok(())
    }

    pub fn delete_bookmark(&self, conversation_id: i64) -> Result<usize> {
        let conn = self.lock_conn();
        conn.execute(
            "DELETE FROM bookmarks WHERE conversation_id = ?1",
            [conversation_id],
        )
    }
}

#[cfg(test)]
pub(crate) fn test_db() -> Database {
    let db = Database::open(":memory:").unwrap();
    db.execute_init().unwrap();
    db
}
