use crate::db::{ChatLine, Database, MessageId, StoredMessage, WindowMessage};
use crate::error::PipelineError;

/// Label used when the transport did not provide a sender name.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Append-only log of ingested messages, keyed by conversation.
#[derive(Clone)]
pub struct MessageStore {
    db: Database,
}

impl MessageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn author_label(author_name: Option<&str>) -> String {
        match author_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => UNKNOWN_AUTHOR.to_string(),
        }
    }

    pub async fn append(
        &self,
        conversation_id: i64,
        author_id: i64,
        author_name: Option<&str>,
        text: &str,
    ) -> Result<MessageId, PipelineError> {
        let author_name = Self::author_label(author_name);
        let text = text.to_string();
        self.db
            .run_blocking(move |db| {
                db.append_message(conversation_id, author_id, &author_name, &text)
            })
            .await
    }

    /// The last `limit` messages of a conversation, oldest first.
    pub async fn recent(
        &self,
        conversation_id: i64,
        limit: usize,
    ) -> Result<Vec<ChatLine>, PipelineError> {
        self.db
            .run_blocking(move |db| db.recent_messages(conversation_id, limit))
            .await
    }

    pub async fn since(
        &self,
        conversation_id: i64,
        after_id: MessageId,
    ) -> Result<Vec<WindowMessage>, PipelineError> {
        self.db
            .run_blocking(move |db| db.messages_since(conversation_id, after_id))
            .await
    }

    pub async fn count_since(
        &self,
        conversation_id: i64,
        after_id: MessageId,
    ) -> Result<i64, PipelineError> {
        self.db
            .run_blocking(move |db| db.count_messages_since(conversation_id, after_id))
            .await
    }

    pub async fn get(&self, id: MessageId) -> Result<Option<StoredMessage>, PipelineError> {
        self.db.run_blocking(move |db| db.get_message(id)).await
    }
}
