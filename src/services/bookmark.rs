use crate::db::{Database, MessageId};
use crate::error::PipelineError;
use tracing::info;

/// One cursor per conversation: the last message id covered by a summary.
#[derive(Clone)]
pub struct BookmarkStore {
    db: Database,
}

impl BookmarkStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns 0 when nothing has been summarized yet.
    pub async fn get(&self, conversation_id: i64) -> Result<MessageId, PipelineError> {
        self.db
            .run_blocking(move |db| db.get_bookmark(conversation_id))
            .await
    }

    /// Unconditional upsert. Only call with the max id of a window that was
    /// just summarized successfully.
    pub async fn advance(&self, conversation_id: i64, new_id: MessageId) -> Result<(), PipelineError> {
        self.db
            .run_blocking(move |db| db.set_bookmark(conversation_id, new_id))
            .await?;
        info!(
            "Bookmark for conversation {} advanced to message {}",
            conversation_id, new_id
        );
        Ok(())
    }

    /// Forgets the bookmark so the next summary covers the whole history.
    pub async fn reset(&self, conversation_id: i64) -> Result<bool, PipelineError> {
        let deleted = self
            .db
            .run_blocking(move |db| db.delete_bookmark(conversation_id))
            .await?;
        Ok(deleted > 0)
    }
}
