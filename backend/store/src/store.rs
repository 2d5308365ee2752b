use anyhow::Result;
use async_trait::async_trait;

use homh_core::SavedChat;

/// Most chats returned by a listing.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Abstract interface for saved-chat storage.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert or replace a chat. Returns the stored document, with its id and
    /// timestamp filled in when the caller left them empty.
    async fn save(&self, chat: SavedChat) -> Result<SavedChat>;

    /// Chats ordered newest first, at most `limit` of them.
    async fn list(&self, limit: usize) -> Result<Vec<SavedChat>>;

    async fn get(&self, id: &str) -> Result<Option<SavedChat>>;

    /// Delete a chat. Fails with `HomhError::NotFound` if there is no such id.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Release the underlying connection. Later calls fail.
    async fn close(&self) -> Result<()>;
}
