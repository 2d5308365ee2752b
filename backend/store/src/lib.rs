//! Saved-chat persistence.
//!
//! Chats are stored as whole JSON documents keyed by id. The only backend is
//! SQLite; the trait exists so the gateway can be tested against any store.

pub mod sqlite_store;
pub mod store;

pub use sqlite_store::SqliteChatStore;
pub use store::{ChatStore, DEFAULT_LIST_LIMIT};
