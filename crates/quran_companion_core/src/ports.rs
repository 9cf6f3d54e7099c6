//! crates/quran_companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the hosted database, the content provider and the chat endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AyahText, Bookmark, ChatMessage, ChatRecord, ConnectionQuality, ReadingStats, SurahInfo,
    User, UserCredentials, VerseKey, WordGloss,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Upstream service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Conflicts with existing data: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Raw body chunks of a streamed reply, in transport order.
pub type ByteStream = Pin<Box<dyn Stream<Item = PortResult<Bytes>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Ayah conversations ---
    async fn save_chat_message(
        &self,
        user_id: Uuid,
        verse: VerseKey,
        message: &ChatMessage,
    ) -> PortResult<ChatRecord>;

    /// Stored messages for one verse, oldest first.
    async fn get_chat_history(&self, user_id: Uuid, verse: VerseKey) -> PortResult<Vec<ChatRecord>>;

    async fn clear_chat_history(&self, user_id: Uuid, verse: VerseKey) -> PortResult<()>;

    // --- Bookmarks (upsert on (user, verse)) ---
    async fn upsert_bookmark(
        &self,
        user_id: Uuid,
        verse: VerseKey,
        note: Option<&str>,
    ) -> PortResult<Bookmark>;

    async fn remove_bookmark(&self, user_id: Uuid, verse: VerseKey) -> PortResult<()>;

    async fn list_bookmarks(&self, user_id: Uuid) -> PortResult<Vec<Bookmark>>;

    // --- Reading stats (upsert on user) ---
    async fn record_ayah_read(&self, user_id: Uuid, verse: VerseKey) -> PortResult<ReadingStats>;

    /// Zeroed stats when the user has not read anything yet.
    async fn get_reading_stats(&self, user_id: Uuid) -> PortResult<ReadingStats>;
}

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Opens a streamed reply for `history` about the verse described by `context`.
    ///
    /// Fails before yielding anything on a non-success status or a missing body.
    async fn open_reply_stream(&self, history: &[ChatMessage], context: &str)
        -> PortResult<ByteStream>;
}

#[async_trait]
pub trait ContentService: Send + Sync {
    async fn fetch_surah_list(&self) -> PortResult<Vec<SurahInfo>>;

    /// Arabic text and translation of one verse.
    async fn fetch_ayah(&self, verse: VerseKey) -> PortResult<AyahText>;

    /// Word-by-word glosses of one verse. An unparseable payload yields no words.
    async fn fetch_word_by_word(&self, verse: VerseKey) -> PortResult<Vec<WordGloss>>;

    /// Commentary for one verse. An unparseable payload yields an empty string.
    async fn fetch_tafsir(&self, verse: VerseKey) -> PortResult<String>;
}

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> ConnectionQuality;
}
