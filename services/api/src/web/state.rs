//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-connection chat state.

use quran_companion_core::chat::Conversation;
use quran_companion_core::domain::VerseKey;
use quran_companion_core::ports::{
    ChatCompletionService, ConnectivityProbe, ContentService, DatabaseService, PortResult,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub chat_adapter: Arc<dyn ChatCompletionService>,
    pub content_adapter: Arc<dyn ContentService>,
    pub probe: Arc<dyn ConnectivityProbe>,
}

//=========================================================================================
// ChatSessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single chat socket, bound to one verse.
pub struct ChatSessionState {
    /// `None` for anonymous readers; nothing is persisted for them.
    pub user_id: Option<Uuid>,
    pub verse: VerseKey,
    pub conversation: Conversation,
    /// Cancelled when the socket closes so an in-flight stream stops reading.
    pub cancellation_token: CancellationToken,
}

impl ChatSessionState {
    /// Creates the session, replaying the stored conversation for signed-in users.
    pub async fn new(
        app_state: Arc<AppState>,
        user_id: Option<Uuid>,
        verse: VerseKey,
        context: String,
    ) -> PortResult<Self> {
        let history = match user_id {
            Some(user_id) => app_state
                .db
                .get_chat_history(user_id, verse)
                .await?
                .into_iter()
                .map(|record| record.message)
                .collect(),
            None => Vec::new(),
        };

        Ok(Self::with_conversation(
            user_id,
            verse,
            Conversation::with_history(context, history),
        ))
    }

    pub fn with_conversation(
        user_id: Option<Uuid>,
        verse: VerseKey,
        conversation: Conversation,
    ) -> Self {
        Self {
            user_id,
            verse,
            conversation,
            cancellation_token: CancellationToken::new(),
        }
    }
}
