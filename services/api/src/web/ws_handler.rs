//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a chat WebSocket.
//! One socket is bound to one ayah conversation by its first `init` message.

use crate::web::{
    chat_task::{chat_process, emit, Outbox},
    middleware::CurrentUser,
    protocol::{ClientMessage, ServerMessage, TranscriptEntry},
    state::{AppState, ChatSessionState},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{SinkExt, StreamExt};
use quran_companion_core::{chat::Conversation, domain::VerseKey, verses};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Option<Uuid>) {
    match user_id {
        Some(user_id) => info!("New chat connection for user: {}", user_id),
        None => info!("New anonymous chat connection"),
    }

    // A single writer task owns the sink; everything else talks to it through the outbox.
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                warn!("Failed to write to socket. Stopping writer.");
                break;
            }
        }
    });

    // --- 1. Initialization Phase ---
    let session_state_lock = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Init {
                surah,
                ayah,
                context,
            }) => {
                let verse = VerseKey::new(surah, ayah);
                match initialize_session(&app_state, user_id, verse, context, &outbox).await {
                    Some(state) => Arc::new(Mutex::new(state)),
                    None => {
                        drop(outbox);
                        let _ = writer.await;
                        return;
                    }
                }
            }
            _ => {
                error!("First message was not a valid Init message.");
                writer.abort();
                return;
            }
        },
        _ => {
            error!("Client disconnected before sending Init message.");
            writer.abort();
            return;
        }
    };

    // --- 2. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(client_msg, &app_state, &session_state_lock, &outbox).await;
                }
                Err(e) => warn!("Failed to deserialize client message: {}", e),
            },
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 3. Cleanup ---
    session_state_lock.lock().await.cancellation_token.cancel();
    writer.abort();
    info!("Chat connection closed.");
}

/// Validates the verse and builds the session, replying with the stored transcript.
///
/// Returns `None` (after reporting the error) when the verse does not exist.
async fn initialize_session(
    app_state: &Arc<AppState>,
    user_id: Option<Uuid>,
    verse: VerseKey,
    context: String,
    outbox: &Outbox,
) -> Option<ChatSessionState> {
    if !verses::is_valid(verse) {
        warn!("Init for unknown verse {}", verse);
        emit(
            outbox,
            ServerMessage::Error {
                message: format!("Verse {} does not exist.", verse),
            },
        );
        return None;
    }
    info!("Initializing chat for {}", verse);

    let state = match ChatSessionState::new(app_state.clone(), user_id, verse, context.clone()).await {
        Ok(state) => state,
        Err(e) => {
            // Stored history is a convenience; the chat still works without it.
            error!("Failed to load chat history for {}: {:?}", verse, e);
            ChatSessionState::with_conversation(user_id, verse, Conversation::new(context))
        }
    };

    let history = state
        .conversation
        .messages()
        .iter()
        .map(TranscriptEntry::from)
        .collect();
    emit(outbox, ServerMessage::SessionInitialized { history });
    Some(state)
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_client_message(
    message: ClientMessage,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<ChatSessionState>>,
    outbox: &Outbox,
) {
    match message {
        ClientMessage::Send { content } => {
            // The turn runs in the background so the loop keeps reading (and can see a close).
            let app_state = app_state.clone();
            let session_state_lock = session_state_lock.clone();
            let outbox = outbox.clone();
            tokio::spawn(async move {
                let outcome = chat_process(app_state, session_state_lock, outbox, content).await;
                info!("Chat turn ended: {:?}", outcome);
            });
        }
        ClientMessage::ClearHistory => {
            let mut session = session_state_lock.lock().await;
            if let Err(e) = session.conversation.clear() {
                emit(
                    outbox,
                    ServerMessage::Error {
                        message: e.to_string(),
                    },
                );
                return;
            }
            if let Some(user_id) = session.user_id {
                if let Err(e) = app_state.db.clear_chat_history(user_id, session.verse).await {
                    error!("Failed to clear stored history for {}: {:?}", session.verse, e);
                }
            }
            info!("History cleared for {}", session.verse);
            emit(outbox, ServerMessage::HistoryCleared);
        }
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
        }
    }
}
