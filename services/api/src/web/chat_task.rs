//! services/api/src/web/chat_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! handling a single ayah chat turn: submit, stream, finalize.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, ChatSessionState},
};
use futures::StreamExt;
use quran_companion_core::{
    domain::{ChatMessage, VerseKey},
    stream::StreamEvent,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Channel feeding the socket writer task.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

const REPLY_FAILED_MESSAGE: &str = "The assistant could not answer right now. Please try again.";

/// Represents the outcome of the `chat_process` task.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The reply was streamed to completion and finalized.
    Completed,
    /// The input was refused (blank, or a reply is already in progress).
    Rejected,
    /// The upstream request or the stream failed; the partial reply was kept.
    Failed,
    /// The socket closed while the reply was streaming.
    Cancelled,
}

/// Queues `message` for the socket writer. A closed socket only logs.
pub(crate) fn emit(outbox: &Outbox, message: ServerMessage) {
    if outbox.send(message).is_err() {
        warn!("Client outbox closed. Message dropped.");
    }
}

fn emit_deltas(outbox: &Outbox, events: Vec<StreamEvent>) {
    for event in events {
        match event {
            StreamEvent::Delta(content) => emit(outbox, ServerMessage::Delta { content }),
            StreamEvent::Malformed(reason) => debug!("Skipping malformed stream line: {}", reason),
            StreamEvent::Ignored | StreamEvent::Done => {}
        }
    }
}

/// Stores one message for a signed-in user. Anonymous turns and storage failures are not fatal.
async fn persist(app_state: &AppState, user_id: Option<Uuid>, verse: VerseKey, message: &ChatMessage) {
    let Some(user_id) = user_id else {
        return;
    };
    if let Err(e) = app_state.db.save_chat_message(user_id, verse, message).await {
        error!("Failed to save {} message for {}: {}", message.role.as_str(), verse, e);
    }
}

/// Marks the current turn as failed and notifies the client.
async fn abandon(session_state_lock: &Mutex<ChatSessionState>, outbox: &Outbox) -> ChatOutcome {
    session_state_lock.lock().await.conversation.fail();
    emit(
        outbox,
        ServerMessage::Error {
            message: REPLY_FAILED_MESSAGE.to_string(),
        },
    );
    ChatOutcome::Failed
}

/// The main asynchronous task for one user turn.
pub async fn chat_process(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<ChatSessionState>>,
    outbox: Outbox,
    input: String,
) -> ChatOutcome {
    let start_time = Instant::now();

    let (user_message, history, context, user_id, verse, token) = {
        let mut session = session_state_lock.lock().await;
        let user_message = match session.conversation.submit(&input) {
            Ok(message) => message,
            Err(e) => {
                info!("Chat input rejected: {}", e);
                emit(&outbox, ServerMessage::Error { message: e.to_string() });
                return ChatOutcome::Rejected;
            }
        };
        (
            user_message,
            session.conversation.request_history().to_vec(),
            session.conversation.context().to_string(),
            session.user_id,
            session.verse,
            session.cancellation_token.clone(),
        )
    };
    info!("Chat turn started for {}", verse);

    persist(&app_state, user_id, verse, &user_message).await;
    emit(&outbox, ServerMessage::ReplyStarted);

    let opened = tokio::select! {
        _ = token.cancelled() => {
            session_state_lock.lock().await.conversation.fail();
            return ChatOutcome::Cancelled;
        }
        opened = app_state.chat_adapter.open_reply_stream(&history, &context) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to open reply stream: {}", e);
            return abandon(&session_state_lock, &outbox).await;
        }
    };

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => {
                info!("Socket closed mid-reply. Abandoning stream for {}", verse);
                session_state_lock.lock().await.conversation.fail();
                return ChatOutcome::Cancelled;
            }
            next = stream.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                let received = session_state_lock
                    .lock()
                    .await
                    .conversation
                    .receive_chunk(&chunk);
                match received {
                    Ok(events) => emit_deltas(&outbox, events),
                    Err(e) => {
                        error!("Chunk arrived outside a streaming turn: {}", e);
                        return abandon(&session_state_lock, &outbox).await;
                    }
                }
            }
            Some(Err(e)) => {
                error!("Reply stream failed: {}", e);
                return abandon(&session_state_lock, &outbox).await;
            }
            None => break,
        }
    }

    let completed = session_state_lock.lock().await.conversation.complete_stream();
    let reply = match completed {
        Ok((reply, events)) => {
            emit_deltas(&outbox, events);
            reply
        }
        Err(e) => {
            error!("Failed to complete reply: {}", e);
            return abandon(&session_state_lock, &outbox).await;
        }
    };

    persist(&app_state, user_id, verse, &reply).await;
    if let Err(e) = session_state_lock.lock().await.conversation.finalize() {
        warn!("Failed to finalize reply: {}", e);
    }

    info!("⏱️ Chat turn for {} took: {:?}", verse, start_time.elapsed());
    emit(
        &outbox,
        ServerMessage::ReplyCompleted {
            content: reply.content,
        },
    );
    ChatOutcome::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_app_state, InMemoryDb, ScriptedChat};
    use quran_companion_core::chat::{ChatPhase, Conversation};
    use quran_companion_core::domain::ChatRole;
    use quran_companion_core::ports::DatabaseService;

    const HEL: &[u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n";
    const LO: &[u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n";
    const DONE: &[u8] = b"data: [DONE]\n";

    fn session(user_id: Option<Uuid>) -> Arc<Mutex<ChatSessionState>> {
        Arc::new(Mutex::new(ChatSessionState::with_conversation(
            user_id,
            VerseKey::new(1, 1),
            Conversation::new("In the name of God"),
        )))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn streams_deltas_and_persists_the_reply() {
        let db = Arc::new(InMemoryDb::default());
        let chat = Arc::new(ScriptedChat::chunks(vec![Ok(HEL), Ok(LO), Ok(DONE)]));
        let app_state = test_app_state(db.clone(), chat.clone());
        let user_id = Uuid::new_v4();
        let lock = session(Some(user_id));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = chat_process(app_state, lock.clone(), tx, "What is the Basmala?".to_string()).await;

        assert_eq!(outcome, ChatOutcome::Completed);
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::ReplyStarted,
                ServerMessage::Delta { content: "Hel".to_string() },
                ServerMessage::Delta { content: "lo".to_string() },
                ServerMessage::ReplyCompleted { content: "Hello".to_string() },
            ]
        );
        assert_eq!(lock.lock().await.conversation.phase(), ChatPhase::Idle);
        assert_eq!(chat.requests(), vec![(1, "In the name of God".to_string())]);

        let stored = db.get_chat_history(user_id, VerseKey::new(1, 1)).await.unwrap();
        let stored: Vec<_> = stored.into_iter().map(|r| (r.message.role, r.message.content)).collect();
        assert_eq!(
            stored,
            vec![
                (ChatRole::User, "What is the Basmala?".to_string()),
                (ChatRole::Assistant, "Hello".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn anonymous_turns_are_not_persisted() {
        let db = Arc::new(InMemoryDb::default());
        let chat = Arc::new(ScriptedChat::chunks(vec![Ok(HEL)]));
        let app_state = test_app_state(db.clone(), chat);
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = chat_process(app_state, session(None), tx, "hi".to_string()).await;

        assert_eq!(outcome, ChatOutcome::Completed);
        assert_eq!(db.chat_row_count(), 0);
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let db = Arc::new(InMemoryDb::default());
        let chat = Arc::new(ScriptedChat::chunks(vec![Ok(HEL), Ok(&b"data: {oops\n"[..]), Ok(LO)]));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = chat_process(test_app_state(db, chat), session(None), tx, "q".to_string()).await;

        assert_eq!(outcome, ChatOutcome::Completed);
        assert_eq!(
            drain(&mut rx).last(),
            Some(&ServerMessage::ReplyCompleted { content: "Hello".to_string() })
        );
    }

    #[tokio::test]
    async fn second_submission_is_rejected_while_streaming() {
        let db = Arc::new(InMemoryDb::default());
        let chat = Arc::new(ScriptedChat::chunks(vec![]));
        let lock = session(None);
        lock.lock().await.conversation.submit("first").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = chat_process(test_app_state(db, chat.clone()), lock, tx, "second".to_string()).await;

        assert_eq!(outcome, ChatOutcome::Rejected);
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn open_failure_returns_to_idle_with_an_error() {
        let db = Arc::new(InMemoryDb::default());
        let chat = Arc::new(ScriptedChat::unavailable());
        let lock = session(Some(Uuid::new_v4()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = chat_process(test_app_state(db.clone(), chat), lock.clone(), tx, "q".to_string()).await;

        assert_eq!(outcome, ChatOutcome::Failed);
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::ReplyStarted,
                ServerMessage::Error { message: REPLY_FAILED_MESSAGE.to_string() },
            ]
        );
        assert!(lock.lock().await.conversation.accepts_input());
        // Only the user turn was stored.
        assert_eq!(db.chat_row_count(), 1);
    }

    #[tokio::test]
    async fn read_failure_keeps_the_partial_reply() {
        let db = Arc::new(InMemoryDb::default());
        let chat = Arc::new(ScriptedChat::chunks(vec![Ok(HEL), Err("connection reset")]));
        let lock = session(Some(Uuid::new_v4()));
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = chat_process(test_app_state(db.clone(), chat), lock.clone(), tx, "q".to_string()).await;

        assert_eq!(outcome, ChatOutcome::Failed);
        let session = lock.lock().await;
        assert_eq!(session.conversation.phase(), ChatPhase::Idle);
        assert_eq!(session.conversation.messages().last().map(|m| m.content.as_str()), Some("Hel"));
        assert_eq!(db.chat_row_count(), 1);
    }

    #[tokio::test]
    async fn closing_the_socket_cancels_a_stalled_stream() {
        let db = Arc::new(InMemoryDb::default());
        let chat = Arc::new(ScriptedChat::stalled_after(HEL));
        let lock = session(None);
        let token = lock.lock().await.cancellation_token.clone();
        let (tx, _rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(chat_process(test_app_state(db, chat), lock.clone(), tx, "q".to_string()));
        tokio::task::yield_now().await;
        token.cancel();

        assert_eq!(task.await.unwrap(), ChatOutcome::Cancelled);
        assert!(lock.lock().await.conversation.accepts_input());
    }
}
