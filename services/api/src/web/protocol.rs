//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the reading client and the API
//! server for the ayah chat.

use quran_companion_core::domain::ChatMessage;
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Binds the socket to one verse. This must be the first message sent on the connection.
    Init {
        surah: u16,
        ayah: u16,
        /// Verse text and translation the assistant should answer about.
        context: String,
    },

    /// A user turn. Rejected while a reply is still streaming.
    Send { content: String },

    /// Wipes the transcript (and the stored rows for signed-in users).
    ClearHistory,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for TranscriptEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms initialization and replays any stored conversation for the verse.
    SessionInitialized { history: Vec<TranscriptEntry> },

    /// The user turn was accepted; an empty assistant message is now in progress.
    /// The UI should disable input until `reply_completed` or `error`.
    ReplyStarted,

    /// A text fragment to append to the in-progress assistant message.
    Delta { content: String },

    /// The reply has been fully assembled.
    ReplyCompleted { content: String },

    /// The transcript was cleared.
    HistoryCleared,

    /// Reports a failure to the client, which should show a transient notification.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let init: ClientMessage =
            serde_json::from_str(r#"{"type":"init","surah":2,"ayah":255,"context":"Ayat al-Kursi"}"#)
                .unwrap();
        assert!(matches!(init, ClientMessage::Init { surah: 2, ayah: 255, .. }));
        let clear: ClientMessage = serde_json::from_str(r#"{"type":"clear_history"}"#).unwrap();
        assert!(matches!(clear, ClientMessage::ClearHistory));
    }

    #[test]
    fn server_messages_serialize_with_type_tag() {
        let delta = serde_json::to_value(ServerMessage::Delta { content: "Hel".to_string() }).unwrap();
        assert_eq!(delta, serde_json::json!({ "type": "delta", "content": "Hel" }));
        let started = serde_json::to_value(ServerMessage::ReplyStarted).unwrap();
        assert_eq!(started, serde_json::json!({ "type": "reply_started" }));
    }
}
