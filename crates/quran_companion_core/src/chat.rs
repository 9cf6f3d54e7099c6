//! crates/quran_companion_core/src/chat.rs
//!
//! The per-ayah conversation and the lifecycle of one streamed reply.
//!
//! ```text
//! Idle --submit--> AwaitingStream --first chunk--> Streaming --end--> Finalizing --persisted--> Idle
//!                         \_______________________________\___failure___________________________/
//! ```

use crate::domain::{ChatMessage, ChatRole};
use crate::stream::{DeltaIngester, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    AwaitingStream,
    Streaming,
    Finalizing,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("A reply is already in progress")]
    Busy,
    #[error("Operation not allowed while {0:?}")]
    InvalidPhase(ChatPhase),
}

/// Transcript of one ayah conversation plus the reply currently being streamed.
#[derive(Debug)]
pub struct Conversation {
    context: String,
    messages: Vec<ChatMessage>,
    phase: ChatPhase,
    ingester: Option<DeltaIngester>,
}

impl Conversation {
    /// Starts a conversation about the verse described by `context`.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            messages: Vec::new(),
            phase: ChatPhase::Idle,
            ingester: None,
        }
    }

    /// Seeds the transcript with previously stored messages.
    pub fn with_history(context: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        let mut conversation = Self::new(context);
        conversation.messages = history;
        conversation
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    /// Input stays disabled until the current reply has been finalized or failed.
    pub fn accepts_input(&self) -> bool {
        self.phase == ChatPhase::Idle
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Records the user's turn and opens an empty assistant placeholder.
    ///
    /// Returns the trimmed user message that was appended.
    pub fn submit(&mut self, input: &str) -> Result<ChatMessage, ChatError> {
        if !self.accepts_input() {
            return Err(ChatError::Busy);
        }
        let content = input.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyInput);
        }
        let user_message = ChatMessage::user(content);
        self.messages.push(user_message.clone());
        self.messages.push(ChatMessage::assistant(String::new()));
        self.ingester = Some(DeltaIngester::new());
        self.phase = ChatPhase::AwaitingStream;
        Ok(user_message)
    }

    /// Messages to send upstream for the pending reply: everything but the placeholder.
    pub fn request_history(&self) -> &[ChatMessage] {
        match self.phase {
            ChatPhase::Idle => &self.messages,
            _ => &self.messages[..self.messages.len().saturating_sub(1)],
        }
    }

    /// Feeds one transport chunk. Returns the events of every line it completed;
    /// the `Delta` ones have already been appended to the reply.
    pub fn receive_chunk(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, ChatError> {
        match self.phase {
            ChatPhase::AwaitingStream | ChatPhase::Streaming => {}
            phase => return Err(ChatError::InvalidPhase(phase)),
        }
        self.phase = ChatPhase::Streaming;
        let events = match self.ingester.as_mut() {
            Some(ingester) => ingester.push(chunk),
            None => return Err(ChatError::InvalidPhase(self.phase)),
        };
        self.append_deltas(&events);
        Ok(events)
    }

    /// Marks the end of the byte stream and returns the assembled reply.
    pub fn complete_stream(&mut self) -> Result<(ChatMessage, Vec<StreamEvent>), ChatError> {
        match self.phase {
            ChatPhase::AwaitingStream | ChatPhase::Streaming => {}
            phase => return Err(ChatError::InvalidPhase(phase)),
        }
        let events = match self.ingester.take() {
            Some(mut ingester) => ingester.finish(),
            None => return Err(ChatError::InvalidPhase(self.phase)),
        };
        self.append_deltas(&events);
        self.phase = ChatPhase::Finalizing;
        let reply = self
            .in_progress()
            .cloned()
            .unwrap_or_else(|| ChatMessage::assistant(String::new()));
        Ok((reply, events))
    }

    /// The finalized reply has been stored (or storage was skipped). Input re-opens.
    pub fn finalize(&mut self) -> Result<(), ChatError> {
        if self.phase != ChatPhase::Finalizing {
            return Err(ChatError::InvalidPhase(self.phase));
        }
        self.phase = ChatPhase::Idle;
        Ok(())
    }

    /// Abandons the current turn. Whatever text already arrived stays in the transcript.
    pub fn fail(&mut self) {
        self.ingester = None;
        self.phase = ChatPhase::Idle;
    }

    /// Clears the transcript. Only allowed while idle.
    pub fn clear(&mut self) -> Result<(), ChatError> {
        if !self.accepts_input() {
            return Err(ChatError::Busy);
        }
        self.messages.clear();
        Ok(())
    }

    fn in_progress(&self) -> Option<&ChatMessage> {
        self.messages
            .last()
            .filter(|message| message.role == ChatRole::Assistant)
    }

    fn append_deltas(&mut self, events: &[StreamEvent]) {
        let Some(reply) = self
            .messages
            .last_mut()
            .filter(|message| message.role == ChatRole::Assistant)
        else {
            return;
        };
        for event in events {
            if let StreamEvent::Delta(text) = event {
                reply.content.push_str(text);
            }
        }
    }
}
