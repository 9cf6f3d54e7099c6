//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the hosted ayah-chat endpoint.
//! It implements the `ChatCompletionService` port from the `core` crate and
//! hands the raw event-stream body back untouched; decoding happens in the core.

use async_trait::async_trait;
use futures::StreamExt;
use quran_companion_core::domain::ChatMessage;
use quran_companion_core::ports::{ByteStream, ChatCompletionService, PortError, PortResult};
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    context: &'a str,
}

fn build_request<'a>(history: &'a [ChatMessage], context: &'a str) -> ReplyRequest<'a> {
    ReplyRequest {
        messages: history
            .iter()
            .map(|message| WireMessage {
                role: message.role.as_str(),
                content: &message.content,
            })
            .collect(),
        context,
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionService` over an SSE-style HTTP endpoint.
#[derive(Clone)]
pub struct EdgeChatAdapter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl EdgeChatAdapter {
    /// Creates a new `EdgeChatAdapter`.
    pub fn new(client: Client, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl ChatCompletionService for EdgeChatAdapter {
    async fn open_reply_stream(
        &self,
        history: &[ChatMessage],
        context: &str,
    ) -> PortResult<ByteStream> {
        debug!("Opening reply stream with {} prior messages", history.len());

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(&build_request(history, context));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unavailable(format!("chat endpoint unreachable: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Err(PortError::Unavailable(
                "chat endpoint returned no body".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat endpoint returned {}: {}", status, body.trim());
            return Err(PortError::Unavailable(format!(
                "chat endpoint returned {}",
                status
            )));
        }

        let mut body = response.bytes_stream();
        let stream = async_stream::stream! {
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => yield Ok(bytes),
                    Err(e) => {
                        yield Err(PortError::Unavailable(format!("reply stream interrupted: {}", e)));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
