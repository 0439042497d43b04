//! Wire contracts shared by the browser shell and the storefront service.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const PARTIAL_REQUEST_HEADER: &str = "X-Request-Partial";
pub const PAGE_TITLE_HEADER: &str = "X-Page-Title";
pub const CONTENT_RELOADED_EVENT: &str = "mainContentReloaded";
pub const BACKGROUND_NAVIGATION_EVENT: &str = "backgroundNavigationRequest";
pub const BYPASS_NAVIGATION_ATTRIBUTE: &str = "data-bypass-background-nav";
pub const CHATBOT_CONFIG_ATTRIBUTE: &str = "data-chatbot-config";
pub const DEFAULT_CHAT_API_BASE: &str = "/api/chat";

pub const NO_RESPONSE_TEXT: &str = "[No response or unexpected format from bot server]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStatus {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChatStatus {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            message: None,
        }
    }

    pub fn disabled(message: impl Into<String>) -> Self {
        Self {
            enabled: false,
            message: Some(message.into()),
        }
    }
}

/// Body of `GET /api/document/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub title: String,
    pub html_content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    AddMessage,
    Token,
    End,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// One server-pushed event of a streaming exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStreamEvent {
    pub event: ChatEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChatEventData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ChatStreamEvent {
    pub fn add_message(text: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            event: ChatEventKind::AddMessage,
            data: Some(ChatEventData {
                text: Some(text.into()),
                sender: Some(sender.into()),
            }),
            token: None,
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self {
            event: ChatEventKind::Token,
            data: None,
            token: Some(token.into()),
        }
    }

    pub fn end() -> Self {
        Self {
            event: ChatEventKind::End,
            data: None,
            token: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event: ChatEventKind::Error,
            data: Some(ChatEventData {
                text: Some(message.into()),
                sender: None,
            }),
            token: None,
        }
    }

    /// True when the backend echoed the visitor's own message back.
    pub fn is_from_human(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|data| data.sender.as_deref())
            .map(str::trim)
            .is_some_and(|sender| {
                sender.eq_ignore_ascii_case("user") || sender.eq_ignore_ascii_case("human")
            })
    }

    pub fn text(&self) -> Option<&str> {
        self.data.as_ref().and_then(|data| data.text.as_deref())
    }

    /// Token payload, falling back to `data.text` for backends that nest it.
    pub fn token_text(&self) -> Option<&str> {
        self.token.as_deref().or_else(|| self.text())
    }
}

pub fn decode_stream_event(raw: &str) -> Result<ChatStreamEvent, serde_json::Error> {
    serde_json::from_str(raw.trim())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSendRequest {
    pub input_value: String,
    pub session_id: String,
}

impl ChatSendRequest {
    pub fn post_body(&self) -> Value {
        json!({
            "input_value": self.input_value,
            "output_type": "chat",
            "input_type": "chat",
            "session_id": self.session_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedReply {
    pub text: String,
    pub is_rich_content: bool,
    pub session_id: Option<String>,
}

/// Pulls the reply text out of a Langflow run response.
///
/// The nested shape is not documented upstream, so every step is optional and
/// anything unexpected degrades to the raw first output rendered as text.
pub fn extract_reply(payload: &Value) -> ExtractedReply {
    const MESSAGE: &str = "/outputs/0/outputs/0/results/message";

    if let Some(data) = payload.pointer(&format!("{MESSAGE}/data")) {
        let session_id = data
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string);
        if let Some(text) = non_blank(data.get("text")) {
            return ExtractedReply {
                text,
                is_rich_content: true,
                session_id,
            };
        }
    }

    if let Some(text) = non_blank(payload.pointer(&format!("{MESSAGE}/text"))) {
        return ExtractedReply {
            text,
            is_rich_content: true,
            session_id: None,
        };
    }

    let text = match payload.pointer("/outputs/0") {
        Some(first) => serde_json::to_string_pretty(first)
            .unwrap_or_else(|_| "[Error displaying message content]".to_string()),
        None => NO_RESPONSE_TEXT.to_string(),
    };
    ExtractedReply {
        text,
        is_rich_content: false,
        session_id: None,
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(ToString::to_string)
}
