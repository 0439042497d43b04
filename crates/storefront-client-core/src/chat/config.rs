use serde::Deserialize;
use url::form_urlencoded;

use crate::chat::message::ChatMessage;
use crate::protocol::{ChatSendRequest, DEFAULT_CHAT_API_BASE};

pub const DEFAULT_INTRODUCTORY_TEXT: &str =
    "Hello! I'm your Product Assistant. How can I help you find the perfect product today?";

const CHAT_LOG_KEY_PREFIX: &str = "chatLog:";
const SESSION_KEY_PREFIX: &str = "chatSession_";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatConfigError {
    #[error("chatbot configuration is missing the chatbot type")]
    MissingChatbotType,
    #[error("chatbot type '{0}' may only contain letters, digits, '-' and '_'")]
    InvalidChatbotType(String),
    #[error("chat api base must be a site-relative path or an http(s) url")]
    InvalidApiBase,
    #[error("chatbot configuration is not valid JSON: {0}")]
    Malformed(String),
}

/// Configuration as supplied by the page, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChatbotConfig {
    #[serde(default, alias = "chatbot_type")]
    pub chatbot_type: Option<String>,
    #[serde(default, alias = "persist_chat")]
    pub persist_chat: Option<bool>,
    #[serde(default, alias = "introductory_message")]
    pub introductory_message: Option<String>,
    #[serde(default, alias = "api_base")]
    pub api_base: Option<String>,
    #[serde(default)]
    pub streaming: Option<bool>,
}

impl RawChatbotConfig {
    pub fn from_json(raw: &str) -> Result<Self, ChatConfigError> {
        serde_json::from_str(raw).map_err(|error| ChatConfigError::Malformed(error.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatbotConfig {
    pub chatbot_type: String,
    pub persist_chat: bool,
    pub introductory_message: ChatMessage,
    pub api_base: String,
    pub streaming: bool,
}

impl ChatbotConfig {
    pub fn new(chatbot_type: impl Into<String>) -> Result<Self, ChatConfigError> {
        Self::from_raw(RawChatbotConfig {
            chatbot_type: Some(chatbot_type.into()),
            ..RawChatbotConfig::default()
        })
    }

    pub fn from_raw(raw: RawChatbotConfig) -> Result<Self, ChatConfigError> {
        let chatbot_type = raw
            .chatbot_type
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ChatConfigError::MissingChatbotType)?;
        if !chatbot_type
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(ChatConfigError::InvalidChatbotType(chatbot_type));
        }

        let api_base = normalize_api_base(raw.api_base.as_deref().unwrap_or(DEFAULT_CHAT_API_BASE))?;
        let introductory_text = raw
            .introductory_message
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_INTRODUCTORY_TEXT.to_string());

        Ok(Self {
            chatbot_type,
            persist_chat: raw.persist_chat.unwrap_or(true),
            introductory_message: ChatMessage::bot(introductory_text),
            api_base,
            streaming: raw.streaming.unwrap_or(true),
        })
    }

    pub fn endpoints(&self) -> ChatbotEndpoints {
        ChatbotEndpoints::derive(&self.api_base, &self.chatbot_type)
    }
}

pub fn normalize_api_base(raw: &str) -> Result<String, ChatConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        return Ok(trimmed.to_string());
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ChatConfigError::InvalidApiBase);
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(ChatConfigError::InvalidApiBase);
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(ChatConfigError::InvalidApiBase);
    }
    Ok(trimmed.to_string())
}

/// URLs and storage keys for one chatbot type. Two types never share either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatbotEndpoints {
    pub status_url: String,
    pub send_url: String,
    pub stream_url: String,
    pub log_storage_key: String,
    pub session_storage_key: String,
}

impl ChatbotEndpoints {
    pub fn derive(api_base: &str, chatbot_type: &str) -> Self {
        let send_url = format!("{api_base}/{chatbot_type}");
        Self {
            status_url: format!("{send_url}/status"),
            stream_url: format!("{send_url}/stream"),
            send_url,
            log_storage_key: format!("{CHAT_LOG_KEY_PREFIX}{chatbot_type}"),
            session_storage_key: format!("{SESSION_KEY_PREFIX}{chatbot_type}"),
        }
    }

    pub fn stream_request_url(&self, request: &ChatSendRequest) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("input_value", &request.input_value)
            .append_pair("session_id", &request.session_id)
            .finish();
        format!("{}?{query}", self.stream_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_chatbot_type_is_rejected() {
        assert_eq!(
            ChatbotConfig::from_raw(RawChatbotConfig::default()),
            Err(ChatConfigError::MissingChatbotType)
        );
        assert_eq!(
            ChatbotConfig::new("   "),
            Err(ChatConfigError::MissingChatbotType)
        );
    }

    #[test]
    fn chatbot_type_with_path_characters_is_rejected() {
        assert!(matches!(
            ChatbotConfig::new("../admin"),
            Err(ChatConfigError::InvalidChatbotType(_))
        ));
    }

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let raw = RawChatbotConfig::from_json(r#"{"chatbotType":"product-assistant"}"#)
            .expect("raw config");
        let config = ChatbotConfig::from_raw(raw).expect("config");
        assert!(config.persist_chat);
        assert!(config.streaming);
        assert_eq!(config.api_base, "/api/chat");
        assert_eq!(config.introductory_message.text, DEFAULT_INTRODUCTORY_TEXT);
        assert!(!config.introductory_message.is_rich_content);
    }

    #[test]
    fn endpoints_are_scoped_by_chatbot_type() {
        let products = ChatbotConfig::new("product-assistant")
            .expect("config")
            .endpoints();
        let support = ChatbotConfig::new("support").expect("config").endpoints();

        assert_eq!(products.status_url, "/api/chat/product-assistant/status");
        assert_eq!(products.send_url, "/api/chat/product-assistant");
        assert_eq!(products.stream_url, "/api/chat/product-assistant/stream");
        assert_ne!(products.log_storage_key, support.log_storage_key);
        assert_ne!(products.session_storage_key, support.session_storage_key);
    }

    #[test]
    fn stream_request_url_encodes_query_parameters() {
        let endpoints = ChatbotEndpoints::derive("https://shop.test/api/chat", "bot");
        let url = endpoints.stream_request_url(&ChatSendRequest {
            input_value: "drills & saws?".to_string(),
            session_id: "user_1".to_string(),
        });
        assert_eq!(
            url,
            "https://shop.test/api/chat/bot/stream?input_value=drills+%26+saws%3F&session_id=user_1"
        );
    }

    #[test]
    fn api_base_normalization() {
        assert_eq!(normalize_api_base("/api/chat/"), Ok("/api/chat".to_string()));
        assert_eq!(
            normalize_api_base(" https://chat.example.com/ "),
            Ok("https://chat.example.com".to_string())
        );
        assert_eq!(
            normalize_api_base("ftp://example.com"),
            Err(ChatConfigError::InvalidApiBase)
        );
        assert_eq!(
            normalize_api_base("//cdn.example.com"),
            Err(ChatConfigError::InvalidApiBase)
        );
    }

    #[test]
    fn malformed_declarative_config_is_reported() {
        assert!(matches!(
            RawChatbotConfig::from_json("{chatbotType:"),
            Err(ChatConfigError::Malformed(_))
        ));
    }
}
