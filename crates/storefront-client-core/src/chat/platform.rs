//! Capabilities the chat runtime needs from its host. The browser shell
//! implements them over `localStorage`, cookies, `fetch`, `EventSource` and
//! the DOM; tests implement them in memory.

use std::rc::Rc;

use async_trait::async_trait;
use futures::stream::LocalBoxStream;
use serde_json::Value;

use crate::chat::identity::SessionIdentity;
use crate::chat::message::ChatMessage;
use crate::protocol::{ChatSendRequest, ChatStatus, ChatStreamEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("client storage is unavailable")]
    Unavailable,
    #[error("client storage write failed: {0}")]
    WriteFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server has no chatbot registered under the requested type.
    #[error("chatbot not found")]
    NotFound,
    #[error("bot server responded with HTTP {status}")]
    Status { status: u16 },
    #[error("{0}")]
    Network(String),
    #[error("bot server sent an unreadable payload: {0}")]
    Decode(String),
    #[error("{0}")]
    Backend(String),
}

impl TransportError {
    /// Detail appended to the user-facing connection error line.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

pub trait ChatStorage {
    fn load_log(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn store_log(&self, key: &str, encoded: &str) -> Result<(), StorageError>;
    fn remove_log(&self, key: &str) -> Result<(), StorageError>;
    fn load_session(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Writes the identity and restarts its retention window.
    fn store_session(&self, key: &str, identity: &SessionIdentity) -> Result<(), StorageError>;
}

/// Presentation capability. Implementations own markup, the runtime owns state.
pub trait ChatView {
    fn render_log(&self, messages: &[ChatMessage]);
    fn append_message(&self, message: &ChatMessage);
    fn show_placeholder(&self, exchange_id: u64);
    fn update_placeholder(&self, exchange_id: u64, text: &str);
    /// Swaps the placeholder for the committed message. Called once per exchange.
    fn resolve_placeholder(&self, exchange_id: u64, message: &ChatMessage);
    fn clear_input(&self);
    fn set_input_enabled(&self, enabled: bool);
    fn set_toggle_visible(&self, visible: bool);
    fn set_window_visible(&self, visible: bool);
    fn scroll_to_latest(&self);
    fn confirm_clear(&self) -> bool;
}

/// Closes an open streaming channel. Must take effect before it returns.
pub trait ChannelHandle {
    fn close(&self);
}

pub struct ChatChannel {
    pub events: LocalBoxStream<'static, Result<ChatStreamEvent, TransportError>>,
    pub handle: Rc<dyn ChannelHandle>,
}

#[async_trait(?Send)]
pub trait ChatTransport {
    async fn fetch_status(&self, status_url: &str) -> Result<ChatStatus, TransportError>;
    async fn open_stream(&self, stream_url: &str) -> Result<ChatChannel, TransportError>;
    async fn post_message(
        &self,
        send_url: &str,
        request: &ChatSendRequest,
    ) -> Result<Value, TransportError>;
}
