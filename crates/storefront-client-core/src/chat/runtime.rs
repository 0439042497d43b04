use std::cell::{Ref, RefCell};
use std::rc::Rc;

use futures::StreamExt;
use futures::stream::{AbortHandle, abortable};
use tracing::{debug, info, warn};

use crate::chat::config::{ChatConfigError, ChatbotConfig, RawChatbotConfig};
use crate::chat::platform::{ChannelHandle, ChatStorage, ChatTransport, ChatView};
use crate::chat::widget::{ChatEffect, ChatWidgetState, SendPlan};
use crate::lifecycle::{ComponentScope, ContentReloaded, LifecycleComponent};
use crate::protocol::ChatSendRequest;

struct OpenChannel {
    exchange_id: u64,
    handle: Rc<dyn ChannelHandle>,
    abort: AbortHandle,
}

struct WidgetInner<S, V, T> {
    state: RefCell<ChatWidgetState>,
    channel: RefCell<Option<OpenChannel>>,
    storage: S,
    view: V,
    transport: T,
}

/// Handle to one mounted chat widget. Cloning shares the same widget.
pub struct ChatWidget<S, V, T> {
    inner: Rc<WidgetInner<S, V, T>>,
}

impl<S, V, T> Clone for ChatWidget<S, V, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, V, T> ChatWidget<S, V, T>
where
    S: ChatStorage,
    V: ChatView,
    T: ChatTransport,
{
    /// Restores persisted state and renders it. Availability stays unknown
    /// until [`Self::refresh_status`] completes.
    pub fn new(config: ChatbotConfig, storage: S, view: V, transport: T) -> Self {
        let endpoints = config.endpoints();
        let stored_log = if config.persist_chat {
            storage
                .load_log(&endpoints.log_storage_key)
                .unwrap_or_else(|error| {
                    warn!(%error, "chat log could not be read");
                    None
                })
        } else {
            None
        };
        let stored_session = storage
            .load_session(&endpoints.session_storage_key)
            .unwrap_or_else(|error| {
                warn!(%error, "chat session could not be read");
                None
            });

        let (state, effects) =
            ChatWidgetState::restore(config, stored_log.as_deref(), stored_session.as_deref());
        let widget = Self {
            inner: Rc::new(WidgetInner {
                state: RefCell::new(state),
                channel: RefCell::new(None),
                storage,
                view,
                transport,
            }),
        };
        widget.apply(effects);
        widget
    }

    pub async fn initialize(config: ChatbotConfig, storage: S, view: V, transport: T) -> Self {
        let widget = Self::new(config, storage, view, transport);
        widget.refresh_status().await;
        widget
    }

    pub async fn refresh_status(&self) {
        let status_url = self.inner.state.borrow().endpoints().status_url.clone();
        let status = self.inner.transport.fetch_status(&status_url).await;
        self.update(|state| state.apply_status(status));
        info!(
            chatbot_type = %self.inner.state.borrow().config().chatbot_type,
            availability = ?self.inner.state.borrow().availability(),
            "chat widget availability resolved"
        );
    }

    pub fn state(&self) -> Ref<'_, ChatWidgetState> {
        self.inner.state.borrow()
    }

    pub fn view(&self) -> &V {
        &self.inner.view
    }

    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    pub fn open(&self) {
        self.update(ChatWidgetState::open);
    }

    pub fn close(&self) {
        self.update(ChatWidgetState::close);
    }

    pub fn toggle(&self) {
        if self.inner.state.borrow().is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn clear_history(&self) {
        let confirmed = self.inner.view.confirm_clear();
        self.update(|state| state.clear_history(confirmed));
    }

    /// Cancels any open exchange without touching visibility.
    pub fn shutdown(&self) {
        self.update(ChatWidgetState::cancel);
    }

    /// Sends `input` and drives the exchange to exactly one outcome. A later
    /// send, a close or a shutdown cuts this one short.
    pub async fn send(&self, input: &str) {
        let plan = self.inner.state.borrow_mut().begin_send(input);
        let Some(SendPlan {
            exchange_id,
            request,
            effects,
        }) = plan
        else {
            return;
        };
        self.apply(effects);

        let (streaming, endpoints) = {
            let state = self.inner.state.borrow();
            (state.config().streaming, state.endpoints().clone())
        };
        if streaming {
            let url = endpoints.stream_request_url(&request);
            self.run_stream(exchange_id, &url).await;
        } else {
            self.run_post(exchange_id, &endpoints.send_url, &request)
                .await;
        }
    }

    async fn run_stream(&self, exchange_id: u64, url: &str) {
        let channel = match self.inner.transport.open_stream(url).await {
            Ok(channel) => channel,
            Err(error) => {
                self.update(|state| state.fail_exchange(exchange_id, &error));
                return;
            }
        };

        if !self.is_current(exchange_id) {
            debug!(exchange_id, "exchange superseded while its stream was opening");
            channel.handle.close();
            return;
        }

        let (mut events, abort) = abortable(channel.events);
        self.inner.channel.replace(Some(OpenChannel {
            exchange_id,
            handle: channel.handle,
            abort,
        }));

        while let Some(item) = events.next().await {
            self.update(|state| match item {
                Ok(event) => state.apply_event(exchange_id, &event),
                Err(error) => state.fail_exchange(exchange_id, &error),
            });
            if !self.is_current(exchange_id) {
                break;
            }
        }

        self.update(|state| state.finish_stream(exchange_id));
        self.release_channel(exchange_id);
    }

    async fn run_post(&self, exchange_id: u64, url: &str, request: &ChatSendRequest) {
        let result = self.inner.transport.post_message(url, request).await;
        self.update(|state| match result {
            Ok(payload) => state.complete_post(exchange_id, &payload),
            Err(error) => state.fail_exchange(exchange_id, &error),
        });
    }

    fn is_current(&self, exchange_id: u64) -> bool {
        self.inner.state.borrow().is_current(exchange_id)
    }

    fn update(&self, transition: impl FnOnce(&mut ChatWidgetState) -> Vec<ChatEffect>) {
        let effects = transition(&mut self.inner.state.borrow_mut());
        self.apply(effects);
    }

    fn release_channel(&self, exchange_id: u64) {
        let open = self
            .inner
            .channel
            .borrow_mut()
            .take_if(|open| open.exchange_id == exchange_id);
        if let Some(open) = open {
            open.handle.close();
            open.abort.abort();
        }
    }

    fn apply(&self, effects: Vec<ChatEffect>) {
        let view = &self.inner.view;
        for effect in effects {
            match effect {
                ChatEffect::RenderLog => view.render_log(self.inner.state.borrow().log().messages()),
                ChatEffect::AppendMessage(message) => view.append_message(&message),
                ChatEffect::ShowPlaceholder(id) => view.show_placeholder(id),
                ChatEffect::UpdatePlaceholder { exchange_id, text } => {
                    view.update_placeholder(exchange_id, &text);
                }
                ChatEffect::ResolvePlaceholder {
                    exchange_id,
                    message,
                } => view.resolve_placeholder(exchange_id, &message),
                ChatEffect::CloseChannel(exchange_id) => self.release_channel(exchange_id),
                ChatEffect::PersistLog => self.persist_log(),
                ChatEffect::DiscardLog => self.discard_log(),
                ChatEffect::PersistSession => self.persist_session(),
                ChatEffect::ClearInput => view.clear_input(),
                ChatEffect::SetInputEnabled(enabled) => view.set_input_enabled(enabled),
                ChatEffect::SetToggleVisible(visible) => view.set_toggle_visible(visible),
                ChatEffect::SetWindowVisible(visible) => view.set_window_visible(visible),
                ChatEffect::ScrollToLatest => view.scroll_to_latest(),
            }
        }
    }

    fn persist_log(&self) {
        let state = self.inner.state.borrow();
        let key = &state.endpoints().log_storage_key;
        if let Err(error) = self.inner.storage.store_log(key, &state.log().encode()) {
            warn!(%error, key, "failed to persist chat log");
        }
    }

    fn discard_log(&self) {
        let state = self.inner.state.borrow();
        let key = &state.endpoints().log_storage_key;
        if let Err(error) = self.inner.storage.remove_log(key) {
            warn!(%error, key, "failed to remove chat log");
        }
    }

    fn persist_session(&self) {
        let state = self.inner.state.borrow();
        let key = &state.endpoints().session_storage_key;
        if let Err(error) = self.inner.storage.store_session(key, state.session()) {
            warn!(%error, key, "failed to persist chat session");
        }
    }
}

impl<S, V, T> LifecycleComponent for ChatWidget<S, V, T>
where
    S: ChatStorage,
    V: ChatView,
    T: ChatTransport,
{
    fn name(&self) -> &str {
        "chat-widget"
    }

    fn scope(&self) -> ComponentScope {
        ComponentScope::Persistent
    }

    fn mount(&self, _context: &ContentReloaded) {
        let effects = self.inner.state.borrow().reassert_visibility();
        self.apply(effects);
    }

    fn unmount(&self) {
        self.shutdown();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized(ChatbotConfig),
    AlreadyInitialized,
    Rejected(ChatConfigError),
}

/// Accepts a widget configuration at most once. A rejected configuration
/// leaves the slot empty.
#[derive(Debug, Default)]
pub struct ChatWidgetSlot {
    accepted: RefCell<Option<String>>,
}

impl ChatWidgetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.accepted.borrow().is_some()
    }

    pub fn accepted_chatbot_type(&self) -> Option<String> {
        self.accepted.borrow().clone()
    }

    pub fn claim_json(&self, raw: &str) -> InitOutcome {
        match RawChatbotConfig::from_json(raw) {
            Ok(raw) => self.claim(raw),
            Err(error) => self.reject(error),
        }
    }

    pub fn claim(&self, raw: RawChatbotConfig) -> InitOutcome {
        if let Some(existing) = self.accepted.borrow().as_deref() {
            warn!(chatbot_type = existing, "chat widget already initialized; ignoring configuration");
            return InitOutcome::AlreadyInitialized;
        }
        match ChatbotConfig::from_raw(raw) {
            Ok(config) => {
                self.accepted.replace(Some(config.chatbot_type.clone()));
                InitOutcome::Initialized(config)
            }
            Err(error) => self.reject(error),
        }
    }

    fn reject(&self, error: ChatConfigError) -> InitOutcome {
        if self.is_initialized() {
            return InitOutcome::AlreadyInitialized;
        }
        warn!(%error, "chat widget configuration rejected");
        InitOutcome::Rejected(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_accepts_first_valid_configuration_only() {
        let slot = ChatWidgetSlot::new();
        assert!(matches!(
            slot.claim_json(r#"{"persistChat":false}"#),
            InitOutcome::Rejected(ChatConfigError::MissingChatbotType)
        ));
        assert!(!slot.is_initialized());

        let first = slot.claim_json(r#"{"chatbotType":"product-assistant"}"#);
        assert!(matches!(first, InitOutcome::Initialized(ref config) if config.chatbot_type == "product-assistant"));

        assert_eq!(
            slot.claim_json(r#"{"chatbotType":"support"}"#),
            InitOutcome::AlreadyInitialized
        );
        assert_eq!(slot.claim_json("not json"), InitOutcome::AlreadyInitialized);
        assert_eq!(
            slot.accepted_chatbot_type().as_deref(),
            Some("product-assistant")
        );
    }
}
