use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use serde_json::{Value, json};
use storefront_client_core::chat::{
    Availability, ChannelHandle, ChatChannel, ChatLog, ChatMessage, ChatStorage, ChatTransport,
    ChatView, ChatWidget, ChatbotConfig, SessionIdentity, StorageError, TransportError,
};
use storefront_client_core::lifecycle::{ContentReloaded, LifecycleRegistry};
use storefront_client_core::protocol::{ChatSendRequest, ChatStatus, ChatStreamEvent};

const LOG_KEY: &str = "chatLog:product-assistant";
const SESSION_KEY: &str = "chatSession_product-assistant";

type Journal = Rc<RefCell<Vec<String>>>;
type StreamItem = Result<ChatStreamEvent, TransportError>;

#[derive(Default)]
struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    fn with(entries: &[(&str, &str)]) -> Self {
        let storage = Self::default();
        for (key, value) in entries {
            storage
                .entries
                .borrow_mut()
                .insert((*key).to_string(), (*value).to_string());
        }
        storage
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl ChatStorage for MemoryStorage {
    fn load_log(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn store_log(&self, key: &str, encoded: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), encoded.to_string());
        Ok(())
    }

    fn remove_log(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn load_session(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn store_session(&self, key: &str, identity: &SessionIdentity) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), identity.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingView {
    rendered: RefCell<Vec<ChatMessage>>,
    placeholders: RefCell<BTreeMap<u64, String>>,
    resolutions: RefCell<Vec<(u64, ChatMessage)>>,
    toggle_visible: Cell<bool>,
    window_visible: Cell<bool>,
    input_enabled: Cell<bool>,
    inputs_cleared: Cell<usize>,
    confirm: Cell<bool>,
}

impl ChatView for RecordingView {
    fn render_log(&self, messages: &[ChatMessage]) {
        *self.rendered.borrow_mut() = messages.to_vec();
    }

    fn append_message(&self, message: &ChatMessage) {
        self.rendered.borrow_mut().push(message.clone());
    }

    fn show_placeholder(&self, exchange_id: u64) {
        self.placeholders
            .borrow_mut()
            .insert(exchange_id, String::new());
    }

    fn update_placeholder(&self, exchange_id: u64, text: &str) {
        self.placeholders
            .borrow_mut()
            .insert(exchange_id, text.to_string());
    }

    fn resolve_placeholder(&self, exchange_id: u64, message: &ChatMessage) {
        self.placeholders.borrow_mut().remove(&exchange_id);
        self.rendered.borrow_mut().push(message.clone());
        self.resolutions
            .borrow_mut()
            .push((exchange_id, message.clone()));
    }

    fn clear_input(&self) {
        self.inputs_cleared.set(self.inputs_cleared.get() + 1);
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.input_enabled.set(enabled);
    }

    fn set_toggle_visible(&self, visible: bool) {
        self.toggle_visible.set(visible);
    }

    fn set_window_visible(&self, visible: bool) {
        self.window_visible.set(visible);
    }

    fn scroll_to_latest(&self) {}

    fn confirm_clear(&self) -> bool {
        self.confirm.get()
    }
}

struct RecordingHandle {
    label: String,
    journal: Journal,
}

impl ChannelHandle for RecordingHandle {
    fn close(&self) {
        self.journal
            .borrow_mut()
            .push(format!("close:{}", self.label));
    }
}

struct ScriptedTransport {
    status: RefCell<Option<Result<ChatStatus, TransportError>>>,
    streams: RefCell<VecDeque<(String, Result<ChatChannel, TransportError>)>>,
    posts: RefCell<VecDeque<Result<Value, TransportError>>>,
    requested: Journal,
    channels: Journal,
}

impl ScriptedTransport {
    fn with_status(status: Result<ChatStatus, TransportError>, channels: &Journal) -> Self {
        Self {
            status: RefCell::new(Some(status)),
            streams: RefCell::new(VecDeque::new()),
            posts: RefCell::new(VecDeque::new()),
            requested: Journal::default(),
            channels: Rc::clone(channels),
        }
    }

    fn enabled(channels: &Journal) -> Self {
        Self::with_status(Ok(ChatStatus::enabled()), channels)
    }

    fn handle(&self, label: &str) -> Rc<dyn ChannelHandle> {
        Rc::new(RecordingHandle {
            label: label.to_string(),
            journal: Rc::clone(&self.channels),
        })
    }

    fn push_stream(&self, label: &str, items: Vec<StreamItem>) {
        let channel = ChatChannel {
            events: futures::stream::iter(items).boxed_local(),
            handle: self.handle(label),
        };
        self.streams
            .borrow_mut()
            .push_back((label.to_string(), Ok(channel)));
    }

    fn push_live_stream(&self, label: &str) -> mpsc::UnboundedSender<StreamItem> {
        let (sender, receiver) = mpsc::unbounded();
        let channel = ChatChannel {
            events: receiver.boxed_local(),
            handle: self.handle(label),
        };
        self.streams
            .borrow_mut()
            .push_back((label.to_string(), Ok(channel)));
        sender
    }

    fn push_stream_failure(&self, label: &str, error: TransportError) {
        self.streams
            .borrow_mut()
            .push_back((label.to_string(), Err(error)));
    }

    fn push_post(&self, reply: Result<Value, TransportError>) {
        self.posts.borrow_mut().push_back(reply);
    }
}

#[async_trait(?Send)]
impl ChatTransport for ScriptedTransport {
    async fn fetch_status(&self, status_url: &str) -> Result<ChatStatus, TransportError> {
        self.requested
            .borrow_mut()
            .push(format!("GET {status_url}"));
        self.status
            .borrow_mut()
            .take()
            .unwrap_or(Err(TransportError::Network("no scripted status".to_string())))
    }

    async fn open_stream(&self, stream_url: &str) -> Result<ChatChannel, TransportError> {
        self.requested
            .borrow_mut()
            .push(format!("STREAM {stream_url}"));
        let (label, channel) = self
            .streams
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| TransportError::Network("no scripted stream".to_string()))?;
        if channel.is_ok() {
            self.channels.borrow_mut().push(format!("open:{label}"));
        }
        channel
    }

    async fn post_message(
        &self,
        send_url: &str,
        request: &ChatSendRequest,
    ) -> Result<Value, TransportError> {
        self.requested.borrow_mut().push(format!(
            "POST {send_url} {}",
            request.post_body()
        ));
        self.posts
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(TransportError::Network("no scripted reply".to_string())))
    }
}

type TestWidget = ChatWidget<MemoryStorage, RecordingView, ScriptedTransport>;

fn product_assistant() -> anyhow::Result<ChatbotConfig> {
    Ok(ChatbotConfig::new("product-assistant")?)
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn stored_log(widget: &TestWidget, config: &ChatbotConfig) -> anyhow::Result<ChatLog> {
    let raw = widget
        .storage()
        .get(LOG_KEY)
        .context("chat log was never persisted")?;
    Ok(ChatLog::decode(&raw, &config.introductory_message)?)
}

#[tokio::test]
async fn streamed_reply_is_committed_once_and_persisted() -> anyhow::Result<()> {
    let config = product_assistant()?;
    let channels = Journal::default();
    let transport = ScriptedTransport::enabled(&channels);
    transport.push_stream(
        "first",
        vec![
            Ok(ChatStreamEvent::token("Try ")),
            Ok(ChatStreamEvent::add_message("Need a drill", "User")),
            Ok(ChatStreamEvent::token("the X200")),
            Ok(ChatStreamEvent::end()),
        ],
    );

    let widget = ChatWidget::initialize(
        config.clone(),
        MemoryStorage::default(),
        RecordingView::default(),
        transport,
    )
    .await;
    widget.open();
    widget.send("Need a drill").await;

    assert_eq!(
        widget.state().log().last(),
        &ChatMessage::bot_rich("Try the X200")
    );
    assert_eq!(stored_log(&widget, &config)?.len(), 3);
    assert_eq!(widget.view().resolutions.borrow().len(), 1);
    assert!(widget.view().placeholders.borrow().is_empty());
    assert_eq!(widget.view().inputs_cleared.get(), 1);
    assert_eq!(
        channels.borrow().as_slice(),
        ["open:first", "close:first"]
    );

    let session = widget
        .storage()
        .get(SESSION_KEY)
        .context("session was never persisted")?;
    assert!(session.starts_with("user_"));
    Ok(())
}

#[tokio::test]
async fn stream_url_carries_input_and_session() -> anyhow::Result<()> {
    let channels = Journal::default();
    let transport = ScriptedTransport::enabled(&channels);
    transport.push_stream("only", vec![Ok(ChatStreamEvent::end())]);
    let requested = Rc::clone(&transport.requested);

    let widget = ChatWidget::initialize(
        product_assistant()?,
        MemoryStorage::with(&[(SESSION_KEY, "user_1700000000000")]),
        RecordingView::default(),
        transport,
    )
    .await;
    widget.send("drills & saws").await;

    assert_eq!(
        requested.borrow().as_slice(),
        [
            "GET /api/chat/product-assistant/status",
            "STREAM /api/chat/product-assistant/stream?input_value=drills+%26+saws&session_id=user_1700000000000",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn superseding_send_closes_previous_channel_before_opening_next() -> anyhow::Result<()> {
    let config = product_assistant()?;
    let channels = Journal::default();
    let transport = ScriptedTransport::enabled(&channels);
    let first_events = transport.push_live_stream("first");
    let second_events = transport.push_live_stream("second");

    let widget = ChatWidget::initialize(
        config,
        MemoryStorage::default(),
        RecordingView::default(),
        transport,
    )
    .await;

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let first = tokio::task::spawn_local({
                let widget = widget.clone();
                async move { widget.send("first question").await }
            });
            settle().await;
            first_events.unbounded_send(Ok(ChatStreamEvent::token("partial")))?;
            settle().await;

            let second = tokio::task::spawn_local({
                let widget = widget.clone();
                async move { widget.send("second question").await }
            });
            settle().await;
            second_events.unbounded_send(Ok(ChatStreamEvent::token("done")))?;
            second_events.unbounded_send(Ok(ChatStreamEvent::end()))?;

            first.await?;
            second.await?;
            Ok::<_, anyhow::Error>(())
        })
        .await?;

    assert_eq!(
        channels.borrow().as_slice(),
        ["open:first", "close:first", "open:second", "close:second"]
    );
    let state = widget.state();
    let texts: Vec<&str> = state
        .log()
        .messages()
        .iter()
        .skip(1)
        .map(|message| message.text.as_str())
        .collect();
    assert_eq!(texts, ["first question", "partial", "second question", "done"]);
    assert_eq!(widget.view().resolutions.borrow().len(), 2);
    assert!(widget.view().placeholders.borrow().is_empty());
    Ok(())
}

#[tokio::test]
async fn closing_window_mid_stream_commits_exactly_one_message() -> anyhow::Result<()> {
    let channels = Journal::default();
    let transport = ScriptedTransport::enabled(&channels);
    let events = transport.push_live_stream("first");

    let widget = ChatWidget::initialize(
        product_assistant()?,
        MemoryStorage::default(),
        RecordingView::default(),
        transport,
    )
    .await;
    widget.open();
    assert!(widget.view().window_visible.get());

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let pending = tokio::task::spawn_local({
                let widget = widget.clone();
                async move { widget.send("hello").await }
            });
            settle().await;
            events.unbounded_send(Ok(ChatStreamEvent::token("half an answer")))?;
            settle().await;

            widget.close();
            // Late events from a closed channel must not resurrect the exchange.
            let _ = events.unbounded_send(Ok(ChatStreamEvent::end()));
            pending.await?;
            Ok::<_, anyhow::Error>(())
        })
        .await?;

    let view = widget.view();
    assert_eq!(view.resolutions.borrow().len(), 1);
    assert!(view.placeholders.borrow().is_empty());
    assert!(!view.window_visible.get());
    assert!(view.toggle_visible.get());
    assert_eq!(
        widget.state().log().last(),
        &ChatMessage::bot_rich("half an answer")
    );
    assert_eq!(channels.borrow().as_slice(), ["open:first", "close:first"]);
    Ok(())
}

#[tokio::test]
async fn transport_failures_resolve_with_connection_error() -> anyhow::Result<()> {
    let channels = Journal::default();
    let transport = ScriptedTransport::enabled(&channels);
    transport.push_stream_failure("refused", TransportError::Network("connection refused".to_string()));
    transport.push_stream(
        "interrupted",
        vec![
            Ok(ChatStreamEvent::token("partial")),
            Err(TransportError::Network("stream interrupted".to_string())),
        ],
    );

    let widget = ChatWidget::initialize(
        product_assistant()?,
        MemoryStorage::default(),
        RecordingView::default(),
        transport,
    )
    .await;

    widget.send("first").await;
    assert_eq!(
        widget.state().log().last().text,
        "Error: Could not connect to the bot server. connection refused"
    );

    widget.send("second").await;
    assert_eq!(
        widget.state().log().last().text,
        "Error: Could not connect to the bot server. stream interrupted"
    );
    assert_eq!(widget.view().resolutions.borrow().len(), 2);
    assert!(widget.view().placeholders.borrow().is_empty());
    Ok(())
}

#[tokio::test]
async fn stream_without_any_reply_commits_apology() -> anyhow::Result<()> {
    let channels = Journal::default();
    let transport = ScriptedTransport::enabled(&channels);
    transport.push_stream("silent", Vec::new());

    let widget = ChatWidget::initialize(
        product_assistant()?,
        MemoryStorage::default(),
        RecordingView::default(),
        transport,
    )
    .await;
    widget.send("anyone there?").await;

    assert_eq!(
        widget.state().log().last(),
        &ChatMessage::bot("I'm sorry, I didn't get a response. Please try again.")
    );
    Ok(())
}

#[tokio::test]
async fn non_streaming_send_extracts_reply_and_session() -> anyhow::Result<()> {
    let mut config = product_assistant()?;
    config.streaming = false;
    let channels = Journal::default();
    let transport = ScriptedTransport::enabled(&channels);
    transport.push_post(Ok(json!({
        "outputs": [{ "outputs": [{ "results": { "message": {
            "data": { "text": "<p>The <b>X200</b> fits.</p>", "session_id": "user_555" }
        } } }] }]
    })));
    transport.push_post(Err(TransportError::Status { status: 502 }));
    let requested = Rc::clone(&transport.requested);

    let widget = ChatWidget::initialize(
        config,
        MemoryStorage::default(),
        RecordingView::default(),
        transport,
    )
    .await;
    widget.send("which drill?").await;

    assert_eq!(
        widget.state().log().last(),
        &ChatMessage::bot_rich("<p>The <b>X200</b> fits.</p>")
    );
    assert_eq!(widget.storage().get(SESSION_KEY).as_deref(), Some("user_555"));
    let post = requested
        .borrow()
        .iter()
        .find(|line| line.starts_with("POST"))
        .cloned()
        .ok_or_else(|| anyhow!("no POST was issued"))?;
    assert!(post.starts_with("POST /api/chat/product-assistant "));
    assert!(post.contains("\"output_type\":\"chat\""));

    widget.send("and a saw?").await;
    assert_eq!(
        widget.state().log().last().text,
        "Error: Could not connect to the bot server. bot server responded with HTTP 502"
    );
    assert!(channels.borrow().is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_chatbot_disables_widget_without_sending() -> anyhow::Result<()> {
    let channels = Journal::default();
    let transport = ScriptedTransport::with_status(Err(TransportError::NotFound), &channels);
    transport.push_stream("unused", vec![Ok(ChatStreamEvent::end())]);

    let widget = ChatWidget::initialize(
        product_assistant()?,
        MemoryStorage::default(),
        RecordingView::default(),
        transport,
    )
    .await;
    widget.open();
    widget.send("hello").await;

    assert_eq!(widget.state().availability(), Availability::Disabled);
    assert!(!widget.view().toggle_visible.get());
    assert!(!widget.view().window_visible.get());
    assert!(!widget.view().input_enabled.get());
    assert_eq!(widget.state().log().len(), 1);
    assert!(channels.borrow().is_empty());
    Ok(())
}

#[tokio::test]
async fn persisted_log_is_restored_and_corrupt_log_is_replaced() -> anyhow::Result<()> {
    let config = product_assistant()?;
    let channels = Journal::default();
    let earlier = r#"[{"text":"Hello! I'm your Product Assistant. How can I help you find the perfect product today?","sender":"bot"},{"text":"hi","sender":"user"},{"text":"<b>Hi!</b>","sender":"bot","isHTML":true}]"#;

    let restored = ChatWidget::new(
        config.clone(),
        MemoryStorage::with(&[(LOG_KEY, earlier)]),
        RecordingView::default(),
        ScriptedTransport::enabled(&channels),
    );
    assert_eq!(restored.view().rendered.borrow().len(), 3);
    assert!(restored.view().rendered.borrow()[2].is_rich_content);
    assert!(!restored.view().toggle_visible.get());

    let corrupt = ChatWidget::new(
        config.clone(),
        MemoryStorage::with(&[(LOG_KEY, "{definitely not json")]),
        RecordingView::default(),
        ScriptedTransport::enabled(&channels),
    );
    assert_eq!(corrupt.state().log().len(), 1);
    assert_eq!(stored_log(&corrupt, &config)?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn non_persistent_widget_removes_stale_stored_log() -> anyhow::Result<()> {
    let mut config = product_assistant()?;
    config.persist_chat = false;
    let channels = Journal::default();
    let stale = r#"[{"text":"Hello","sender":"bot"},{"text":"old question","sender":"user"}]"#;

    let widget = ChatWidget::initialize(
        config,
        MemoryStorage::with(&[(LOG_KEY, stale)]),
        RecordingView::default(),
        ScriptedTransport::enabled(&channels),
    )
    .await;
    assert_eq!(widget.state().log().len(), 1);
    assert_eq!(widget.storage().get(LOG_KEY), None);

    widget.view().confirm.set(true);
    widget.clear_history();
    assert_eq!(widget.storage().get(LOG_KEY), None);
    assert!(widget.storage().get(SESSION_KEY).is_some());
    Ok(())
}

#[tokio::test]
async fn clear_history_needs_confirmation_and_mints_new_identity() -> anyhow::Result<()> {
    let config = product_assistant()?;
    let channels = Journal::default();
    let transport = ScriptedTransport::enabled(&channels);
    transport.push_stream("reply", vec![Ok(ChatStreamEvent::token("ok")), Ok(ChatStreamEvent::end())]);

    let widget = ChatWidget::initialize(
        config.clone(),
        MemoryStorage::with(&[(SESSION_KEY, "user_1")]),
        RecordingView::default(),
        transport,
    )
    .await;
    widget.send("hello").await;

    widget.clear_history();
    assert_eq!(widget.state().log().len(), 3);
    assert_eq!(widget.storage().get(SESSION_KEY).as_deref(), Some("user_1"));

    widget.view().confirm.set(true);
    widget.clear_history();
    assert_eq!(widget.state().log().len(), 1);
    assert_eq!(stored_log(&widget, &config)?.len(), 1);
    let rotated = widget
        .storage()
        .get(SESSION_KEY)
        .context("session missing after clear")?;
    assert_ne!(rotated, "user_1");
    assert!(rotated.starts_with("user_"));
    assert_eq!(widget.view().rendered.borrow().len(), 1);
    Ok(())
}

#[tokio::test]
async fn content_reload_preserves_open_window() -> anyhow::Result<()> {
    let channels = Journal::default();
    let widget = ChatWidget::initialize(
        product_assistant()?,
        MemoryStorage::default(),
        RecordingView::default(),
        ScriptedTransport::enabled(&channels),
    )
    .await;
    let registry = LifecycleRegistry::new();
    registry.register(Rc::new(widget.clone()));

    widget.open();
    widget.view().window_visible.set(false);
    widget.view().toggle_visible.set(true);
    registry.content_reloaded(&ContentReloaded {
        url: "/search?q=drill".to_string(),
    });

    assert!(widget.state().is_open());
    assert!(widget.view().window_visible.get());
    assert!(!widget.view().toggle_visible.get());
    Ok(())
}
