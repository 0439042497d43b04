#[cfg(any(target_arch = "wasm32", test))]
mod shell_logic;
#[cfg(target_arch = "wasm32")]
mod wasm_constants;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::RefCell;
    use std::rc::Rc;

    use async_trait::async_trait;
    use futures::StreamExt;
    use futures::channel::mpsc;
    use gloo_net::http::Request;
    use storefront_client_core::chat::{
        ChannelHandle, ChatChannel, ChatMessage, ChatSender, ChatStorage, ChatTransport, ChatView,
        ChatWidget, ChatWidgetSlot, InitOutcome, SessionIdentity, StorageError, TransportError,
    };
    use storefront_client_core::lifecycle::{ContentReloaded, LifecycleComponent, LifecycleRegistry};
    use storefront_client_core::navigation::{
        BrowserHistory, ContentShell, FetchError, FragmentFetcher, FragmentResponse, HistoryEntry,
        LinkClick, LinkDecision, NavigationController, NavigationOutcome, classify_link_click,
        same_origin_path,
    };
    use storefront_client_core::protocol::{
        BACKGROUND_NAVIGATION_EVENT, BYPASS_NAVIGATION_ATTRIBUTE, CHATBOT_CONFIG_ATTRIBUTE,
        CONTENT_RELOADED_EVENT, ChatSendRequest, ChatStatus, ChatStreamEvent, DocumentPayload,
        PAGE_TITLE_HEADER, PARTIAL_REQUEST_HEADER,
    };
    use tracing::{debug, info, warn};
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{
        Element, EventSource, HtmlAnchorElement, HtmlElement, HtmlImageElement, HtmlInputElement,
        KeyboardEvent, MessageEvent, MouseEvent, PopStateEvent,
    };

    use crate::shell_logic::*;
    use crate::wasm_constants::*;

    mod chat;
    mod dom;
    mod lifecycle;
    mod logging;
    mod network;
    mod routing;
    mod storage;

    use chat::*;
    use dom::*;
    use lifecycle::*;
    use logging::*;
    use network::*;
    use routing::*;
    use storage::*;

    type BrowserNavigation = NavigationController<HttpFragmentFetcher, MainContentShell, WindowHistory>;
    type BrowserChatWidget = ChatWidget<BrowserChatStorage, DomChatView, BrowserChatTransport>;

    thread_local! {
        static NAVIGATION: RefCell<Option<Rc<BrowserNavigation>>> = const { RefCell::new(None) };
        static LIFECYCLE: LifecycleRegistry = LifecycleRegistry::new();
        static CHAT_SLOT: ChatWidgetSlot = ChatWidgetSlot::new();
        static CHAT_LISTENERS: ListenerSet = ListenerSet::default();
        static ROUTE_LINK_CLICK_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static ROUTE_POPSTATE_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static BACKGROUND_NAVIGATION_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static CONTENT_RELOADED_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static PAGEHIDE_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static PAGESHOW_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
    }

    #[derive(Debug, thiserror::Error)]
    enum ShellError {
        #[error("{0} is unavailable")]
        Unavailable(&'static str),
        #[error("element '{0}' is missing or has an unexpected type")]
        Element(&'static str),
        #[error("request failed: {0}")]
        Request(String),
        #[error("server responded with HTTP {0}")]
        Status(u16),
        #[error("{context}: {message}")]
        Js {
            context: &'static str,
            message: String,
        },
    }

    fn js_error(context: &'static str) -> impl FnOnce(JsValue) -> ShellError {
        move |value| ShellError::Js {
            context,
            message: value.as_string().unwrap_or_else(|| format!("{value:?}")),
        }
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        init_console_tracing();
        if let Err(error) = boot() {
            warn!(%error, "storefront shell failed to start");
        }
    }

    /// Mounts the chat widget for `config_json`. Later calls are ignored once a
    /// configuration has been accepted.
    #[wasm_bindgen]
    pub fn init_chatbot(config_json: String) {
        mount_chat_widget(&config_json);
    }

    /// Partially loads `url` as if an internal link had been clicked.
    #[wasm_bindgen]
    pub fn navigate(url: String) {
        request_background_navigation(&url);
    }

    /// Boot state of the shell as JSON, for diagnostics from the console.
    #[wasm_bindgen]
    pub fn shell_status_json() -> String {
        let phase = if navigation().is_some() { "started" } else { "pending" };
        serde_json::json!({
            "phase": phase,
            "components": LIFECYCLE.with(LifecycleRegistry::len),
            "chatbotType": CHAT_SLOT.with(ChatWidgetSlot::accepted_chatbot_type),
        })
        .to_string()
    }

    fn boot() -> Result<(), ShellError> {
        let navigation = Rc::new(NavigationController::new(
            HttpFragmentFetcher,
            MainContentShell,
            WindowHistory,
        ));
        let initial_url = navigation.state().current_url;
        NAVIGATION.with(|slot| slot.replace(Some(navigation)));

        install_browser_navigation_handlers()?;
        install_lifecycle_handlers()?;
        register_page_components();

        if let Some(config_json) = chatbot_config_from_markup() {
            mount_chat_widget(&config_json);
        }

        LIFECYCLE.with(|registry| {
            registry.mount_all(&ContentReloaded { url: initial_url });
            info!(components = registry.len(), "storefront shell started");
        });
        Ok(())
    }

    fn navigation() -> Option<Rc<BrowserNavigation>> {
        NAVIGATION.with(|slot| slot.borrow().clone())
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::shell_status_json;

#[cfg(not(target_arch = "wasm32"))]
pub fn shell_status_json() -> String {
    "{\"phase\":\"native\",\"detail\":\"the storefront shell only runs on wasm\"}".to_string()
}
