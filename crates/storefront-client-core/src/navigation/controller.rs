use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::lifecycle::ContentReloaded;
use crate::navigation::fragment::{
    DEFAULT_PRIMARY_NAV_LABELS, FragmentResponse, strip_primary_navigation,
};
use crate::navigation::link::path_of;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("fragment request failed: {0}")]
    Network(String),
    #[error("fragment body could not be read: {0}")]
    Body(String),
}

#[async_trait(?Send)]
pub trait FragmentFetcher {
    /// Requests `url` with the partial-fragment marker header set.
    async fn fetch_fragment(&self, url: &str) -> Result<FragmentResponse, FetchError>;
}

pub trait ContentShell {
    /// Swaps the content region's markup in one assignment. Returns false when
    /// the page has no content region.
    fn replace_content(&self, html: &str) -> bool;
    fn set_title(&self, title: &str);
    fn emit_content_reloaded(&self, event: &ContentReloaded);
}

pub trait BrowserHistory {
    fn push(&self, url: &str);
    fn current_path(&self) -> String;
    fn navigate_full(&self, url: &str);
    fn reload(&self);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub current_url: String,
    pub is_partial_load_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Loaded { url: String },
    /// A newer load started before this one finished; its response was dropped.
    Superseded,
    /// The partial load failed and the browser was sent to `url` the normal way.
    FellBack { url: String, reason: String },
    Reloaded,
    Ignored,
}

/// State recorded on each history entry pushed by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryEntry {
    pub path: Option<String>,
}

pub struct NavigationController<F, S, H> {
    fetcher: F,
    shell: S,
    history: H,
    primary_nav_labels: Vec<String>,
    generation: Cell<u64>,
    state: RefCell<NavigationState>,
}

impl<F, S, H> NavigationController<F, S, H>
where
    F: FragmentFetcher,
    S: ContentShell,
    H: BrowserHistory,
{
    pub fn new(fetcher: F, shell: S, history: H) -> Self {
        let current_url = history.current_path();
        Self {
            fetcher,
            shell,
            history,
            primary_nav_labels: DEFAULT_PRIMARY_NAV_LABELS
                .iter()
                .map(|label| (*label).to_string())
                .collect(),
            generation: Cell::new(0),
            state: RefCell::new(NavigationState {
                current_url,
                is_partial_load_active: false,
            }),
        }
    }

    pub fn state(&self) -> NavigationState {
        self.state.borrow().clone()
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    /// Link clicks and background requests from other components.
    pub async fn navigate(&self, url: &str) -> NavigationOutcome {
        self.load(url, false).await
    }

    pub async fn handle_popstate(&self, entry: Option<HistoryEntry>) -> NavigationOutcome {
        if let Some(path) = entry.and_then(|entry| entry.path) {
            return self.load(&path, true).await;
        }
        if path_of(&self.history.current_path()) != "/" {
            info!("history entry without state; reloading");
            self.history.reload();
            return NavigationOutcome::Reloaded;
        }
        NavigationOutcome::Ignored
    }

    /// Partially loads `url`. `replay` loads come from history traversal and
    /// never push a new entry. The most recently started load wins.
    pub async fn load(&self, url: &str, replay: bool) -> NavigationOutcome {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.state.borrow_mut().is_partial_load_active = true;
        debug!(url, replay, generation, "starting partial load");

        let result = self.fetcher.fetch_fragment(url).await;

        if self.generation.get() != generation {
            debug!(url, generation, "discarding partial load overtaken by a newer one");
            return NavigationOutcome::Superseded;
        }
        self.state.borrow_mut().is_partial_load_active = false;

        let response = match result {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                return self.fall_back(url, format!("HTTP {}", response.status));
            }
            Err(error) => return self.fall_back(url, error.to_string()),
        };

        let body = strip_primary_navigation(&response.body, &self.primary_nav_labels);
        if !self.shell.replace_content(&body) {
            return self.fall_back(url, "page has no content region".to_string());
        }
        if let Some(title) = response
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
        {
            self.shell.set_title(title);
        }
        if !replay {
            self.history.push(url);
        }
        self.state.borrow_mut().current_url = url.to_string();

        self.shell.emit_content_reloaded(&ContentReloaded {
            url: url.to_string(),
        });
        NavigationOutcome::Loaded {
            url: url.to_string(),
        }
    }

    fn fall_back(&self, url: &str, reason: String) -> NavigationOutcome {
        warn!(url, %reason, "partial load failed; falling back to full navigation");
        self.history.navigate_full(url);
        NavigationOutcome::FellBack {
            url: url.to_string(),
            reason,
        }
    }
}
