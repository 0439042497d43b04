//! Same-page navigation: internal link clicks swap only the main content
//! region while history and back/forward keep working.

pub mod controller;
pub mod fragment;
pub mod link;

pub use controller::{
    BrowserHistory, ContentShell, FetchError, FragmentFetcher, HistoryEntry, NavigationController,
    NavigationOutcome, NavigationState,
};
pub use fragment::{DEFAULT_PRIMARY_NAV_LABELS, FragmentResponse, strip_primary_navigation};
pub use link::{LinkClick, LinkDecision, classify_link_click, path_of, same_origin_path};
