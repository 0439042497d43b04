use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, VARY};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use storefront_client_core::protocol::{PAGE_TITLE_HEADER, PARTIAL_REQUEST_HEADER};

const CACHE_NO_STORE: &str = "no-store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub is_partial: bool,
}

pub fn classify_request(headers: &HeaderMap) -> PageRequest {
    PageRequest {
        is_partial: header_is_true(headers, PARTIAL_REQUEST_HEADER),
    }
}

pub fn fragment_response(fragment_html: String, http_status: StatusCode) -> Response {
    (
        http_status,
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (CACHE_CONTROL, CACHE_NO_STORE),
            (VARY, PARTIAL_REQUEST_HEADER),
        ],
        fragment_html,
    )
        .into_response()
}

pub fn page_response(html: String, http_status: StatusCode) -> Response {
    (
        http_status,
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (VARY, PARTIAL_REQUEST_HEADER),
        ],
        html,
    )
        .into_response()
}

/// Only printable ASCII titles are sent. Browsers read header bytes as Latin-1,
/// so anything else is dropped and the client keeps its current title.
pub fn set_page_title_header(response: &mut Response, title: &str) {
    if !title.is_ascii() {
        tracing::debug!(title, "page title is not ASCII; omitting header");
        return;
    }
    match HeaderValue::from_str(title) {
        Ok(value) => {
            response.headers_mut().insert(PAGE_TITLE_HEADER, value);
        }
        Err(_) => {
            tracing::warn!(title, "page title is not a valid header value; omitting");
        }
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn header_is_true(headers: &HeaderMap, name: &str) -> bool {
    header_text(headers, name).is_some_and(|value| value.eq_ignore_ascii_case("true"))
}
