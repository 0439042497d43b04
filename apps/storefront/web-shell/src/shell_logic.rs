//! Browser-independent rules the WASM shell applies to DOM input.

use url::{Url, form_urlencoded};

pub(crate) const SESSION_COOKIE_MAX_AGE_SECS: u32 = 30 * 24 * 60 * 60;

/// Elements dropped from rich bot markup before it is inserted.
pub(crate) const UNSAFE_ELEMENT_SELECTOR: &str =
    "script, style, iframe, object, embed, link, meta, base, form";

// Only used to resolve site-relative URLs; never requested.
const URL_BASE: &str = "http://storefront.invalid";

pub(crate) fn session_cookie(name: &str, value: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{name}={encoded}; max-age={SESSION_COOKIE_MAX_AGE_SECS}; path=/; SameSite=Lax")
}

/// Looks `name` up in a `document.cookie` string.
pub(crate) fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| decode_cookie_component(value.trim()))
    })
}

fn decode_cookie_component(raw: &str) -> String {
    let query = format!("v={raw}");
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

pub(crate) fn tag_matches_filter(tag_name: &str, filter: &str) -> bool {
    tag_name
        .to_lowercase()
        .contains(&filter.trim().to_lowercase())
}

pub(crate) fn document_api_url(doc_id: &str) -> Option<String> {
    let mut url = Url::parse(URL_BASE).ok()?;
    url.path_segments_mut()
        .ok()?
        .clear()
        .extend(["api", "document", doc_id]);
    Some(url.path().to_string())
}

/// `current` with its `doc` query parameter set to `doc_id`; other parameters
/// are kept and the fragment is dropped.
pub(crate) fn doc_selection_url(current: &str, doc_id: &str) -> Option<String> {
    let mut url = Url::parse(URL_BASE).ok()?.join(current).ok()?;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "doc")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("doc", doc_id);
    Some(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
}

/// History entry to push once a document request settles. Failed loads keep
/// the current entry so back/forward never replays a broken selection.
pub(crate) fn document_history_url(current: &str, doc_id: &str, loaded: bool) -> Option<String> {
    if !loaded {
        return None;
    }
    doc_selection_url(current, doc_id)
}

/// Title shown in the document viewer: the served title, else the link text,
/// else the id.
pub(crate) fn document_title(served: &str, link_text: &str, doc_id: &str) -> String {
    [served, link_text, doc_id]
        .into_iter()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn is_unsafe_attribute(name: &str, value: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("on") || name == "srcdoc" {
        return true;
    }
    matches!(
        name.as_str(),
        "href" | "src" | "xlink:href" | "action" | "formaction"
    ) && is_script_url(value)
}

/// The value as a browser URL parser reads it: tab and newline removed
/// everywhere, C0 controls and spaces trimmed from both ends.
fn parsed_url_text(value: &str) -> String {
    let stripped: String = value
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    stripped
        .trim_matches(|c: char| c <= ' ')
        .to_ascii_lowercase()
}

fn is_script_url(value: &str) -> bool {
    let url = parsed_url_text(value);
    if url.starts_with("javascript:") || url.starts_with("vbscript:") {
        return true;
    }
    url.starts_with("data:") && (!url.starts_with("data:image/") || url.starts_with("data:image/svg"))
}

/// Clicks that land on a link or image inside a recommendation card keep
/// their own behaviour.
pub(crate) fn card_click_hits_control(target_tag: &str) -> bool {
    target_tag.eq_ignore_ascii_case("a") || target_tag.eq_ignore_ascii_case("img")
}
