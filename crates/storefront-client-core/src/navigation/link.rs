use url::Url;

/// A click on an anchor, as observed by the browser shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClick {
    pub button: i16,
    pub ctrl_key: bool,
    pub meta_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    /// Raw `href` attribute as written in the markup.
    pub href_attribute: Option<String>,
    /// Fully resolved `href` property.
    pub resolved_href: String,
    pub target: Option<String>,
    pub has_download: bool,
    pub bypass: bool,
    /// Origin of the current page, e.g. `https://shop.example.com`.
    pub page_origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    /// Prevent the default navigation and partially load this site-relative URL.
    Intercept(String),
    PassThrough,
}

pub fn classify_link_click(click: &LinkClick) -> LinkDecision {
    if click.button != 0 || click.ctrl_key || click.meta_key || click.shift_key || click.alt_key {
        return LinkDecision::PassThrough;
    }
    if click.bypass || click.has_download {
        return LinkDecision::PassThrough;
    }
    if let Some(target) = click.target.as_deref().map(str::trim)
        && !target.is_empty()
        && !target.eq_ignore_ascii_case("_self")
    {
        return LinkDecision::PassThrough;
    }

    let attribute = click.href_attribute.as_deref().unwrap_or_default().trim();
    if attribute.is_empty() || attribute.starts_with('#') {
        return LinkDecision::PassThrough;
    }

    match same_origin_path(&click.resolved_href, &click.page_origin) {
        Some(path) => LinkDecision::Intercept(path),
        None => LinkDecision::PassThrough,
    }
}

// Stands in for the page when its origin is unknown, so site-relative hrefs still resolve.
const FALLBACK_BASE: &str = "http://storefront.invalid/";

/// Reduces `href` to its path, query and fragment when it resolves to `origin`.
/// Links carrying credentials are never treated as internal.
pub fn same_origin_path(href: &str, origin: &str) -> Option<String> {
    let base = Url::parse(origin.trim())
        .ok()
        .filter(Url::has_host)
        .or_else(|| Url::parse(FALLBACK_BASE).ok())?;
    let target = base.join(href.trim()).ok()?;
    if target.origin() != base.origin()
        || !target.username().is_empty()
        || target.password().is_some()
    {
        return None;
    }

    let mut path = target.path().to_string();
    if let Some(query) = target.query() {
        path.push('?');
        path.push_str(query);
    }
    if let Some(fragment) = target.fragment() {
        path.push('#');
        path.push_str(fragment);
    }
    Some(path)
}

/// Path component of a site-relative URL, without query or fragment.
pub fn path_of(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
