use maud::{DOCTYPE, Markup, PreEscaped, html};
use storefront_client_core::protocol::DocumentPayload;

use crate::catalog::{DisplayTag, DocumentLink, FamilyNode, Product, SearchQuery};

pub const HOME_TITLE: &str = "Welcome";
pub const SEARCH_TITLE: &str = "Search Products";
pub const PRODUCT_NOT_FOUND_TITLE: &str = "Product Not Found";

const WEB_SHELL_MODULE_PATH: &str = "/assets/storefront_web_shell.js";
const PLACEHOLDER_IMAGE_PATH: &str = "/assets/images/placeholder.svg";

#[derive(Debug, Clone)]
pub struct ChatWidgetView {
    /// Serialized client configuration placed on the widget root.
    pub config_json: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct SearchView<'a> {
    pub query: &'a SearchQuery,
    pub products: Vec<&'a Product>,
    pub hierarchy: &'a [FamilyNode],
    pub display_tags: Vec<DisplayTag>,
}

#[derive(Debug, Clone)]
pub struct InitialDocument {
    pub id: String,
    pub payload: DocumentPayload,
}

#[derive(Debug, Clone)]
pub struct ProductView<'a> {
    pub product: &'a Product,
    pub documentation: Vec<DocumentLink>,
    pub initial_document: Option<InitialDocument>,
    /// Query string of the search the visitor came from, when known.
    pub back_to_search: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PageBody<'a> {
    Home,
    Search(SearchView<'a>),
    Product(ProductView<'a>),
    NotFound { message: String },
}

#[derive(Debug, Clone)]
pub struct StorefrontPage<'a> {
    pub title: String,
    pub path: String,
    pub body: PageBody<'a>,
    pub chat: Option<ChatWidgetView>,
}

pub fn render_page(page: &StorefrontPage<'_>) -> String {
    let markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (page.title) }
                style { (PreEscaped(styles())) }
                script type="module" {
                    (PreEscaped(format!(
                        "import init from '{WEB_SHELL_MODULE_PATH}'; init().catch((error) => console.error(error));"
                    )))
                }
            }
            body {
                (topbar(&page.path))
                main id="main-content" class="sf-main" {
                    (render_main_fragment_markup(page))
                }
                @if let Some(chat) = &page.chat {
                    (chat_widget(chat))
                }
            }
        }
    };

    markup.into_string()
}

pub fn render_main_fragment(page: &StorefrontPage<'_>) -> String {
    render_main_fragment_markup(page).into_string()
}

fn topbar(path: &str) -> Markup {
    let nav = [("/", "Home"), ("/search", SEARCH_TITLE)];

    html! {
        header class="sf-topbar" {
            a class="sf-brand" href="/" { "Storefront" }
            nav class="sf-nav" {
                @for (href, label) in nav {
                    @let active = nav_active(path, href);
                    a class={(if active { "sf-nav-link active" } else { "sf-nav-link" })} href=(href) { (label) }
                }
            }
        }
    }
}

fn nav_active(path: &str, href: &str) -> bool {
    if href == "/" {
        return path == "/";
    }
    path == href || path.starts_with(&format!("{href}/"))
}

fn render_main_fragment_markup(page: &StorefrontPage<'_>) -> Markup {
    match &page.body {
        PageBody::Home => home(),
        PageBody::Search(view) => search(view),
        PageBody::Product(view) => product_detail(view),
        PageBody::NotFound { message } => html! {
            section class="sf-card sf-not-found" {
                h1 { (page.title) }
                p { (message) }
                a href="/search" { "Browse all products" }
            }
        },
    }
}

fn home() -> Markup {
    html! {
        section class="sf-hero" {
            h1 { "Find the right tool for the job" }
            p { "Browse the catalog by family, narrow it down with tags, or ask the Product Assistant for a recommendation." }
            form class="sf-hero-search" method="get" action="/search" {
                input type="search" name="q" placeholder="What are you working on?" aria-label="Search products";
                button type="submit" { "Search" }
            }
        }
    }
}

fn search(view: &SearchView<'_>) -> Markup {
    let query = view.query;
    html! {
        div class="sf-search" {
            button id="mobile-menu-toggle" class="sf-menu-toggle" type="button" aria-label="Toggle filters" { "Filters" }
            aside id="sidebar" class="sf-sidebar" {
                nav class="hierarchy-filter" {
                    ul {
                        li class="nav-item" {
                            a href="/search" class={(if query.family.is_none() { "active" } else { "" })} { "All products" }
                        }
                        @for node in view.hierarchy {
                            @let family_active = query.family.as_deref() == Some(node.family.as_str());
                            li class={(if family_active { "nav-item dropdown active" } else { "nav-item dropdown" })} {
                                a class="dropbtn" href={ "/search?" (family_query(&node.family, None)) } data-bypass-background-nav { (node.family) }
                                div class="dropdown-content" {
                                    a href={ "/search?" (family_query(&node.family, None)) } { "All " (node.family) }
                                    @for product_type in &node.product_types {
                                        a href={ "/search?" (family_query(&node.family, Some(product_type))) } { (product_type) }
                                    }
                                }
                            }
                        }
                    }
                }
                div class="available-tags" {
                    h3 { "Tags" }
                    input id="tagSearchInput" type="search" placeholder="Filter tags" aria-label="Filter tags";
                    ul {
                        @for entry in &view.display_tags {
                            @let selected = query.tags.contains(&entry.tag);
                            li data-tag-name=(entry.tag.to_lowercase()) class={(if selected { "selected" } else { "" })} {
                                a class="tag-link" href={ "/search?" (query.with_tag_toggled(&entry.tag)) } {
                                    (entry.tag) " (" (entry.dynamic_count) ")"
                                }
                            }
                        }
                    }
                }
            }
            section id="main-product-area" class="sf-results" {
                h1 { (SEARCH_TITLE) }
                form class="sf-search-form" method="get" action="/search" {
                    @if let Some(family) = &query.family {
                        input type="hidden" name="family" value=(family);
                        @if let Some(product_type) = &query.product_type {
                            input type="hidden" name="type" value=(product_type);
                        }
                    }
                    @for tag in &query.tags {
                        input type="hidden" name="tag" value=(tag);
                    }
                    input type="search" name="q" value=[query.q.as_deref()] placeholder="Describe what you need" aria-label="Search products";
                    button type="submit" { "Search" }
                }
                @if view.products.is_empty() {
                    p class="sf-empty" { "No products match these filters." }
                } @else {
                    p class="sf-result-count" { (view.products.len()) " products" }
                    div class="product-grid" {
                        @for product in &view.products {
                            (product_card(product))
                        }
                    }
                }
            }
        }
    }
}

fn product_card(product: &Product) -> Markup {
    let href = format!("/product/{}", product.id);
    html! {
        article class="product-card product-card-link" data-href=(href) {
            img src=(product.image_url.as_deref().unwrap_or(PLACEHOLDER_IMAGE_PATH)) alt=(product.name) loading="lazy";
            h3 { a href=(href) { (product.name) } }
            @if let Some(family) = &product.family {
                p class="sf-card-family" {
                    (family)
                    @if let Some(product_type) = &product.product_type {
                        " / " (product_type)
                    }
                }
            }
            @if !product.tags.is_empty() {
                ul class="sf-card-tags" {
                    @for tag in &product.tags {
                        li { a class="tag-link" href={ "/search?" (tag_query(tag)) } { (tag) } }
                    }
                }
            }
        }
    }
}

fn product_detail(view: &ProductView<'_>) -> Markup {
    let product = view.product;
    let initial_id = view
        .initial_document
        .as_ref()
        .map(|document| document.id.as_str());
    html! {
        div class="sf-product" {
            @if let Some(back) = &view.back_to_search {
                a class="sf-back-link" href={ "/search" (back) } { "Back to search results" }
            }
            section class="sf-product-summary" {
                img class="product-detail-image"
                    src=(product.image_url.as_deref().unwrap_or(PLACEHOLDER_IMAGE_PATH))
                    alt=(product.name);
                div class="sf-product-copy" {
                    h1 { (product.name) }
                    @if let Some(sku) = &product.sku {
                        p class="sf-sku" { "SKU: " (sku) }
                    }
                    @if let Some(description) = &product.description {
                        p { (description) }
                    }
                    @if !product.tags.is_empty() {
                        ul class="sf-card-tags" {
                            @for tag in &product.tags {
                                li { a class="tag-link" href={ "/search?" (tag_query(tag)) } { (tag) } }
                            }
                        }
                    }
                }
            }
            section class="sf-product-docs" {
                div class="product-documentation-links" {
                    h2 { "Documentation" }
                    @if view.documentation.is_empty() {
                        p { "No documentation available." }
                    } @else {
                        ul {
                            @for link in &view.documentation {
                                @let active = initial_id == Some(link.id.as_str());
                                li {
                                    a class={(if active { "doc-link active" } else { "doc-link" })}
                                        href={ "/product/" (product.id) "?doc=" (link.id) }
                                        data-doc-id=(link.id)
                                        data-bypass-background-nav {
                                        (link.title)
                                    }
                                }
                            }
                        }
                    }
                }
                div class="product-detail-doc-display" data-initial-doc-id=[initial_id] {
                    @match &view.initial_document {
                        Some(document) => {
                            h2 id="docViewerTitle" { (document.payload.title) }
                            div id="docViewerContent" { (PreEscaped(&document.payload.html_content)) }
                        }
                        None => {
                            h2 id="docViewerTitle" hidden { "Select a document" }
                            div id="docViewerContent" { p { "Select a document from the list to view its content." } }
                        }
                    }
                }
            }
            div id="imageModal" class="sf-modal" hidden {
                button id="imageModalCloseBtn" class="sf-modal-close" type="button" aria-label="Close" { "×" }
                img id="imageModalContent" class="sf-modal-image" alt="";
                p id="imageModalCaption" {}
            }
        }
    }
}

fn chat_widget(chat: &ChatWidgetView) -> Markup {
    html! {
        div id="chatbot-root" class="sf-chat" data-chatbot-config=(chat.config_json) {
            button id="chat-toggle" class="sf-chat-toggle" type="button" hidden aria-label="Open chat" { "Chat" }
            div id="chat-widget" class="sf-chat-window" hidden {
                div class="sf-chat-header" {
                    span { (chat.title) }
                    button id="clear-chat-button-header" type="button" title="Clear chat history" { "Clear" }
                    button id="minimize-chat" type="button" aria-label="Close chat" { "×" }
                }
                div id="chat-messages" class="sf-chat-messages" {}
                form id="chat-form" class="sf-chat-input" {
                    input id="chat-input-text" type="text" autocomplete="off" placeholder="Ask about our products..." disabled;
                    button id="chat-send-button" type="submit" disabled { "Send" }
                }
            }
        }
    }
}

fn family_query(family: &str, product_type: Option<&str>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer.append_pair("family", family);
    if let Some(product_type) = product_type {
        serializer.append_pair("type", product_type);
    }
    serializer.finish()
}

fn tag_query(tag: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("tag", tag)
        .finish()
}

fn styles() -> &'static str {
    r#"
:root { --sf-ink: #1d2430; --sf-muted: #5c6675; --sf-accent: #0b6bcb; --sf-line: #dde2ea; --sf-bg: #f6f7f9; }
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, sans-serif; color: var(--sf-ink); background: var(--sf-bg); }
a { color: var(--sf-accent); }
.sf-topbar { display: flex; align-items: center; gap: 2rem; padding: 0.75rem 1.5rem; background: #fff; border-bottom: 1px solid var(--sf-line); }
.sf-brand { font-weight: 700; text-decoration: none; color: var(--sf-ink); }
.sf-nav { display: flex; gap: 1rem; }
.sf-nav-link { text-decoration: none; color: var(--sf-muted); }
.sf-nav-link.active { color: var(--sf-ink); font-weight: 600; }
.sf-main { max-width: 1200px; margin: 0 auto; padding: 1.5rem; }
.sf-hero { padding: 3rem 0; text-align: center; }
.sf-hero-search, .sf-search-form { display: flex; gap: 0.5rem; justify-content: center; margin: 1rem 0; }
.sf-search { display: grid; grid-template-columns: 260px 1fr; gap: 1.5rem; }
.sf-menu-toggle { display: none; }
.sf-sidebar ul { list-style: none; padding: 0; margin: 0; }
.hierarchy-filter .dropdown-content { display: none; padding-left: 1rem; }
.hierarchy-filter .dropdown-content a { display: block; }
.hierarchy-filter .nav-item.active .dropdown-content { display: block; }
.available-tags li.selected a { font-weight: 700; }
.product-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 1rem; }
.product-card { background: #fff; border: 1px solid var(--sf-line); border-radius: 8px; padding: 1rem; cursor: pointer; }
.product-card img { width: 100%; aspect-ratio: 4 / 3; object-fit: contain; }
.sf-card-tags { display: flex; flex-wrap: wrap; gap: 0.25rem; list-style: none; padding: 0; }
.sf-card-tags a { font-size: 0.8rem; padding: 0.1rem 0.4rem; border: 1px solid var(--sf-line); border-radius: 999px; text-decoration: none; }
.sf-product-summary { display: grid; grid-template-columns: minmax(200px, 360px) 1fr; gap: 1.5rem; }
.product-detail-image { width: 100%; cursor: zoom-in; }
.sf-product-docs { display: grid; grid-template-columns: 260px 1fr; gap: 1.5rem; margin-top: 2rem; }
.doc-link.active { font-weight: 700; }
.product-detail-doc-display { background: #fff; border: 1px solid var(--sf-line); padding: 1rem; border-radius: 8px; }
.sf-modal { position: fixed; inset: 0; background: rgba(0, 0, 0, 0.8); display: flex; flex-direction: column; align-items: center; justify-content: center; }
.sf-modal[hidden] { display: none; }
.sf-modal-image { max-width: 90vw; max-height: 80vh; }
.sf-modal-close, .sf-modal p { color: #fff; }
.sf-chat-toggle { position: fixed; right: 1.5rem; bottom: 1.5rem; border-radius: 999px; padding: 0.75rem 1.25rem; }
.sf-chat-window { position: fixed; right: 1.5rem; bottom: 1.5rem; width: 360px; max-height: 70vh; display: flex; flex-direction: column; background: #fff; border: 1px solid var(--sf-line); border-radius: 12px; }
.sf-chat-window[hidden], .sf-chat-toggle[hidden] { display: none; }
.sf-chat-header { display: flex; gap: 0.5rem; align-items: center; padding: 0.5rem 0.75rem; border-bottom: 1px solid var(--sf-line); }
.sf-chat-header span { flex: 1; font-weight: 600; }
.sf-chat-messages { flex: 1; overflow-y: auto; padding: 0.75rem; }
.chat-message { margin: 0.5rem 0; padding: 0.5rem 0.75rem; border-radius: 8px; white-space: pre-wrap; }
.chat-message.user { background: #e6f0fb; margin-left: 2rem; }
.chat-message.bot { background: #f1f2f4; margin-right: 2rem; }
.chat-message.thinking-indicator { color: var(--sf-muted); font-style: italic; }
.sf-chat-input { display: flex; gap: 0.5rem; padding: 0.5rem; border-top: 1px solid var(--sf-line); }
.sf-chat-input input { flex: 1; }
@media (max-width: 800px) {
  .sf-search, .sf-product-summary, .sf-product-docs { grid-template-columns: 1fr; }
  .sf-menu-toggle { display: inline-block; }
  .sf-sidebar { display: none; }
  .sf-sidebar.sidebar-visible { display: block; }
}
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_client_core::protocol::BYPASS_NAVIGATION_ATTRIBUTE;

    fn page(body: PageBody<'_>, chat: Option<ChatWidgetView>) -> StorefrontPage<'_> {
        StorefrontPage {
            title: HOME_TITLE.to_string(),
            path: "/".to_string(),
            body,
            chat,
        }
    }

    #[test]
    fn full_page_wraps_fragment_with_navigation_and_chat_widget() {
        let chat = ChatWidgetView {
            config_json: r#"{"chatbotType":"product-assistant"}"#.to_string(),
            title: "Product Assistant".to_string(),
        };
        let html = render_page(&page(PageBody::Home, Some(chat)));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Welcome</title>"));
        assert!(html.contains(r#"<main id="main-content" class="sf-main">"#));
        assert!(html.contains(">Search Products</a>"));
        assert!(html.contains(
            r#"data-chatbot-config="{&quot;chatbotType&quot;:&quot;product-assistant&quot;}""#
        ));
    }

    #[test]
    fn fragment_has_no_layout_chrome() {
        let fragment = render_main_fragment(&page(PageBody::Home, None));
        assert!(!fragment.contains("<html"));
        assert!(!fragment.contains("sf-topbar"));
        assert!(fragment.contains("sf-hero"));
    }

    #[test]
    fn document_links_bypass_background_navigation() {
        let product = Product {
            id: "p1".to_string(),
            name: "Cordless Drill X200".to_string(),
            sku: None,
            family: None,
            product_type: None,
            tags: Vec::new(),
            description: None,
            image_url: None,
            documentation_ids: vec!["d1".to_string()],
        };
        let view = ProductView {
            product: &product,
            documentation: vec![DocumentLink {
                id: "d1".to_string(),
                title: "User Manual".to_string(),
            }],
            initial_document: Some(InitialDocument {
                id: "d1".to_string(),
                payload: DocumentPayload {
                    title: "User Manual".to_string(),
                    html_content: "<h1>Setup</h1>".to_string(),
                },
            }),
            back_to_search: None,
        };
        let fragment = render_main_fragment(&page(PageBody::Product(view), None));
        assert!(fragment.contains(BYPASS_NAVIGATION_ATTRIBUTE));
        assert!(fragment.contains(r#"class="doc-link active""#));
        assert!(fragment.contains(r#"data-initial-doc-id="d1""#));
        assert!(fragment.contains("<div id=\"docViewerContent\"><h1>Setup</h1></div>"));
    }
}
