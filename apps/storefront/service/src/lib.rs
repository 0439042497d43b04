use std::convert::Infallible;
use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::header::REFERER;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use storefront_client_core::protocol::{
    ChatSendRequest, ChatStatus, ChatStreamEvent, DEFAULT_CHAT_API_BASE,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api_envelope;
pub mod catalog;
pub mod config;
pub mod langflow;
pub mod web_maud;
pub mod web_partial;

use crate::api_envelope::{
    ApiErrorCode, chatbot_unavailable_error, error_response, upstream_error,
};
use crate::catalog::{Catalog, Product, SearchQuery};
use crate::config::Config;
use crate::langflow::{LangflowClient, LangflowError};
use crate::web_maud::{
    ChatWidgetView, HOME_TITLE, InitialDocument, PRODUCT_NOT_FOUND_TITLE, PageBody, ProductView,
    SEARCH_TITLE, SearchView, StorefrontPage, render_main_fragment, render_page,
};
use crate::web_partial::{classify_request, fragment_response, page_response, set_page_title_header};

const SERVICE_NAME: &str = "storefront-service";
const CHAT_WIDGET_TITLE: &str = "Product Assistant";
const CHAT_EVENT_BUFFER: usize = 64;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    catalog: Arc<Catalog>,
    langflow: LangflowClient,
    chat_widget: Option<ChatWidgetView>,
    started_at: SystemTime,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    products: usize,
    documents: usize,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    status: &'static str,
    static_dir: String,
}

pub fn build_router(config: Config, catalog: Catalog) -> Result<Router, LangflowError> {
    let langflow = LangflowClient::new(config.langflow_timeout, config.langflow_api_key.clone())?;
    let chat_widget = chat_widget_view(&config);
    let static_dir = config.static_dir.clone();
    let state = AppState {
        config: Arc::new(config),
        catalog: Arc::new(catalog),
        langflow,
        chat_widget,
        started_at: SystemTime::now(),
    };

    let chat_router = Router::new()
        .route("/:chatbot_type", post(chat_send))
        .route("/:chatbot_type/status", get(chat_status))
        .route("/:chatbot_type/stream", get(chat_stream));

    Ok(Router::new()
        .route("/", get(home_page))
        .route("/search", get(search_page))
        .route("/product/:product_id", get(product_page))
        .route("/product/sku/:sku", get(product_by_sku_page))
        .route("/api/document/:doc_id", get(document_api))
        .nest(DEFAULT_CHAT_API_BASE, chat_router)
        .route("/healthz", get(health))
        .route("/readyz", get(readiness))
        .nest_service("/assets", ServeDir::new(static_dir))
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        ))
}

fn chat_widget_view(config: &Config) -> Option<ChatWidgetView> {
    let chatbot_type = config.default_chatbot.as_ref()?;
    let mut widget_config = json!({
        "chatbotType": chatbot_type,
        "persistChat": true,
        "apiBase": DEFAULT_CHAT_API_BASE,
        "streaming": true,
    });
    if let Some(intro) = &config.chat_introductory_message {
        widget_config["introductoryMessage"] = json!(intro);
    }
    Some(ChatWidgetView {
        config_json: widget_config.to_string(),
        title: CHAT_WIDGET_TITLE.to_string(),
    })
}

fn render_storefront(
    state: &AppState,
    headers: &HeaderMap,
    status: StatusCode,
    title: String,
    path: String,
    body: PageBody<'_>,
) -> Response {
    let page = StorefrontPage {
        title,
        path,
        body,
        chat: state.chat_widget.clone(),
    };
    if classify_request(headers).is_partial {
        let mut response = fragment_response(render_main_fragment(&page), status);
        set_page_title_header(&mut response, &page.title);
        return response;
    }
    page_response(render_page(&page), status)
}

async fn home_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    render_storefront(
        &state,
        &headers,
        StatusCode::OK,
        HOME_TITLE.to_string(),
        "/".to_string(),
        PageBody::Home,
    )
}

async fn search_page(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let query = SearchQuery::from_query_string(raw_query.as_deref().unwrap_or_default());
    let results = state.catalog.search(&query);
    tracing::debug!(
        family = query.family.as_deref(),
        tags = query.tags.len(),
        results = results.products.len(),
        "catalog search"
    );
    let body = PageBody::Search(SearchView {
        query: &query,
        products: results.products,
        hierarchy: state.catalog.hierarchy(),
        display_tags: results.display_tags,
    });
    render_storefront(
        &state,
        &headers,
        StatusCode::OK,
        SEARCH_TITLE.to_string(),
        "/search".to_string(),
        body,
    )
}

async fn product_page(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let product = state.catalog.product(&product_id);
    product_response(&state, &headers, product, raw_query.as_deref())
}

async fn product_by_sku_page(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let product = state.catalog.product_by_sku(&sku);
    product_response(&state, &headers, product, raw_query.as_deref())
}

fn product_response(
    state: &AppState,
    headers: &HeaderMap,
    product: Option<&Product>,
    raw_query: Option<&str>,
) -> Response {
    let Some(product) = product else {
        return render_storefront(
            state,
            headers,
            StatusCode::NOT_FOUND,
            PRODUCT_NOT_FOUND_TITLE.to_string(),
            "/product".to_string(),
            PageBody::NotFound {
                message: "Product not found.".to_string(),
            },
        );
    };

    let documentation = state.catalog.documentation_for(product);
    let requested_doc = raw_query.and_then(|raw| {
        url::form_urlencoded::parse(raw.as_bytes())
            .find(|(key, _)| key == "doc")
            .map(|(_, value)| value.into_owned())
    });
    // Only documents attached to this product are pre-rendered.
    let initial_document = requested_doc
        .filter(|doc_id| documentation.iter().any(|link| &link.id == doc_id))
        .and_then(|doc_id| {
            let payload = state.catalog.document(&doc_id)?.to_payload();
            Some(InitialDocument {
                id: doc_id,
                payload,
            })
        });

    let body = PageBody::Product(ProductView {
        product,
        documentation,
        initial_document,
        back_to_search: search_referer(headers),
    });
    render_storefront(
        state,
        headers,
        StatusCode::OK,
        product.name.clone(),
        format!("/product/{}", product.id),
        body,
    )
}

/// Query suffix of the search page the request came from, if any.
fn search_referer(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(REFERER)?.to_str().ok()?;
    let uri: Uri = referer.parse().ok()?;
    if uri.path() != "/search" {
        return None;
    }
    Some(
        uri.query()
            .map(|query| format!("?{query}"))
            .unwrap_or_default(),
    )
}

async fn document_api(State(state): State<AppState>, Path(doc_id): Path<String>) -> Response {
    match state.catalog.document(&doc_id) {
        Some(document) => Json(document.to_payload()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Document not found" })),
        )
            .into_response(),
    }
}

async fn chat_status(
    State(state): State<AppState>,
    Path(chatbot_type): Path<String>,
) -> (StatusCode, Json<ChatStatus>) {
    if state.config.chatbots.contains_key(&chatbot_type) {
        return (StatusCode::OK, Json(ChatStatus::enabled()));
    }
    (
        StatusCode::NOT_FOUND,
        Json(ChatStatus::disabled(format!(
            "Chatbot type '{chatbot_type}' is not configured."
        ))),
    )
}

async fn chat_stream(
    State(state): State<AppState>,
    Path(chatbot_type): Path<String>,
    Query(request): Query<ChatSendRequest>,
) -> Response {
    let Some(flow_url) = state.config.chatbots.get(&chatbot_type).cloned() else {
        return chatbot_unavailable_error(&chatbot_type).into_response();
    };
    if request.input_value.trim().is_empty() {
        return error_response(ApiErrorCode::InvalidRequest, "input_value is required.")
            .into_response();
    }

    let (events, receiver) = mpsc::channel(CHAT_EVENT_BUFFER);
    let langflow = state.langflow.clone();
    tokio::spawn(async move {
        if let Err(error) = langflow.stream(&flow_url, &request, events.clone()).await {
            tracing::warn!(%chatbot_type, %error, "chat stream failed");
            let _ = events.send(ChatStreamEvent::error(error.to_string())).await;
        }
    });

    let stream = ReceiverStream::new(receiver).map(|event| Ok::<_, Infallible>(sse_event(&event)));
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn sse_event(event: &ChatStreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(error) => Event::default().data(
            json!({ "event": "error", "data": { "text": error.to_string() } }).to_string(),
        ),
    }
}

async fn chat_send(
    State(state): State<AppState>,
    Path(chatbot_type): Path<String>,
    Json(request): Json<ChatSendRequest>,
) -> Response {
    let Some(flow_url) = state.config.chatbots.get(&chatbot_type) else {
        return chatbot_unavailable_error(&chatbot_type).into_response();
    };
    match state.langflow.run(flow_url, &request).await {
        Ok(payload) => Json(payload).into_response(),
        Err(error) => {
            tracing::warn!(%chatbot_type, %error, "chat run failed");
            upstream_error(error.to_string()).into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = match state.started_at.elapsed() {
        Ok(duration) => duration.as_secs(),
        Err(_) => 0,
    };

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        products: state.catalog.product_count(),
        documents: state.catalog.document_count(),
    })
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let static_dir = state.config.static_dir.to_string_lossy().to_string();

    if state.config.static_dir.is_dir() {
        return (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                static_dir,
            }),
        );
    }

    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ReadinessResponse {
            status: "not_ready",
            static_dir,
        }),
    )
}

async fn not_found(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let path = uri.path();
    if path.starts_with("/api/") {
        return error_response(
            ApiErrorCode::NotFound,
            format!("Route '{path}' was not found."),
        )
        .into_response();
    }
    render_storefront(
        &state,
        &headers,
        StatusCode::NOT_FOUND,
        "Page Not Found".to_string(),
        path.to_string(),
        PageBody::NotFound {
            message: "The page you were looking for does not exist.".to_string(),
        },
    )
}
