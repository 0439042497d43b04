//! Client for Langflow flow run endpoints.

use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use storefront_client_core::protocol::{ChatEventKind, ChatSendRequest, ChatStreamEvent};
use thiserror::Error;
use tokio::sync::mpsc;

const API_KEY_HEADER: &str = "x-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum LangflowError {
    #[error("invalid flow url '{url}': {source}")]
    InvalidFlowUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Langflow request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Langflow responded with HTTP {status}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct LangflowClient {
    http: reqwest::Client,
    api_key: Option<String>,
    timeout: Duration,
}

impl LangflowClient {
    pub fn new(timeout: Duration, api_key: Option<String>) -> Result<Self, LangflowError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key,
            timeout,
        })
    }

    /// Runs the flow once and returns its JSON response unchanged.
    pub async fn run(&self, flow_url: &str, request: &ChatSendRequest) -> Result<Value, LangflowError> {
        let url = flow_run_url(flow_url, false)?;
        let response = self
            .request(url)
            .timeout(self.timeout)
            .json(&request.post_body())
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Streams a flow run, forwarding normalized events until a terminal event or the receiver goes away.
    ///
    /// The upstream request is dropped as soon as the receiver closes, even while
    /// Langflow is silent. A stream that ends without an `end` event is closed
    /// with a synthetic one.
    pub async fn stream(
        &self,
        flow_url: &str,
        request: &ChatSendRequest,
        events: mpsc::Sender<ChatStreamEvent>,
    ) -> Result<(), LangflowError> {
        let url = flow_run_url(flow_url, true)?;
        let response = tokio::select! {
            () = events.closed() => {
                receiver_gone();
                return Ok(());
            }
            response = self.request(url).json(&request.post_body()).send() => response?,
        };
        let response = ensure_success(response).await?;

        let mut body = response.bytes_stream();
        let mut decoder = NdjsonDecoder::default();
        loop {
            let chunk = tokio::select! {
                () = events.closed() => {
                    receiver_gone();
                    return Ok(());
                }
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            for event in decoder.push(&chunk?) {
                if forward(&events, event).await {
                    return Ok(());
                }
            }
        }
        for event in decoder.finish() {
            if forward(&events, event).await {
                return Ok(());
            }
        }
        let _ = events.send(ChatStreamEvent::end()).await;
        Ok(())
    }

    fn request(&self, url: url::Url) -> reqwest::RequestBuilder {
        let builder = self.http.post(url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }
}

fn receiver_gone() {
    tracing::debug!("chat stream receiver dropped; releasing upstream request");
}

/// Returns true when forwarding should stop.
async fn forward(events: &mpsc::Sender<ChatStreamEvent>, event: ChatStreamEvent) -> bool {
    let terminal = matches!(event.event, ChatEventKind::End | ChatEventKind::Error);
    if events.send(event).await.is_err() {
        receiver_gone();
        return true;
    }
    terminal
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LangflowError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LangflowError::Status {
        status: status.as_u16(),
        body,
    })
}

fn flow_run_url(flow_url: &str, stream: bool) -> Result<url::Url, LangflowError> {
    let mut url = url::Url::parse(flow_url).map_err(|source| LangflowError::InvalidFlowUrl {
        url: flow_url.to_string(),
        source,
    })?;
    if stream {
        url.query_pairs_mut().append_pair("stream", "true");
    }
    Ok(url)
}

/// Splits a byte stream into newline-delimited JSON events.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            events.extend(decode_line(&line));
        }
        events
    }

    pub fn finish(&mut self) -> Vec<ChatStreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest).into_iter().collect()
    }
}

fn decode_line(line: &[u8]) -> Option<ChatStreamEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(line) {
        Ok(value) => normalize_event(&value),
        Err(error) => {
            tracing::warn!(%error, "skipping undecodable Langflow stream line");
            None
        }
    }
}

/// Maps one Langflow stream event onto the chat stream contract.
pub fn normalize_event(value: &Value) -> Option<ChatStreamEvent> {
    let data = value.get("data");
    let text_at = |key: &str| {
        data.and_then(|data| data.get(key))
            .and_then(Value::as_str)
            .map(ToString::to_string)
    };

    match value.get("event").and_then(Value::as_str)? {
        "add_message" => {
            let sender = text_at("sender")
                .or_else(|| text_at("sender_name"))
                .unwrap_or_else(|| "Machine".to_string());
            Some(ChatStreamEvent::add_message(
                text_at("text").unwrap_or_default(),
                sender,
            ))
        }
        "token" => text_at("chunk")
            .or_else(|| text_at("token"))
            .or_else(|| value.get("token").and_then(Value::as_str).map(ToString::to_string))
            .map(ChatStreamEvent::token),
        "end" => Some(ChatStreamEvent::end()),
        "error" => Some(ChatStreamEvent::error(
            text_at("error")
                .or_else(|| text_at("text"))
                .unwrap_or_else(|| "Langflow reported an error".to_string()),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_langflow_event_kinds() {
        let message = normalize_event(&json!({
            "event": "add_message",
            "data": { "text": "Try the X200", "sender": "Machine", "id": "m1" }
        }))
        .expect("message");
        assert_eq!(message, ChatStreamEvent::add_message("Try the X200", "Machine"));

        let token = normalize_event(&json!({ "event": "token", "data": { "chunk": "Try", "id": "m1" } }))
            .expect("token");
        assert_eq!(token, ChatStreamEvent::token("Try"));

        assert_eq!(
            normalize_event(&json!({ "event": "end", "data": { "result": {} } })),
            Some(ChatStreamEvent::end())
        );
        assert_eq!(
            normalize_event(&json!({ "event": "error", "data": { "error": "flow crashed" } })),
            Some(ChatStreamEvent::error("flow crashed"))
        );
        assert_eq!(normalize_event(&json!({ "event": "vertices_sorted", "data": {} })), None);
        assert_eq!(normalize_event(&json!({ "data": {} })), None);
    }

    #[test]
    fn decoder_reassembles_lines_split_across_chunks() {
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push(br#"{"event":"token","data":{"chu"#).is_empty());
        let events = decoder.push(b"nk\":\"Hel\"}}\n\n{\"event\":\"token\",\"data\":{\"chunk\":\"lo\"}}\n");
        assert_eq!(
            events,
            [ChatStreamEvent::token("Hel"), ChatStreamEvent::token("lo")]
        );
        assert!(decoder.push(b"not json\n").is_empty());
        assert!(decoder.push(br#"{"event":"end"}"#).is_empty());
        assert_eq!(decoder.finish(), [ChatStreamEvent::end()]);
    }

    #[test]
    fn stream_url_gets_stream_flag() {
        let url = flow_run_url("http://flows.test/api/v1/run/abc?tweak=1", true).expect("url");
        assert_eq!(url.as_str(), "http://flows.test/api/v1/run/abc?tweak=1&stream=true");
        assert!(matches!(
            flow_run_url("not a url", false),
            Err(LangflowError::InvalidFlowUrl { .. })
        ));
    }
}
