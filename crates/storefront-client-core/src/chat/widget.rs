//! Chat session state machine. Every user action, network result and stream
//! event goes through [`ChatWidgetState`], which answers with the
//! [`ChatEffect`]s the host must apply. No I/O happens here.

use serde_json::Value;
use tracing::{debug, warn};

use crate::chat::config::{ChatbotConfig, ChatbotEndpoints};
use crate::chat::identity::SessionIdentity;
use crate::chat::message::{ChatLog, ChatMessage};
use crate::chat::platform::TransportError;
use crate::protocol::{ChatEventKind, ChatSendRequest, ChatStatus, ChatStreamEvent, extract_reply};

pub const NO_REPLY_APOLOGY: &str = "I'm sorry, I didn't get a response. Please try again.";
pub const CONNECTION_ERROR_PREFIX: &str = "Error: Could not connect to the bot server. ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEffect {
    RenderLog,
    AppendMessage(ChatMessage),
    ShowPlaceholder(u64),
    UpdatePlaceholder { exchange_id: u64, text: String },
    ResolvePlaceholder { exchange_id: u64, message: ChatMessage },
    CloseChannel(u64),
    PersistLog,
    /// Drops a stored log the widget must not keep.
    DiscardLog,
    PersistSession,
    ClearInput,
    SetInputEnabled(bool),
    SetToggleVisible(bool),
    SetWindowVisible(bool),
    ScrollToLatest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPlan {
    pub exchange_id: u64,
    pub request: ChatSendRequest,
    pub effects: Vec<ChatEffect>,
}

/// The single in-flight request of a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Exchange {
    id: u64,
    accumulated: String,
}

#[derive(Debug, Clone)]
pub struct ChatWidgetState {
    config: ChatbotConfig,
    endpoints: ChatbotEndpoints,
    log: ChatLog,
    session: SessionIdentity,
    availability: Availability,
    is_open: bool,
    exchange: Option<Exchange>,
    next_exchange_id: u64,
}

impl ChatWidgetState {
    /// Builds the initial state from whatever the host had persisted.
    pub fn restore(
        config: ChatbotConfig,
        stored_log: Option<&str>,
        stored_session: Option<&str>,
    ) -> (Self, Vec<ChatEffect>) {
        let endpoints = config.endpoints();
        let mut effects = Vec::new();

        let log = match stored_log.filter(|_| config.persist_chat) {
            Some(raw) => match ChatLog::decode(raw, &config.introductory_message) {
                Ok(log) => log,
                Err(error) => {
                    warn!(
                        chatbot_type = %config.chatbot_type,
                        %error,
                        "discarding unreadable chat log"
                    );
                    effects.push(ChatEffect::PersistLog);
                    ChatLog::new(config.introductory_message.clone())
                }
            },
            None => ChatLog::new(config.introductory_message.clone()),
        };
        if !config.persist_chat {
            effects.push(ChatEffect::DiscardLog);
        }

        let session = stored_session
            .and_then(SessionIdentity::parse)
            .unwrap_or_else(SessionIdentity::mint);
        effects.push(ChatEffect::PersistSession);

        let state = Self {
            config,
            endpoints,
            log,
            session,
            availability: Availability::Unknown,
            is_open: false,
            exchange: None,
            next_exchange_id: 1,
        };
        effects.push(ChatEffect::RenderLog);
        effects.push(ChatEffect::SetInputEnabled(false));
        effects.extend(state.visibility_effects());
        (state, effects)
    }

    pub fn config(&self) -> &ChatbotConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &ChatbotEndpoints {
        &self.endpoints
    }

    pub fn log(&self) -> &ChatLog {
        &self.log
    }

    pub fn session(&self) -> &SessionIdentity {
        &self.session
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn active_exchange(&self) -> Option<u64> {
        self.exchange.as_ref().map(|exchange| exchange.id)
    }

    pub fn is_current(&self, exchange_id: u64) -> bool {
        self.active_exchange() == Some(exchange_id)
    }

    pub fn apply_status(&mut self, status: Result<ChatStatus, TransportError>) -> Vec<ChatEffect> {
        let mut effects = Vec::new();
        match status {
            Ok(status) if status.enabled => {
                self.availability = Availability::Enabled;
                if self.log.replace_introductory(&self.config.introductory_message) {
                    if self.config.persist_chat {
                        effects.push(ChatEffect::PersistLog);
                    }
                    effects.push(ChatEffect::RenderLog);
                }
                effects.push(ChatEffect::SetInputEnabled(true));
            }
            Ok(status) => {
                debug!(
                    chatbot_type = %self.config.chatbot_type,
                    message = status.message.as_deref().unwrap_or_default(),
                    "chatbot disabled by server"
                );
                self.availability = Availability::Disabled;
                effects.push(ChatEffect::SetInputEnabled(false));
            }
            Err(TransportError::NotFound) => {
                warn!(chatbot_type = %self.config.chatbot_type, "chatbot type is not registered");
                self.availability = Availability::Disabled;
                effects.push(ChatEffect::SetInputEnabled(false));
            }
            Err(error) => {
                warn!(chatbot_type = %self.config.chatbot_type, %error, "chatbot status check failed");
                self.availability = Availability::Disabled;
                effects.push(ChatEffect::SetInputEnabled(false));
            }
        }
        if self.availability == Availability::Disabled {
            effects.extend(self.cancel());
        }
        effects.extend(self.visibility_effects());
        effects
    }

    /// Sets the open flag whatever the availability; only visibility depends on it.
    pub fn open(&mut self) -> Vec<ChatEffect> {
        self.is_open = true;
        let mut effects = self.visibility_effects();
        effects.push(ChatEffect::ScrollToLatest);
        effects
    }

    pub fn close(&mut self) -> Vec<ChatEffect> {
        self.is_open = false;
        let mut effects = self.cancel();
        effects.extend(self.visibility_effects());
        effects
    }

    /// Re-applies visibility after the page content was swapped.
    pub fn reassert_visibility(&self) -> Vec<ChatEffect> {
        self.visibility_effects()
    }

    /// Starts an exchange for `input`, superseding any exchange still open.
    pub fn begin_send(&mut self, input: &str) -> Option<SendPlan> {
        let text = input.trim();
        if text.is_empty() || self.availability != Availability::Enabled {
            return None;
        }

        let mut effects = self.cancel();

        let message = ChatMessage::user(text);
        self.log.push(message.clone());
        effects.push(ChatEffect::AppendMessage(message));
        effects.push(ChatEffect::ClearInput);
        if self.config.persist_chat {
            effects.push(ChatEffect::PersistLog);
        }
        effects.push(ChatEffect::PersistSession);

        let exchange_id = self.next_exchange_id;
        self.next_exchange_id += 1;
        self.exchange = Some(Exchange {
            id: exchange_id,
            accumulated: String::new(),
        });
        effects.push(ChatEffect::ShowPlaceholder(exchange_id));
        effects.push(ChatEffect::ScrollToLatest);

        Some(SendPlan {
            exchange_id,
            request: ChatSendRequest {
                input_value: text.to_string(),
                session_id: self.session.as_str().to_string(),
            },
            effects,
        })
    }

    pub fn apply_event(&mut self, exchange_id: u64, event: &ChatStreamEvent) -> Vec<ChatEffect> {
        if !self.is_current(exchange_id) || event.is_from_human() {
            return Vec::new();
        }
        match event.event {
            ChatEventKind::AddMessage => {
                let text = event.text().unwrap_or_default().to_string();
                self.update_accumulated(exchange_id, |accumulated| *accumulated = text)
            }
            ChatEventKind::Token => {
                let Some(token) = event.token_text() else {
                    return Vec::new();
                };
                let token = token.to_string();
                self.update_accumulated(exchange_id, |accumulated| accumulated.push_str(&token))
            }
            ChatEventKind::End => self.resolve_exchange(None),
            ChatEventKind::Error => {
                let detail = event
                    .text()
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or("the bot server reported an error");
                self.fail_exchange(exchange_id, &TransportError::Backend(detail.to_string()))
            }
            ChatEventKind::Unknown => Vec::new(),
        }
    }

    /// The stream closed without an `end` event; commits what arrived.
    pub fn finish_stream(&mut self, exchange_id: u64) -> Vec<ChatEffect> {
        if !self.is_current(exchange_id) {
            return Vec::new();
        }
        self.resolve_exchange(None)
    }

    pub fn fail_exchange(&mut self, exchange_id: u64, error: &TransportError) -> Vec<ChatEffect> {
        if !self.is_current(exchange_id) {
            return Vec::new();
        }
        warn!(chatbot_type = %self.config.chatbot_type, %error, "chat exchange failed");
        let message = ChatMessage::bot(format!("{CONNECTION_ERROR_PREFIX}{}", error.detail()));
        self.resolve_exchange(Some(message))
    }

    /// Completes a non-streaming exchange with the raw backend payload.
    pub fn complete_post(&mut self, exchange_id: u64, payload: &Value) -> Vec<ChatEffect> {
        if !self.is_current(exchange_id) {
            return Vec::new();
        }
        let reply = extract_reply(payload);
        let mut effects = Vec::new();
        if let Some(session) = reply.session_id.as_deref().and_then(SessionIdentity::parse)
            && session != self.session
        {
            self.session = session;
            effects.push(ChatEffect::PersistSession);
        }
        let message = if reply.is_rich_content {
            ChatMessage::bot_rich(reply.text)
        } else {
            ChatMessage::bot(reply.text)
        };
        effects.extend(self.resolve_exchange(Some(message)));
        effects
    }

    /// Closes the open exchange, if any. Resolves it like a terminal event.
    pub fn cancel(&mut self) -> Vec<ChatEffect> {
        let Some(exchange_id) = self.active_exchange() else {
            return Vec::new();
        };
        let mut effects = vec![ChatEffect::CloseChannel(exchange_id)];
        effects.extend(self.resolve_exchange(None));
        effects
    }

    pub fn clear_history(&mut self, confirmed: bool) -> Vec<ChatEffect> {
        if !confirmed {
            return Vec::new();
        }
        let mut effects = self.cancel();
        self.log.reset(self.config.introductory_message.clone());
        self.session = SessionIdentity::mint_distinct_from(Some(&self.session));
        effects.push(if self.config.persist_chat {
            ChatEffect::PersistLog
        } else {
            ChatEffect::DiscardLog
        });
        effects.push(ChatEffect::PersistSession);
        effects.push(ChatEffect::RenderLog);
        effects.push(ChatEffect::ScrollToLatest);
        effects
    }

    fn update_accumulated(
        &mut self,
        exchange_id: u64,
        update: impl FnOnce(&mut String),
    ) -> Vec<ChatEffect> {
        let Some(exchange) = self.exchange.as_mut() else {
            return Vec::new();
        };
        update(&mut exchange.accumulated);
        vec![
            ChatEffect::UpdatePlaceholder {
                exchange_id,
                text: exchange.accumulated.clone(),
            },
            ChatEffect::ScrollToLatest,
        ]
    }

    /// Ends the current exchange with `outcome`, or with the accumulated text
    /// (the apology when nothing arrived). The only place an exchange is dropped.
    fn resolve_exchange(&mut self, outcome: Option<ChatMessage>) -> Vec<ChatEffect> {
        let Some(exchange) = self.exchange.take() else {
            return Vec::new();
        };
        let message = outcome.unwrap_or_else(|| {
            if exchange.accumulated.trim().is_empty() {
                ChatMessage::bot(NO_REPLY_APOLOGY)
            } else {
                ChatMessage::bot_rich(exchange.accumulated)
            }
        });
        self.log.push(message.clone());

        let mut effects = vec![ChatEffect::ResolvePlaceholder {
            exchange_id: exchange.id,
            message,
        }];
        if self.config.persist_chat {
            effects.push(ChatEffect::PersistLog);
        }
        effects.push(ChatEffect::ScrollToLatest);
        effects
    }

    fn visibility_effects(&self) -> Vec<ChatEffect> {
        let enabled = self.availability == Availability::Enabled;
        vec![
            ChatEffect::SetToggleVisible(enabled && !self.is_open),
            ChatEffect::SetWindowVisible(enabled && self.is_open),
        ]
    }
}
