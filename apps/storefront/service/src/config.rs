use std::collections::BTreeMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_STATIC_DIR: &str = "apps/storefront/service/static";
const DEFAULT_PRODUCTS_PATH: &str = "apps/storefront/service/data/products.jsonl";
const DEFAULT_DOCUMENTS_PATH: &str = "apps/storefront/service/data/documents.jsonl";
const DEFAULT_CHATBOT_TYPE: &str = "product-assistant";
const DEFAULT_LANGFLOW_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub log_format: LogFormat,
    pub static_dir: PathBuf,
    pub products_path: PathBuf,
    pub documents_path: PathBuf,
    /// Chatbot type to Langflow flow run URL.
    pub chatbots: BTreeMap<String, String>,
    pub langflow_api_key: Option<String>,
    pub langflow_timeout: Duration,
    /// Chatbot embedded in the page layout, if any is registered.
    pub default_chatbot: Option<String>,
    pub chat_introductory_message: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid STOREFRONT_BIND_ADDR value '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid PORT value '{value}': {source}")]
    InvalidPort {
        value: String,
        source: std::num::ParseIntError,
    },
    #[error("invalid STOREFRONT_CHATBOTS entry '{entry}': expected type=url")]
    InvalidChatbotEntry { entry: String },
    #[error("invalid chatbot type '{value}': only letters, digits, '-' and '_' are allowed")]
    InvalidChatbotType { value: String },
    #[error("invalid STOREFRONT_LANGFLOW_TIMEOUT_MS value '{value}': {source}")]
    InvalidTimeout {
        value: String,
        source: std::num::ParseIntError,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = match (var("STOREFRONT_BIND_ADDR"), var("PORT")) {
            (Some(raw), _) => raw
                .parse()
                .map_err(|source| ConfigError::InvalidBindAddr { value: raw, source })?,
            (None, Some(port)) => {
                let parsed: u16 = port
                    .parse()
                    .map_err(|source| ConfigError::InvalidPort {
                        value: port.clone(),
                        source,
                    })?;
                SocketAddr::from(([0, 0, 0, 0], parsed))
            }
            (None, None) => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|source| ConfigError::InvalidBindAddr {
                    value: DEFAULT_BIND_ADDR.to_string(),
                    source,
                })?,
        };

        let log_filter = var("STOREFRONT_LOG_FILTER")
            .or_else(|| var("LOG_LEVEL"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_format = match var("STOREFRONT_LOG_FORMAT") {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let static_dir = var("STOREFRONT_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));
        let products_path = var("STOREFRONT_PRODUCTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PRODUCTS_PATH));
        let documents_path = var("STOREFRONT_DOCUMENTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENTS_PATH));

        let mut chatbots = match var("STOREFRONT_CHATBOTS") {
            Some(raw) => parse_chatbots(&raw)?,
            None => BTreeMap::new(),
        };
        if let Some(url) = var("LANGFLOW_PRODUCT_ASSISTANT_ENDPOINT") {
            chatbots
                .entry(DEFAULT_CHATBOT_TYPE.to_string())
                .or_insert(url);
        }

        let langflow_timeout = match var("STOREFRONT_LANGFLOW_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse()
                    .map_err(|source| ConfigError::InvalidTimeout { value: raw, source })?,
            ),
            None => Duration::from_millis(DEFAULT_LANGFLOW_TIMEOUT_MS),
        };

        let default_chatbot = var("STOREFRONT_DEFAULT_CHATBOT")
            .or_else(|| {
                chatbots
                    .contains_key(DEFAULT_CHATBOT_TYPE)
                    .then(|| DEFAULT_CHATBOT_TYPE.to_string())
            })
            .or_else(|| chatbots.keys().next().cloned());

        Ok(Self {
            bind_addr,
            log_filter,
            log_format,
            static_dir,
            products_path,
            documents_path,
            chatbots,
            langflow_api_key: var("LANGFLOW_API_KEY"),
            langflow_timeout,
            default_chatbot,
            chat_introductory_message: var("STOREFRONT_CHAT_INTRO"),
        })
    }

    pub fn for_tests(static_dir: PathBuf) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_filter: "debug".to_string(),
            log_format: LogFormat::Text,
            products_path: static_dir.join("products.jsonl"),
            documents_path: static_dir.join("documents.jsonl"),
            static_dir,
            chatbots: BTreeMap::new(),
            langflow_api_key: None,
            langflow_timeout: Duration::from_secs(5),
            default_chatbot: None,
            chat_introductory_message: None,
        }
    }
}

fn parse_chatbots(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut chatbots = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let Some((chatbot_type, url)) = entry.split_once('=') else {
            return Err(ConfigError::InvalidChatbotEntry {
                entry: entry.to_string(),
            });
        };
        let (chatbot_type, url) = (chatbot_type.trim(), url.trim());
        if chatbot_type.is_empty() || url.is_empty() {
            return Err(ConfigError::InvalidChatbotEntry {
                entry: entry.to_string(),
            });
        }
        if !chatbot_type
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(ConfigError::InvalidChatbotType {
                value: chatbot_type.to_string(),
            });
        }
        chatbots.insert(chatbot_type.to_string(), url.to_string());
    }
    Ok(chatbots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).expect("default config");
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.chatbots.is_empty());
        assert_eq!(config.default_chatbot, None);
        assert_eq!(config.langflow_timeout, Duration::from_secs(60));
    }

    #[test]
    fn port_is_honoured_when_bind_addr_is_unset() {
        let config = config_from(&[("PORT", "8080"), ("STOREFRONT_BIND_ADDR", "  ")])
            .expect("port config");
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn log_level_is_a_fallback_filter() {
        let config = config_from(&[("LOG_LEVEL", "debug"), ("STOREFRONT_LOG_FORMAT", "JSON")])
            .expect("log config");
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn chatbots_merge_list_and_product_assistant_endpoint() {
        let config = config_from(&[
            (
                "STOREFRONT_CHATBOTS",
                "support=http://flows.test/run/support, sales = http://flows.test/run/sales",
            ),
            (
                "LANGFLOW_PRODUCT_ASSISTANT_ENDPOINT",
                "http://flows.test/run/products",
            ),
        ])
        .expect("chatbot config");
        assert_eq!(config.chatbots.len(), 3);
        assert_eq!(
            config.chatbots.get("sales").map(String::as_str),
            Some("http://flows.test/run/sales")
        );
        assert_eq!(config.default_chatbot.as_deref(), Some("product-assistant"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            config_from(&[("STOREFRONT_BIND_ADDR", "nope")]),
            Err(ConfigError::InvalidBindAddr { .. })
        ));
        assert!(matches!(
            config_from(&[("STOREFRONT_CHATBOTS", "support")]),
            Err(ConfigError::InvalidChatbotEntry { .. })
        ));
        assert!(matches!(
            config_from(&[("STOREFRONT_CHATBOTS", "a/b=http://x")]),
            Err(ConfigError::InvalidChatbotType { .. })
        ));
        assert!(matches!(
            config_from(&[("STOREFRONT_LANGFLOW_TIMEOUT_MS", "soon")]),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }
}
