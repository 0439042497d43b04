use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    User,
    Bot,
}

impl ChatSender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub text: String,
    pub sender: ChatSender,
    /// Text is pre-rendered markup rather than literal text.
    #[serde(default, alias = "isHTML")]
    pub is_rich_content: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: ChatSender::User,
            is_rich_content: false,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: ChatSender::Bot,
            is_rich_content: false,
        }
    }

    pub fn bot_rich(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: ChatSender::Bot,
            is_rich_content: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("persisted chat log is unreadable: {0}")]
pub struct ChatLogDecodeError(#[from] serde_json::Error);

/// Ordered conversation transcript. Never empty: the first entry is the
/// introductory message after initialization or reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new(introductory: ChatMessage) -> Self {
        Self {
            messages: vec![introductory],
        }
    }

    /// Decodes a persisted log. An empty array yields a fresh log.
    pub fn decode(raw: &str, introductory: &ChatMessage) -> Result<Self, ChatLogDecodeError> {
        let messages: Vec<ChatMessage> = serde_json::from_str(raw)?;
        if messages.is_empty() {
            return Ok(Self::new(introductory.clone()));
        }
        Ok(Self { messages })
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(&self.messages).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> &ChatMessage {
        &self.messages[0]
    }

    pub fn last(&self) -> &ChatMessage {
        &self.messages[self.messages.len() - 1]
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn reset(&mut self, introductory: ChatMessage) {
        self.messages.clear();
        self.messages.push(introductory);
    }

    /// Swaps the first entry for `introductory` when it differs.
    pub fn replace_introductory(&mut self, introductory: &ChatMessage) -> bool {
        if self.messages[0] == *introductory {
            return false;
        }
        self.messages[0] = introductory.clone();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intro() -> ChatMessage {
        ChatMessage::bot("Hello! How can I help?")
    }

    #[test]
    fn decode_accepts_legacy_is_html_field() {
        let raw = r#"[{"text":"<b>hi</b>","sender":"bot","isHTML":true},{"text":"yo","sender":"user"}]"#;
        let log = ChatLog::decode(raw, &intro()).expect("legacy log");
        assert_eq!(log.len(), 2);
        assert!(log.first().is_rich_content);
        assert_eq!(log.last(), &ChatMessage::user("yo"));
    }

    #[test]
    fn decode_of_empty_array_restores_introductory_message() {
        let log = ChatLog::decode("[]", &intro()).expect("empty log");
        assert_eq!(log.messages(), &[intro()]);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(ChatLog::decode("{not json", &intro()).is_err());
        assert!(ChatLog::decode(r#"[{"text":1}]"#, &intro()).is_err());
    }

    #[test]
    fn encode_uses_camel_case_field_names() {
        let mut log = ChatLog::new(intro());
        log.push(ChatMessage::bot_rich("<p>ok</p>"));
        let encoded = log.encode();
        assert!(encoded.contains("\"isRichContent\":true"));
        assert!(encoded.contains("\"sender\":\"bot\""));
    }

    #[test]
    fn replace_introductory_only_reports_real_changes() {
        let mut log = ChatLog::new(intro());
        assert!(!log.replace_introductory(&intro()));
        let updated = ChatMessage::bot("Welcome back!");
        assert!(log.replace_introductory(&updated));
        assert_eq!(log.first(), &updated);
    }
}
