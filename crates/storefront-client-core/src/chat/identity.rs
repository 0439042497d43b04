use std::fmt;

use web_time::{SystemTime, UNIX_EPOCH};

const SESSION_PREFIX: &str = "user_";

/// Opaque per-chatbot conversation token that lets the backend correlate turns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    /// Accepts a stored value unless it is blank or a stringified null.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn mint() -> Self {
        Self::from_millis(unix_millis())
    }

    /// Mints a token guaranteed to differ from `previous`, even within the same millisecond.
    pub fn mint_distinct_from(previous: Option<&Self>) -> Self {
        let mut millis = unix_millis();
        loop {
            let candidate = Self::from_millis(millis);
            if previous != Some(&candidate) {
                return candidate;
            }
            millis = millis.saturating_add(1);
        }
    }

    pub fn from_millis(millis: u128) -> Self {
        Self(format!("{SESSION_PREFIX}{millis}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis())
}
