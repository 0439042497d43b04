//! Chat session runtime: configuration, persistence, availability and the
//! send/receive protocol of one embedded chat widget.

pub mod config;
pub mod identity;
pub mod message;
pub mod platform;
pub mod runtime;
pub mod widget;

pub use config::{ChatConfigError, ChatbotConfig, ChatbotEndpoints, RawChatbotConfig};
pub use identity::SessionIdentity;
pub use message::{ChatLog, ChatLogDecodeError, ChatMessage, ChatSender};
pub use platform::{
    ChannelHandle, ChatChannel, ChatStorage, ChatTransport, ChatView, StorageError, TransportError,
};
pub use runtime::{ChatWidget, ChatWidgetSlot, InitOutcome};
pub use widget::{Availability, ChatEffect, ChatWidgetState, SendPlan};
