pub mod chat;
pub mod lifecycle;
pub mod navigation;
pub mod protocol;

pub use chat::{
    ChatLog, ChatMessage, ChatSender, ChatWidget, ChatWidgetSlot, ChatbotConfig, ChatbotEndpoints,
    InitOutcome, SessionIdentity,
};
pub use lifecycle::{ComponentScope, ContentReloaded, LifecycleComponent, LifecycleRegistry};
pub use navigation::{LinkClick, LinkDecision, NavigationController, NavigationOutcome};
