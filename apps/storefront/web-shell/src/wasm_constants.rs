pub(crate) const MAIN_CONTENT_ID: &str = "main-content";

pub(crate) const CHATBOT_ROOT_ID: &str = "chatbot-root";
pub(crate) const CHAT_TOGGLE_ID: &str = "chat-toggle";
pub(crate) const CHAT_WINDOW_ID: &str = "chat-widget";
pub(crate) const CHAT_MESSAGES_ID: &str = "chat-messages";
pub(crate) const CHAT_FORM_ID: &str = "chat-form";
pub(crate) const CHAT_INPUT_ID: &str = "chat-input-text";
pub(crate) const CHAT_SEND_BUTTON_ID: &str = "chat-send-button";
pub(crate) const CHAT_CLEAR_BUTTON_ID: &str = "clear-chat-button-header";
pub(crate) const CHAT_MINIMIZE_BUTTON_ID: &str = "minimize-chat";
pub(crate) const CHAT_EXCHANGE_ATTRIBUTE: &str = "data-exchange-id";
pub(crate) const CHAT_THINKING_TEXT: &str = "Thinking...";
pub(crate) const CHAT_CLEAR_CONFIRMATION: &str =
    "Are you sure you want to clear the chat history?";
pub(crate) const CHAT_MESSAGE_CLASS: &str = "chat-message";
pub(crate) const RICH_CONTENT_CLASS: &str = "rich-content";
pub(crate) const RICH_MESSAGE_SELECTOR: &str = ".chat-message.rich-content";
pub(crate) const THINKING_CLASS: &str = "thinking-indicator";
pub(crate) const PRODUCT_RECOMMENDATION_SELECTOR: &str = ".product-recommendation";
pub(crate) const RECOMMENDATION_LINK_SELECTOR: &str = "h4 a";

pub(crate) const DOC_LINKS_SELECTOR: &str = ".product-documentation-links ul";
pub(crate) const DOC_LINK_SELECTOR: &str = ".doc-link";
pub(crate) const DOC_DISPLAY_SELECTOR: &str = ".product-detail-doc-display";
pub(crate) const DOC_VIEWER_TITLE_ID: &str = "docViewerTitle";
pub(crate) const DOC_VIEWER_CONTENT_ID: &str = "docViewerContent";
pub(crate) const DOC_LOADING_HTML: &str = "<p>Loading...</p>";
pub(crate) const DOC_LOAD_ERROR_TITLE: &str = "Error";
pub(crate) const DOC_LOAD_ERROR_HTML: &str =
    "<p>Could not load document content. Please try again later.</p>";
pub(crate) const DOC_UNSELECTED_TITLE: &str = "Select a document";
pub(crate) const DOC_UNSELECTED_HTML: &str =
    "<p>Select a document from the list to view its content.</p>";

pub(crate) const PRODUCT_IMAGE_SELECTOR: &str = ".product-detail-image";
pub(crate) const IMAGE_MODAL_ID: &str = "imageModal";
pub(crate) const IMAGE_MODAL_IMAGE_ID: &str = "imageModalContent";
pub(crate) const IMAGE_MODAL_CAPTION_ID: &str = "imageModalCaption";
pub(crate) const IMAGE_MODAL_CLOSE_ID: &str = "imageModalCloseBtn";

pub(crate) const TAG_FILTER_INPUT_ID: &str = "tagSearchInput";
pub(crate) const TAG_ITEMS_SELECTOR: &str = ".available-tags li";
pub(crate) const TAG_NAME_ATTRIBUTE: &str = "data-tag-name";
pub(crate) const HIERARCHY_FILTER_SELECTOR: &str = ".hierarchy-filter";
pub(crate) const DROPDOWN_BUTTON_SELECTOR: &str = ".dropbtn";
pub(crate) const DROPDOWN_ITEM_SELECTOR: &str = ".nav-item.dropdown";
pub(crate) const OPEN_DROPDOWNS_SELECTOR: &str = ".nav-item.dropdown.active";
pub(crate) const PRODUCT_GRID_SELECTOR: &str = ".product-grid";
pub(crate) const PRODUCT_CARD_SELECTOR: &str = ".product-card.product-card-link";
pub(crate) const TAG_LINK_SELECTOR: &str = ".tag-link";
pub(crate) const MOBILE_MENU_TOGGLE_ID: &str = "mobile-menu-toggle";
pub(crate) const SIDEBAR_ID: &str = "sidebar";
pub(crate) const SIDEBAR_VISIBLE_CLASS: &str = "sidebar-visible";
pub(crate) const ACTIVE_CLASS: &str = "active";
