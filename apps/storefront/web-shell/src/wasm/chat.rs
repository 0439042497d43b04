use super::*;

    pub(super) fn chatbot_config_from_markup() -> Option<String> {
        optional_element::<Element>(CHATBOT_ROOT_ID)?.get_attribute(CHATBOT_CONFIG_ATTRIBUTE)
    }

    pub(super) fn mount_chat_widget(config_json: &str) {
        let config = match CHAT_SLOT.with(|slot| slot.claim_json(config_json)) {
            InitOutcome::Initialized(config) => config,
            InitOutcome::AlreadyInitialized => return,
            InitOutcome::Rejected(error) => {
                warn!(%error, "chat widget not mounted");
                return;
            }
        };
        let view = match DomChatView::attach() {
            Ok(view) => view,
            Err(error) => {
                warn!(%error, chatbot_type = %config.chatbot_type, "chat widget markup is missing");
                return;
            }
        };

        let widget = ChatWidget::new(config, BrowserChatStorage, view, BrowserChatTransport);
        bind_chat_controls(&widget);
        LIFECYCLE.with(|registry| registry.register(Rc::new(widget.clone())));
        spawn_local(async move {
            widget.refresh_status().await;
        });
    }

    fn bind_chat_controls(widget: &BrowserChatWidget) {
        CHAT_LISTENERS.with(|listeners| {
            listeners.clear();

            if let Some(toggle) = optional_element::<Element>(CHAT_TOGGLE_ID) {
                let widget = widget.clone();
                listeners.listen(&toggle, "click", move |_event| widget.toggle());
            }
            if let Some(minimize) = optional_element::<Element>(CHAT_MINIMIZE_BUTTON_ID) {
                let widget = widget.clone();
                listeners.listen(&minimize, "click", move |_event| widget.close());
            }
            if let Some(clear) = optional_element::<Element>(CHAT_CLEAR_BUTTON_ID) {
                let widget = widget.clone();
                listeners.listen(&clear, "click", move |_event| widget.clear_history());
            }
            if let Some(form) = optional_element::<Element>(CHAT_FORM_ID) {
                let widget = widget.clone();
                listeners.listen(&form, "submit", move |event| {
                    event.prevent_default();
                    let Some(input) = optional_element::<HtmlInputElement>(CHAT_INPUT_ID) else {
                        return;
                    };
                    let text = input.value();
                    let widget = widget.clone();
                    spawn_local(async move {
                        widget.send(&text).await;
                    });
                });
            }
            if let Some(messages) = optional_element::<Element>(CHAT_MESSAGES_ID) {
                listeners.listen(&messages, "click", intercept_rich_content_click);
            }
        });
    }

    /// Same-origin links and recommendation cards inside bot markup load in
    /// place so the chat window stays open.
    fn intercept_rich_content_click(event: web_sys::Event) {
        if event.default_prevented() || closest_to_target(&event, RICH_MESSAGE_SELECTOR).is_none() {
            return;
        }

        if let Some(anchor) = closest_to_target(&event, "a")
            .and_then(|anchor| anchor.dyn_into::<HtmlAnchorElement>().ok())
        {
            if let Some(path) = site_relative(&anchor.href()) {
                event.prevent_default();
                request_background_navigation(&path);
            }
            return;
        }

        let Some(card) = closest_to_target(&event, PRODUCT_RECOMMENDATION_SELECTOR) else {
            return;
        };
        let target_tag = event
            .target()
            .and_then(|target| target.dyn_into::<Element>().ok())
            .map(|target| target.tag_name())
            .unwrap_or_default();
        if card_click_hits_control(&target_tag) {
            return;
        }
        let link = card
            .query_selector(RECOMMENDATION_LINK_SELECTOR)
            .ok()
            .flatten()
            .and_then(|link| link.dyn_into::<HtmlAnchorElement>().ok());
        if let Some(path) = link.and_then(|link| site_relative(&link.href())) {
            event.prevent_default();
            request_background_navigation(&path);
        }
    }

    /// Renders the chat log into the widget markup served with every page.
    pub(super) struct DomChatView {
        toggle: HtmlElement,
        window: HtmlElement,
        messages: HtmlElement,
        input: HtmlInputElement,
        send_button: HtmlElement,
    }

    impl DomChatView {
        pub(super) fn attach() -> Result<Self, ShellError> {
            Ok(Self {
                toggle: element_by_id(CHAT_TOGGLE_ID)?,
                window: element_by_id(CHAT_WINDOW_ID)?,
                messages: element_by_id(CHAT_MESSAGES_ID)?,
                input: element_by_id(CHAT_INPUT_ID)?,
                send_button: element_by_id(CHAT_SEND_BUTTON_ID)?,
            })
        }

        fn placeholder(&self, exchange_id: u64) -> Option<Element> {
            self.messages
                .query_selector(&format!("[{CHAT_EXCHANGE_ATTRIBUTE}=\"{exchange_id}\"]"))
                .ok()
                .flatten()
        }

        fn push_element(&self, element: &Element) {
            if let Err(error) = self.messages.append_child(element) {
                warn!(error = ?error, "failed to append chat message");
            }
            self.scroll_to_latest();
        }
    }

    fn message_element(message: &ChatMessage) -> Result<HtmlElement, ShellError> {
        let element = create_html_element("div")?;
        let classes = element.class_list();
        let _ = classes.add_2(CHAT_MESSAGE_CLASS, message.sender.as_str());
        if message.is_rich_content && message.sender == ChatSender::Bot {
            let _ = classes.add_1(RICH_CONTENT_CLASS);
            element
                .append_child(&sanitized_fragment(&message.text)?)
                .map_err(js_error("failed to insert rich message"))?;
        } else {
            element.set_text_content(Some(&message.text));
        }
        Ok(element)
    }

    impl ChatView for DomChatView {
        fn render_log(&self, messages: &[ChatMessage]) {
            self.messages.set_inner_html("");
            for message in messages {
                self.append_message(message);
            }
        }

        fn append_message(&self, message: &ChatMessage) {
            match message_element(message) {
                Ok(element) => self.push_element(&element),
                Err(error) => warn!(%error, "chat message could not be rendered"),
            }
        }

        fn show_placeholder(&self, exchange_id: u64) {
            let element = match create_html_element("div") {
                Ok(element) => element,
                Err(error) => {
                    warn!(%error, "thinking indicator could not be rendered");
                    return;
                }
            };
            let _ = element
                .class_list()
                .add_3(CHAT_MESSAGE_CLASS, ChatSender::Bot.as_str(), THINKING_CLASS);
            let _ = element.set_attribute(CHAT_EXCHANGE_ATTRIBUTE, &exchange_id.to_string());
            element.set_text_content(Some(CHAT_THINKING_TEXT));
            self.push_element(&element);
        }

        fn update_placeholder(&self, exchange_id: u64, text: &str) {
            if let Some(placeholder) = self.placeholder(exchange_id) {
                let _ = placeholder.class_list().remove_1(THINKING_CLASS);
                placeholder.set_text_content(Some(text));
                self.scroll_to_latest();
            }
        }

        fn resolve_placeholder(&self, exchange_id: u64, message: &ChatMessage) {
            let element = match message_element(message) {
                Ok(element) => element,
                Err(error) => {
                    warn!(%error, exchange_id, "chat reply could not be rendered");
                    if let Some(placeholder) = self.placeholder(exchange_id) {
                        placeholder.remove();
                    }
                    return;
                }
            };
            match self.placeholder(exchange_id) {
                Some(placeholder) => {
                    if let Err(error) = placeholder.replace_with_with_node_1(&element) {
                        warn!(error = ?error, exchange_id, "failed to replace thinking indicator");
                    }
                    self.scroll_to_latest();
                }
                None => self.push_element(&element),
            }
        }

        fn clear_input(&self) {
            self.input.set_value("");
        }

        fn set_input_enabled(&self, enabled: bool) {
            self.input.set_disabled(!enabled);
            let _ = self
                .send_button
                .toggle_attribute_with_force("disabled", !enabled);
        }

        fn set_toggle_visible(&self, visible: bool) {
            self.toggle.set_hidden(!visible);
        }

        fn set_window_visible(&self, visible: bool) {
            self.window.set_hidden(!visible);
            if visible {
                let _ = self.input.focus();
                self.scroll_to_latest();
            }
        }

        fn scroll_to_latest(&self) {
            self.messages.set_scroll_top(self.messages.scroll_height());
        }

        fn confirm_clear(&self) -> bool {
            window()
                .and_then(|window| {
                    window
                        .confirm_with_message(CHAT_CLEAR_CONFIRMATION)
                        .map_err(js_error("confirm dialog failed"))
                })
                .unwrap_or(false)
        }
    }
