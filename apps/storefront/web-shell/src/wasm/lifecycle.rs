use super::*;

    use std::cell::Cell;

    pub(super) fn install_lifecycle_handlers() -> Result<(), ShellError> {
        let window = window()?;
        let document = document()?;

        CONTENT_RELOADED_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |event| {
                let url = event_detail_url(&event, "newPageUrl")
                    .unwrap_or_else(|| WindowHistory.current_path());
                LIFECYCLE.with(|registry| registry.content_reloaded(&ContentReloaded { url }));
            }));
            let _ = document.add_event_listener_with_callback(
                CONTENT_RELOADED_EVENT,
                callback.as_ref().unchecked_ref(),
            );
            *slot.borrow_mut() = Some(callback);
        });

        PAGEHIDE_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
                LIFECYCLE.with(LifecycleRegistry::unmount_all);
            }));
            let _ = window
                .add_event_listener_with_callback("pagehide", callback.as_ref().unchecked_ref());
            *slot.borrow_mut() = Some(callback);
        });

        PAGESHOW_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            // Restored from the back/forward cache after a pagehide unmount.
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |event| {
                let restored = event
                    .dyn_ref::<web_sys::PageTransitionEvent>()
                    .is_some_and(web_sys::PageTransitionEvent::persisted);
                if restored {
                    let url = WindowHistory.current_path();
                    LIFECYCLE.with(|registry| registry.mount_all(&ContentReloaded { url }));
                }
            }));
            let _ = window
                .add_event_listener_with_callback("pageshow", callback.as_ref().unchecked_ref());
            *slot.borrow_mut() = Some(callback);
        });

        Ok(())
    }

    pub(super) fn register_page_components() {
        LIFECYCLE.with(|registry| {
            registry.register(Rc::new(DocumentViewer::default()));
            registry.register(Rc::new(SearchFilters::default()));
        });
    }

    /// Documentation panel and image modal of a product page.
    #[derive(Default)]
    pub(super) struct DocumentViewer {
        listeners: ListenerSet,
        /// Bumped per document request and on unmount; stale responses are dropped.
        generation: Rc<Cell<u64>>,
    }

    impl LifecycleComponent for DocumentViewer {
        fn name(&self) -> &str {
            "document-viewer"
        }

        fn mount(&self, _context: &ContentReloaded) {
            let Some(display) = query_document(DOC_DISPLAY_SELECTOR) else {
                return;
            };
            let links = query_document(DOC_LINKS_SELECTOR);

            if let Some(initial_id) = display.get_attribute("data-initial-doc-id") {
                let initial_link = links.as_ref().and_then(|links| doc_link(links, &initial_id));
                match initial_link {
                    Some(link) => mark_active_doc_link(&link),
                    None => show_unselected_document(),
                }
            }

            if let Some(links) = &links {
                let generation = Rc::clone(&self.generation);
                self.listeners.listen(links, "click", move |event| {
                    select_document(&event, &generation);
                });
            }
            self.bind_image_modal();
            debug!(listeners = self.listeners.len(), "document viewer mounted");
        }

        fn unmount(&self) {
            self.generation.set(self.generation.get() + 1);
            self.listeners.clear();
        }
    }

    impl DocumentViewer {
        fn bind_image_modal(&self) {
            let image = query_document(PRODUCT_IMAGE_SELECTOR)
                .and_then(|element| element.dyn_into::<HtmlImageElement>().ok());
            let modal = optional_element::<HtmlElement>(IMAGE_MODAL_ID);
            let (Some(image), Some(modal)) = (image, modal) else {
                return;
            };

            let opened = modal.clone();
            let source = image.clone();
            self.listeners.listen(&image, "click", move |_event| {
                if let Some(enlarged) = optional_element::<HtmlImageElement>(IMAGE_MODAL_IMAGE_ID) {
                    enlarged.set_src(&source.src());
                    enlarged.set_alt(&source.alt());
                }
                if let Some(caption) = optional_element::<HtmlElement>(IMAGE_MODAL_CAPTION_ID) {
                    caption.set_text_content(Some(&source.alt()));
                }
                opened.set_hidden(false);
            });

            if let Some(close_button) = optional_element::<HtmlElement>(IMAGE_MODAL_CLOSE_ID) {
                let closed = modal.clone();
                self.listeners
                    .listen(&close_button, "click", move |_event| closed.set_hidden(true));
            }

            let overlay = modal.clone();
            self.listeners.listen(&modal, "click", move |event| {
                let on_overlay = event
                    .target()
                    .is_some_and(|target| JsValue::from(target) == JsValue::from(overlay.clone()));
                if on_overlay {
                    overlay.set_hidden(true);
                }
            });

            if let Ok(document) = document() {
                self.listeners.listen(&document, "keydown", move |event| {
                    let escape = event
                        .dyn_ref::<KeyboardEvent>()
                        .is_some_and(|keyboard| keyboard.key() == "Escape");
                    if escape && !modal.hidden() {
                        modal.set_hidden(true);
                    }
                });
            }
        }
    }

    fn doc_link(links: &Element, doc_id: &str) -> Option<Element> {
        query_all(links, DOC_LINK_SELECTOR)
            .into_iter()
            .find(|link| link.get_attribute("data-doc-id").as_deref() == Some(doc_id))
    }

    fn mark_active_doc_link(active: &Element) {
        for link in query_document_all(DOC_LINK_SELECTOR) {
            let _ = link.class_list().remove_1(ACTIVE_CLASS);
        }
        let _ = active.class_list().add_1(ACTIVE_CLASS);
        if let Some(title) = optional_element::<HtmlElement>(DOC_VIEWER_TITLE_ID) {
            title.set_hidden(false);
        }
    }

    fn show_unselected_document() {
        for link in query_document_all(DOC_LINK_SELECTOR) {
            let _ = link.class_list().remove_1(ACTIVE_CLASS);
        }
        if let Some(title) = optional_element::<HtmlElement>(DOC_VIEWER_TITLE_ID) {
            title.set_text_content(Some(DOC_UNSELECTED_TITLE));
            title.set_hidden(true);
        }
        if let Some(content) = optional_element::<Element>(DOC_VIEWER_CONTENT_ID) {
            content.set_inner_html(DOC_UNSELECTED_HTML);
        }
    }

    fn show_document(title: &str, html: &str) {
        if let Some(heading) = optional_element::<HtmlElement>(DOC_VIEWER_TITLE_ID) {
            heading.set_text_content(Some(title));
            heading.set_hidden(false);
        }
        if let Some(content) = optional_element::<Element>(DOC_VIEWER_CONTENT_ID) {
            content.set_inner_html(html);
        }
    }

    fn select_document(event: &web_sys::Event, generation: &Rc<Cell<u64>>) {
        let Some(link) = closest_to_target(event, DOC_LINK_SELECTOR) else {
            return;
        };
        event.prevent_default();
        let Some(doc_id) = link.get_attribute("data-doc-id") else {
            return;
        };
        let link_text = link.text_content().unwrap_or_default();
        mark_active_doc_link(&link);

        let request = generation.get() + 1;
        generation.set(request);
        let generation = Rc::clone(generation);
        show_document(&document_title("", &link_text, &doc_id), DOC_LOADING_HTML);

        spawn_local(async move {
            let result = match document_api_url(&doc_id) {
                Some(url) => fetch_document(&url).await,
                None => Err(ShellError::Unavailable("document url")),
            };
            if generation.get() != request {
                debug!(%doc_id, "dropping superseded document response");
                return;
            }
            let loaded = match result {
                Ok(payload) => {
                    show_document(
                        &document_title(&payload.title, &link_text, &doc_id),
                        &payload.html_content,
                    );
                    true
                }
                Err(error) => {
                    warn!(%doc_id, %error, "document could not be loaded");
                    show_document(DOC_LOAD_ERROR_TITLE, DOC_LOAD_ERROR_HTML);
                    false
                }
            };
            if let Some(url) =
                document_history_url(&WindowHistory.current_path(), &doc_id, loaded)
            {
                WindowHistory.push(&url);
            }
        });
    }

    /// Sidebar filters and result grid of the search page.
    #[derive(Default)]
    pub(super) struct SearchFilters {
        listeners: ListenerSet,
    }

    impl LifecycleComponent for SearchFilters {
        fn name(&self) -> &str {
            "search-filters"
        }

        fn mount(&self, _context: &ContentReloaded) {
            if let Some(input) = optional_element::<HtmlInputElement>(TAG_FILTER_INPUT_ID) {
                let source = input.clone();
                self.listeners.listen(&input, "input", move |_event| {
                    filter_tags(&source.value());
                });
            }

            if let Some(hierarchy) = query_document(HIERARCHY_FILTER_SELECTOR) {
                let container = hierarchy.clone();
                self.listeners.listen(&hierarchy, "click", move |event| {
                    toggle_dropdown(&event, &container);
                });
            }

            if let Some(grid) = query_document(PRODUCT_GRID_SELECTOR) {
                self.listeners.listen(&grid, "click", open_product_card);
            }

            self.bind_mobile_sidebar();
        }

        fn unmount(&self) {
            self.listeners.clear();
        }
    }

    impl SearchFilters {
        fn bind_mobile_sidebar(&self) {
            let toggle = optional_element::<Element>(MOBILE_MENU_TOGGLE_ID);
            let sidebar = optional_element::<Element>(SIDEBAR_ID);
            let (Some(toggle), Some(sidebar)) = (toggle, sidebar) else {
                return;
            };

            let toggled = sidebar.clone();
            self.listeners.listen(&toggle, "click", move |event| {
                event.stop_propagation();
                let _ = toggled.class_list().toggle(SIDEBAR_VISIBLE_CLASS);
            });

            if let Ok(document) = document() {
                self.listeners.listen(&document, "click", move |event| {
                    let visible = sidebar.class_list().contains(SIDEBAR_VISIBLE_CLASS);
                    if visible
                        && !target_is_within(&event, &sidebar)
                        && !target_is_within(&event, &toggle)
                    {
                        let _ = sidebar.class_list().remove_1(SIDEBAR_VISIBLE_CLASS);
                    }
                });
            }
        }
    }

    fn filter_tags(filter: &str) {
        for item in query_document_all(TAG_ITEMS_SELECTOR) {
            let tag_name = item.get_attribute(TAG_NAME_ATTRIBUTE).unwrap_or_default();
            if let Ok(item) = item.dyn_into::<HtmlElement>() {
                item.set_hidden(!tag_matches_filter(&tag_name, filter));
            }
        }
    }

    fn toggle_dropdown(event: &web_sys::Event, container: &Element) {
        let Some(button) = closest_to_target(event, DROPDOWN_BUTTON_SELECTOR) else {
            return;
        };
        event.prevent_default();
        let Some(dropdown) = button.closest(DROPDOWN_ITEM_SELECTOR).ok().flatten() else {
            return;
        };
        let was_open = dropdown.class_list().contains(ACTIVE_CLASS);
        for open in query_all(container, OPEN_DROPDOWNS_SELECTOR) {
            let _ = open.class_list().remove_1(ACTIVE_CLASS);
        }
        let _ = dropdown.class_list().toggle_with_force(ACTIVE_CLASS, !was_open);
    }

    fn open_product_card(event: web_sys::Event) {
        if event.default_prevented() || closest_to_target(&event, TAG_LINK_SELECTOR).is_some() {
            return;
        }
        let Some(card) = closest_to_target(&event, PRODUCT_CARD_SELECTOR) else {
            return;
        };
        if let Some(href) = card.get_attribute("data-href") {
            request_background_navigation(&href);
        }
    }
