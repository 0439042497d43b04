use super::*;

    pub(super) fn window() -> Result<web_sys::Window, ShellError> {
        web_sys::window().ok_or(ShellError::Unavailable("window"))
    }

    pub(super) fn document() -> Result<web_sys::Document, ShellError> {
        window()?
            .document()
            .ok_or(ShellError::Unavailable("document"))
    }

    pub(super) fn element_by_id<T: JsCast>(id: &'static str) -> Result<T, ShellError> {
        document()?
            .get_element_by_id(id)
            .and_then(|element| element.dyn_into::<T>().ok())
            .ok_or(ShellError::Element(id))
    }

    pub(super) fn optional_element<T: JsCast>(id: &str) -> Option<T> {
        document()
            .ok()?
            .get_element_by_id(id)?
            .dyn_into::<T>()
            .ok()
    }

    pub(super) fn query_document(selector: &str) -> Option<Element> {
        document().ok()?.query_selector(selector).ok().flatten()
    }

    pub(super) fn query_document_all(selector: &str) -> Vec<Element> {
        match document().map(|document| document.query_selector_all(selector)) {
            Ok(Ok(list)) => node_list_elements(&list),
            _ => Vec::new(),
        }
    }

    pub(super) fn query_all(root: &Element, selector: &str) -> Vec<Element> {
        match root.query_selector_all(selector) {
            Ok(list) => node_list_elements(&list),
            Err(_) => Vec::new(),
        }
    }

    pub(super) fn node_list_elements(list: &web_sys::NodeList) -> Vec<Element> {
        (0..list.length())
            .filter_map(|index| list.get(index))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    /// Nearest ancestor of the event target (itself included) matching `selector`.
    pub(super) fn closest_to_target(event: &web_sys::Event, selector: &str) -> Option<Element> {
        event
            .target()?
            .dyn_into::<Element>()
            .ok()?
            .closest(selector)
            .ok()
            .flatten()
    }

    pub(super) fn target_is_within(event: &web_sys::Event, container: &Element) -> bool {
        event
            .target()
            .and_then(|target| target.dyn_into::<web_sys::Node>().ok())
            .is_some_and(|node| container.contains(Some(&node)))
    }

    pub(super) fn create_html_element(tag: &str) -> Result<HtmlElement, ShellError> {
        document()?
            .create_element(tag)
            .map_err(js_error("failed to create element"))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| ShellError::Unavailable("html element"))
    }

    /// Parses bot markup in an inert template and strips anything that could
    /// run script before it reaches the live document.
    pub(super) fn sanitized_fragment(html: &str) -> Result<web_sys::DocumentFragment, ShellError> {
        let template = document()?
            .create_element("template")
            .map_err(js_error("failed to create template"))?
            .dyn_into::<web_sys::HtmlTemplateElement>()
            .map_err(|_| ShellError::Unavailable("template element"))?;
        template.set_inner_html(html);
        let content = template.content();

        if let Ok(list) = content.query_selector_all(UNSAFE_ELEMENT_SELECTOR) {
            for element in node_list_elements(&list) {
                element.remove();
            }
        }
        if let Ok(list) = content.query_selector_all("*") {
            for element in node_list_elements(&list) {
                let names = element.get_attribute_names();
                for name in names.iter().filter_map(|name| name.as_string()) {
                    let value = element.get_attribute(&name).unwrap_or_default();
                    if is_unsafe_attribute(&name, &value) {
                        let _ = element.remove_attribute(&name);
                    }
                }
            }
        }
        Ok(content)
    }

    fn url_detail(key: &str, url: &str) -> Result<JsValue, ShellError> {
        let detail = js_sys::Object::new();
        js_sys::Reflect::set(&detail, &JsValue::from_str(key), &JsValue::from_str(url))
            .map_err(js_error("failed to build event detail"))?;
        Ok(detail.into())
    }

    pub(super) fn dispatch_url_event(
        target: &web_sys::EventTarget,
        name: &str,
        key: &str,
        url: &str,
    ) -> Result<(), ShellError> {
        let init = web_sys::CustomEventInit::new();
        init.set_bubbles(true);
        init.set_cancelable(true);
        init.set_detail(&url_detail(key, url)?);
        let event = web_sys::CustomEvent::new_with_event_init_dict(name, &init)
            .map_err(js_error("failed to create event"))?;
        target
            .dispatch_event(&event)
            .map_err(js_error("failed to dispatch event"))?;
        Ok(())
    }

    pub(super) fn event_detail_url(event: &web_sys::Event, key: &str) -> Option<String> {
        let detail = event.dyn_ref::<web_sys::CustomEvent>()?.detail();
        js_sys::Reflect::get(&detail, &JsValue::from_str(key))
            .ok()?
            .as_string()
    }

    struct Listener {
        target: web_sys::EventTarget,
        event: &'static str,
        callback: Closure<dyn FnMut(web_sys::Event)>,
    }

    /// Event listeners owned by one component, removed together.
    #[derive(Default)]
    pub(super) struct ListenerSet {
        listeners: RefCell<Vec<Listener>>,
    }

    impl ListenerSet {
        pub(super) fn listen(
            &self,
            target: &web_sys::EventTarget,
            event: &'static str,
            handler: impl FnMut(web_sys::Event) + 'static,
        ) {
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(handler));
            if let Err(error) =
                target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            {
                warn!(event, error = ?error, "failed to add event listener");
                return;
            }
            self.listeners.borrow_mut().push(Listener {
                target: target.clone(),
                event,
                callback,
            });
        }

        pub(super) fn clear(&self) {
            let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
            for listener in listeners {
                let _ = listener.target.remove_event_listener_with_callback(
                    listener.event,
                    listener.callback.as_ref().unchecked_ref(),
                );
            }
        }

        pub(super) fn len(&self) -> usize {
            self.listeners.borrow().len()
        }
    }

    /// The `<main>` region swapped by partial loads.
    pub(super) struct MainContentShell;

    impl ContentShell for MainContentShell {
        fn replace_content(&self, html: &str) -> bool {
            let Some(main) = optional_element::<Element>(MAIN_CONTENT_ID) else {
                return false;
            };
            main.set_inner_html(html);
            true
        }

        fn set_title(&self, title: &str) {
            if let Ok(document) = document() {
                document.set_title(title);
            }
        }

        fn emit_content_reloaded(&self, event: &ContentReloaded) {
            let Some(main) = optional_element::<Element>(MAIN_CONTENT_ID) else {
                return;
            };
            if let Err(error) =
                dispatch_url_event(&main, CONTENT_RELOADED_EVENT, "newPageUrl", &event.url)
            {
                warn!(%error, url = %event.url, "failed to announce reloaded content");
            }
        }
    }
