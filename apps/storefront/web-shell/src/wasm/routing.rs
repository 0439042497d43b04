use super::*;

    /// `window.history` and `window.location`.
    pub(super) struct WindowHistory;

    fn history_state(url: &str) -> JsValue {
        let state = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&state, &JsValue::from_str("path"), &JsValue::from_str(url));
        state.into()
    }

    impl BrowserHistory for WindowHistory {
        fn push(&self, url: &str) {
            let Ok(history) = window().and_then(|window| {
                window
                    .history()
                    .map_err(js_error("history is unavailable"))
            }) else {
                return;
            };
            if let Err(error) = history.push_state_with_url(&history_state(url), "", Some(url)) {
                warn!(url, error = ?error, "failed to push history entry");
            }
        }

        fn current_path(&self) -> String {
            let Ok(location) = window().map(|window| window.location()) else {
                return "/".to_string();
            };
            let pathname = location.pathname().unwrap_or_else(|_| "/".to_string());
            let search = location.search().unwrap_or_default();
            let hash = location.hash().unwrap_or_default();
            format!("{pathname}{search}{hash}")
        }

        fn navigate_full(&self, url: &str) {
            if let Ok(window) = window() {
                let _ = window.location().set_href(url);
            }
        }

        fn reload(&self) {
            if let Ok(window) = window() {
                let _ = window.location().reload();
            }
        }
    }

    pub(super) fn install_browser_navigation_handlers() -> Result<(), ShellError> {
        let window = window()?;
        let document = document()?;

        ROUTE_POPSTATE_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |event| {
                let entry = history_entry_from_event(&event);
                spawn_navigation(move |navigation| async move {
                    navigation.handle_popstate(entry).await
                });
            }));
            let _ = window
                .add_event_listener_with_callback("popstate", callback.as_ref().unchecked_ref());
            *slot.borrow_mut() = Some(callback);
        });

        ROUTE_LINK_CLICK_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |event| {
                intercept_internal_link_click(event);
            }));
            let _ = document.add_event_listener_with_callback_and_bool(
                "click",
                callback.as_ref().unchecked_ref(),
                true,
            );
            *slot.borrow_mut() = Some(callback);
        });

        BACKGROUND_NAVIGATION_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |event| {
                let Some(url) = event_detail_url(&event, "url") else {
                    debug!("background navigation request without a url");
                    return;
                };
                match site_relative(&url) {
                    Some(path) => spawn_navigation(move |navigation| async move {
                        navigation.navigate(&path).await
                    }),
                    None => warn!(%url, "ignoring background navigation to another origin"),
                }
            }));
            let _ = document.add_event_listener_with_callback(
                BACKGROUND_NAVIGATION_EVENT,
                callback.as_ref().unchecked_ref(),
            );
            *slot.borrow_mut() = Some(callback);
        });

        Ok(())
    }

    fn history_entry_from_event(event: &web_sys::Event) -> Option<HistoryEntry> {
        let state = event.dyn_ref::<PopStateEvent>()?.state();
        if state.is_null() || state.is_undefined() {
            return None;
        }
        let path = js_sys::Reflect::get(&state, &JsValue::from_str("path"))
            .ok()
            .and_then(|value| value.as_string());
        Some(HistoryEntry { path })
    }

    pub(super) fn page_origin() -> Option<String> {
        window().ok()?.location().origin().ok()
    }

    /// Reduces an absolute or site-relative URL to a same-origin path.
    pub(super) fn site_relative(url: &str) -> Option<String> {
        same_origin_path(url, &page_origin().unwrap_or_default())
    }

    pub(super) fn intercept_internal_link_click(event: web_sys::Event) {
        if event.default_prevented() {
            return;
        }
        let Some(mouse_event) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        let Some(anchor) = anchor_from_event(&event) else {
            return;
        };

        let target = anchor.target();
        let click = LinkClick {
            button: mouse_event.button(),
            ctrl_key: mouse_event.ctrl_key(),
            meta_key: mouse_event.meta_key(),
            shift_key: mouse_event.shift_key(),
            alt_key: mouse_event.alt_key(),
            href_attribute: anchor.get_attribute("href"),
            resolved_href: anchor.href(),
            target: (!target.is_empty()).then_some(target),
            has_download: anchor.has_attribute("download"),
            bypass: anchor.has_attribute(BYPASS_NAVIGATION_ATTRIBUTE),
            page_origin: page_origin().unwrap_or_default(),
        };

        if let LinkDecision::Intercept(url) = classify_link_click(&click) {
            event.prevent_default();
            spawn_navigation(move |navigation| async move { navigation.navigate(&url).await });
        }
    }

    pub(super) fn anchor_from_event(event: &web_sys::Event) -> Option<HtmlAnchorElement> {
        let composed_path = event.composed_path();
        for index in 0..composed_path.length() {
            let value = composed_path.get(index);
            if let Ok(anchor) = value.dyn_into::<HtmlAnchorElement>() {
                return Some(anchor);
            }
        }
        None
    }

    /// Asks the navigation controller, through a DOM event, to partially load `url`.
    pub(super) fn request_background_navigation(url: &str) {
        let dispatched = document().and_then(|document| {
            dispatch_url_event(&document, BACKGROUND_NAVIGATION_EVENT, "url", url)
        });
        if let Err(error) = dispatched {
            warn!(%error, url, "background navigation request failed; navigating normally");
            WindowHistory.navigate_full(url);
        }
    }

    fn spawn_navigation<F, Fut>(run: F)
    where
        F: FnOnce(Rc<BrowserNavigation>) -> Fut + 'static,
        Fut: std::future::Future<Output = NavigationOutcome> + 'static,
    {
        let Some(navigation) = navigation() else {
            warn!("navigation requested before the shell started");
            return;
        };
        spawn_local(async move {
            let outcome = run(navigation).await;
            debug!(?outcome, "navigation settled");
        });
    }
