use super::*;

    type StreamItem = Result<ChatStreamEvent, TransportError>;

    pub(super) fn map_network_error(error: gloo_net::Error) -> TransportError {
        TransportError::Network(error.to_string())
    }

    fn map_decode_error(error: gloo_net::Error) -> TransportError {
        TransportError::Decode(error.to_string())
    }

    /// Fetches `<main>` fragments for the navigation controller.
    pub(super) struct HttpFragmentFetcher;

    #[async_trait(?Send)]
    impl FragmentFetcher for HttpFragmentFetcher {
        async fn fetch_fragment(&self, url: &str) -> Result<FragmentResponse, FetchError> {
            let response = Request::get(url)
                .header(PARTIAL_REQUEST_HEADER, "true")
                .send()
                .await
                .map_err(|error| FetchError::Network(error.to_string()))?;
            let status = response.status();
            let title = response.headers().get(PAGE_TITLE_HEADER);
            let body = response
                .text()
                .await
                .map_err(|error| FetchError::Body(error.to_string()))?;
            Ok(FragmentResponse {
                status,
                title,
                body,
            })
        }
    }

    pub(super) struct BrowserChatTransport;

    #[async_trait(?Send)]
    impl ChatTransport for BrowserChatTransport {
        async fn fetch_status(&self, status_url: &str) -> Result<ChatStatus, TransportError> {
            let response = Request::get(status_url)
                .header("accept", "application/json")
                .send()
                .await
                .map_err(map_network_error)?;
            match response.status() {
                404 => Err(TransportError::NotFound),
                status if !response.ok() => Err(TransportError::Status { status }),
                _ => response.json::<ChatStatus>().await.map_err(map_decode_error),
            }
        }

        async fn open_stream(&self, stream_url: &str) -> Result<ChatChannel, TransportError> {
            let (handle, events) = EventSourceHandle::open(stream_url)?;
            Ok(ChatChannel {
                events: events.boxed_local(),
                handle: Rc::new(handle),
            })
        }

        async fn post_message(
            &self,
            send_url: &str,
            request: &ChatSendRequest,
        ) -> Result<serde_json::Value, TransportError> {
            let response = Request::post(send_url)
                .json(&request.post_body())
                .map_err(map_network_error)?
                .send()
                .await
                .map_err(map_network_error)?;
            match response.status() {
                404 => Err(TransportError::NotFound),
                status if !response.ok() => Err(TransportError::Status { status }),
                _ => response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(map_decode_error),
            }
        }
    }

    /// One `EventSource` exchange. Events are forwarded into an unbounded
    /// channel until the server errors or the handle is closed.
    pub(super) struct EventSourceHandle {
        source: EventSource,
        sender: mpsc::UnboundedSender<StreamItem>,
        callbacks: RefCell<
            Option<(
                Closure<dyn FnMut(MessageEvent)>,
                Closure<dyn FnMut(web_sys::Event)>,
            )>,
        >,
    }

    impl EventSourceHandle {
        pub(super) fn open(
            url: &str,
        ) -> Result<(Self, mpsc::UnboundedReceiver<StreamItem>), TransportError> {
            let source = EventSource::new(url).map_err(|value| {
                TransportError::Network(value.as_string().unwrap_or_else(|| format!("{value:?}")))
            })?;
            let (sender, receiver) = mpsc::unbounded();

            let message_sender = sender.clone();
            let on_message = Closure::<dyn FnMut(MessageEvent)>::wrap(Box::new(move |event: MessageEvent| {
                let item = match event.data().as_string() {
                    Some(data) => serde_json::from_str::<ChatStreamEvent>(&data)
                        .map_err(|error| TransportError::Decode(error.to_string())),
                    None => Err(TransportError::Decode(
                        "stream event carried no text".to_string(),
                    )),
                };
                let _ = message_sender.unbounded_send(item);
            }));

            // Left open, the browser would reconnect and resend the message.
            let error_sender = sender.clone();
            let error_source = source.clone();
            let on_error = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
                error_source.close();
                let _ = error_sender.unbounded_send(Err(TransportError::Network(
                    "the event stream connection was lost".to_string(),
                )));
                error_sender.close_channel();
            }));

            source.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
            source.set_onerror(Some(on_error.as_ref().unchecked_ref()));
            debug!(url, "event stream opened");

            Ok((
                Self {
                    source,
                    sender,
                    callbacks: RefCell::new(Some((on_message, on_error))),
                },
                receiver,
            ))
        }
    }

    impl ChannelHandle for EventSourceHandle {
        fn close(&self) {
            self.source.close();
            self.source.set_onmessage(None);
            self.source.set_onerror(None);
            self.sender.close_channel();
            self.callbacks.replace(None);
        }
    }

    impl Drop for EventSourceHandle {
        fn drop(&mut self) {
            self.source.close();
        }
    }

    pub(super) async fn fetch_document(url: &str) -> Result<DocumentPayload, ShellError> {
        let response = Request::get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|error| ShellError::Request(error.to_string()))?;
        if !response.ok() {
            return Err(ShellError::Status(response.status()));
        }
        response
            .json::<DocumentPayload>()
            .await
            .map_err(|error| ShellError::Request(error.to_string()))
    }
