use super::*;

    /// Chat log in `localStorage`, session identity in a first-party cookie.
    pub(super) struct BrowserChatStorage;

    impl BrowserChatStorage {
        fn local_storage() -> Result<web_sys::Storage, StorageError> {
            window()
                .ok()
                .and_then(|window| window.local_storage().ok().flatten())
                .ok_or(StorageError::Unavailable)
        }

        fn html_document() -> Result<web_sys::HtmlDocument, StorageError> {
            document()
                .ok()
                .and_then(|document| document.dyn_into::<web_sys::HtmlDocument>().ok())
                .ok_or(StorageError::Unavailable)
        }
    }

    fn write_failed(value: JsValue) -> StorageError {
        StorageError::WriteFailed(value.as_string().unwrap_or_else(|| format!("{value:?}")))
    }

    impl ChatStorage for BrowserChatStorage {
        fn load_log(&self, key: &str) -> Result<Option<String>, StorageError> {
            Self::local_storage()?
                .get_item(key)
                .map_err(|_| StorageError::Unavailable)
        }

        fn store_log(&self, key: &str, encoded: &str) -> Result<(), StorageError> {
            Self::local_storage()?
                .set_item(key, encoded)
                .map_err(write_failed)
        }

        fn remove_log(&self, key: &str) -> Result<(), StorageError> {
            Self::local_storage()?.remove_item(key).map_err(write_failed)
        }

        fn load_session(&self, key: &str) -> Result<Option<String>, StorageError> {
            let cookies = Self::html_document()?
                .cookie()
                .map_err(|_| StorageError::Unavailable)?;
            Ok(cookie_value(&cookies, key))
        }

        fn store_session(&self, key: &str, identity: &SessionIdentity) -> Result<(), StorageError> {
            Self::html_document()?
                .set_cookie(&session_cookie(key, identity.as_str()))
                .map_err(write_failed)
        }
    }
