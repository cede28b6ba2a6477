/// Error types shared by the background and content entry points
use thiserror::Error;
use wasm_bindgen::JsValue;

/// How a failed `sendMessage` should be treated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagingError {
    /// The tab has no listener yet, or is not a page at all.
    #[error("no receiver: {0}")]
    NoReceiver(String),
    /// The extension was reloaded while the page stayed open.
    #[error("extension context invalidated")]
    ContextInvalidated,
    #[error("messaging failed: {0}")]
    Other(String),
}

impl MessagingError {
    pub fn classify(message: &str) -> MessagingError {
        if message.contains("Extension context invalidated") {
            MessagingError::ContextInvalidated
        } else if message.contains("Receiving end does not exist")
            || message.contains("The message port closed before a response was received")
        {
            MessagingError::NoReceiver(message.to_string())
        } else {
            MessagingError::Other(message.to_string())
        }
    }

    pub fn from_js(value: &JsValue) -> MessagingError {
        MessagingError::classify(&js_error_text(value))
    }

    /// Worth retrying: neither expected silence nor a dead context.
    pub fn is_transient(&self) -> bool {
        matches!(self, MessagingError::Other(_))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_wasm_bindgen::Error> for Error {
    fn from(e: serde_wasm_bindgen::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<Error> for JsValue {
    fn from(e: Error) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

/// Best-effort text of a thrown JS value (Error object or plain string).
pub fn js_error_text(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    js_sys::Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_no_receiver() {
        let err = MessagingError::classify(
            "Could not establish connection. Receiving end does not exist.",
        );
        assert!(matches!(err, MessagingError::NoReceiver(_)));
        assert!(!err.is_transient());

        let err = MessagingError::classify(
            "The message port closed before a response was received.",
        );
        assert!(matches!(err, MessagingError::NoReceiver(_)));
    }

    #[test]
    fn test_classify_context_invalidated() {
        let err = MessagingError::classify("Error: Extension context invalidated.");
        assert_eq!(err, MessagingError::ContextInvalidated);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_other_is_transient() {
        let err = MessagingError::classify("Tabs cannot be edited right now");
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "messaging failed: Tabs cannot be edited right now");
    }

    #[test]
    fn test_error_wraps_messaging() {
        let err: Error = MessagingError::ContextInvalidated.into();
        assert_eq!(err.to_string(), "extension context invalidated");
    }
}
