/// Typed wrappers around the chrome.* bridge in js/chrome_bridge.js

use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

use crate::config::RetryPolicy;
use crate::error::{Error, MessagingError, Result, js_error_text};
use crate::messages::Message;
use crate::rules::TabInfo;
use crate::storage::{RuleSnapshot, StoreWrite};

// Import JS bridge functions
#[wasm_bindgen(module = "/js/chrome_bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn storageGetAll() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageApply(write: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryTabs() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn activeTab() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendTabMessage(tab_id: i32, message: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(message: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sleep(ms: u32) -> std::result::Result<(), JsValue>;
}

/// Plain JS objects, not `Map`s, so chrome.storage and sendMessage accept them.
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(Error::from)
}

/// Every stored item, as a typed snapshot plus the raw key list.
pub async fn load_snapshot() -> Result<(RuleSnapshot, Vec<String>)> {
    let items_js = storageGetAll()
        .await
        .map_err(|e| Error::Storage(js_error_text(&e)))?;

    let items: Map<String, Value> = if items_js.is_null() || items_js.is_undefined() {
        Map::new()
    } else {
        serde_wasm_bindgen::from_value(items_js)?
    };

    let keys = items.keys().cloned().collect();
    Ok((RuleSnapshot::from_items(&items), keys))
}

pub async fn apply_write(write: &StoreWrite) -> Result<()> {
    if write.is_empty() {
        return Ok(());
    }
    storageApply(to_js(write)?)
        .await
        .map_err(|e| Error::Storage(js_error_text(&e)))
}

pub async fn open_tabs() -> Result<Vec<TabInfo>> {
    let tabs_js = queryTabs()
        .await
        .map_err(|e| Error::Storage(js_error_text(&e)))?;
    Ok(serde_wasm_bindgen::from_value(tabs_js)?)
}

pub async fn active_tab() -> Result<Option<TabInfo>> {
    let tab_js = activeTab()
        .await
        .map_err(|e| Error::Storage(js_error_text(&e)))?;
    if tab_js.is_null() || tab_js.is_undefined() {
        return Ok(None);
    }
    Ok(Some(serde_wasm_bindgen::from_value(tab_js)?))
}

pub async fn send_to_tab(tab_id: i32, message: &Message) -> std::result::Result<JsValue, MessagingError> {
    let message_js = to_js(message).map_err(|e| MessagingError::Other(e.to_string()))?;
    sendTabMessage(tab_id, message_js)
        .await
        .map_err(|e| MessagingError::from_js(&e))
}

pub async fn send_to_runtime(message: &Message) -> std::result::Result<JsValue, MessagingError> {
    let message_js = to_js(message).map_err(|e| MessagingError::Other(e.to_string()))?;
    sendRuntimeMessage(message_js)
        .await
        .map_err(|e| MessagingError::from_js(&e))
}

pub async fn wait(ms: u32) {
    if ms == 0 {
        return;
    }
    if let Err(e) = sleep(ms).await {
        log::warn!("Timer failed: {}", js_error_text(&e));
    }
}

/// Run `send` until it succeeds, the error is not retryable, or the policy
/// runs out of attempts.
pub async fn with_retry<F, Fut>(
    policy: &RetryPolicy,
    retryable: impl Fn(&MessagingError) -> bool,
    mut send: F,
) -> std::result::Result<JsValue, MessagingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<JsValue, MessagingError>>,
{
    let mut attempt = 0;
    loop {
        match send().await {
            Ok(value) => return Ok(value),
            Err(e) if retryable(&e) => match policy.delay_for(attempt) {
                Some(delay) => {
                    log::debug!("Retry {} in {}ms after: {}", attempt + 1, delay, e);
                    wait(delay).await;
                    attempt += 1;
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        }
    }
}
