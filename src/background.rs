/// Background service worker entry points
///
/// The JS shell forwards chrome events here. Each handler loads a fresh
/// storage snapshot, asks the `Propagator` what to do and performs it.
use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::chrome;
use crate::config::{Config, RetryPolicy};
use crate::error::{MessagingError, Result};
use crate::messages::{Message, Reply, ResolvedReply, StatusReply, TabReply};
use crate::propagator::{Outgoing, Propagator};
use crate::rules::TabInfo;
use crate::storage::StoreWrite;

thread_local! {
    static PROPAGATOR: RefCell<Propagator> = RefCell::new(Propagator::default());
}

fn propagator() -> Propagator {
    PROPAGATOR.with(|p| p.borrow().clone())
}

/// Install the configuration. Returns the sweep interval in minutes for the
/// alarm the shell creates.
#[wasm_bindgen]
pub fn init_background(config: JsValue) -> u32 {
    let config = Config::from_json(serde_wasm_bindgen::from_value(config).ok());
    let minutes = config.sweep_interval_minutes;
    PROPAGATOR.with(|p| *p.borrow_mut() = Propagator::new(config));
    log::info!("Background ready, sweeping every {} minutes", minutes);
    minutes
}

#[wasm_bindgen]
pub async fn on_tab_updated(tab_id: i32, status: String, url: Option<String>) -> std::result::Result<(), JsValue> {
    let Some(url) = url else {
        return Ok(());
    };
    if status != "complete" {
        return Ok(());
    }

    let propagator = propagator();
    // let the page's own scripts attach their players first
    chrome::wait(propagator.config().settle_delay_ms).await;

    let (snapshot, _) = chrome::load_snapshot().await?;
    let tab = TabInfo::new(tab_id, &url);
    deliver(&propagator, propagator.on_tab_complete(&tab, &status, &snapshot)).await;
    Ok(())
}

#[wasm_bindgen]
pub async fn on_tab_removed(tab_id: i32) -> std::result::Result<(), JsValue> {
    let write = propagator().on_tab_removed(tab_id);
    chrome::apply_write(&write).await?;
    log::debug!("Cleaned up state for closed tab {}", tab_id);
    Ok(())
}

#[wasm_bindgen]
pub async fn on_storage_changed(changed_keys: Vec<String>) -> std::result::Result<(), JsValue> {
    let propagator = propagator();
    let (snapshot, _) = chrome::load_snapshot().await?;
    let tabs = chrome::open_tabs().await?;
    let out = propagator.on_storage_changed(&changed_keys, &tabs, &snapshot);
    deliver(&propagator, out).await;
    Ok(())
}

#[wasm_bindgen]
pub async fn run_orphan_sweep() -> std::result::Result<(), JsValue> {
    let propagator = propagator();
    let (_, stored_keys) = chrome::load_snapshot().await?;
    let open_ids: Vec<i32> = chrome::open_tabs().await?.iter().map(|t| t.id).collect();
    let write = propagator.sweep(stored_keys.iter().map(String::as_str), &open_ids);
    chrome::apply_write(&write).await?;
    Ok(())
}

/// `chrome.runtime.onMessage` from the popup or a content script.
#[wasm_bindgen]
pub async fn on_runtime_message(
    message: JsValue,
    sender_tab_id: Option<i32>,
    sender_frame_id: Option<i32>,
) -> std::result::Result<JsValue, JsValue> {
    let message: Message = match serde_wasm_bindgen::from_value(message) {
        Ok(message) => message,
        Err(e) => {
            log::warn!("Ignoring unknown runtime message: {}", e);
            return Ok(chrome::to_js(&Reply::Status(StatusReply::new("ignored")))?);
        }
    };
    let reply = handle_runtime_message(message, sender_tab_id, sender_frame_id).await?;
    Ok(chrome::to_js(&reply)?)
}

async fn handle_runtime_message(
    message: Message,
    sender_tab_id: Option<i32>,
    sender_frame_id: Option<i32>,
) -> Result<Reply> {
    let propagator = propagator();
    match message {
        Message::GetCurrentTab => Ok(Reply::Tab(TabReply {
            tab_id: sender_tab_id,
        })),
        Message::ResolveSpeed { url } => {
            let (snapshot, _) = chrome::load_snapshot().await?;
            let (resolution, markers) =
                propagator.on_resolve_request(sender_tab_id, sender_frame_id, &url, &snapshot);
            deliver(&propagator, markers).await;

            Ok(Reply::Resolved(ResolvedReply {
                tab_id: sender_tab_id,
                speed: resolution.speed.value(),
                source: resolution.source,
            }))
        }
        Message::DisableGlobal => set_enabled(&propagator, false).await,
        Message::EnableGlobal => set_enabled(&propagator, true).await,
        other => {
            log::debug!("Background ignores {:?}", other);
            Ok(Reply::Status(StatusReply::new("ignored")))
        }
    }
}

async fn set_enabled(propagator: &Propagator, enabled: bool) -> Result<Reply> {
    let tabs = chrome::open_tabs().await?;
    deliver(propagator, propagator.on_global_toggle(enabled, &tabs)).await;
    let status = if enabled { "enabled" } else { "disabled" };
    log::info!("Extension {}", status);
    Ok(Reply::Status(StatusReply::new(status)))
}

/// Storage writes run in order; each tab message runs on its own task so
/// one slow retry never holds up the other tabs.
async fn deliver(propagator: &Propagator, out: Vec<Outgoing>) {
    for item in out {
        match item {
            Outgoing::Send { tab_id, message } => {
                let retry = propagator.config().retry;
                spawn_local(async move { send_quietly(&retry, tab_id, &message).await });
            }
            Outgoing::Store(write) => store_quietly(&write).await,
        }
    }
}

async fn send_quietly(retry: &RetryPolicy, tab_id: i32, message: &Message) {
    let result = chrome::with_retry(retry, MessagingError::is_transient, || {
        chrome::send_to_tab(tab_id, message)
    })
    .await;

    match result {
        Ok(_) => log::debug!("Sent {:?} to tab {}", message, tab_id),
        // no content script in this tab; expected for many pages
        Err(MessagingError::NoReceiver(_)) => log::debug!("Tab {} has no listener", tab_id),
        Err(e) => log::error!("Failed to message tab {}: {}", tab_id, e),
    }
}

async fn store_quietly(write: &StoreWrite) {
    if let Err(e) = chrome::apply_write(write).await {
        log::error!("Storage write failed: {}", e);
    }
}
