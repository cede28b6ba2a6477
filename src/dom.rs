/// Small owners for browser callbacks
///
/// Each type keeps its `Closure` alive and unregisters it on drop, so
/// replacing or dropping one tears down the timer or listener with it.
use std::cell::Cell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, EventTarget, HtmlMediaElement, NodeList, ShadowRoot, Window};

use crate::applier::{MediaElement, apply_speed};
use crate::speed::Speed;

pub fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

pub fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))
}

impl MediaElement for HtmlMediaElement {
    fn playback_rate(&self) -> f64 {
        HtmlMediaElement::playback_rate(self)
    }

    fn set_playback_rate(&self, rate: f64) {
        HtmlMediaElement::set_playback_rate(self, rate)
    }
}

/// A `setInterval` that stops when dropped.
pub struct Interval {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl Interval {
    pub fn start(ms: u32, f: impl FnMut() + 'static) -> Result<Interval, JsValue> {
        let callback = Closure::<dyn FnMut()>::new(f);
        let handle = window()?.set_interval_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            ms as i32,
        )?;
        Ok(Interval {
            handle,
            _callback: callback,
        })
    }
}

impl Drop for Interval {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(self.handle);
        }
    }
}

/// Runs its callback once, `delay_ms` after the last `schedule`.
pub struct Debouncer {
    delay_ms: u32,
    pending: Cell<Option<i32>>,
    callback: Closure<dyn FnMut()>,
}

impl Debouncer {
    pub fn new(delay_ms: u32, f: impl FnMut() + 'static) -> Rc<Debouncer> {
        Rc::new(Debouncer {
            delay_ms,
            pending: Cell::new(None),
            callback: Closure::<dyn FnMut()>::new(f),
        })
    }

    pub fn schedule(&self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Some(handle) = self.pending.take() {
            window.clear_timeout_with_handle(handle);
        }
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            self.callback.as_ref().unchecked_ref(),
            self.delay_ms as i32,
        ) {
            Ok(handle) => self.pending.set(Some(handle)),
            Err(e) => log::warn!("setTimeout failed: {:?}", e),
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let (Some(handle), Some(window)) = (self.pending.take(), web_sys::window()) {
            window.clear_timeout_with_handle(handle);
        }
    }
}

/// An event listener removed on drop.
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    pub fn new(
        target: &EventTarget,
        event: &'static str,
        f: impl FnMut(web_sys::Event) + 'static,
    ) -> Result<Listener, JsValue> {
        let callback = Closure::<dyn FnMut(web_sys::Event)>::new(f);
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
        Ok(Listener {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
    }
}

fn nodes(list: NodeList) -> impl Iterator<Item = web_sys::Node> {
    (0..list.length()).filter_map(move |i| list.item(i))
}

enum ScanRoot {
    Document(Document),
    Shadow(ShadowRoot),
}

impl ScanRoot {
    fn query_all(&self, selector: &str) -> Result<NodeList, JsValue> {
        match self {
            ScanRoot::Document(doc) => doc.query_selector_all(selector),
            ScanRoot::Shadow(shadow) => shadow.query_selector_all(selector),
        }
    }
}

/// Every media element matching `selector`, including inside open shadow roots.
pub fn find_media(document: &Document, selector: &str) -> Vec<HtmlMediaElement> {
    let mut found = Vec::new();
    collect_media(&ScanRoot::Document(document.clone()), selector, &mut found);
    found
}

fn collect_media(root: &ScanRoot, selector: &str, found: &mut Vec<HtmlMediaElement>) {
    match root.query_all(selector) {
        Ok(list) => found.extend(nodes(list).filter_map(|n| n.dyn_into::<HtmlMediaElement>().ok())),
        Err(e) => log::debug!("Media query failed: {:?}", e),
    }

    let Ok(all) = root.query_all("*") else {
        return;
    };
    for node in nodes(all) {
        let Some(shadow) = node.dyn_ref::<Element>().and_then(Element::shadow_root) else {
            continue;
        };
        collect_media(&ScanRoot::Shadow(shadow), selector, found);
    }
}

/// Put every media element back to normal speed. Returns how many changed.
pub fn reset_media(document: &Document, selector: &str) -> usize {
    apply_speed(&find_media(document, selector), Speed::DEFAULT)
}
