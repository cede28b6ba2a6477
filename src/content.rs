/// Content script: keeps every media element on the page at the target speed
///
/// `PageState` decides, this module touches the DOM. Watchers are owned by
/// the controller and torn down by dropping them.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::Array;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    HtmlMediaElement, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
    MutationObserver, MutationObserverInit, Storage,
};

use crate::applier::{
    Effect, LEGACY_LOCAL_KEYS, Mode, PageState, SESSION_SOURCE_KEY, SESSION_SPEED_KEY,
    WATCHED_ATTRIBUTES, WatchPolicy, apply_speed, media_selector,
};
use crate::chrome;
use crate::config::Config;
use crate::domain::PageContext;
use crate::dom::{self, Debouncer, Interval, Listener};
use crate::error::MessagingError;
use crate::messages::{Message, Reply, ResolvedReply, StatusReply};
use crate::speed::{Speed, SpeedSource};

thread_local! {
    static CONTROLLER: RefCell<Option<Rc<ContentController>>> = const { RefCell::new(None) };
}

fn controller() -> Option<Rc<ContentController>> {
    CONTROLLER.with(|c| c.borrow().clone())
}

#[wasm_bindgen]
pub fn start_content(config: JsValue) -> Result<(), JsValue> {
    let config = Config::from_json(serde_wasm_bindgen::from_value(config).ok());
    let controller = ContentController::new(config)?;
    CONTROLLER.with(|c| {
        if let Some(old) = c.borrow_mut().replace(controller.clone()) {
            old.stop();
        }
    });
    controller.start()
}

/// `chrome.runtime.onMessage` inside the page.
#[wasm_bindgen]
pub fn content_handle_message(message: JsValue) -> Result<JsValue, JsValue> {
    let reply = match (serde_wasm_bindgen::from_value::<Message>(message), controller()) {
        (Ok(message), Some(controller)) => controller.handle_message(&message),
        (Err(e), _) => {
            log::debug!("Ignoring unknown message: {}", e);
            Reply::Status(StatusReply::new("ignored"))
        }
        (_, None) => Reply::Status(StatusReply::new("not ready")),
    };
    Ok(chrome::to_js(&reply)?)
}

/// Called by the loader on the Navigation API `navigatesuccess` event.
#[wasm_bindgen]
pub fn content_url_changed() {
    let Some(controller) = controller() else {
        return;
    };
    let settle = controller.config.history_settle_ms;
    spawn_local(async move {
        chrome::wait(settle).await;
        controller.on_navigation();
    });
}

/// Called when the shell sees "Extension context invalidated".
#[wasm_bindgen]
pub fn content_context_invalidated() {
    if let Some(controller) = controller() {
        let effect = controller.state.borrow_mut().enter_standalone();
        controller.perform(effect);
    }
}

/// Observers and timers active while the page is enabled.
struct Watchers {
    mutation: MutationObserver,
    _on_mutation: Closure<dyn FnMut(Array, MutationObserver)>,
    intersection: IntersectionObserver,
    _on_intersect: Closure<dyn FnMut(Array, IntersectionObserver)>,
    _reapply: Rc<Debouncer>,
    _scroll: Option<(Rc<Debouncer>, Listener)>,
    _media_poll: Option<Interval>,
}

impl Watchers {
    fn install(owner: Weak<ContentController>, policy: &WatchPolicy) -> Result<Watchers, JsValue> {
        let document = dom::document()?;

        let reapply = {
            let owner = owner.clone();
            Debouncer::new(policy.mutation_debounce_ms, move || {
                if let Some(controller) = owner.upgrade() {
                    controller.reapply();
                }
            })
        };

        let on_mutation = {
            let reapply = Rc::downgrade(&reapply);
            Closure::<dyn FnMut(Array, MutationObserver)>::new(move |records: Array, _| {
                if records.length() > 0 {
                    if let Some(reapply) = reapply.upgrade() {
                        reapply.schedule();
                    }
                }
            })
        };
        let mutation = MutationObserver::new(on_mutation.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_attributes(true);
        let filter: Array = WATCHED_ATTRIBUTES.iter().map(|a| JsValue::from_str(a)).collect();
        init.set_attribute_filter(&filter);
        let root = document
            .document_element()
            .ok_or_else(|| JsValue::from_str("no document element"))?;
        mutation.observe_with_options(&root, &init)?;

        let on_intersect = {
            let owner = owner.clone();
            Closure::<dyn FnMut(Array, IntersectionObserver)>::new(move |entries: Array, _| {
                let Some(controller) = owner.upgrade() else {
                    return;
                };
                let speed = controller.state.borrow().speed();
                let visible: Vec<HtmlMediaElement> = entries
                    .iter()
                    .filter_map(|e| e.dyn_into::<IntersectionObserverEntry>().ok())
                    .filter(|e| e.is_intersecting())
                    .filter_map(|e| e.target().dyn_into::<HtmlMediaElement>().ok())
                    .collect();
                apply_speed(&visible, speed);
            })
        };
        let options = IntersectionObserverInit::new();
        options.set_threshold(&JsValue::from_f64(policy.intersection_threshold));
        options.set_root_margin(&policy.intersection_root_margin);
        let intersection =
            IntersectionObserver::new_with_options(on_intersect.as_ref().unchecked_ref(), &options)?;

        let scroll = match policy.scroll_debounce_ms {
            Some(ms) => {
                let owner = owner.clone();
                let debouncer = Debouncer::new(ms, move || {
                    if let Some(controller) = owner.upgrade() {
                        controller.reapply();
                    }
                });
                let target = Rc::downgrade(&debouncer);
                let window = dom::window()?;
                let listener = Listener::new(&window, "scroll", move |_| {
                    if let Some(debouncer) = target.upgrade() {
                        debouncer.schedule();
                    }
                })?;
                Some((debouncer, listener))
            }
            None => None,
        };

        let media_poll = match policy.media_poll_ms {
            Some(ms) => Some(Interval::start(ms, move || {
                if let Some(controller) = owner.upgrade() {
                    controller.poll_media();
                }
            })?),
            None => None,
        };

        Ok(Watchers {
            mutation,
            _on_mutation: on_mutation,
            intersection,
            _on_intersect: on_intersect,
            _reapply: reapply,
            _scroll: scroll,
            _media_poll: media_poll,
        })
    }

    fn observe(&self, media: &[HtmlMediaElement]) {
        for element in media {
            self.intersection.observe(element);
        }
    }
}

impl Drop for Watchers {
    fn drop(&mut self) {
        self.mutation.disconnect();
        self.intersection.disconnect();
    }
}

/// SPA navigation detection that works without the Navigation API.
struct NavigationWatch {
    _popstate: Listener,
    _url_poll: Interval,
    _unload: Listener,
}

pub struct ContentController {
    config: Config,
    state: RefCell<PageState>,
    watchers: RefCell<Option<Watchers>>,
    navigation: RefCell<Option<NavigationWatch>>,
    selector: String,
    me: Weak<ContentController>,
}

impl ContentController {
    fn new(config: Config) -> Result<Rc<ContentController>, JsValue> {
        let href = current_href()?;
        Ok(Rc::new_cyclic(|me| ContentController {
            config,
            state: RefCell::new(PageState::new(&href)),
            watchers: RefCell::new(None),
            navigation: RefCell::new(None),
            selector: media_selector(),
            me: me.clone(),
        }))
    }

    fn start(&self) -> Result<(), JsValue> {
        if let Some(session) = session_storage() {
            let speed = session.get_item(SESSION_SPEED_KEY).ok().flatten();
            let source = session.get_item(SESSION_SOURCE_KEY).ok().flatten();
            if self.state.borrow_mut().restore_cached(speed.as_deref(), source.as_deref()) {
                log::debug!("Restored cached speed {}", self.state.borrow().speed().value());
            }
        }

        let window = dom::window()?;
        let owner = self.me.clone();
        let popstate = Listener::new(&window, "popstate", move |_| {
            if let Some(controller) = owner.upgrade() {
                controller.on_navigation();
            }
        })?;
        let owner = self.me.clone();
        let url_poll = Interval::start(self.config.url_poll_ms, move || {
            if let Some(controller) = owner.upgrade() {
                controller.on_navigation();
            }
        })?;
        let unload = Listener::new(&window, "beforeunload", |_| clear_session_cache())?;
        *self.navigation.borrow_mut() = Some(NavigationWatch {
            _popstate: popstate,
            _url_poll: url_poll,
            _unload: unload,
        });

        self.spawn_resolve();
        Ok(())
    }

    /// Drop every watcher and timer.
    fn stop(&self) {
        self.watchers.borrow_mut().take();
        self.navigation.borrow_mut().take();
    }

    fn spawn_resolve(&self) {
        if let Some(controller) = self.me.upgrade() {
            spawn_local(async move { controller.resolve_and_apply().await });
        }
    }

    async fn resolve_and_apply(&self) {
        if self.state.borrow().mode() == Mode::Standalone {
            self.perform(Effect::Apply);
            return;
        }

        let effect = match self.request_resolution().await {
            Ok(resolved) => self
                .state
                .borrow_mut()
                .set_target(Speed::clamped(resolved.speed), resolved.source),
            Err(MessagingError::ContextInvalidated) => self.state.borrow_mut().enter_standalone(),
            Err(e) => {
                log::warn!("Could not resolve speed, using last known: {}", e);
                let mut state = self.state.borrow_mut();
                let speed = state.speed();
                state.set_target(speed, SpeedSource::Fallback)
            }
        };
        self.perform(effect);
    }

    async fn request_resolution(&self) -> Result<ResolvedReply, MessagingError> {
        let message = Message::ResolveSpeed {
            url: current_href().map_err(|e| MessagingError::Other(format!("{:?}", e)))?,
        };
        let value = chrome::with_retry(
            &self.config.retry,
            |e| *e != MessagingError::ContextInvalidated,
            || chrome::send_to_runtime(&message),
        )
        .await?;
        serde_wasm_bindgen::from_value(value).map_err(|e| MessagingError::Other(e.to_string()))
    }

    fn handle_message(&self, message: &Message) -> Reply {
        let (reply, effect) = self.state.borrow_mut().handle(message);
        self.perform(effect);
        reply
    }

    fn perform(&self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::Apply => {
                self.reapply();
                self.save_session_cache();
                if let Err(e) = self.start_watchers() {
                    log::error!("Failed to start media watchers: {:?}", e);
                }
            }
            Effect::Teardown => {
                self.watchers.borrow_mut().take();
                let reset = dom::document()
                    .map(|doc| dom::reset_media(&doc, &self.selector))
                    .unwrap_or(0);
                clear_session_cache();
                log::info!("Disabled, reset {} media elements", reset);
            }
            Effect::Reresolve => self.spawn_resolve(),
            Effect::PurgeLegacy => purge_legacy_keys(),
        }
    }

    fn start_watchers(&self) -> Result<(), JsValue> {
        let hostname = PageContext::parse(&current_href()?)
            .map(|page| page.hostname)
            .unwrap_or_default();
        let policy = WatchPolicy::for_hostname(&hostname, &self.config);
        // drop the old set before installing the new one
        self.watchers.borrow_mut().take();
        let watchers = Watchers::install(self.me.clone(), &policy)?;
        watchers.observe(&self.find_media());
        *self.watchers.borrow_mut() = Some(watchers);
        Ok(())
    }

    fn find_media(&self) -> Vec<HtmlMediaElement> {
        match dom::document() {
            Ok(document) => dom::find_media(&document, &self.selector),
            Err(_) => Vec::new(),
        }
    }

    /// Apply the current target to every media element and watch new ones.
    fn reapply(&self) {
        let state = self.state.borrow();
        if !state.is_enabled() {
            return;
        }
        let media = self.find_media();
        let changed = apply_speed(&media, state.speed());
        if changed > 0 {
            log::debug!("Set {} of {} media elements to {}", changed, media.len(), state.speed().value());
        }
        if let Some(watchers) = self.watchers.borrow().as_ref() {
            watchers.observe(&media);
        }
    }

    fn poll_media(&self) {
        let count = self.find_media().len();
        if self.state.borrow_mut().media_count_changed(count) {
            self.reapply();
        }
    }

    fn on_navigation(&self) {
        let Ok(href) = current_href() else {
            return;
        };
        if !self.state.borrow_mut().url_changed(&href) {
            return;
        }
        log::debug!("Navigated to {}", href);
        if self.state.borrow().is_enabled() {
            self.spawn_resolve();
        }
    }

    fn save_session_cache(&self) {
        let Some(session) = session_storage() else {
            return;
        };
        let state = self.state.borrow();
        let _ = session.set_item(SESSION_SPEED_KEY, &state.speed().value().to_string());
        let _ = session.set_item(SESSION_SOURCE_KEY, state.source().as_str());
    }
}

fn current_href() -> Result<String, JsValue> {
    dom::window()?.location().href()
}

fn session_storage() -> Option<Storage> {
    dom::window().ok()?.session_storage().ok().flatten()
}

fn clear_session_cache() {
    if let Some(session) = session_storage() {
        let _ = session.remove_item(SESSION_SPEED_KEY);
        let _ = session.remove_item(SESSION_SOURCE_KEY);
    }
}

fn purge_legacy_keys() {
    let Some(local) = dom::window().ok().and_then(|w| w.local_storage().ok().flatten()) else {
        return;
    };
    for key in LEGACY_LOCAL_KEYS {
        let _ = local.remove_item(key);
    }
    log::info!("Removed legacy page storage keys");
}
