/// Page-side speed state and the rules for reacting to messages
///
/// `PageState` is the platform-free half of the content script: it holds the
/// target speed and decides what each incoming message means. The DOM half in
/// `content.rs` performs the resulting `Effect`.
use crate::config::Config;
use crate::domain::is_infinite_scroll_site;
use crate::messages::{CurrentSpeedReply, Message, Reply, SpeedUpdatedReply, StatusReply};
use crate::speed::{Speed, SpeedSource};

/// Selectors for playable media, including players embedded in custom elements.
pub const MEDIA_SELECTORS: [&str; 6] = [
    "video",
    "audio",
    "video[data-testid*=\"video\"]",
    "div[data-click-id=\"media\"] video",
    "shreddit-player video",
    "[data-adclicklocation*=\"media\"] video",
];

/// Attributes whose change may mean a new media source.
pub const WATCHED_ATTRIBUTES: [&str; 3] = ["src", "autoplay", "preload"];

pub const SESSION_SPEED_KEY: &str = "sv_session_speed";
pub const SESSION_SOURCE_KEY: &str = "sv_session_source";
pub const LEGACY_LOCAL_KEYS: [&str; 2] = ["speedyVideoLastSpeed", "speedyVideoLastSource"];

pub fn media_selector() -> String {
    MEDIA_SELECTORS.join(", ")
}

pub trait MediaElement {
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
}

/// Set `speed` on every element whose rate differs. Returns how many changed.
pub fn apply_speed<M: MediaElement>(elements: &[M], speed: Speed) -> usize {
    let target = speed.value();
    let mut changed = 0;
    for media in elements {
        if media.playback_rate() != target {
            media.set_playback_rate(target);
            changed += 1;
        }
    }
    changed
}

/// How a page watches for media that appears after load.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchPolicy {
    pub mutation_debounce_ms: u32,
    pub intersection_threshold: f64,
    pub intersection_root_margin: String,
    /// Element-count poll for feeds where mutations are unreliable
    pub media_poll_ms: Option<u32>,
    pub scroll_debounce_ms: Option<u32>,
}

impl WatchPolicy {
    pub fn for_hostname(hostname: &str, config: &Config) -> WatchPolicy {
        let feed = is_infinite_scroll_site(hostname, &config.infinite_scroll_hosts);
        WatchPolicy {
            mutation_debounce_ms: config.mutation_debounce_ms,
            intersection_threshold: config.intersection_threshold,
            intersection_root_margin: config.intersection_root_margin.clone(),
            media_poll_ms: feed.then_some(config.media_poll_ms),
            scroll_debounce_ms: feed.then_some(config.scroll_debounce_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Speeds come from the background.
    Coordinated,
    /// The extension context is gone; keep applying the last known speed.
    Standalone,
}

/// What the DOM layer has to do after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Apply the target and (re)start watchers.
    Apply,
    /// Reset media to 1.0 and stop all watchers and timers.
    Teardown,
    /// Ask the background for a fresh resolution.
    Reresolve,
    PurgeLegacy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    speed: Speed,
    source: SpeedSource,
    enabled: bool,
    mode: Mode,
    current_url: String,
    last_media_count: usize,
}

impl PageState {
    pub fn new(url: &str) -> PageState {
        PageState {
            speed: Speed::DEFAULT,
            source: SpeedSource::Global,
            enabled: true,
            mode: Mode::Coordinated,
            current_url: url.to_string(),
            last_media_count: 0,
        }
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn source(&self) -> SpeedSource {
        self.source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Replace the target. A `disabled` resolution turns the page off.
    pub fn set_target(&mut self, speed: Speed, source: SpeedSource) -> Effect {
        if source == SpeedSource::Disabled {
            return self.disable();
        }
        self.enabled = true;
        self.speed = speed;
        self.source = source;
        Effect::Apply
    }

    pub fn disable(&mut self) -> Effect {
        self.enabled = false;
        self.speed = Speed::DEFAULT;
        self.source = SpeedSource::Disabled;
        Effect::Teardown
    }

    /// Seed from the session cache written by a previous apply on this page.
    pub fn restore_cached(&mut self, speed: Option<&str>, source: Option<&str>) -> bool {
        match (speed.and_then(Speed::parse), source.and_then(SpeedSource::parse)) {
            (Some(speed), Some(source)) => {
                self.speed = speed;
                self.source = source;
                true
            }
            _ => false,
        }
    }

    /// The extension was reloaded under us; continue on the last known speed.
    pub fn enter_standalone(&mut self) -> Effect {
        if self.mode == Mode::Standalone {
            return Effect::None;
        }
        log::warn!("Extension context lost, continuing standalone at {}", self.speed.value());
        self.mode = Mode::Standalone;
        self.source = SpeedSource::Standalone;
        Effect::Apply
    }

    /// Record a navigation; true when the URL really changed.
    pub fn url_changed(&mut self, url: &str) -> bool {
        if url == self.current_url {
            return false;
        }
        self.current_url = url.to_string();
        true
    }

    /// Record the media count seen by the poll; true when it moved.
    pub fn media_count_changed(&mut self, count: usize) -> bool {
        if count == self.last_media_count {
            return false;
        }
        self.last_media_count = count;
        true
    }

    pub fn handle(&mut self, message: &Message) -> (Reply, Effect) {
        match message {
            Message::UpdateSpeed { speed, source } => {
                if !self.enabled {
                    return (
                        Reply::Status(StatusReply::new("blocked - extension disabled")),
                        Effect::None,
                    );
                }
                let source = source.unwrap_or(SpeedSource::Manual);
                let effect = self.set_target(Speed::clamped(*speed), source);
                let reply = SpeedUpdatedReply {
                    status: "speed updated".to_string(),
                    new_speed: self.speed.value(),
                    source: self.source,
                };
                (Reply::SpeedUpdated(reply), effect)
            }
            Message::GetCurrentSpeed => (
                Reply::CurrentSpeed(CurrentSpeedReply {
                    current_speed: self.speed.value(),
                    source: self.source,
                    is_enabled: self.enabled,
                }),
                Effect::None,
            ),
            Message::Disable => {
                let effect = self.disable();
                (Reply::Status(StatusReply::new("disabled")), effect)
            }
            Message::Enable => {
                self.enabled = true;
                (Reply::Status(StatusReply::new("enabled")), Effect::Reresolve)
            }
            Message::CleanupLegacyData => (
                Reply::Status(StatusReply::new("cleanup completed")),
                Effect::PurgeLegacy,
            ),
            other => {
                log::debug!("Content script ignores {:?}", other);
                (Reply::Status(StatusReply::new("ignored")), Effect::None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeMedia {
        rate: Cell<f64>,
        writes: Cell<u32>,
    }

    impl FakeMedia {
        fn at(rate: f64) -> FakeMedia {
            FakeMedia {
                rate: Cell::new(rate),
                writes: Cell::new(0),
            }
        }
    }

    impl MediaElement for FakeMedia {
        fn playback_rate(&self) -> f64 {
            self.rate.get()
        }

        fn set_playback_rate(&self, rate: f64) {
            self.rate.set(rate);
            self.writes.set(self.writes.get() + 1);
        }
    }

    #[test]
    fn test_apply_only_touches_differing_elements() {
        let media = vec![FakeMedia::at(1.0), FakeMedia::at(2.0), FakeMedia::at(0.5)];
        let changed = apply_speed(&media, Speed::clamped(2.0));
        assert_eq!(changed, 2);
        assert!(media.iter().all(|m| m.playback_rate() == 2.0));
        assert_eq!(media[1].writes.get(), 0);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let media = vec![FakeMedia::at(1.0)];
        assert_eq!(apply_speed(&media, Speed::clamped(1.5)), 1);
        assert_eq!(apply_speed(&media, Speed::clamped(1.5)), 0);
    }

    #[test]
    fn test_watch_policy_for_feeds() {
        let config = Config::default();
        let feed = WatchPolicy::for_hostname("www.reddit.com", &config);
        assert_eq!(feed.media_poll_ms, Some(1000));
        assert_eq!(feed.scroll_debounce_ms, Some(200));
        assert_eq!(feed.mutation_debounce_ms, 50);

        let plain = WatchPolicy::for_hostname("vimeo.com", &config);
        assert_eq!(plain.media_poll_ms, None);
        assert_eq!(plain.scroll_debounce_ms, None);
    }

    #[test]
    fn test_update_speed_replaces_target() {
        let mut state = PageState::new("https://a.com");
        let (reply, effect) = state.handle(&Message::UpdateSpeed {
            speed: 2.5,
            source: Some(SpeedSource::Domain),
        });
        assert_eq!(effect, Effect::Apply);
        assert_eq!(state.speed().value(), 2.5);
        assert_eq!(
            reply,
            Reply::SpeedUpdated(SpeedUpdatedReply {
                status: "speed updated".to_string(),
                new_speed: 2.5,
                source: SpeedSource::Domain,
            })
        );
    }

    #[test]
    fn test_update_without_source_is_manual() {
        let mut state = PageState::new("https://a.com");
        state.handle(&Message::UpdateSpeed { speed: 40.0, source: None });
        assert_eq!(state.source(), SpeedSource::Manual);
        assert_eq!(state.speed().value(), 16.0);
    }

    #[test]
    fn test_update_blocked_while_disabled() {
        let mut state = PageState::new("https://a.com");
        state.handle(&Message::Disable);
        let (reply, effect) = state.handle(&Message::UpdateSpeed { speed: 2.0, source: None });
        assert_eq!(effect, Effect::None);
        assert_eq!(reply, Reply::Status(StatusReply::new("blocked - extension disabled")));
        assert_eq!(state.speed(), Speed::DEFAULT);
    }

    #[test]
    fn test_disabled_resolution_tears_down() {
        let mut state = PageState::new("https://a.com");
        let effect = state.set_target(Speed::DEFAULT, SpeedSource::Disabled);
        assert_eq!(effect, Effect::Teardown);
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_enable_requests_resolution() {
        let mut state = PageState::new("https://a.com");
        state.handle(&Message::Disable);
        let (_, effect) = state.handle(&Message::Enable);
        assert_eq!(effect, Effect::Reresolve);
        assert!(state.is_enabled());
    }

    #[test]
    fn test_current_speed_reply() {
        let mut state = PageState::new("https://a.com");
        state.set_target(Speed::clamped(3.0), SpeedSource::Pinned);
        let (reply, _) = state.handle(&Message::GetCurrentSpeed);
        assert_eq!(
            reply,
            Reply::CurrentSpeed(CurrentSpeedReply {
                current_speed: 3.0,
                source: SpeedSource::Pinned,
                is_enabled: true,
            })
        );
    }

    #[test]
    fn test_cleanup_legacy_data() {
        let mut state = PageState::new("https://a.com");
        let (_, effect) = state.handle(&Message::CleanupLegacyData);
        assert_eq!(effect, Effect::PurgeLegacy);
    }

    #[test]
    fn test_standalone_keeps_last_speed() {
        let mut state = PageState::new("https://a.com");
        assert!(state.restore_cached(Some("1.75"), Some("domain")));
        assert_eq!(state.enter_standalone(), Effect::Apply);
        assert_eq!(state.mode(), Mode::Standalone);
        assert_eq!(state.speed().value(), 1.75);
        assert_eq!(state.enter_standalone(), Effect::None);
    }

    #[test]
    fn test_restore_cached_rejects_garbage() {
        let mut state = PageState::new("https://a.com");
        assert!(!state.restore_cached(Some("x"), Some("domain")));
        assert!(!state.restore_cached(Some("2"), None));
        assert_eq!(state.speed(), Speed::DEFAULT);
    }

    #[test]
    fn test_url_and_media_trackers() {
        let mut state = PageState::new("https://a.com/1");
        assert!(!state.url_changed("https://a.com/1"));
        assert!(state.url_changed("https://a.com/2"));
        assert!(!state.url_changed("https://a.com/2"));

        assert!(!state.media_count_changed(0));
        assert!(state.media_count_changed(3));
        assert!(!state.media_count_changed(3));
    }
}
