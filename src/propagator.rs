/// Background planning: which tabs hear about which change
///
/// Every handler here is pure. It takes a storage snapshot plus the open tabs
/// and returns the messages and storage writes to perform; `background.rs`
/// carries them out.
use crate::config::Config;
use crate::domain::{PageContext, is_http_url};
use crate::messages::Message;
use crate::resolver::{Resolution, active_rule_marker, resolve};
use crate::rules::TabInfo;
use crate::speed::SpeedSource;
use crate::storage::{RuleSnapshot, StoreWrite, TabKey, keys, keys_for_tab, orphaned_keys};

#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Send { tab_id: i32, message: Message },
    Store(StoreWrite),
}

/// What a storage change means for open tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChangeScope {
    GlobalSpeed,
    AllTabs,
    Tab(i32),
}

fn change_scope(key: &str) -> Option<ChangeScope> {
    match key {
        keys::SELECTED_SPEED => Some(ChangeScope::GlobalSpeed),
        keys::DOMAIN_SPEEDS | keys::BLACKLIST_DOMAINS | keys::EXCLUSIONS => {
            Some(ChangeScope::AllTabs)
        }
        _ => match TabKey::parse(key) {
            Some((TabKey::PinnedSpeed, id))
            | Some((TabKey::DomainRuleDisabled, id))
            | Some((TabKey::LegacyDomainOverrides, id)) => Some(ChangeScope::Tab(id)),
            _ => None,
        },
    }
}

#[derive(Debug, Clone, Default)]
pub struct Propagator {
    config: Config,
}

impl Propagator {
    pub fn new(config: Config) -> Self {
        Propagator { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolve_for(&self, tab_id: Option<i32>, url: &str, snapshot: &RuleSnapshot) -> Option<Resolution> {
        let page = PageContext::parse(url)?;
        Some(resolve(tab_id, &page, snapshot))
    }

    /// Speed update for one tab plus the matching `activeDomainRule_<id>` write.
    fn update_tab(&self, tab: &TabInfo, snapshot: &RuleSnapshot) -> Vec<Outgoing> {
        let Some(page) = PageContext::parse(&tab.url) else {
            return Vec::new();
        };
        let resolution = resolve(Some(tab.id), &page, snapshot);
        let marker = active_rule_marker(Some(tab.id), &page, snapshot, &resolution);

        let mut out = vec![Outgoing::Send {
            tab_id: tab.id,
            message: Message::update(&resolution),
        }];
        if marker.as_ref() != snapshot.active_domain_rule(tab.id) {
            out.push(Outgoing::Store(
                StoreWrite::new().set_active_domain_rule(tab.id, marker.as_ref()),
            ));
        }
        out
    }

    /// A tab finished loading. The caller waits `settle_delay_ms` first.
    pub fn on_tab_complete(&self, tab: &TabInfo, status: &str, snapshot: &RuleSnapshot) -> Vec<Outgoing> {
        if status != "complete" || !is_http_url(&tab.url) {
            return Vec::new();
        }
        log::debug!("Tab {} loaded {}", tab.id, tab.url);
        self.update_tab(tab, snapshot)
    }

    /// A content script asks for its speed. Only the top frame (frame id 0)
    /// owns the tab's `activeDomainRule_<id>` marker; embedded frames get a
    /// resolution for their own URL and leave storage alone.
    pub fn on_resolve_request(
        &self,
        tab_id: Option<i32>,
        frame_id: Option<i32>,
        url: &str,
        snapshot: &RuleSnapshot,
    ) -> (Resolution, Vec<Outgoing>) {
        let resolution = self
            .resolve_for(tab_id, url, snapshot)
            .unwrap_or(Resolution::new(snapshot.global_speed, SpeedSource::Global));

        let markers = match (tab_id, frame_id) {
            (Some(tab_id), Some(0)) if is_http_url(url) => self
                .update_tab(&TabInfo::new(tab_id, url), snapshot)
                .into_iter()
                .filter(|o| matches!(o, Outgoing::Store(_)))
                .collect(),
            _ => Vec::new(),
        };
        (resolution, markers)
    }

    /// Tabs a global speed change must leave alone.
    pub fn skips_global_update(&self, tab_id: i32, snapshot: &RuleSnapshot) -> bool {
        snapshot.has_pin(tab_id) || snapshot.active_domain_rule(tab_id).is_some()
    }

    pub fn on_storage_changed(
        &self,
        changed_keys: &[String],
        tabs: &[TabInfo],
        snapshot: &RuleSnapshot,
    ) -> Vec<Outgoing> {
        let scopes: Vec<ChangeScope> = changed_keys.iter().filter_map(|k| change_scope(k)).collect();
        if scopes.is_empty() {
            return Vec::new();
        }

        let all_tabs = scopes.contains(&ChangeScope::AllTabs);
        let global = scopes.contains(&ChangeScope::GlobalSpeed);

        let mut out = Vec::new();
        for tab in tabs.iter().filter(|tab| is_http_url(&tab.url)) {
            let targeted = all_tabs || scopes.contains(&ChangeScope::Tab(tab.id));
            if !targeted {
                if !global {
                    continue;
                }
                if self.skips_global_update(tab.id, snapshot) {
                    log::debug!("Global speed change skips tab {}", tab.id);
                    continue;
                }
            }

            let updates = self.update_tab(tab, snapshot);
            // a global change never overrides a pin or domain rule
            if !targeted && updates.iter().any(follows_tab_rule) {
                continue;
            }
            out.extend(updates);
        }
        out
    }

    /// Cleanup for a closed tab.
    pub fn on_tab_removed(&self, tab_id: i32) -> StoreWrite {
        StoreWrite::new().remove_keys(keys_for_tab(tab_id))
    }

    /// Orphan sweep: drop per-tab keys of tabs that no longer exist.
    pub fn sweep<'a>(
        &self,
        stored_keys: impl IntoIterator<Item = &'a str>,
        open_tab_ids: &[i32],
    ) -> StoreWrite {
        let orphans = orphaned_keys(stored_keys, open_tab_ids);
        if !orphans.is_empty() {
            log::info!("Removing {} orphaned tab keys", orphans.len());
        }
        StoreWrite::new().remove_keys(orphans)
    }

    /// Persist the enable flag and tell every page about it.
    pub fn on_global_toggle(&self, enabled: bool, tabs: &[TabInfo]) -> Vec<Outgoing> {
        let message = if enabled { Message::Enable } else { Message::Disable };
        let mut out = vec![Outgoing::Store(StoreWrite::new().set_extension_enabled(enabled))];
        out.extend(
            tabs.iter()
                .filter(|tab| is_http_url(&tab.url))
                .map(|tab| Outgoing::Send {
                    tab_id: tab.id,
                    message: message.clone(),
                }),
        );
        out
    }
}

fn follows_tab_rule(out: &Outgoing) -> bool {
    matches!(
        out,
        Outgoing::Send {
            message: Message::UpdateSpeed {
                source: Some(SpeedSource::Pinned) | Some(SpeedSource::Domain),
                ..
            },
            ..
        }
    )
}
