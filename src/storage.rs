/// Typed view over chrome.storage.local
///
/// Everything read from storage passes through `RuleSnapshot::from_items`, so
/// the rest of the crate never touches raw JSON. Writes are collected into a
/// `StoreWrite` and handed to the bridge together.
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::rules::{ActiveDomainRule, BlacklistEntry, DomainRule, ExclusionPattern, RuleSet};
use crate::speed::{PresetList, Speed};

pub mod keys {
    pub const EXTENSION_STATE: &str = "extensionState";
    pub const SELECTED_SPEED: &str = "selectedSpeed";
    pub const DEFAULT_SPEED_LIST: &str = "defaultSpeedList";
    pub const DOMAIN_SPEEDS: &str = "domainSpeeds";
    pub const BLACKLIST_DOMAINS: &str = "blacklistDomains";
    pub const EXCLUSIONS: &str = "websitesAddedToUrlConditionsExclusion";
    pub const DARK_MODE: &str = "darkMode";
}

/// Keys that belong to a single tab and must die with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TabKey {
    PinnedSpeed,
    ActiveDomainRule,
    DomainRuleDisabled,
    /// Older name for `DomainRuleDisabled`; read and cleaned up, never written.
    LegacyDomainOverrides,
}

impl TabKey {
    pub const ALL: [TabKey; 4] = [
        TabKey::PinnedSpeed,
        TabKey::ActiveDomainRule,
        TabKey::DomainRuleDisabled,
        TabKey::LegacyDomainOverrides,
    ];

    fn prefix(self) -> &'static str {
        match self {
            TabKey::PinnedSpeed => "pinnedSpeed_",
            TabKey::ActiveDomainRule => "activeDomainRule_",
            TabKey::DomainRuleDisabled => "domainRuleDisabled_",
            TabKey::LegacyDomainOverrides => "tabDomainOverrides_",
        }
    }

    pub fn key(self, tab_id: i32) -> String {
        format!("{}{}", self.prefix(), tab_id)
    }

    pub fn parse(key: &str) -> Option<(TabKey, i32)> {
        TabKey::ALL.iter().find_map(|kind| {
            key.strip_prefix(kind.prefix())
                .and_then(|id| id.parse::<i32>().ok())
                .map(|id| (*kind, id))
        })
    }
}

/// Every per-tab key for one tab.
pub fn keys_for_tab(tab_id: i32) -> Vec<String> {
    TabKey::ALL.iter().map(|kind| kind.key(tab_id)).collect()
}

/// Per-tab keys whose tab is no longer open.
pub fn orphaned_keys<'a>(
    stored_keys: impl IntoIterator<Item = &'a str>,
    open_tab_ids: &[i32],
) -> Vec<String> {
    let open: BTreeSet<i32> = open_tab_ids.iter().copied().collect();
    stored_keys
        .into_iter()
        .filter(|key| matches!(TabKey::parse(key), Some((_, id)) if !open.contains(&id)))
        .map(str::to_string)
        .collect()
}

/// Per-tab state read from storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabState {
    pub pinned_speed: Option<Speed>,
    pub active_domain_rule: Option<ActiveDomainRule>,
    pub domain_rule_overridden: bool,
}

/// A consistent read of every key the resolver needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSnapshot {
    pub extension_enabled: bool,
    pub global_speed: Speed,
    pub presets: PresetList,
    pub rules: RuleSet,
    pub dark_mode: bool,
    pub tabs: BTreeMap<i32, TabState>,
}

impl RuleSnapshot {
    pub fn new() -> Self {
        RuleSnapshot {
            extension_enabled: true,
            global_speed: Speed::DEFAULT,
            presets: PresetList::default(),
            rules: RuleSet::new(),
            dark_mode: false,
            tabs: BTreeMap::new(),
        }
    }

    /// Build a snapshot from the item map returned by `chrome.storage.local.get`.
    pub fn from_items(items: &Map<String, Value>) -> RuleSnapshot {
        let mut snapshot = RuleSnapshot::new();

        if let Some(enabled) = items.get(keys::EXTENSION_STATE).and_then(Value::as_bool) {
            snapshot.extension_enabled = enabled;
        }
        if let Some(speed) = items.get(keys::SELECTED_SPEED).and_then(read_speed) {
            snapshot.global_speed = speed;
        }
        if let Some(Value::Array(list)) = items.get(keys::DEFAULT_SPEED_LIST) {
            let speeds: Vec<Speed> = list.iter().filter_map(read_speed).collect();
            snapshot.presets = PresetList::new(speeds);
        }
        if let Some(dark) = items.get(keys::DARK_MODE).and_then(Value::as_bool) {
            snapshot.dark_mode = dark;
        }

        snapshot.rules.domain_rules = read_list(items, keys::DOMAIN_SPEEDS, read_domain_rule);
        snapshot.rules.blacklist = read_list(items, keys::BLACKLIST_DOMAINS, read_blacklist_entry);
        if items.contains_key(keys::EXCLUSIONS) {
            snapshot.rules.exclusions = read_list(items, keys::EXCLUSIONS, |v| {
                v.as_str().and_then(ExclusionPattern::parse)
            });
        }

        for (key, value) in items {
            let Some((kind, tab_id)) = TabKey::parse(key) else {
                continue;
            };
            let tab = snapshot.tabs.entry(tab_id).or_default();
            match kind {
                TabKey::PinnedSpeed => match read_speed(value) {
                    Some(speed) => tab.pinned_speed = Some(speed),
                    None => log::warn!("Ignoring malformed {}: {}", key, value),
                },
                TabKey::ActiveDomainRule => {
                    match serde_json::from_value::<ActiveDomainRule>(value.clone()) {
                        Ok(rule) => tab.active_domain_rule = Some(rule),
                        Err(e) => log::warn!("Ignoring malformed {}: {}", key, e),
                    }
                }
                TabKey::DomainRuleDisabled | TabKey::LegacyDomainOverrides => {
                    tab.domain_rule_overridden |= is_truthy(value);
                }
            }
        }

        snapshot
    }

    pub fn tab(&self, tab_id: i32) -> Option<&TabState> {
        self.tabs.get(&tab_id)
    }

    pub fn pinned_speed(&self, tab_id: i32) -> Option<Speed> {
        self.tab(tab_id).and_then(|t| t.pinned_speed)
    }

    pub fn has_pin(&self, tab_id: i32) -> bool {
        self.pinned_speed(tab_id).is_some()
    }

    pub fn active_domain_rule(&self, tab_id: i32) -> Option<&ActiveDomainRule> {
        self.tab(tab_id).and_then(|t| t.active_domain_rule.as_ref())
    }

    pub fn domain_rule_overridden(&self, tab_id: i32) -> bool {
        self.tab(tab_id).is_some_and(|t| t.domain_rule_overridden)
    }
}

impl Default for RuleSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts a JSON number or a numeric string.
fn read_speed(value: &Value) -> Option<Speed> {
    match value {
        Value::Number(n) => n.as_f64().map(Speed::clamped),
        Value::String(s) => Speed::parse(s),
        _ => None,
    }
}

fn read_domain_rule(value: &Value) -> Option<DomainRule> {
    let domain = value.get("domain")?.as_str()?;
    let speed = read_speed(value.get("speed")?)?;
    if domain.trim().is_empty() {
        return None;
    }
    Some(DomainRule::new(domain, speed.value()))
}

fn read_blacklist_entry(value: &Value) -> Option<BlacklistEntry> {
    let domain = value.get("domain")?.as_str()?;
    if domain.trim().is_empty() {
        return None;
    }
    Some(BlacklistEntry::new(domain))
}

fn read_list<T>(
    items: &Map<String, Value>,
    key: &str,
    read: impl Fn(&Value) -> Option<T>,
) -> Vec<T> {
    match items.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| {
                let parsed = read(value);
                if parsed.is_none() {
                    log::warn!("Dropping malformed entry in {}: {}", key, value);
                }
                parsed
            })
            .collect(),
        Some(other) => {
            log::warn!("Expected a list in {}, found {}", key, other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A batch of storage writes. The bridge runs the removals and then the sets,
/// so a batch holding both can fire `storage.onChanged` twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreWrite {
    pub set: Map<String, Value>,
    pub remove: Vec<String>,
}

impl StoreWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    fn put(mut self, key: String, value: Value) -> Self {
        self.remove.retain(|k| *k != key);
        self.set.insert(key, value);
        self
    }

    fn delete(mut self, key: String) -> Self {
        self.set.remove(&key);
        if !self.remove.contains(&key) {
            self.remove.push(key);
        }
        self
    }

    pub fn remove_keys(self, keys: impl IntoIterator<Item = String>) -> Self {
        keys.into_iter().fold(self, |write, key| write.delete(key))
    }

    /// `selectedSpeed` is stored as a string.
    pub fn set_global_speed(self, speed: f64) -> Self {
        let speed = Speed::clamped(speed);
        self.put(keys::SELECTED_SPEED.to_string(), json!(speed.value().to_string()))
    }

    pub fn set_pinned_speed(self, tab_id: i32, speed: f64) -> Self {
        let speed = Speed::clamped(speed);
        self.put(TabKey::PinnedSpeed.key(tab_id), json!(speed.value()))
    }

    pub fn clear_pinned_speed(self, tab_id: i32) -> Self {
        self.delete(TabKey::PinnedSpeed.key(tab_id))
    }

    pub fn set_domain_rule_override(self, tab_id: i32, overridden: bool) -> Self {
        let write = self.delete(TabKey::LegacyDomainOverrides.key(tab_id));
        if overridden {
            write.put(TabKey::DomainRuleDisabled.key(tab_id), json!(true))
        } else {
            write.delete(TabKey::DomainRuleDisabled.key(tab_id))
        }
    }

    pub fn set_active_domain_rule(self, tab_id: i32, rule: Option<&ActiveDomainRule>) -> Self {
        let key = TabKey::ActiveDomainRule.key(tab_id);
        match rule.and_then(|r| serde_json::to_value(r).ok()) {
            Some(value) => self.put(key, value),
            None => self.delete(key),
        }
    }

    pub fn set_domain_rules(self, rules: &[DomainRule]) -> Self {
        let value = serde_json::to_value(rules).unwrap_or_else(|_| json!([]));
        self.put(keys::DOMAIN_SPEEDS.to_string(), value)
    }

    pub fn set_blacklist(self, entries: &[BlacklistEntry]) -> Self {
        let value = serde_json::to_value(entries).unwrap_or_else(|_| json!([]));
        self.put(keys::BLACKLIST_DOMAINS.to_string(), value)
    }

    pub fn set_presets(self, presets: &PresetList) -> Self {
        let value = serde_json::to_value(presets).unwrap_or_else(|_| json!([]));
        self.put(keys::DEFAULT_SPEED_LIST.to_string(), value)
    }

    pub fn set_extension_enabled(self, enabled: bool) -> Self {
        self.put(keys::EXTENSION_STATE.to_string(), json!(enabled))
    }

    pub fn set_dark_mode(self, dark: bool) -> Self {
        self.put(keys::DARK_MODE.to_string(), json!(dark))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_storage_uses_defaults() {
        let snapshot = RuleSnapshot::from_items(&Map::new());
        assert!(snapshot.extension_enabled);
        assert_eq!(snapshot.global_speed, Speed::DEFAULT);
        assert_eq!(snapshot.presets, PresetList::default());
        assert_eq!(snapshot.rules.exclusions, ExclusionPattern::defaults());
        assert!(snapshot.tabs.is_empty());
    }

    #[test]
    fn test_parses_full_snapshot() {
        let snapshot = RuleSnapshot::from_items(&items(json!({
            "extensionState": false,
            "selectedSpeed": "2.5",
            "defaultSpeedList": [1.0, 2.0, 40],
            "domainSpeeds": [{"domain": "YouTube.com", "speed": 1.5}],
            "blacklistDomains": [{"domain": "netflix.com"}],
            "websitesAddedToUrlConditionsExclusion": ["contains_game"],
            "darkMode": true,
            "pinnedSpeed_12": 3,
            "domainRuleDisabled_12": true,
        })));

        assert!(!snapshot.extension_enabled);
        assert_eq!(snapshot.global_speed.value(), 2.5);
        assert_eq!(snapshot.presets.speeds().last().unwrap().value(), 16.0);
        assert_eq!(snapshot.rules.domain_rules, vec![DomainRule::new("youtube.com", 1.5)]);
        assert_eq!(snapshot.rules.blacklist, vec![BlacklistEntry::new("netflix.com")]);
        assert_eq!(
            snapshot.rules.exclusions,
            vec![ExclusionPattern::Contains("game".to_string())]
        );
        assert!(snapshot.dark_mode);
        assert_eq!(snapshot.pinned_speed(12).unwrap().value(), 3.0);
        assert!(snapshot.domain_rule_overridden(12));
        assert!(!snapshot.domain_rule_overridden(13));
    }

    #[test]
    fn test_malformed_records_are_dropped() {
        let snapshot = RuleSnapshot::from_items(&items(json!({
            "selectedSpeed": "fast",
            "domainSpeeds": [
                {"domain": "ok.com", "speed": "2"},
                {"domain": 5, "speed": 1},
                {"domain": "nospeed.com"},
                {"domain": "  ", "speed": 1},
                "garbage"
            ],
            "blacklistDomains": {"domain": "not-a-list.com"},
            "pinnedSpeed_4": {"speed": 2},
            "activeDomainRule_4": "youtube.com",
        })));

        assert_eq!(snapshot.global_speed, Speed::DEFAULT);
        assert_eq!(snapshot.rules.domain_rules, vec![DomainRule::new("ok.com", 2.0)]);
        assert!(snapshot.rules.blacklist.is_empty());
        assert_eq!(snapshot.pinned_speed(4), None);
        assert_eq!(snapshot.active_domain_rule(4), None);
    }

    #[test]
    fn test_stored_empty_exclusions_disable_defaults() {
        let snapshot = RuleSnapshot::from_items(&items(json!({
            "websitesAddedToUrlConditionsExclusion": [],
        })));
        assert!(snapshot.rules.exclusions.is_empty());
    }

    #[test]
    fn test_legacy_override_key_counts_as_override() {
        let snapshot = RuleSnapshot::from_items(&items(json!({
            "tabDomainOverrides_9": {"youtube.com": true},
            "tabDomainOverrides_10": {},
        })));
        assert!(snapshot.domain_rule_overridden(9));
        assert!(!snapshot.domain_rule_overridden(10));
    }

    #[test]
    fn test_tab_key_parse() {
        assert_eq!(TabKey::parse("pinnedSpeed_42"), Some((TabKey::PinnedSpeed, 42)));
        assert_eq!(
            TabKey::parse("activeDomainRule_7"),
            Some((TabKey::ActiveDomainRule, 7))
        );
        assert_eq!(TabKey::parse("pinnedSpeed_abc"), None);
        assert_eq!(TabKey::parse("selectedSpeed"), None);
    }

    #[test]
    fn test_orphaned_keys() {
        let stored = [
            "selectedSpeed",
            "pinnedSpeed_1",
            "pinnedSpeed_2",
            "activeDomainRule_2",
            "domainRuleDisabled_3",
            "tabDomainOverrides_4",
        ];
        let orphans = orphaned_keys(stored.iter().copied(), &[1, 3]);
        assert_eq!(
            orphans,
            vec!["pinnedSpeed_2", "activeDomainRule_2", "tabDomainOverrides_4"]
        );
    }

    #[test]
    fn test_keys_for_tab() {
        let keys = keys_for_tab(5);
        assert!(keys.contains(&"pinnedSpeed_5".to_string()));
        assert!(keys.contains(&"activeDomainRule_5".to_string()));
        assert!(keys.contains(&"domainRuleDisabled_5".to_string()));
        assert!(keys.contains(&"tabDomainOverrides_5".to_string()));
    }

    #[test]
    fn test_store_write_clamps_speeds() {
        let write = StoreWrite::new().set_global_speed(20.0).set_pinned_speed(3, 0.0);
        assert_eq!(write.set.get("selectedSpeed"), Some(&json!("16")));
        assert_eq!(write.set.get("pinnedSpeed_3"), Some(&json!(0.1)));
    }

    #[test]
    fn test_store_write_set_then_remove() {
        let write = StoreWrite::new().set_pinned_speed(3, 2.0).clear_pinned_speed(3);
        assert!(write.set.is_empty());
        assert_eq!(write.remove, vec!["pinnedSpeed_3"]);

        let write = write.set_pinned_speed(3, 2.0);
        assert!(write.remove.is_empty());
    }

    #[test]
    fn test_override_write_replaces_legacy_key() {
        let write = StoreWrite::new().set_domain_rule_override(8, true);
        assert_eq!(write.set.get("domainRuleDisabled_8"), Some(&json!(true)));
        assert_eq!(write.remove, vec!["tabDomainOverrides_8"]);
    }

    #[test]
    fn test_store_write_serializes_for_bridge() {
        let write = StoreWrite::new().set_extension_enabled(false).remove_keys(keys_for_tab(1));
        let value = serde_json::to_value(&write).unwrap();
        assert_eq!(value["set"]["extensionState"], json!(false));
        assert_eq!(value["remove"].as_array().unwrap().len(), 4);
    }
}
