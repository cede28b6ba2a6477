/// Popup operations: preset clicks, pinning, theme

use crate::domain::PageContext;
use crate::rules::DomainRule;
use crate::resolver::{Resolution, applicable_domain_rule, resolve};
use crate::speed::{Speed, SpeedSource};
use crate::storage::{RuleSnapshot, StoreWrite};

/// The tab the popup was opened on.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTab {
    pub id: i32,
    pub page: Option<PageContext>,
}

impl ActiveTab {
    pub fn new(id: i32, url: &str) -> ActiveTab {
        ActiveTab {
            id,
            page: PageContext::parse(url),
        }
    }

    pub fn resolution(&self, snapshot: &RuleSnapshot) -> Resolution {
        match &self.page {
            Some(page) => resolve(Some(self.id), page, snapshot),
            None => Resolution::new(snapshot.global_speed, SpeedSource::Global),
        }
    }
}

/// Clicking a preset button.
///
/// A pinned tab keeps its pin and only changes the pinned value. Otherwise
/// the global speed changes, and a domain rule driving this tab is marked
/// overridden so the new speed actually shows up here.
pub fn preset_click(snapshot: &RuleSnapshot, tab: Option<&ActiveTab>, speed: Speed) -> StoreWrite {
    let Some(tab) = tab else {
        return StoreWrite::new().set_global_speed(speed.value());
    };

    if snapshot.has_pin(tab.id) {
        return StoreWrite::new().set_pinned_speed(tab.id, speed.value());
    }

    let write = StoreWrite::new().set_global_speed(speed.value());
    let rule_active = tab
        .page
        .as_ref()
        .is_some_and(|page| applicable_domain_rule(Some(tab.id), page, snapshot).is_some());
    if rule_active {
        write.set_domain_rule_override(tab.id, true)
    } else {
        write
    }
}

/// Pin the tab at its current speed, or drop the pin.
pub fn toggle_pin(snapshot: &RuleSnapshot, tab: &ActiveTab) -> StoreWrite {
    if snapshot.has_pin(tab.id) {
        StoreWrite::new().clear_pinned_speed(tab.id)
    } else {
        let current = tab.resolution(snapshot);
        StoreWrite::new().set_pinned_speed(tab.id, current.speed.value())
    }
}

/// Give the domain rule back to a tab where the user overrode it.
pub fn restore_domain_rule(tab: &ActiveTab) -> StoreWrite {
    StoreWrite::new().set_domain_rule_override(tab.id, false)
}

/// The rule for this tab's site that the user switched off here, if any.
pub fn overridden_rule<'a>(snapshot: &'a RuleSnapshot, tab: &ActiveTab) -> Option<&'a DomainRule> {
    if !snapshot.domain_rule_overridden(tab.id) {
        return None;
    }
    let page = tab.page.as_ref()?;
    snapshot.rules.find_domain_rule(&page.hostname)
}

pub fn toggle_dark_mode(snapshot: &RuleSnapshot) -> StoreWrite {
    StoreWrite::new().set_dark_mode(!snapshot.dark_mode)
}

/// The preset to highlight: the one equal to the speed this tab runs at.
pub fn active_preset(snapshot: &RuleSnapshot, tab: Option<&ActiveTab>) -> Speed {
    match tab {
        Some(tab) => tab.resolution(snapshot).speed,
        None => snapshot.global_speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn snapshot(value: Value) -> RuleSnapshot {
        RuleSnapshot::from_items(value.as_object().unwrap())
    }

    fn create_test_tab(id: i32, url: &str) -> ActiveTab {
        ActiveTab::new(id, url)
    }

    #[test]
    fn test_preset_click_sets_global() {
        let snap = snapshot(json!({}));
        let tab = create_test_tab(1, "https://example.com");
        let write = preset_click(&snap, Some(&tab), Speed::clamped(2.0));
        assert_eq!(write, StoreWrite::new().set_global_speed(2.0));
    }

    #[test]
    fn test_preset_click_updates_pin() {
        let snap = snapshot(json!({"pinnedSpeed_1": 3}));
        let tab = create_test_tab(1, "https://example.com");
        let write = preset_click(&snap, Some(&tab), Speed::clamped(1.5));
        assert_eq!(write, StoreWrite::new().set_pinned_speed(1, 1.5));
    }

    #[test]
    fn test_preset_click_overrides_domain_rule() {
        let snap = snapshot(json!({
            "domainSpeeds": [{"domain": "youtube.com", "speed": 1.5}],
        }));
        let tab = create_test_tab(2, "https://www.youtube.com/watch");
        let write = preset_click(&snap, Some(&tab), Speed::clamped(2.0));
        assert_eq!(write.set.get("domainRuleDisabled_2"), Some(&json!(true)));
        assert_eq!(write.set.get("selectedSpeed"), Some(&json!("2")));
    }

    #[test]
    fn test_preset_click_without_tab() {
        let snap = snapshot(json!({"pinnedSpeed_1": 3}));
        let write = preset_click(&snap, None, Speed::clamped(0.5));
        assert_eq!(write, StoreWrite::new().set_global_speed(0.5));
    }

    #[test]
    fn test_toggle_pin_uses_current_speed() {
        let snap = snapshot(json!({
            "domainSpeeds": [{"domain": "youtube.com", "speed": 1.5}],
        }));
        let tab = create_test_tab(3, "https://youtube.com");
        let write = toggle_pin(&snap, &tab);
        assert_eq!(write, StoreWrite::new().set_pinned_speed(3, 1.5));
    }

    #[test]
    fn test_toggle_pin_removes_existing_pin() {
        let snap = snapshot(json!({"pinnedSpeed_3": 2}));
        let tab = create_test_tab(3, "https://youtube.com");
        assert_eq!(toggle_pin(&snap, &tab), StoreWrite::new().clear_pinned_speed(3));
    }

    #[test]
    fn test_restore_domain_rule() {
        let write = restore_domain_rule(&create_test_tab(3, "https://youtube.com"));
        assert!(write.remove.contains(&"domainRuleDisabled_3".to_string()));
        assert!(write.remove.contains(&"tabDomainOverrides_3".to_string()));
    }

    #[test]
    fn test_overridden_rule() {
        let snap = snapshot(json!({
            "domainSpeeds": [{"domain": "youtube.com", "speed": 1.5}],
            "domainRuleDisabled_3": true,
        }));
        let overridden = create_test_tab(3, "https://youtube.com");
        let untouched = create_test_tab(4, "https://youtube.com");
        assert_eq!(overridden_rule(&snap, &overridden).map(|r| r.domain.as_str()), Some("youtube.com"));
        assert!(overridden_rule(&snap, &untouched).is_none());
    }

    #[test]
    fn test_toggle_dark_mode() {
        let snap = snapshot(json!({"darkMode": true}));
        assert_eq!(toggle_dark_mode(&snap), StoreWrite::new().set_dark_mode(false));
    }

    #[test]
    fn test_active_preset_follows_resolution() {
        let snap = snapshot(json!({"selectedSpeed": "2", "pinnedSpeed_5": 3}));
        let pinned = create_test_tab(5, "https://a.com");
        let other = create_test_tab(6, "https://a.com");
        assert_eq!(active_preset(&snap, Some(&pinned)).value(), 3.0);
        assert_eq!(active_preset(&snap, Some(&other)).value(), 2.0);
        assert_eq!(active_preset(&snap, None).value(), 2.0);
    }
}
