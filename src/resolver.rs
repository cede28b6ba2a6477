/// Decides which playback speed applies to a tab
use serde::{Deserialize, Serialize};

use crate::domain::PageContext;
use crate::rules::{ActiveDomainRule, DomainRule};
use crate::speed::{Speed, SpeedSource};
use crate::storage::RuleSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub speed: Speed,
    pub source: SpeedSource,
}

impl Resolution {
    pub fn new(speed: Speed, source: SpeedSource) -> Resolution {
        Resolution { speed, source }
    }

    fn normal(source: SpeedSource) -> Resolution {
        Resolution::new(Speed::DEFAULT, source)
    }
}

/// Resolve the speed for a page, highest priority first:
///
/// 1. extension disabled
/// 2. blacklisted hostname
/// 3. tab pin
/// 4. domain rule, unless overridden in this tab
/// 5. URL exclusion pattern
/// 6. global speed
///
/// Pure over the snapshot, so repeated calls give the same answer.
pub fn resolve(tab_id: Option<i32>, page: &PageContext, snapshot: &RuleSnapshot) -> Resolution {
    if !snapshot.extension_enabled {
        return Resolution::normal(SpeedSource::Disabled);
    }

    if snapshot.rules.is_blacklisted(&page.hostname) {
        return Resolution::normal(SpeedSource::Blacklisted);
    }

    if let Some(pinned) = tab_id.and_then(|id| snapshot.pinned_speed(id)) {
        return Resolution::new(pinned, SpeedSource::Pinned);
    }

    if let Some(rule) = applicable_domain_rule(tab_id, page, snapshot) {
        return Resolution::new(rule.speed, SpeedSource::Domain);
    }

    if snapshot.rules.is_excluded(&page.url) {
        return Resolution::normal(SpeedSource::Excluded);
    }

    Resolution::new(snapshot.global_speed, SpeedSource::Global)
}

/// The domain rule that drives this page, if the user has not overridden it.
pub fn applicable_domain_rule<'a>(
    tab_id: Option<i32>,
    page: &PageContext,
    snapshot: &'a RuleSnapshot,
) -> Option<&'a DomainRule> {
    let overridden = tab_id.is_some_and(|id| snapshot.domain_rule_overridden(id));
    if overridden {
        return None;
    }
    snapshot.rules.find_domain_rule(&page.hostname)
}

/// Marker describing the rule behind a `domain` resolution.
pub fn active_rule_marker(
    tab_id: Option<i32>,
    page: &PageContext,
    snapshot: &RuleSnapshot,
    resolution: &Resolution,
) -> Option<ActiveDomainRule> {
    if resolution.source != SpeedSource::Domain {
        return None;
    }
    applicable_domain_rule(tab_id, page, snapshot).map(|rule| ActiveDomainRule {
        domain: rule.domain.clone(),
        speed: rule.speed,
        hostname: page.hostname.clone(),
    })
}
