/// Data structures for speed rules and open tabs
use serde::{Deserialize, Serialize};

use crate::domain::{find_matching, hostname_matches, normalize_domain, strip_www};
use crate::speed::Speed;

pub const MAX_DOMAIN_RULES: usize = 20;
pub const MAX_BLACKLIST_ENTRIES: usize = 50;

/// Built-in exclusions for sites that break when media rate changes.
pub const DEFAULT_EXCLUSION_PATTERNS: [&str; 14] = [
    "starts_https://docs.google.com",
    "starts_https://play.geforcenow.com",
    "starts_https://www.xbox.com",
    "starts_https://docs.qq.com",
    "starts_https://www.playstation.com",
    "starts_https://excalidraw.com",
    "starts_https://www.photopea.com",
    "starts_https://www.canva.com",
    "starts_http://luna.amazon.com",
    "starts_https://ys.mihoyo.com",
    "starts_https://www.youtube.com/playables",
    "starts_https://stadia.google.com",
    "starts_https://www.nvidia.com/en-us/geforce-now",
    "starts_https://games.amazon.com",
];

/// Information about a browser tab
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: i32,
    #[serde(default)]
    pub url: String,
}

impl TabInfo {
    pub fn new(id: i32, url: &str) -> TabInfo {
        TabInfo {
            id,
            url: url.to_string(),
        }
    }
}

/// A hostname pattern mapped to a fixed speed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainRule {
    pub domain: String,
    pub speed: Speed,
}

impl DomainRule {
    pub fn new(domain: &str, speed: f64) -> DomainRule {
        DomainRule {
            domain: normalize_domain(domain),
            speed: Speed::clamped(speed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlacklistEntry {
    pub domain: String,
}

impl BlacklistEntry {
    pub fn new(domain: &str) -> BlacklistEntry {
        BlacklistEntry {
            domain: normalize_domain(domain),
        }
    }
}

/// Marker for the domain rule currently driving a tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveDomainRule {
    pub domain: String,
    pub speed: Speed,
    pub hostname: String,
}

/// URL condition that suppresses speed control, stored as `starts_...`,
/// `contains_...` or `exact_...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionPattern {
    StartsWith(String),
    Contains(String),
    Exact(String),
}

impl ExclusionPattern {
    pub fn parse(tagged: &str) -> Option<ExclusionPattern> {
        if let Some(rest) = tagged.strip_prefix("starts_") {
            Some(ExclusionPattern::StartsWith(rest.to_lowercase()))
        } else if let Some(rest) = tagged.strip_prefix("contains_") {
            Some(ExclusionPattern::Contains(rest.to_lowercase()))
        } else if let Some(rest) = tagged.strip_prefix("exact_") {
            Some(ExclusionPattern::Exact(rest.to_lowercase()))
        } else {
            None
        }
    }

    pub fn defaults() -> Vec<ExclusionPattern> {
        DEFAULT_EXCLUSION_PATTERNS
            .iter()
            .filter_map(|p| ExclusionPattern::parse(p))
            .collect()
    }

    pub fn matches(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        match self {
            ExclusionPattern::StartsWith(prefix) => url.starts_with(prefix.as_str()),
            ExclusionPattern::Contains(term) => url.contains(term.as_str()),
            ExclusionPattern::Exact(exact) => url == *exact,
        }
    }

    pub fn to_tagged(&self) -> String {
        match self {
            ExclusionPattern::StartsWith(p) => format!("starts_{}", p),
            ExclusionPattern::Contains(p) => format!("contains_{}", p),
            ExclusionPattern::Exact(p) => format!("exact_{}", p),
        }
    }
}

/// The user-edited rule lists, in stored order.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub domain_rules: Vec<DomainRule>,
    pub blacklist: Vec<BlacklistEntry>,
    pub exclusions: Vec<ExclusionPattern>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet {
            domain_rules: Vec::new(),
            blacklist: Vec::new(),
            exclusions: ExclusionPattern::defaults(),
        }
    }

    /// Add or replace a rule. Rules are unique by www-stripped domain.
    /// Returns false when the list is full.
    pub fn add_domain_rule(&mut self, rule: DomainRule) -> bool {
        let key = strip_www(&rule.domain).to_string();
        if let Some(existing) = self
            .domain_rules
            .iter_mut()
            .find(|r| strip_www(&r.domain) == key)
        {
            existing.speed = rule.speed;
            return true;
        }
        if self.domain_rules.len() >= MAX_DOMAIN_RULES {
            return false;
        }
        self.domain_rules.push(rule);
        true
    }

    pub fn add_blacklist(&mut self, entry: BlacklistEntry) -> bool {
        if self
            .blacklist
            .iter()
            .any(|b| strip_www(&b.domain) == strip_www(&entry.domain))
        {
            return true;
        }
        if self.blacklist.len() >= MAX_BLACKLIST_ENTRIES {
            return false;
        }
        self.blacklist.push(entry);
        true
    }

    pub fn find_domain_rule(&self, hostname: &str) -> Option<&DomainRule> {
        find_matching(&self.domain_rules, hostname, |r| r.domain.as_str())
    }

    pub fn is_blacklisted(&self, hostname: &str) -> bool {
        self.blacklist
            .iter()
            .any(|entry| hostname_matches(&entry.domain, hostname))
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.exclusions.iter().any(|p| p.matches(url))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_rule_normalizes() {
        let rule = DomainRule::new("  YouTube.COM ", 20.0);
        assert_eq!(rule.domain, "youtube.com");
        assert_eq!(rule.speed.value(), 16.0);
    }

    #[test]
    fn test_exclusion_parse_and_match() {
        let starts = ExclusionPattern::parse("starts_https://Docs.Google.com").unwrap();
        assert!(starts.matches("https://docs.google.com/document/d/1"));
        assert!(!starts.matches("https://drive.google.com"));

        let contains = ExclusionPattern::parse("contains_/live/").unwrap();
        assert!(contains.matches("https://example.com/LIVE/stream"));

        let exact = ExclusionPattern::parse("exact_https://a.com/x").unwrap();
        assert!(exact.matches("https://a.com/x"));
        assert!(!exact.matches("https://a.com/x?y=1"));

        assert_eq!(ExclusionPattern::parse("prefix_https://a.com"), None);
    }

    #[test]
    fn test_exclusion_tag_round_trip() {
        assert_eq!(
            ExclusionPattern::Contains("game".to_string()).to_tagged(),
            "contains_game"
        );
        assert_eq!(ExclusionPattern::defaults().len(), DEFAULT_EXCLUSION_PATTERNS.len());
    }

    #[test]
    fn test_add_domain_rule_replaces_duplicate() {
        let mut rules = RuleSet::new();
        assert!(rules.add_domain_rule(DomainRule::new("youtube.com", 1.5)));
        assert!(rules.add_domain_rule(DomainRule::new("www.youtube.com", 2.0)));
        assert_eq!(rules.domain_rules.len(), 1);
        assert_eq!(rules.domain_rules[0].speed.value(), 2.0);
    }

    #[test]
    fn test_domain_rule_cap() {
        let mut rules = RuleSet::new();
        for i in 0..MAX_DOMAIN_RULES {
            assert!(rules.add_domain_rule(DomainRule::new(&format!("site{}.com", i), 1.5)));
        }
        assert!(!rules.add_domain_rule(DomainRule::new("one-more.com", 2.0)));
        assert_eq!(rules.domain_rules.len(), MAX_DOMAIN_RULES);
    }

    #[test]
    fn test_blacklist_cap_and_duplicates() {
        let mut rules = RuleSet::new();
        for i in 0..MAX_BLACKLIST_ENTRIES {
            assert!(rules.add_blacklist(BlacklistEntry::new(&format!("site{}.com", i))));
        }
        assert!(rules.add_blacklist(BlacklistEntry::new("www.site0.com")));
        assert!(!rules.add_blacklist(BlacklistEntry::new("extra.com")));
        assert_eq!(rules.blacklist.len(), MAX_BLACKLIST_ENTRIES);
    }

    #[test]
    fn test_blacklist_matching() {
        let mut rules = RuleSet::new();
        rules.add_blacklist(BlacklistEntry::new("Netflix.com"));
        assert!(rules.is_blacklisted("www.netflix.com"));
        assert!(rules.is_blacklisted("assets.netflix.com"));
        assert!(!rules.is_blacklisted("notnetflix.com"));
    }

    #[test]
    fn test_tab_info_deserializes_without_url() {
        let tab: TabInfo = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(tab.id, 7);
        assert_eq!(tab.url, "");
    }
}
