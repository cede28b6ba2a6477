/// Validation for the settings forms
///
/// Saving is all-or-nothing: a batch with any invalid row writes nothing and
/// returns the per-row results so the form can show them inline.
use std::sync::LazyLock;

use regex::Regex;

use crate::rules::{BlacklistEntry, DomainRule, MAX_BLACKLIST_ENTRIES, MAX_DOMAIN_RULES, RuleSet};
use crate::speed::{MAX_SPEED, MIN_SPEED, PresetList, Speed};

static DOMAIN_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.-]+$").expect("valid regex"));
static DOMAIN_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(www\.)?[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    None,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Validation {
    pub is_valid: bool,
    pub message: String,
    pub severity: Severity,
}

impl Validation {
    fn ok() -> Validation {
        Validation {
            is_valid: true,
            ..Validation::default()
        }
    }

    fn valid(message: &str, severity: Severity) -> Validation {
        Validation {
            is_valid: true,
            message: message.to_string(),
            severity,
        }
    }

    fn invalid(message: &str, severity: Severity) -> Validation {
        Validation {
            is_valid: false,
            message: message.to_string(),
            severity,
        }
    }
}

pub fn validate_domain(text: &str) -> Validation {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        // no message while the field is still empty
        return Validation::invalid("", Severity::None);
    }
    if trimmed.len() < 3 {
        return Validation::invalid("Domain too short", Severity::Warning);
    }
    if !DOMAIN_CHARS.is_match(trimmed) {
        return Validation::invalid("Use only letters, numbers, dots, and hyphens", Severity::Error);
    }
    if !DOMAIN_FORMAT.is_match(trimmed) {
        return Validation::invalid("Enter a valid domain (e.g., youtube.com)", Severity::Warning);
    }
    Validation::valid("Valid domain ✓", Severity::Success)
}

pub fn validate_speed(speed: f64) -> Validation {
    if speed.is_nan() {
        return Validation::invalid("Enter a number", Severity::Warning);
    }
    if speed < MIN_SPEED {
        return Validation::invalid("Minimum speed is 0.1x", Severity::Warning);
    }
    if speed > MAX_SPEED {
        return Validation::invalid("Maximum speed is 16x", Severity::Error);
    }
    if speed < 0.25 {
        return Validation::valid("Very slow playback", Severity::Warning);
    }
    if speed > 8.0 {
        return Validation::valid("Very fast playback", Severity::Warning);
    }
    Validation::ok()
}

pub fn parse_speed_input(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// One row of the preset editor; empty string means "no error".
pub fn validate_preset(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "Please enter a speed value".to_string();
    }
    let Ok(value) = trimmed.parse::<f64>() else {
        return "Please enter a valid number".to_string();
    };
    if !value.is_finite() {
        return "Please enter a valid number".to_string();
    }
    if !(MIN_SPEED..=MAX_SPEED).contains(&value) {
        return "Speed must be between 0.1 and 16".to_string();
    }
    String::new()
}

/// Validate every preset row; on success the clamped list to store.
pub fn validate_presets(rows: &[String]) -> Result<PresetList, Vec<String>> {
    let errors: Vec<String> = rows.iter().map(|row| validate_preset(row)).collect();
    if errors.iter().any(|e| !e.is_empty()) {
        return Err(errors);
    }
    let speeds = rows
        .iter()
        .map(|row| Speed::clamped(parse_speed_input(row)))
        .collect();
    Ok(PresetList::new(speeds))
}

/// A domain rule as typed into the form.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRuleRow {
    pub domain: String,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowErrors {
    pub domain: Validation,
    pub speed: Validation,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchErrors {
    pub domain_rules: Vec<RowErrors>,
    pub blacklist: Vec<Validation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanRules {
    pub domain_rules: Vec<DomainRule>,
    pub blacklist: Vec<BlacklistEntry>,
}

/// Validate both lists together. Rows past the caps are dropped and a
/// repeated domain keeps the speed of its last row.
pub fn validate_rule_batch(
    rules: &[DomainRuleRow],
    blacklist: &[String],
) -> Result<CleanRules, BatchErrors> {
    let rules = &rules[..rules.len().min(MAX_DOMAIN_RULES)];
    let blacklist = &blacklist[..blacklist.len().min(MAX_BLACKLIST_ENTRIES)];

    let errors = BatchErrors {
        domain_rules: rules
            .iter()
            .map(|row| RowErrors {
                domain: validate_domain(&row.domain),
                speed: validate_speed(row.speed),
            })
            .collect(),
        blacklist: blacklist.iter().map(|d| validate_domain(d)).collect(),
    };

    let has_errors = errors
        .domain_rules
        .iter()
        .any(|row| !row.domain.is_valid || !row.speed.is_valid)
        || errors.blacklist.iter().any(|v| !v.is_valid);
    if has_errors {
        return Err(errors);
    }

    let mut set = RuleSet::new();
    for row in rules {
        set.add_domain_rule(DomainRule::new(&row.domain, row.speed));
    }
    for domain in blacklist {
        set.add_blacklist(BlacklistEntry::new(domain));
    }
    Ok(CleanRules {
        domain_rules: set.domain_rules,
        blacklist: set.blacklist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(domain: &str, speed: f64) -> DomainRuleRow {
        DomainRuleRow {
            domain: domain.to_string(),
            speed,
        }
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("youtube.com").is_valid);
        assert!(validate_domain("www.twitch.tv").is_valid);
        assert!(validate_domain("Sub.Example.co.uk").is_valid);

        let empty = validate_domain("   ");
        assert!(!empty.is_valid);
        assert_eq!(empty.message, "");

        assert_eq!(validate_domain("ab").message, "Domain too short");
        assert_eq!(validate_domain("https://youtube.com").severity, Severity::Error);
        assert_eq!(validate_domain("youtube.com/watch").severity, Severity::Error);
        assert_eq!(
            validate_domain("localhost").message,
            "Enter a valid domain (e.g., youtube.com)"
        );
        assert!(!validate_domain("example.c0m").is_valid);
    }

    #[test]
    fn test_validate_speed() {
        assert!(validate_speed(1.5).is_valid);
        assert!(!validate_speed(f64::NAN).is_valid);
        assert!(!validate_speed(0.05).is_valid);
        assert!(!validate_speed(17.0).is_valid);

        let slow = validate_speed(0.2);
        assert!(slow.is_valid);
        assert_eq!(slow.severity, Severity::Warning);

        let fast = validate_speed(12.0);
        assert!(fast.is_valid);
        assert_eq!(fast.message, "Very fast playback");
    }

    #[test]
    fn test_validate_presets() {
        let rows = vec!["1".to_string(), " 2.256 ".to_string()];
        let presets = validate_presets(&rows).unwrap();
        assert_eq!(presets.speeds()[1].value(), 2.26);

        let rows = vec!["".to_string(), "abc".to_string(), "20".to_string(), "3".to_string()];
        let errors = validate_presets(&rows).unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Please enter a speed value",
                "Please enter a valid number",
                "Speed must be between 0.1 and 16",
                "",
            ]
        );
    }

    #[test]
    fn test_rule_batch_cleans_values() {
        let clean = validate_rule_batch(
            &[row(" YouTube.com ", 1.556)],
            &["Netflix.com".to_string()],
        )
        .unwrap();
        assert_eq!(clean.domain_rules, vec![DomainRule::new("youtube.com", 1.56)]);
        assert_eq!(clean.blacklist, vec![BlacklistEntry::new("netflix.com")]);
    }

    #[test]
    fn test_rule_batch_is_all_or_nothing() {
        let errors = validate_rule_batch(
            &[row("youtube.com", 1.5), row("vimeo.com", 30.0)],
            &["ok.com".to_string(), "bad domain".to_string()],
        )
        .unwrap_err();
        assert!(errors.domain_rules[0].domain.is_valid);
        assert!(!errors.domain_rules[1].speed.is_valid);
        assert!(errors.blacklist[0].is_valid);
        assert!(!errors.blacklist[1].is_valid);
    }

    #[test]
    fn test_rule_batch_merges_duplicates() {
        let clean = validate_rule_batch(
            &[row("youtube.com", 1.5), row("www.youtube.com", 2.0), row("vimeo.com", 3.0)],
            &["a.com".to_string(), "www.a.com".to_string()],
        )
        .unwrap();
        assert_eq!(
            clean.domain_rules,
            vec![DomainRule::new("youtube.com", 2.0), DomainRule::new("vimeo.com", 3.0)]
        );
        assert_eq!(clean.blacklist, vec![BlacklistEntry::new("a.com")]);
    }

    #[test]
    fn test_rule_batch_respects_caps() {
        let rows: Vec<DomainRuleRow> = (0..25).map(|i| row(&format!("site{}.com", i), 2.0)).collect();
        let clean = validate_rule_batch(&rows, &[]).unwrap();
        assert_eq!(clean.domain_rules.len(), MAX_DOMAIN_RULES);
    }
}
