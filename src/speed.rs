/// Playback speed values, presets and source labels
use serde::{Deserialize, Serialize};

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 16.0;
pub const MAX_PRESETS: usize = 9;

pub const DEFAULT_PRESETS: [f64; 9] = [0.5, 1.0, 1.1, 1.5, 2.0, 2.5, 3.0, 8.0, 16.0];

/// A playback rate that is always inside [0.1, 16.0] and rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Speed(f64);

impl Speed {
    pub const DEFAULT: Speed = Speed(1.0);

    /// Clamp and round an arbitrary value. NaN becomes the default speed.
    pub fn clamped(value: f64) -> Speed {
        if value.is_nan() {
            return Speed::DEFAULT;
        }
        let bounded = value.clamp(MIN_SPEED, MAX_SPEED);
        Speed((bounded * 100.0).round() / 100.0)
    }

    /// Parse the string form used by `selectedSpeed`.
    pub fn parse(text: &str) -> Option<Speed> {
        text.trim().parse::<f64>().ok().filter(|v| v.is_finite()).map(Speed::clamped)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Two-decimal label used on preset buttons.
    pub fn label(self) -> String {
        format!("{:.2}", self.0)
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::DEFAULT
    }
}

impl From<f64> for Speed {
    fn from(value: f64) -> Self {
        Speed::clamped(value)
    }
}

impl From<Speed> for f64 {
    fn from(speed: Speed) -> Self {
        speed.0
    }
}

/// Which tier produced the speed applied to a page.
///
/// The resolver only yields the first six; the content script uses the
/// remaining labels for speeds it applied on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedSource {
    Disabled,
    Blacklisted,
    Pinned,
    Domain,
    Excluded,
    Global,
    Manual,
    Fallback,
    Standalone,
}

impl SpeedSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SpeedSource::Disabled => "disabled",
            SpeedSource::Blacklisted => "blacklisted",
            SpeedSource::Pinned => "pinned",
            SpeedSource::Domain => "domain",
            SpeedSource::Excluded => "excluded",
            SpeedSource::Global => "global",
            SpeedSource::Manual => "manual",
            SpeedSource::Fallback => "fallback",
            SpeedSource::Standalone => "standalone",
        }
    }

    pub fn parse(text: &str) -> Option<SpeedSource> {
        serde_json::from_value(serde_json::Value::String(text.to_string())).ok()
    }
}

/// The user-editable quick-select buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetList(Vec<Speed>);

impl PresetList {
    pub fn new(speeds: Vec<Speed>) -> PresetList {
        let mut list = PresetList(Vec::new());
        for speed in speeds {
            list.push(speed);
        }
        if list.0.is_empty() {
            return PresetList::default();
        }
        list
    }

    /// Append a preset. No-op once the list holds nine entries.
    pub fn push(&mut self, speed: Speed) -> bool {
        if self.0.len() >= MAX_PRESETS {
            return false;
        }
        self.0.push(speed);
        true
    }

    pub fn speeds(&self) -> &[Speed] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

}

impl Default for PresetList {
    fn default() -> Self {
        PresetList(DEFAULT_PRESETS.iter().copied().map(Speed::clamped).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(Speed::clamped(20.0).value(), 16.0);
        assert_eq!(Speed::clamped(0.0).value(), 0.1);
        assert_eq!(Speed::clamped(-3.0).value(), 0.1);
        assert_eq!(Speed::clamped(1.5).value(), 1.5);
    }

    #[test]
    fn test_clamp_rounds_to_two_decimals() {
        assert_eq!(Speed::clamped(1.23456).value(), 1.23);
        assert_eq!(Speed::clamped(2.005).label().len(), 4);
    }

    #[test]
    fn test_nan_becomes_default() {
        assert_eq!(Speed::clamped(f64::NAN), Speed::DEFAULT);
    }

    #[test]
    fn test_parse_selected_speed_string() {
        assert_eq!(Speed::parse("2"), Some(Speed::clamped(2.0)));
        assert_eq!(Speed::parse(" 1.75 "), Some(Speed::clamped(1.75)));
        assert_eq!(Speed::parse("99"), Some(Speed::clamped(16.0)));
        assert_eq!(Speed::parse("fast"), None);
        assert_eq!(Speed::parse("inf"), None);
    }

    #[test]
    fn test_deserialize_clamps() {
        let speed: Speed = serde_json::from_str("42.0").unwrap();
        assert_eq!(speed.value(), 16.0);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(SpeedSource::Blacklisted.as_str(), "blacklisted");
        assert_eq!(SpeedSource::parse("pinned"), Some(SpeedSource::Pinned));
        assert_eq!(SpeedSource::parse("nope"), None);
        assert_eq!(serde_json::to_string(&SpeedSource::Global).unwrap(), "\"global\"");
    }

    #[test]
    fn test_preset_list_caps_at_nine() {
        let mut presets = PresetList::default();
        assert_eq!(presets.len(), 9);
        assert!(!presets.push(Speed::clamped(4.0)));
        assert_eq!(presets.len(), 9);
    }

    #[test]
    fn test_preset_list_new_truncates_and_defaults() {
        let many: Vec<Speed> = (1..=12).map(|v| Speed::clamped(v as f64)).collect();
        assert_eq!(PresetList::new(many).len(), 9);
        assert_eq!(PresetList::new(Vec::new()), PresetList::default());
    }
}
