/// Timing and retry settings shared by the background and content scripts
use serde::{Deserialize, Serialize};

use crate::domain::INFINITE_SCROLL_HOSTS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Wait after a tab finishes loading before pushing its speed
    pub settle_delay_ms: u32,
    pub sweep_interval_minutes: u32,
    pub mutation_debounce_ms: u32,
    pub scroll_debounce_ms: u32,
    pub media_poll_ms: u32,
    pub url_poll_ms: u32,
    /// Delay between a navigation event and the URL check
    pub history_settle_ms: u32,
    pub intersection_threshold: f64,
    pub intersection_root_margin: String,
    pub retry: RetryPolicy,
    pub infinite_scroll_hosts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            settle_delay_ms: 500,
            sweep_interval_minutes: 5,
            mutation_debounce_ms: 50,
            scroll_debounce_ms: 200,
            media_poll_ms: 1000,
            url_poll_ms: 2000,
            history_settle_ms: 100,
            intersection_threshold: 0.1,
            intersection_root_margin: "50px".to_string(),
            retry: RetryPolicy::default(),
            infinite_scroll_hosts: INFINITE_SCROLL_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl Config {
    /// Parse an override object; anything missing or malformed keeps its default.
    pub fn from_json(value: Option<serde_json::Value>) -> Config {
        match value {
            None | Some(serde_json::Value::Null) => Config::default(),
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config override: {}", e);
                Config::default()
            }),
        }
    }
}

/// Bounded retries with a linearly growing delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u32,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), or None once exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<u32> {
        if attempt >= self.max_retries {
            return None;
        }
        Some(self.base_delay_ms.saturating_mul(attempt + 1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retry_delays_grow_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Some(1000));
        assert_eq!(policy.delay_for(1), Some(2000));
        assert_eq!(policy.delay_for(2), Some(3000));
        assert_eq!(policy.delay_for(3), None);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = Config::from_json(Some(json!({
            "settleDelayMs": 250,
            "retry": {"maxRetries": 1}
        })));
        assert_eq!(config.settle_delay_ms, 250);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.mutation_debounce_ms, 50);
    }

    #[test]
    fn test_invalid_override_falls_back() {
        let config = Config::from_json(Some(json!({"settleDelayMs": "soon"})));
        assert_eq!(config, Config::default());
        assert_eq!(Config::from_json(None), Config::default());
    }
}
