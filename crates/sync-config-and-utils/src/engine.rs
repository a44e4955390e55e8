//! Retry, batching and concurrency settings for the sync engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration handed to the dispatcher and the retry scheduler.
///
/// # Backoff
///
/// After the n-th failed attempt (`retry_count = n`) the next attempt is
/// scheduled `min(base_delay * 2^(n-1), max_delay)` later, plus a random
/// jitter of up to `jitter_ratio` of that delay. With the defaults:
///
/// | retry_count | delay (before jitter) |
/// |-------------|-----------------------|
/// | 1           | 30s                   |
/// | 2           | 60s                   |
/// | 3           | 120s                  |
/// | 8+          | 3600s (capped)        |
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the exponential delay (before jitter).
    pub max_delay: Duration,
    /// Attempts after which a failed entry becomes terminal.
    pub max_retries: u32,
    /// Maximum jitter as a fraction of the computed delay (0.0 disables jitter).
    pub jitter_ratio: f64,
    /// Maximum entries claimed per scheduling pass.
    pub batch_size: usize,
    /// Maximum concurrent in-flight dispatches per target system.
    pub per_target_concurrency_limit: usize,
    /// Timeout applied to a single outbound call.
    pub dispatch_timeout: Duration,
    /// Age after which an unreleased claim is considered abandoned.
    pub claim_ttl: Duration,
    /// Interval between scheduling passes of the background loop.
    pub poll_interval: Duration,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        EngineSettings::default().to_engine_config()
    }
}

/// File representation of [`SyncEngineConfig`] (durations in milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
    pub jitter_ratio: f64,
    pub batch_size: usize,
    pub per_target_concurrency_limit: usize,
    pub dispatch_timeout_ms: u64,
    pub claim_ttl_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 30_000,
            max_delay_ms: 3_600_000,
            max_retries: 8,
            jitter_ratio: 0.1,
            batch_size: 50,
            per_target_concurrency_limit: 4,
            dispatch_timeout_ms: 30_000,
            claim_ttl_ms: 300_000,
            poll_interval_ms: 5_000,
        }
    }
}

impl EngineSettings {
    /// Convert to the runtime configuration, clamping values that would
    /// stall the engine (zero batch size, zero permits).
    ///
    /// `claim_ttl` is kept at no less than twice the dispatch timeout so a
    /// live claim cannot be taken over while its call is still in flight.
    pub fn to_engine_config(&self) -> SyncEngineConfig {
        let dispatch_timeout_ms = self.dispatch_timeout_ms.max(1);
        SyncEngineConfig {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.base_delay_ms)),
            max_retries: self.max_retries.max(1),
            jitter_ratio: self.jitter_ratio.clamp(0.0, 1.0),
            batch_size: self.batch_size.max(1),
            per_target_concurrency_limit: self.per_target_concurrency_limit.max(1),
            dispatch_timeout: Duration::from_millis(dispatch_timeout_ms),
            claim_ttl: Duration::from_millis(
                self.claim_ttl_ms.max(dispatch_timeout_ms.saturating_mul(2)),
            ),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(10)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_convert_to_durations() {
        let config = SyncEngineConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(30));
        assert_eq!(config.max_delay, Duration::from_secs(3600));
        assert_eq!(config.max_retries, 8);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.per_target_concurrency_limit, 4);
        assert_eq!(config.dispatch_timeout, Duration::from_secs(30));
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let settings = EngineSettings {
            base_delay_ms: 10_000,
            max_delay_ms: 1_000,
            max_retries: 0,
            jitter_ratio: 7.5,
            batch_size: 0,
            per_target_concurrency_limit: 0,
            dispatch_timeout_ms: 5_000,
            claim_ttl_ms: 0,
            ..EngineSettings::default()
        };

        let config = settings.to_engine_config();
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.jitter_ratio, 1.0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.per_target_concurrency_limit, 1);
        assert_eq!(config.claim_ttl, Duration::from_secs(10));
    }

    #[test]
    fn claim_ttl_outlasts_dispatch_timeout() {
        let settings = EngineSettings {
            dispatch_timeout_ms: 60_000,
            claim_ttl_ms: 45_000,
            ..EngineSettings::default()
        };
        let config = settings.to_engine_config();
        assert_eq!(config.claim_ttl, Duration::from_secs(120));

        let config = EngineSettings::default().to_engine_config();
        assert_eq!(config.claim_ttl, Duration::from_secs(300));
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let settings: EngineSettings = serde_json::from_str(r#"{"max_retries": 3}"#).unwrap();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.batch_size, EngineSettings::default().batch_size);
    }
}
