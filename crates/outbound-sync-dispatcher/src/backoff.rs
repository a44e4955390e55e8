//! Retry scheduling for failed deliveries.

use chrono::{DateTime, Utc};
use rand::Rng;
use sync_config_and_utils::SyncEngineConfig;

/// Computes the exponential backoff duration for a given retry count.
///
/// `delay = base_delay * 2^(retry_count - 1)`, capped at `max_delay`.
///
/// | Retry Count | Delay (base=30s, max=1h) |
/// |-------------|--------------------------|
/// | 0           | 0s                       |
/// | 1           | 30s                      |
/// | 2           | 60s                      |
/// | 3           | 120s                     |
/// | 8+          | 3600s                    |
pub fn compute_backoff(retry_count: u32, config: &SyncEngineConfig) -> chrono::Duration {
    if retry_count == 0 {
        return chrono::Duration::zero();
    }

    let base_ms = config.base_delay.as_millis() as u64;
    let max_ms = config.max_delay.as_millis() as u64;
    let shift = retry_count - 1;
    let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);

    chrono::Duration::milliseconds(delay_ms as i64)
}

/// Random jitter in `[0, delay * jitter_ratio]`.
pub fn compute_jitter(
    delay: chrono::Duration,
    jitter_ratio: f64,
    rng: &mut impl Rng,
) -> chrono::Duration {
    let max_ms = (delay.num_milliseconds().max(0) as f64 * jitter_ratio).floor() as i64;
    if max_ms <= 0 {
        return chrono::Duration::zero();
    }
    chrono::Duration::milliseconds(rng.gen_range(0..=max_ms))
}

/// When the next attempt is due after the `retry_count`-th failure, or
/// `None` once `max_retries` attempts have failed.
pub fn next_retry_at(
    now: DateTime<Utc>,
    retry_count: u32,
    config: &SyncEngineConfig,
) -> Option<DateTime<Utc>> {
    if retry_count >= config.max_retries {
        return None;
    }
    let delay = compute_backoff(retry_count, config);
    let jitter = compute_jitter(delay, config.jitter_ratio, &mut rand::thread_rng());
    Some(now + delay + jitter)
}
