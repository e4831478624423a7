//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;

/// Calculate the delay before retry number `retry` (0-indexed).
///
/// `min(base * 2^retry + jitter, max)`, with jitter drawn uniformly from
/// `[0, jitter_ms)`.
pub fn calculate_backoff(retry: u32, config: &RetryConfig) -> Duration {
    let jitter = if config.jitter_ms > 0 {
        rand::thread_rng().gen_range(0..config.jitter_ms)
    } else {
        0
    };
    backoff_with_jitter(retry, config.base_delay_ms, config.max_delay_ms, jitter)
}

fn backoff_with_jitter(retry: u32, base_ms: u64, max_ms: u64, jitter_ms: u64) -> Duration {
    let exponential_base = 2u64.saturating_pow(retry);
    let delay_ms = base_ms.saturating_mul(exponential_base).saturating_add(jitter_ms);

    Duration::from_millis(delay_ms.min(max_ms))
}
