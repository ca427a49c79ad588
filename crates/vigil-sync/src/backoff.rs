//! Retry delay curves.
//!
//! Both curves are exponential with uniform jitter. The attempt caps bound
//! delay growth only; neither the decision queue nor the reconnect loop is
//! ever abandoned because of them.

use std::time::Duration;

use rand::Rng;

/// Failure-count cap for the sync backoff curve.
pub const SYNC_ATTEMPT_CAP: u32 = 10;

/// Ceiling for the sync retry delay.
pub const SYNC_DELAY_CAP_MS: u64 = 60_000;

/// Failure-count cap for the reconnect curve.
pub const RECONNECT_ATTEMPT_CAP: u32 = 6;

const BASE_MS: u64 = 1_000;
const JITTER_MS: u64 = 1_000;

/// Uniform jitter in `[0, 1s)`.
pub fn jitter_ms() -> u64 {
    rand::thread_rng().gen_range(0..JITTER_MS)
}

/// Sync retry delay: `min(60s, 2^attempt * 1s + jitter)`.
pub fn sync_delay(attempt: u32, jitter_ms: u64) -> Duration {
    let base = BASE_MS.saturating_mul(1 << attempt.min(SYNC_ATTEMPT_CAP));
    Duration::from_millis((base + jitter_ms).min(SYNC_DELAY_CAP_MS))
}

/// Reconnect delay: `2^attempt * 1s + jitter`, attempt capped at 6.
pub fn reconnect_delay(attempt: u32, jitter_ms: u64) -> Duration {
    let base = BASE_MS.saturating_mul(1 << attempt.min(RECONNECT_ATTEMPT_CAP));
    Duration::from_millis(base + jitter_ms)
}
