//! Randomized pauses between requests to the same catalog.

use rand::Rng;
use std::time::Duration;

/// Pick a delay uniformly from `min..=max`
pub fn jittered_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }

    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

/// Sleep for a jittered delay; a zero range returns immediately
pub async fn pause(min: Duration, max: Duration) {
    let delay = jittered_delay(min, max);
    if delay > Duration::ZERO {
        tokio::time::sleep(delay).await;
    }
}
