//! Jittered sleeping for the liveness scheduler.
//!
//! # Responsibilities
//! - Spread periodic pings so reconnecting backends never synchronize
//! - Keep the underlying sleep swappable for deterministic tests
//!
//! # Design Decisions
//! - Jitter factor is normally distributed around 1.0 and hard-clamped, so
//!   a ping is never sent at less than half or more than 1.5x the period

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand_distr::{Distribution, Normal};

const STD_DEV: f64 = 0.15;
const MIN_FACTOR: f64 = 0.5;
const MAX_FACTOR: f64 = 1.5;

/// Multiplies `d` by a factor drawn from Normal(1.0, 0.15), clamped to
/// [0.5, 1.5].
pub fn jitter(d: Duration) -> Duration {
    let normal = Normal::new(1.0, STD_DEV).expect("valid distribution parameters");
    let factor = normal
        .sample(&mut rand::thread_rng())
        .clamp(MIN_FACTOR, MAX_FACTOR);
    d.mul_f64(factor)
}

type SleepFn = Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A sleeper that waits approximately the requested duration.
///
/// The sleep primitive is a function-valued field: production uses
/// `tokio::time::sleep`, tests substitute an observer that returns at once.
#[derive(Clone)]
pub struct Sleepish {
    sleep: SleepFn,
}

impl Sleepish {
    pub fn new() -> Self {
        Self {
            sleep: Arc::new(|d| Box::pin(tokio::time::sleep(d))),
        }
    }

    /// Builds a sleeper around a custom sleep function.
    pub fn with_sleep<F, Fut>(sleep: F) -> Self
    where
        F: Fn(Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            sleep: Arc::new(move |d| Box::pin(sleep(d))),
        }
    }

    /// Sleeps for approximately `d`: the jittered duration is handed to the
    /// configured sleep function.
    pub async fn sleep(&self, d: Duration) {
        (self.sleep)(jitter(d)).await;
    }
}

impl Default for Sleepish {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sleepish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sleepish")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn jitter_stays_in_bounds_and_looks_bell_shaped() {
        let second = Duration::from_secs(1);
        let mut buckets = [0usize; 11];
        for _ in 0..1000 {
            let d = jitter(second);
            assert!(d >= Duration::from_millis(500), "too short: {d:?}");
            assert!(d <= Duration::from_millis(1500), "too long: {d:?}");
            let bucket = ((d.as_millis() - 500) / 100).min(10) as usize;
            buckets[bucket] += 1;
        }
        // The middle of the histogram dominates both tails.
        let middle = buckets[4] + buckets[5];
        assert!(middle > buckets[0] + buckets[1], "histogram: {buckets:?}");
        assert!(middle > buckets[9] + buckets[10], "histogram: {buckets:?}");
    }

    #[tokio::test]
    async fn sleep_function_is_swappable() {
        let seen: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let sleepish = Sleepish::with_sleep(move |d| {
            record.lock().unwrap().push(d);
            async {}
        });

        for _ in 0..100 {
            sleepish.sleep(Duration::from_secs(1)).await;
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 100);
        for d in seen.iter() {
            assert!(*d >= Duration::from_millis(500) && *d <= Duration::from_millis(1500));
        }
    }
}
