//! Exponential backoff with jitter.
//!
//! The delay before retry `n` (0-based) is `min(base * 2^n, max)`, then
//! shifted by a uniformly random amount of up to ±25%. Jitter keeps many
//! clients that failed together from retrying in lockstep.

use std::time::Duration;

use rand::Rng;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
/// Default ceiling for the unjittered delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(8000);
/// Ceiling used by the response-cache retry variant.
pub const CACHE_LAYER_MAX_DELAY: Duration = Duration::from_millis(5000);
/// Maximum relative jitter applied to a delay.
pub const JITTER_RATIO: f64 = 0.25;

/// Computes the wait between retry attempts.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use meteo_client::clients::BackoffPolicy;
///
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.unjittered(2), Duration::from_millis(4000));
///
/// let delay = policy.delay(2);
/// assert!(delay >= Duration::from_millis(3000) && delay <= Duration::from_millis(5000));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: JITTER_RATIO,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with custom base and max delays.
    ///
    /// If `base_delay` exceeds `max_delay`, the base is lowered to the max.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay: base_delay.min(max_delay),
            max_delay,
            jitter: JITTER_RATIO,
        }
    }

    /// The variant used by the response cache: 1s base, 5s cap.
    #[must_use]
    pub fn cache_layer() -> Self {
        Self::new(DEFAULT_BASE_DELAY, CACHE_LAYER_MAX_DELAY)
    }

    /// Returns a copy of this policy without jitter.
    ///
    /// Useful where reproducible timings matter more than spreading load.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Returns the base delay.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the cap applied before jitter.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns `min(base * 2^attempt, max)`.
    #[must_use]
    pub fn unjittered(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Returns the jittered delay for `attempt`, floored to whole milliseconds.
    ///
    /// The value lies within `[0.75, 1.25]` of [`unjittered`](Self::unjittered)
    /// and never exceeds `max_delay * 1.25`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let spread = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        self.delay_with(attempt, spread)
    }

    /// Applies a given jitter sample in `[-1, 1]`.
    fn delay_with(&self, attempt: u32, spread: f64) -> Duration {
        let capped = self.unjittered(attempt).as_secs_f64() * 1000.0;
        let jittered = capped + capped * self.jitter * spread.clamp(-1.0, 1.0);
        // Whole milliseconds, never negative
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = jittered.max(0.0).floor() as u64;
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_defaults() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay(), ms(1000));
        assert_eq!(policy.max_delay(), ms(8000));
        assert_eq!(BackoffPolicy::cache_layer().max_delay(), ms(5000));
    }

    #[test]
    fn test_unjittered_doubles_then_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.unjittered(0), ms(1000));
        assert_eq!(policy.unjittered(1), ms(2000));
        assert_eq!(policy.unjittered(2), ms(4000));
        assert_eq!(policy.unjittered(3), ms(8000));
        assert_eq!(policy.unjittered(4), ms(8000));
        assert_eq!(policy.unjittered(40), ms(8000));
    }

    #[test]
    fn test_jitter_extremes() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_with(0, -1.0), ms(750));
        assert_eq!(policy.delay_with(0, 1.0), ms(1250));
        assert_eq!(policy.delay_with(1, 0.0), ms(2000));
        assert_eq!(policy.delay_with(10, 1.0), ms(10_000));
    }

    #[test]
    fn test_delay_stays_within_bounds() {
        let policy = BackoffPolicy::default();
        let bounds = [(0, 750, 1250), (1, 1500, 2500), (2, 3000, 5000)];
        for _ in 0..500 {
            for (attempt, low, high) in bounds {
                let delay = policy.delay(attempt);
                assert!(
                    delay >= ms(low) && delay <= ms(high),
                    "attempt {attempt}: {delay:?} outside [{low}, {high}]"
                );
            }
        }
    }

    #[test]
    fn test_delay_never_exceeds_jittered_cap() {
        let policy = BackoffPolicy::cache_layer();
        for attempt in 0..20 {
            assert!(policy.delay(attempt) <= ms(6250));
        }
    }

    #[test]
    fn test_without_jitter_is_deterministic() {
        let policy = BackoffPolicy::default().without_jitter();
        assert_eq!(policy.delay(0), ms(1000));
        assert_eq!(policy.delay(2), ms(4000));
    }

    #[test]
    fn test_base_above_max_is_clamped() {
        let policy = BackoffPolicy::new(ms(10_000), ms(2000));
        assert_eq!(policy.unjittered(0), ms(2000));
    }
}
