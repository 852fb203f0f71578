//! Bounded retry policy with exponential backoff.
//!
//! The remote responder used to carry a manual sleep-and-double loop
//! inline in its call path; this module lifts that into a reusable
//! policy value (max attempts, base delay, multiplier, cap) that is
//! testable without any network call. The caller owns the sleeping —
//! the policy only answers "how many attempts" and "how long before
//! attempt N retries".

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded-retry policy for a fallible operation.
///
/// Delays apply only *between* attempts, never after the last one:
/// for `max_attempts = 3` there are at most two waits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first (minimum 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt.
    #[serde(default = "default_base_delay")]
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Factor applied to the delay after each failed attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on any single delay.
    #[serde(default = "default_max_delay")]
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            multiplier: default_multiplier(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after a failed attempt number `attempt` (1-based)
    /// before the next one: `base_delay * multiplier^(attempt - 1)`,
    /// capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_possible_wrap)] // attempt count won't exceed i32
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(delay_secs).min(self.max_delay)
    }

    /// True when `attempt` (1-based) is the final allowed attempt, so
    /// no delay should follow its failure.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_from_base() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_each_delay_at_least_doubles() {
        let policy = RetryPolicy::default();
        for attempt in 1..policy.max_attempts {
            let current = policy.delay_for_attempt(attempt);
            let next = policy.delay_for_attempt(attempt + 1);
            assert!(next >= current * 2, "attempt {attempt}: {next:?} < 2 * {current:?}");
        }
    }

    #[test]
    fn test_delay_caps_at_max() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(8),
        };

        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_secs(8));
    }

    #[test]
    fn test_final_attempt_has_no_following_delay() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_final_attempt(1));
        assert!(!policy.is_final_attempt(2));
        assert!(policy.is_final_attempt(3));
    }

    #[test]
    fn test_deserialize_with_humantime_durations() {
        let policy: RetryPolicy = toml::from_str(
            r#"
            max_attempts = 5
            base_delay = "250ms"
            multiplier = 1.5
            max_delay = "10s"
            "#,
        )
        .unwrap();

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_deserialize_defaults() {
        let policy: RetryPolicy = toml::from_str("").unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }
}

mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
