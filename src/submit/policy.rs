// src/submit/policy.rs
// =============================================================================
// This module describes the IndexNow engines and their retry behavior.
//
// Instead of hardcoding nested retry loops per engine, each engine carries
// a small declarative descriptor (attempt limits, backoff shape, whether a
// 403 is retryable) and one generic driver in engine.rs consumes it. Adding
// an engine means adding a table entry, not new control flow.
//
// Why do some engines treat 403 specially?
// - A freshly published key file takes a while to propagate through the
//   IndexNow hub and Bing, so a 403 from those is presumed transient and
//   retried on a short fixed schedule before giving up
// =============================================================================

use std::time::Duration;

// Ceiling for 429 attempts per engine per batch
const MAX_RATE_LIMIT_ATTEMPTS: u32 = 5;

// Fixed waits between soft-403 attempts on propagation-sensitive engines:
// at most 3 attempts with 10s then 20s in between
const SOFT_AUTH_DELAYS: &[Duration] = &[Duration::from_secs(10), Duration::from_secs(20)];

// One IndexNow-enabled search engine endpoint
#[derive(Debug, Clone, Copy)]
pub struct Engine {
    pub name: &'static str,
    pub endpoint: &'static str,
    pub policy: RetryPolicy,
}

// Declarative retry behavior for one engine
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts allowed while the engine keeps answering 429
    pub max_attempts: u32,
    /// Fixed delay schedule for soft 403s; empty means 403 is a hard failure
    pub soft_auth_delays: &'static [Duration],
}

impl RetryPolicy {
    /// Backoff before the next attempt after the given 429'd attempt:
    /// clamp(2^(attempt+1), 4s, 60s) - roughly 4s, 8s, 16s, 32s, 60s
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt.saturating_add(1));
        Duration::from_secs(secs.clamp(4, 60))
    }

    /// True when this engine retries a 403 as a presumed propagation delay
    pub fn retries_soft_auth(&self) -> bool {
        !self.soft_auth_delays.is_empty()
    }

    /// Total attempts allowed on the soft-403 path (one more than there
    /// are delays, since the final attempt is not followed by a wait)
    pub fn max_soft_auth_attempts(&self) -> u32 {
        self.soft_auth_delays.len() as u32 + 1
    }
}

const SOFT_AUTH_POLICY: RetryPolicy = RetryPolicy {
    max_attempts: MAX_RATE_LIMIT_ATTEMPTS,
    soft_auth_delays: SOFT_AUTH_DELAYS,
};

const HARD_AUTH_POLICY: RetryPolicy = RetryPolicy {
    max_attempts: MAX_RATE_LIMIT_ATTEMPTS,
    soft_auth_delays: &[],
};

// All IndexNow-enabled search engines we submit to
//
// Only the hub and Bing get the soft-403 treatment; the rest treat 403 as
// an immediate hard failure.
const ENGINES: &[Engine] = &[
    Engine {
        name: "indexnow",
        endpoint: "https://api.indexnow.org/indexnow",
        policy: SOFT_AUTH_POLICY,
    },
    Engine {
        name: "bing",
        endpoint: "https://www.bing.com/indexnow",
        policy: SOFT_AUTH_POLICY,
    },
    Engine {
        name: "yandex",
        endpoint: "https://yandex.com/indexnow",
        policy: HARD_AUTH_POLICY,
    },
    Engine {
        name: "seznam",
        endpoint: "https://search.seznam.cz/indexnow",
        policy: HARD_AUTH_POLICY,
    },
    Engine {
        name: "naver",
        endpoint: "https://searchadvisor.naver.com/indexnow",
        policy: HARD_AUTH_POLICY,
    },
    Engine {
        name: "yep",
        endpoint: "https://indexnow.yep.com/indexnow",
        policy: HARD_AUTH_POLICY,
    },
];

// Returns the configured engine roster
pub fn engines() -> &'static [Engine] {
    ENGINES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_delays_follow_the_curve() {
        let policy = HARD_AUTH_POLICY;
        let delays: Vec<u64> = (1..=5)
            .map(|attempt| policy.rate_limit_delay(attempt).as_secs())
            .collect();
        assert_eq!(delays, vec![4, 8, 16, 32, 60]);
    }

    #[test]
    fn test_rate_limit_delays_are_bounded_and_non_decreasing() {
        let policy = HARD_AUTH_POLICY;
        let mut previous = Duration::ZERO;
        for attempt in 1..=10 {
            let delay = policy.rate_limit_delay(attempt);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(60));
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_soft_auth_applies_only_to_hub_and_bing() {
        for engine in engines() {
            let expected = matches!(engine.name, "indexnow" | "bing");
            assert_eq!(engine.policy.retries_soft_auth(), expected, "{}", engine.name);
        }
    }

    #[test]
    fn test_soft_auth_schedule_is_ten_then_twenty() {
        assert_eq!(
            SOFT_AUTH_POLICY.soft_auth_delays,
            &[Duration::from_secs(10), Duration::from_secs(20)]
        );
        assert_eq!(SOFT_AUTH_POLICY.max_soft_auth_attempts(), 3);
    }

    #[test]
    fn test_roster_covers_all_known_engines() {
        let names: Vec<&str> = engines().iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec!["indexnow", "bing", "yandex", "seznam", "naver", "yep"]
        );
    }
}
