use std::fmt;
use std::sync::Mutex;

use rustc_hash::FxHashMap;

/// Thread-safe per-group statistics: HTTP status code to occurrence count.
///
/// Mutated by the validator on every completed attempt; read by continuation
/// and final policies. Reads observe a consistent snapshot.
#[derive(Debug, Default)]
pub struct LinkGroupStats {
    counts: Mutex<FxHashMap<u16, u64>>,
}

impl LinkGroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the given status code.
    pub fn record_status(&self, status: u16) {
        let mut counts = self.counts.lock().expect("stats lock poisoned");
        *counts.entry(status).or_insert(0) += 1;
    }

    /// Number of responses observed with the given status code.
    pub fn response_count_by_status(&self, status: u16) -> u64 {
        let counts = self.counts.lock().expect("stats lock poisoned");
        counts.get(&status).copied().unwrap_or(0)
    }

    /// Number of 2xx responses observed.
    pub fn valid_count(&self) -> u64 {
        let counts = self.counts.lock().expect("stats lock poisoned");
        counts
            .iter()
            .filter(|(status, _)| (200..300).contains(*status))
            .map(|(_, count)| count)
            .sum()
    }

    /// Total number of responses observed, any status.
    pub fn total_count(&self) -> u64 {
        let counts = self.counts.lock().expect("stats lock poisoned");
        counts.values().sum()
    }
}

/// Verdict of an `AggregatePolicy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatePolicyResult {
    valid: bool,
    message: String,
}

impl AggregatePolicyResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AggregatePolicyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "valid")
        } else {
            write!(f, "invalid: {}", self.message)
        }
    }
}

/// A pure assertion over a group's statistics.
///
/// Evaluated as a continuation policy before each request (an invalid verdict
/// skips the rest of the group) or as a final policy after all retries (an
/// invalid verdict yields a synthetic error result).
pub trait AggregatePolicy: Send + Sync {
    fn apply(&self, stats: &LinkGroupStats) -> AggregatePolicyResult;
}

impl<F> AggregatePolicy for F
where
    F: Fn(&LinkGroupStats) -> AggregatePolicyResult + Send + Sync,
{
    fn apply(&self, stats: &LinkGroupStats) -> AggregatePolicyResult {
        self(stats)
    }
}

/// Policy that turns invalid once the given status has been observed `limit`
/// or more times. Typical continuation use: stop a group after a few
/// `429 Too Many Requests`.
pub fn max_status_count(status: u16, limit: u64) -> impl AggregatePolicy {
    move |stats: &LinkGroupStats| {
        let count = stats.response_count_by_status(status);
        if count >= limit {
            AggregatePolicyResult::invalid(format!(
                "Got {count} responses with status {status}, limit is {limit}"
            ))
        } else {
            AggregatePolicyResult::valid()
        }
    }
}

/// Policy that is valid once at least `min` 2xx responses have been
/// observed. Typical final use: assert a skipping group still validated a
/// minimum number of links.
pub fn min_valid_count(min: u64) -> impl AggregatePolicy {
    move |stats: &LinkGroupStats| {
        let count = stats.valid_count();
        if count >= min {
            AggregatePolicyResult::valid()
        } else {
            AggregatePolicyResult::invalid(format!(
                "Expected at least {min} valid links, got {count}"
            ))
        }
    }
}
