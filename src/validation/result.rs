use std::fmt;

use crate::core::types::Link;

use super::group::LinkGroup;

/// Outcome of validating a single link.
///
/// Status codes are signed: `0` marks a link that was never attempted
/// (deadline expired or skipped) and negative values mark synthetic results,
/// such as `-5` for a failing final policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The link resolved, including its fragment if it has one.
    Valid { link: Link, status: i32 },
    /// The link is broken; terminal.
    Invalid {
        link: Link,
        status: i32,
        message: String,
    },
    /// A transient outcome, scheduled for a future retry.
    Retry {
        link: Link,
        status: i32,
        message: String,
        /// Absolute wall-clock retry time in milliseconds since the epoch.
        retry_at_ms: u64,
        /// Attempts remaining after the one that produced this result.
        attempts_left: u32,
    },
}

impl ValidationResult {
    pub fn valid(link: Link, status: i32) -> Self {
        Self::Valid { link, status }
    }

    pub fn invalid(link: Link, status: i32, message: impl Into<String>) -> Self {
        Self::Invalid {
            link,
            status,
            message: message.into(),
        }
    }

    pub fn retry(
        link: Link,
        status: i32,
        message: impl Into<String>,
        retry_at_ms: u64,
        attempts_left: u32,
    ) -> Self {
        Self::Retry {
            link,
            status,
            message: message.into(),
            retry_at_ms,
            attempts_left,
        }
    }

    pub fn link(&self) -> &Link {
        match self {
            Self::Valid { link, .. } | Self::Invalid { link, .. } | Self::Retry { link, .. } => {
                link
            }
        }
    }

    pub fn status(&self) -> i32 {
        match self {
            Self::Valid { status, .. }
            | Self::Invalid { status, .. }
            | Self::Retry { status, .. } => *status,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { message, .. } | Self::Retry { message, .. } => Some(message),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// True for both terminal invalids and scheduled retries.
    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }

    /// Scheduled retry time, if this is a retry. A retry time that has
    /// already passed is still a retry; the scheduler decides whether to
    /// execute or abandon it.
    pub fn retry_at_ms(&self) -> Option<u64> {
        match self {
            Self::Retry { retry_at_ms, .. } => Some(*retry_at_ms),
            _ => None,
        }
    }

    pub fn attempts_left(&self) -> Option<u32> {
        match self {
            Self::Retry { attempts_left, .. } => Some(*attempts_left),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(
                f,
                "{} [{}] {}",
                self.link().resolved_uri(),
                self.status(),
                message
            ),
            None => write!(f, "{} [{}]", self.link().resolved_uri(), self.status()),
        }
    }
}

/// One unit of work for a `LinkValidator`: the (possibly rewritten) link,
/// the remaining attempt budget and the owning group, with the group's
/// continuation verdict latched at creation time.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    link: Link,
    attempts_left: u32,
    group: LinkGroup,
    should_continue: bool,
}

impl ValidationRequest {
    pub(crate) fn new(link: Link, attempts_left: u32, group: LinkGroup) -> Self {
        let should_continue = group.evaluate_continuation();
        Self {
            link,
            attempts_left,
            group,
            should_continue,
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn attempts_left(&self) -> u32 {
        self.attempts_left
    }

    pub fn group(&self) -> &LinkGroup {
        &self.group
    }

    /// False when one of the group's continuation policies judged the group
    /// saturated at request-creation time; such a request is dropped.
    pub fn should_continue(&self) -> bool {
        self.should_continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> Link {
        Link::of_resolved("https://example.com/page#frag")
    }

    #[test]
    fn test_valid_result() {
        let result = ValidationResult::valid(link(), 200);

        assert!(result.is_valid());
        assert!(!result.is_invalid());
        assert!(!result.should_retry());
        assert_eq!(result.status(), 200);
        assert_eq!(result.message(), None);
        assert_eq!(result.retry_at_ms(), None);
    }

    #[test]
    fn test_invalid_result() {
        let result = ValidationResult::invalid(link(), 404, "HTTP 404");

        assert!(!result.is_valid());
        assert!(result.is_invalid());
        assert!(!result.should_retry());
        assert_eq!(result.message(), Some("HTTP 404"));
    }

    #[test]
    fn test_retry_result_is_invalid_until_it_succeeds() {
        let result = ValidationResult::retry(link(), 429, "HTTP 429", 1_000, 1);

        assert!(result.is_invalid());
        assert!(result.should_retry());
        assert_eq!(result.retry_at_ms(), Some(1_000));
        assert_eq!(result.attempts_left(), Some(1));
    }

    #[test]
    fn test_past_retry_time_is_still_a_retry() {
        let result = ValidationResult::retry(link(), 503, "HTTP 503", 0, 2);
        assert!(result.should_retry());
    }

    #[test]
    fn test_display() {
        let invalid = ValidationResult::invalid(link(), 404, "HTTP 404");
        assert_eq!(
            invalid.to_string(),
            "https://example.com/page#frag [404] HTTP 404"
        );

        let valid = ValidationResult::valid(link(), 200);
        assert_eq!(valid.to_string(), "https://example.com/page#frag [200]");
    }
}
