use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::seq::SliceRandom;
use regex::Regex;

use crate::core::constants::sentinel_status;
use crate::core::error::{LinkSureError, Result};
use crate::core::types::Link;

use super::fragment::{FragmentValidator, HtmlFragmentValidator};
use super::policy::AggregatePolicy;
use super::policy::LinkGroupStats;
use super::rate_limit::RateLimit;
use super::result::ValidationResult;
use super::stream::LinkStream;

pub(crate) type LinkMapper = Arc<dyn Fn(Link) -> Link + Send + Sync>;
pub(crate) type StreamTransformer = Arc<dyn Fn(Vec<Link>) -> Vec<Link> + Send + Sync>;

/// Compile a pattern for whole-URI matching.
///
/// Group and filter patterns match against the entire resolved URI, not a
/// substring of it.
pub(crate) fn anchored(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

/// A group of links selected by a pattern over the resolved URI, carrying
/// the rules applied to its members: headers, auth, link rewriting, rate
/// limit, stream transformers, continuation/final policies and the fragment
/// validator.
///
/// All rule fields are copy-on-write; each builder method returns a new
/// `LinkGroup`. The statistics instance is shared between all copies of the
/// group. The backreference to the parent stream is a one-shot link consumed
/// by `end_group`.
#[derive(Clone)]
pub struct LinkGroup {
    pub(crate) parent: Option<Box<LinkStream>>,
    pub(crate) pattern: Regex,
    pattern_str: String,
    pub(crate) link_mapper: Option<LinkMapper>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) rate_limit: RateLimit,
    pub(crate) stream_transformers: Vec<StreamTransformer>,
    continuation_policies: Vec<Arc<dyn AggregatePolicy>>,
    final_policies: Vec<Arc<dyn AggregatePolicy>>,
    pub(crate) stats: Arc<LinkGroupStats>,
    pub(crate) fragment_validator: Arc<dyn FragmentValidator>,
}

impl LinkGroup {
    pub(crate) fn new(parent: Option<Box<LinkStream>>, pattern: &str) -> Result<Self> {
        Ok(Self {
            parent,
            pattern: anchored(pattern)?,
            pattern_str: pattern.to_string(),
            link_mapper: None,
            headers: Vec::new(),
            rate_limit: RateLimit::none(),
            stream_transformers: Vec::new(),
            continuation_policies: Vec::new(),
            final_policies: Vec::new(),
            stats: Arc::new(LinkGroupStats::new()),
            fragment_validator: Arc::new(HtmlFragmentValidator),
        })
    }

    /// The always-matching fallback group closing every group list.
    pub(crate) fn sentinel() -> Self {
        Self::new(None, ".*").expect("sentinel pattern compiles")
    }

    /// Apply the given rate limit to this group's requests.
    pub fn rate_limit(&self, rate_limit: RateLimit) -> Self {
        let mut copy = self.clone();
        copy.rate_limit = rate_limit;
        copy
    }

    /// Shuffle the order of the links belonging to this group. Links outside
    /// the group keep their relative order and are emitted first.
    pub fn random_order(&self) -> Self {
        let mut copy = self.clone();
        let pattern = self.pattern.clone();
        copy.stream_transformers.push(Arc::new(move |links: Vec<Link>| {
            let (mut members, complement): (Vec<Link>, Vec<Link>) = links
                .into_iter()
                .partition(|link| pattern.is_match(link.resolved_uri()));
            members.shuffle(&mut rand::thread_rng());
            let mut out = complement;
            out.extend(members);
            out
        }));
        copy
    }

    /// Evaluate the given policy before each request of this group; an
    /// invalid verdict skips the remaining links of the group.
    pub fn continuation_policy(&self, policy: impl AggregatePolicy + 'static) -> Self {
        let mut copy = self.clone();
        copy.continuation_policies.push(Arc::new(policy));
        copy
    }

    /// Evaluate the given policy after all links and retries have been
    /// processed; an invalid verdict yields a synthetic error result keyed
    /// on this group's pattern.
    pub fn final_policy(&self, policy: impl AggregatePolicy + 'static) -> Self {
        let mut copy = self.clone();
        copy.final_policies.push(Arc::new(policy));
        copy
    }

    /// Set a Basic `Authorization` header on this group's requests.
    pub fn basic_auth(&self, username: &str, password: &str) -> Self {
        let credentials = BASE64.encode(format!("{username}:{password}").as_bytes());
        self.header("Authorization", &format!("Basic {credentials}"))
    }

    /// Set a Bearer `Authorization` header on this group's requests.
    pub fn bearer_token(&self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {token}"))
    }

    /// Add an HTTP header to all requests of this group. Repeated calls with
    /// the same name append further values.
    pub fn header(&self, name: &str, value: &str) -> Self {
        let mut copy = self.clone();
        copy.headers.push((name.to_string(), value.to_string()));
        copy
    }

    /// The headers applied to this group's requests, in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Rewrite links of this group before validation, e.g. mapping
    /// `github.com` blob links to `api.github.com` where a bearer token
    /// grants higher limits.
    ///
    /// The mapper runs every time a request is (re)created, including on
    /// retries, so it must be idempotent.
    pub fn link_mapper(&self, mapper: impl Fn(Link) -> Link + Send + Sync + 'static) -> Self {
        let mut copy = self.clone();
        copy.link_mapper = Some(Arc::new(mapper));
        copy
    }

    /// Replace the fragment validator used for this group's links.
    pub fn fragment_validator(&self, validator: impl FragmentValidator + 'static) -> Self {
        let mut copy = self.clone();
        copy.fragment_validator = Arc::new(validator);
        copy
    }

    /// Add this group to its parent stream, immediately before the `.*`
    /// sentinel group. Consumes the one-shot parent backreference.
    pub fn end_group(mut self) -> Result<LinkStream> {
        let parent = self
            .parent
            .take()
            .ok_or_else(|| LinkSureError::Group("Cannot end a parentless group".to_string()))?;
        let mut stream = *parent;
        let sentinel_position = stream.groups.len() - 1;
        stream.groups.insert(sentinel_position, self);
        Ok(stream)
    }

    /// The pattern string defining this group.
    pub fn pattern(&self) -> &str {
        &self.pattern_str
    }

    /// The statistics gathered for this group.
    pub fn stats(&self) -> &LinkGroupStats {
        &self.stats
    }

    /// Whether the link's resolved URI belongs to this group.
    pub(crate) fn matches(&self, link: &Link) -> bool {
        self.pattern.is_match(link.resolved_uri())
    }

    /// True while every continuation policy still judges the group valid.
    pub(crate) fn evaluate_continuation(&self) -> bool {
        self.continuation_policies
            .iter()
            .all(|policy| policy.apply(&self.stats).is_valid())
    }

    /// Evaluate the final policies against the group's statistics. The first
    /// failing policy yields a synthetic invalid keyed on the group pattern.
    pub(crate) fn apply_final_policies(&self) -> ValidationResult {
        for policy in &self.final_policies {
            let result = policy.apply(&self.stats);
            if !result.is_valid() {
                return ValidationResult::invalid(
                    Link::of_resolved(self.pattern_str.clone()),
                    sentinel_status::FINAL_POLICY,
                    result.message().to_string(),
                );
            }
        }
        ValidationResult::valid(
            Link::of_resolved(self.pattern_str.clone()),
            sentinel_status::NOT_ATTEMPTED,
        )
    }
}

impl fmt::Debug for LinkGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkGroup")
            .field("pattern", &self.pattern_str)
            .field("headers", &self.headers.len())
            .field("transformers", &self.stream_transformers.len())
            .field("continuation_policies", &self.continuation_policies.len())
            .field("final_policies", &self.final_policies.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::policy::{max_status_count, min_valid_count};

    fn group(pattern: &str) -> LinkGroup {
        LinkGroup::new(None, pattern).unwrap()
    }

    #[test]
    fn test_matches_whole_uri_only() {
        let group = group(r"https://api\.example\.com/.*");

        assert!(group.matches(&Link::of_resolved("https://api.example.com/v1")));
        assert!(!group.matches(&Link::of_resolved("https://apixexample.com/v1")));
        assert!(!group.matches(&Link::of_resolved(
            "prefix https://api.example.com/v1"
        )));
    }

    #[test]
    fn test_sentinel_matches_everything() {
        let sentinel = LinkGroup::sentinel();
        assert_eq!(sentinel.pattern(), ".*");
        assert!(sentinel.matches(&Link::of_resolved("anything at all")));
    }

    #[test]
    fn test_header_appends_preserving_order() {
        let group = group(".*")
            .header("Accept", "text/html")
            .header("X-Tag", "one")
            .header("X-Tag", "two");

        assert_eq!(
            group.headers(),
            &[
                ("Accept".to_string(), "text/html".to_string()),
                ("X-Tag".to_string(), "one".to_string()),
                ("X-Tag".to_string(), "two".to_string()),
            ]
        );
    }

    #[test]
    fn test_builder_methods_do_not_mutate_receiver() {
        let original = group(".*");
        let with_header = original.header("Accept", "text/html");

        assert!(original.headers().is_empty());
        assert_eq!(with_header.headers().len(), 1);
    }

    #[test]
    fn test_basic_auth_header() {
        let group = group(".*").basic_auth("Aladdin", "open sesame");
        assert_eq!(
            group.headers(),
            &[(
                "Authorization".to_string(),
                "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==".to_string()
            )]
        );
    }

    #[test]
    fn test_bearer_token_header() {
        let group = group(".*").bearer_token("s3cr3t");
        assert_eq!(
            group.headers(),
            &[("Authorization".to_string(), "Bearer s3cr3t".to_string())]
        );
    }

    #[test]
    fn test_end_group_without_parent_fails() {
        let result = group(".*").end_group();
        assert!(matches!(result, Err(LinkSureError::Group(_))));
    }

    #[test]
    fn test_stats_shared_between_copies() {
        let original = group(".*");
        let copy = original.header("Accept", "text/html");

        original.stats().record_status(200);
        assert_eq!(copy.stats().response_count_by_status(200), 1);
    }

    #[test]
    fn test_continuation_evaluation() {
        let group = group(".*").continuation_policy(max_status_count(429, 2));

        assert!(group.evaluate_continuation());
        group.stats().record_status(429);
        group.stats().record_status(429);
        assert!(!group.evaluate_continuation());
    }

    #[test]
    fn test_final_policies_yield_pattern_keyed_synthetic() {
        let group = group(r"https://api\.slow/.*").final_policy(min_valid_count(1));

        let result = group.apply_final_policies();
        assert!(result.is_invalid());
        assert_eq!(result.status(), sentinel_status::FINAL_POLICY);
        assert_eq!(result.link().resolved_uri(), r"https://api\.slow/.*");

        group.stats().record_status(200);
        assert!(group.apply_final_policies().is_valid());
    }

    #[test]
    fn test_random_order_transformer_keeps_complement_order() {
        let group = group(r"https://shuffle\.me/.*").random_order();
        let transformer = group.stream_transformers[0].clone();

        let links = vec![
            Link::of_resolved("https://stable.example.com/1"),
            Link::of_resolved("https://shuffle.me/a"),
            Link::of_resolved("https://stable.example.com/2"),
            Link::of_resolved("https://shuffle.me/b"),
        ];
        let transformed = transformer(links);

        assert_eq!(
            transformed[0].resolved_uri(),
            "https://stable.example.com/1"
        );
        assert_eq!(
            transformed[1].resolved_uri(),
            "https://stable.example.com/2"
        );
        let mut tail: Vec<&str> = transformed[2..]
            .iter()
            .map(|link| link.resolved_uri())
            .collect();
        tail.sort_unstable();
        assert_eq!(tail, vec!["https://shuffle.me/a", "https://shuffle.me/b"]);
    }
}
