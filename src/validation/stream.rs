use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use rustc_hash::FxHashSet;
use tokio::time::sleep;

use crate::config::Config;
use crate::core::constants::sentinel_status;
use crate::core::error::Result;
use crate::core::now_millis;
use crate::core::types::Link;
use crate::logging;
use crate::resolver::{NoopResolver, ResourceResolver};

use super::errors::ValidationErrorStream;
use super::group::{anchored, LinkGroup};
use super::result::{ValidationRequest, ValidationResult};
use super::validator::{HttpLinkValidator, LinkValidator};

/// Produces the links to validate, typically by crawling a rendered site.
///
/// The crawler collaborator implements this; the core only drains it.
pub trait LinkSource {
    fn links(&mut self) -> Vec<Link>;
}

/// A stream of links flowing towards validation.
///
/// All builder methods are copy-on-write: each returns a new `LinkStream`
/// and leaves the receiver usable. The group list always ends with the `.*`
/// sentinel group; groups opened with [`LinkStream::group`] are inserted
/// immediately before it on `end_group`.
#[derive(Clone)]
pub struct LinkStream {
    links: Vec<Link>,
    pub(crate) resolver: Arc<dyn ResourceResolver>,
    retry_attempts: u32,
    overall_timeout_ms: u64,
    pub(crate) groups: Vec<LinkGroup>,
    log_links: bool,
}

impl LinkStream {
    /// Create a stream over the given links, resolving source locations
    /// through `resolver`.
    pub fn new(
        links: impl IntoIterator<Item = Link>,
        resolver: Arc<dyn ResourceResolver>,
    ) -> Self {
        Self {
            links: links.into_iter().collect(),
            resolver,
            retry_attempts: crate::core::constants::retry::DEFAULT_RETRY_ATTEMPTS,
            overall_timeout_ms: crate::core::constants::timeouts::DEFAULT_OVERALL_TIMEOUT_MS,
            groups: vec![LinkGroup::sentinel()],
            log_links: false,
        }
    }

    /// Create a stream over the given links with no source resolution.
    pub fn of(links: impl IntoIterator<Item = Link>) -> Self {
        Self::new(links, Arc::new(NoopResolver))
    }

    /// Create a stream by draining a link source.
    pub fn from_source(
        source: &mut dyn LinkSource,
        resolver: Arc<dyn ResourceResolver>,
    ) -> Self {
        Self::new(source.links(), resolver)
    }

    /// The links currently in the stream, in pipeline order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Log every link as it enters validation.
    pub fn log(&self) -> Self {
        let mut copy = self.clone();
        copy.log_links = true;
        copy
    }

    /// Remove links satisfying the given predicate.
    pub fn exclude(&self, exclude: impl Fn(&Link) -> bool) -> Self {
        let mut copy = self.clone();
        copy.links.retain(|link| !exclude(link));
        copy
    }

    /// Remove links whose resolved URI matches the given pattern.
    pub fn exclude_resolved(&self, pattern: &str) -> Result<Self> {
        let regex = anchored(pattern)?;
        Ok(self.exclude(|link| regex.is_match(link.resolved_uri())))
    }

    /// Remove links whose resolved URI equals any of the given URIs.
    pub fn exclude_resolved_uris(
        &self,
        uris: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let set: FxHashSet<String> = uris.into_iter().map(Into::into).collect();
        self.exclude(|link| set.contains(link.resolved_uri()))
    }

    /// Keep only links whose resolved URI matches the given pattern.
    pub fn include_resolved(&self, pattern: &str) -> Result<Self> {
        let regex = anchored(pattern)?;
        Ok(self.exclude(|link| !regex.is_match(link.resolved_uri())))
    }

    /// Remove links the resolver identifies as AsciiDoc sources ("edit this
    /// page" links).
    pub fn exclude_edit_this_page(&self) -> Self {
        let resolver = Arc::clone(&self.resolver);
        self.exclude(move |link| resolver.is_asciidoc_source(link))
    }

    /// How many times a link responding with a retryable status is retried.
    pub fn retry_attempts(&self, retry_attempts: u32) -> Self {
        let mut copy = self.clone();
        copy.retry_attempts = retry_attempts;
        copy
    }

    /// Deadline in milliseconds within which all links must get validated,
    /// including any retries.
    pub fn overall_timeout(&self, overall_timeout_ms: u64) -> Self {
        let mut copy = self.clone();
        copy.overall_timeout_ms = overall_timeout_ms;
        copy
    }

    /// Apply scheduler settings from a loaded configuration.
    pub fn configured(&self, config: &Config) -> Self {
        let mut copy = self.clone();
        if let Some(retry_attempts) = config.retry_attempts {
            copy.retry_attempts = retry_attempts;
        }
        if let Some(overall_timeout_ms) = config.overall_timeout_ms {
            copy.overall_timeout_ms = overall_timeout_ms;
        }
        copy
    }

    /// Open a new group selecting resolved URIs matching `pattern`. The
    /// group joins this stream once `end_group` is called on it; each link
    /// belongs to the first group whose pattern it matches.
    pub fn group(&self, pattern: &str) -> Result<LinkGroup> {
        LinkGroup::new(Some(Box::new(self.clone())), pattern)
    }

    /// Validate all links with the default HTTP validator.
    pub async fn validate(&self) -> Result<ValidationErrorStream> {
        let validator = HttpLinkValidator::new()?;
        self.validate_with(&validator).await
    }

    /// Validate all links with the given validator.
    pub async fn validate_with(
        &self,
        validator: &dyn LinkValidator,
    ) -> Result<ValidationErrorStream> {
        let started = Instant::now();
        let deadline_ms = now_millis() + self.overall_timeout_ms;
        let mut terminal: Vec<ValidationResult> = Vec::new();
        let mut retryable: Vec<ValidationResult> = Vec::new();

        let mut links = self.links.clone();
        for group in &self.groups {
            for transformer in &group.stream_transformers {
                links = transformer(links);
            }
        }

        logging::log_validation_start(links.len());

        for link in &links {
            if self.log_links {
                info!("{link}");
            }
            let request = self.create_request(link, self.retry_attempts + 1);
            if !request.should_continue() {
                debug!(
                    "Skipping {} per continuation policy of group {}",
                    link.resolved_uri(),
                    request.group().pattern()
                );
                continue;
            }
            let result = if now_millis() >= deadline_ms {
                ValidationResult::invalid(
                    request.link().clone(),
                    sentinel_status::NOT_ATTEMPTED,
                    format!(
                        "Did not try, overall timeout of {} ms expired",
                        self.overall_timeout_ms
                    ),
                )
            } else {
                validator.validate(&request).await?
            };
            if result.is_valid() {
                continue;
            }
            if result.should_retry() {
                retryable.push(result);
            } else {
                terminal.push(result);
            }
        }

        while !retryable.is_empty() {
            retryable.sort_by_key(|result| result.retry_at_ms().unwrap_or(0));
            let head = retryable.remove(0);
            let retry_at_ms = head.retry_at_ms().unwrap_or(0);
            let attempts_left = head.attempts_left().unwrap_or(1);

            let request = self.create_request(head.link(), attempts_left);
            if !request.should_continue() {
                debug!(
                    "Abandoning retry of {} per continuation policy",
                    head.link().resolved_uri()
                );
                continue;
            }

            if retry_at_ms >= deadline_ms {
                terminal.push(ValidationResult::invalid(
                    head.link().clone(),
                    sentinel_status::NOT_ATTEMPTED,
                    format!(
                        "Did not try (again), overall timeout of {} ms expired",
                        self.overall_timeout_ms
                    ),
                ));
                continue;
            }

            let delay_ms = retry_at_ms.saturating_sub(now_millis());
            if delay_ms > 0 {
                logging::log_retry_sleep(delay_ms, &head, retryable.len() + 1);
                sleep(Duration::from_millis(delay_ms)).await;
            }

            let result = validator.validate(&request).await?;
            if result.is_valid() {
                continue;
            }
            if result.should_retry() {
                retryable.push(result);
            } else {
                terminal.push(result);
            }
        }

        terminal.extend(retryable);
        for group in &self.groups {
            let result = group.apply_final_policies();
            if result.is_invalid() {
                terminal.push(result);
            }
        }

        logging::log_validation_complete(
            links.len(),
            terminal.len(),
            started.elapsed().as_millis(),
        );

        Ok(ValidationErrorStream::new(
            terminal,
            Arc::clone(&self.resolver),
        ))
    }

    /// Route a link to the first matching group, rewrite it through the
    /// group's link mapper and latch the group's continuation verdict.
    ///
    /// Both the first pass and the retry pass go through here, so routing is
    /// identical at both call sites.
    pub(crate) fn create_request(&self, link: &Link, attempts: u32) -> ValidationRequest {
        for group in &self.groups {
            if group.matches(link) {
                let mapped = match &group.link_mapper {
                    Some(mapper) => mapper(link.clone()),
                    None => link.clone(),
                };
                return ValidationRequest::new(mapped, attempts, group.clone());
            }
        }
        let fallback = self
            .groups
            .last()
            .expect("sentinel group always present")
            .clone();
        ValidationRequest::new(link.clone(), attempts, fallback)
    }
}

impl fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkStream")
            .field("links", &self.links.len())
            .field("retry_attempts", &self.retry_attempts)
            .field("overall_timeout_ms", &self.overall_timeout_ms)
            .field("groups", &self.groups)
            .finish()
    }
}
