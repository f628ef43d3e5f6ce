use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use log::debug;
use reqwest::Method;
use url::Url;

use crate::core::constants::retry;
use crate::core::error::{LinkSureError, Result};
use crate::core::now_millis;
use crate::http::client::{HttpClient, ReqwestHttpClient};
use crate::http::response::Response;

use super::result::{ValidationRequest, ValidationResult};

/// Executes a single validation request: one HTTP attempt plus outcome
/// classification.
#[async_trait]
pub trait LinkValidator: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult>;
}

/// Default `LinkValidator` issuing real HTTP requests.
///
/// One attempt acquires a credit from the group's rate limit, issues the
/// request with the group's headers, records the observed status into the
/// group's statistics, delegates 2xx responses to the group's fragment
/// validator and classifies everything else as terminal or retryable.
pub struct HttpLinkValidator {
    client: Arc<dyn HttpClient>,
    head_hosts: Vec<String>,
}

impl HttpLinkValidator {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(Arc::new(ReqwestHttpClient::new()?)))
    }

    /// Build a validator from a loaded configuration: custom user agent and
    /// HEAD-request host allowlist.
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let default_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        let user_agent = config.user_agent.as_deref().unwrap_or(default_agent);
        let client = ReqwestHttpClient::with_user_agent(user_agent)?;
        let mut validator = Self::with_client(Arc::new(client));
        if let Some(hosts) = &config.head_request_hosts {
            validator = validator.allow_head_for_hosts(hosts.iter().cloned());
        }
        Ok(validator)
    }

    /// Use a caller-supplied transport.
    pub fn with_client(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            head_hosts: Vec::new(),
        }
    }

    /// Allow HEAD requests for fragment-free links on the given hosts.
    /// Everything else is fetched with GET.
    pub fn allow_head_for_hosts(mut self, hosts: impl IntoIterator<Item = String>) -> Self {
        self.head_hosts.extend(hosts);
        self
    }

    fn select_method(&self, request: &ValidationRequest) -> Method {
        if request.link().fragment().is_none() && !self.head_hosts.is_empty() {
            let host = Url::parse(request.link().request_uri())
                .ok()
                .and_then(|url| url.host_str().map(str::to_string));
            if let Some(host) = host {
                if self.head_hosts.contains(&host) {
                    return Method::HEAD;
                }
            }
        }
        Method::GET
    }

    fn classify_failure(
        &self,
        request: &ValidationRequest,
        status: i32,
        message: String,
        response: Option<&Response>,
    ) -> ValidationResult {
        let link = request.link().clone();
        let attempts_left = request.attempts_left().saturating_sub(1);
        if attempts_left == 0 {
            return ValidationResult::invalid(link, status, message);
        }
        let delay_ms = response
            .and_then(|r| r.header("Retry-After"))
            .and_then(parse_retry_after_ms)
            .unwrap_or(retry::DEFAULT_RETRY_DELAY_MS)
            .min(retry::MAX_RETRY_DELAY_MS);
        ValidationResult::retry(
            link,
            status,
            message,
            now_millis() + delay_ms,
            attempts_left,
        )
    }
}

#[async_trait]
impl LinkValidator for HttpLinkValidator {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult> {
        let group = request.group();
        let link = request.link();

        group.rate_limit.acquire().await;

        let method = self.select_method(request);
        let outcome = self
            .client
            .execute(method, link.request_uri(), &group.headers)
            .await;

        match outcome {
            Ok(response) => {
                let status = response.status();
                group.stats.record_status(status);
                debug!("{} -> {}", link.resolved_uri(), status);

                if (200..300).contains(&status) {
                    return group.fragment_validator.validate(link, &response);
                }

                let message = format!("HTTP {status}");
                if retry::is_retryable(status) {
                    Ok(self.classify_failure(
                        request,
                        i32::from(status),
                        message,
                        Some(&response),
                    ))
                } else {
                    Ok(ValidationResult::invalid(
                        link.clone(),
                        i32::from(status),
                        message,
                    ))
                }
            }
            Err(LinkSureError::Http(err)) => {
                // We are interested in why the request failed, not just that
                // it failed
                let message = std::error::Error::source(&err)
                    .map(|source| source.to_string())
                    .unwrap_or_else(|| err.to_string());
                debug!("{} -> {}", link.resolved_uri(), message);
                Ok(self.classify_failure(request, 0, message, None))
            }
            Err(other) => Err(other),
        }
    }
}

/// Parse a `Retry-After` header value: either integer seconds or an
/// HTTP-date.
fn parse_retry_after_ms(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds * 1_000);
    }
    httpdate::parse_http_date(value).ok().map(|at| {
        at.duration_since(SystemTime::now())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    })
}
