use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Method;

use crate::core::constants::timeouts;
use crate::core::error::Result;

use super::response::Response;

/// Transport boundary of the validation pipeline.
///
/// An implementation issues one HTTP request and captures the final response
/// after redirects. Network-level faults (DNS, TLS, connect, read timeout)
/// surface as `Err`; any HTTP status, including error statuses, surfaces as
/// `Ok(Response)`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        uri: &str,
        headers: &[(String, String)],
    ) -> Result<Response>;
}

/// Default `HttpClient` backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Build a client with the crate's default user agent.
    pub fn new() -> Result<Self> {
        let user_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        Self::with_user_agent(user_agent)
    }

    /// Build a client with a custom user agent.
    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        Self::with_options(
            user_agent,
            Duration::from_secs(timeouts::DEFAULT_REQUEST_TIMEOUT_SECONDS),
        )
    }

    /// Build a client with a custom user agent and per-request timeout.
    pub fn with_options(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(10))
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(
        &self,
        method: Method,
        uri: &str,
        headers: &[(String, String)],
    ) -> Result<Response> {
        let mut request = self.client.request(method, uri);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.send().await?;

        let status = response.status().as_u16();
        let response_headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Response::new(status, response_headers, body.to_vec()))
    }
}
