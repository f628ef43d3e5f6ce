//! linksure - link validation core for rendered documentation sites
//!
//! This library validates links extracted from a rendered documentation
//! site by issuing HTTP requests, checking URL fragments against the
//! returned bodies and applying per-group policies: rate limits, auth
//! headers, link rewriting and continuation/final assertions. Failing
//! links surface as a stream of validation errors.

pub mod config;
pub mod core;
pub mod http;
pub mod logging;
pub mod resolver;
pub mod validation;

// Re-export commonly used types for convenience
pub use config::Config;
pub use core::{Link, LinkBuilder, LinkError, LinkSureError, Result};
pub use http::{HttpClient, ReqwestHttpClient, Response};
pub use resolver::{NoopResolver, ResourceResolver, SourceLocation};
pub use validation::{
    max_status_count, min_valid_count, AggregatePolicy, AggregatePolicyResult,
    AlwaysValidFragmentValidator, FragmentValidator, GitHubBlobFragmentValidator,
    HtmlFragmentValidator, HttpLinkValidator, LinkGroup, LinkGroupStats, LinkSource, LinkStream,
    LinkValidator, RateLimit, ValidationErrorStream, ValidationRequest, ValidationResult,
};
