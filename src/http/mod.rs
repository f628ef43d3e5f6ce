//! HTTP boundary
//!
//! This module defines the transport seam of the pipeline: the `HttpClient`
//! trait, its default `reqwest` implementation and the captured `Response`.

pub mod client;
pub mod response;

// Re-export commonly used items
pub use client::{HttpClient, ReqwestHttpClient};
pub use response::Response;
