//! Outbound request descriptor.

use std::fmt;

use reqwest::Method;
use url::Url;

/// A fully-formed outbound request.
///
/// The expected response shape is the type parameter the request is issued
/// with, not part of the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    name: &'static str,
    method: Method,
    url: Url,
}

impl UpstreamRequest {
    /// Build a request. `name` labels the call in logs and metrics.
    pub fn new(name: &'static str, method: Method, url: Url) -> Self {
        Self { name, method, url }
    }

    pub fn get(name: &'static str, url: Url) -> Self {
        Self::new(name, Method::GET, url)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
