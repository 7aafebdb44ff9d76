//! Request context handed to the TTL policy.
//!
//! The transport layer owns request parsing; it only needs to copy the
//! parameters and headers it already decoded into a [`RequestContext`].

use std::collections::HashMap;

/// The parts of an inbound request the session layer cares about.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Full request URL, used for logging only.
    url: Option<String>,

    /// Query/form parameters. Multiple values per name are kept in order.
    params: HashMap<String, Vec<String>>,

    /// Headers keyed by lowercased name.
    headers: HashMap<String, String>,
}

impl RequestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Add a request parameter value.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Set a request header. Header names are case-insensitive.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// The request URL, if known.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// First value of a parameter. Names are matched case-sensitively.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Value of a header, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}
