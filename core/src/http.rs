//! Transport-level request and response types.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. A
//! `Descriptor` builds an `HttpRequest` without touching the network; a
//! `Transport` turns it into an `HttpResponse`. Keeping both sides as owned
//! data makes the dispatcher testable with a scripted transport.
//!
//! Headers are an ordered `Vec` of pairs rather than a map so that repeated
//! names survive in the order they were added.

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Upper-case wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caching directive attached to an outgoing request.
///
/// `Default` leaves caching to the transport. The other policies are sent
/// as a `Cache-Control` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    Default,
    NoCache,
    NoStore,
    ReturnCacheElseLoad,
}

impl CachePolicy {
    /// The `Cache-Control` value for this policy, if it needs one.
    pub fn cache_control(&self) -> Option<&'static str> {
        match self {
            CachePolicy::Default => None,
            CachePolicy::NoCache => Some("no-cache"),
            CachePolicy::NoStore => Some("no-store"),
            CachePolicy::ReturnCacheElseLoad => Some("max-stale"),
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `Descriptor::build`. `url` is always absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub cache: CachePolicy,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Append a header. Existing headers with the same name are kept.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }
}

/// An HTTP response described as plain data.
///
/// Produced by a `Transport` and consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether `status` is a real HTTP status code.
    pub fn has_valid_status(&self) -> bool {
        (100..=599).contains(&self.status)
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
