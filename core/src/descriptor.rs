//! Declarative description of one HTTP call.
//!
//! # Design
//! `Descriptor<B, R, E>` carries the request body type `B`, the success body
//! type `R` and the error body type `E` as type parameters, so the compiler
//! checks that a call site decodes what it declared. A descriptor never
//! performs I/O: `build` turns it into an `HttpRequest` and the dispatcher
//! does the rest.
//!
//! Query parameters and headers are ordered lists. Declared query items are
//! appended after any already present in `path`, and headers with the same
//! name are all sent, in the order they were added.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use url::Url;

use crate::codec::JsonCodec;
use crate::error::DispatchError;
use crate::http::{CachePolicy, HttpMethod, HttpRequest};

/// Body type for descriptors that send no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoBody;

/// One outbound HTTP call, described as data.
///
/// Defaults decode both the success and the error body as untyped JSON;
/// use `response::<T>()` and `error::<T>()` to declare concrete shapes.
pub struct Descriptor<B = NoBody, R = serde_json::Value, E = serde_json::Value> {
    method: HttpMethod,
    base_path: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    cache: CachePolicy,
    body: Option<B>,
    success_codes: Vec<u16>,
    failure_codes: Vec<u16>,
    _shape: PhantomData<fn() -> (R, E)>,
}

// `R` and `E` are only markers, so cloning and printing depend on `B` alone.
impl<B: Clone, R, E> Clone for Descriptor<B, R, E> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            base_path: self.base_path.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            cache: self.cache,
            body: self.body.clone(),
            success_codes: self.success_codes.clone(),
            failure_codes: self.failure_codes.clone(),
            _shape: PhantomData,
        }
    }
}

impl<B: fmt::Debug, R, E> fmt::Debug for Descriptor<B, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("method", &self.method)
            .field("base_path", &self.base_path)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("cache", &self.cache)
            .field("body", &self.body)
            .field("success_codes", &self.success_codes)
            .field("failure_codes", &self.failure_codes)
            .finish()
    }
}

impl Descriptor {
    pub fn new(method: HttpMethod, base_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            base_path: base_path.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            cache: CachePolicy::Default,
            body: None,
            success_codes: vec![200],
            failure_codes: Vec::new(),
            _shape: PhantomData,
        }
    }

    pub fn get(base_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, base_path, path)
    }

    pub fn post(base_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, base_path, path)
    }

    pub fn put(base_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, base_path, path)
    }

    pub fn patch(base_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, base_path, path)
    }

    pub fn delete(base_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, base_path, path)
    }
}

impl<B, R, E> Descriptor<B, R, E> {
    /// Attach a request body, replacing the body type.
    pub fn body<B2>(self, body: B2) -> Descriptor<B2, R, E> {
        Descriptor {
            method: self.method,
            base_path: self.base_path,
            path: self.path,
            query: self.query,
            headers: self.headers,
            cache: self.cache,
            body: Some(body),
            success_codes: self.success_codes,
            failure_codes: self.failure_codes,
            _shape: PhantomData,
        }
    }

    /// Declare the type the success body decodes into.
    pub fn response<R2>(self) -> Descriptor<B, R2, E> {
        Descriptor {
            method: self.method,
            base_path: self.base_path,
            path: self.path,
            query: self.query,
            headers: self.headers,
            cache: self.cache,
            body: self.body,
            success_codes: self.success_codes,
            failure_codes: self.failure_codes,
            _shape: PhantomData,
        }
    }

    /// Declare the type a failure-status body decodes into.
    pub fn error<E2>(self) -> Descriptor<B, R, E2> {
        Descriptor {
            method: self.method,
            base_path: self.base_path,
            path: self.path,
            query: self.query,
            headers: self.headers,
            cache: self.cache,
            body: self.body,
            success_codes: self.success_codes,
            failure_codes: self.failure_codes,
            _shape: PhantomData,
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a header. A header already present under the same name is kept.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers_mut(&mut self) -> &mut Vec<(String, String)> {
        &mut self.headers
    }

    pub fn cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn success_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.success_codes = codes.into_iter().collect();
        self
    }

    pub fn failure_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.failure_codes = codes.into_iter().collect();
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn is_success(&self, status: u16) -> bool {
        self.success_codes.contains(&status)
    }

    pub fn is_failure(&self, status: u16) -> bool {
        self.failure_codes.contains(&status)
    }

    /// Combine `base_path` and `path` and append the declared query items.
    pub fn url(&self) -> Result<Url, DispatchError<E>> {
        let raw = format!("{}{}", self.base_path, self.path);
        let mut url = Url::parse(&raw).map_err(|e| DispatchError::UrlComposition {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(DispatchError::UrlComposition {
                url: raw,
                reason: "not a hierarchical URL".to_string(),
            });
        }
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Produce the transport request. Performs no I/O.
    pub fn build(&self, codec: &JsonCodec) -> Result<HttpRequest, DispatchError<E>>
    where
        B: Serialize,
    {
        let url = self.url()?;
        let mut request = HttpRequest {
            method: self.method,
            url: url.into(),
            headers: self.headers.clone(),
            cache: self.cache,
            body: None,
        };

        if let Some(body) = &self.body {
            let bytes = codec.encode(body).map_err(DispatchError::Encoding)?;
            if request.header("content-type").is_none() {
                request.add_header("Content-Type", codec.content_type());
            }
            request.body = Some(bytes);
        }

        Ok(request)
    }
}
