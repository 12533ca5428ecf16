//! Error types for request building and dispatch.
//!
//! # Design
//! `DispatchError` is generic over the caller's declared error body `E` so a
//! server error decoded from a failure status comes back as a typed value in
//! `Api`, through the same channel as infrastructure failures. Callers match
//! on the variant to tell the two apart.
//!
//! `TransportError` is kept separate because transports know nothing about
//! descriptors or decoding.

use thiserror::Error;

/// Failure of the underlying HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connectivity, DNS, TLS or protocol failure reported by the HTTP client.
    #[error("request failed: {0}")]
    Request(#[from] ureq::Error),

    /// The request could not be expressed as a wire request
    /// (for example an illegal header name).
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ureq::http::Error),

    /// The in-flight call was cancelled or its worker panicked.
    #[error("request interrupted: {0}")]
    Interrupted(#[from] tokio::task::JoinError),

    /// Error raised by a user-supplied transport.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl TransportError {
    pub fn custom(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        TransportError::Custom(err.into())
    }
}

/// Errors returned by `Descriptor::build` and the dispatchers.
#[derive(Debug, Error)]
pub enum DispatchError<E> {
    /// `base_path + path` did not form a valid absolute URL.
    #[error("cannot compose url `{url}`: {reason}")]
    UrlComposition { url: String, reason: String },

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The transport returned something that is not an HTTP response.
    #[error("invalid response: status {status} is not an HTTP status code")]
    InvalidResponse { status: u16 },

    /// The server answered with a declared failure status and a body that
    /// decoded into the declared error type.
    #[error("api error (HTTP {status}): {error:?}")]
    Api { status: u16, error: E },

    /// The response body did not match the declared response or error type.
    #[error("failed to decode response body (HTTP {status}): {source}")]
    Decoding {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The status code is in neither the success nor the failure set.
    #[error("unhandled status code {status}")]
    UnhandledStatusCode { status: u16, body: Vec<u8> },
}

impl<E> DispatchError<E> {
    /// The HTTP status associated with this error, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::InvalidResponse { status }
            | DispatchError::Api { status, .. }
            | DispatchError::Decoding { status, .. }
            | DispatchError::UnhandledStatusCode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The decoded server error, if this is an `Api` error.
    pub fn api_error(&self) -> Option<&E> {
        match self {
            DispatchError::Api { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Whether the error happened before the transport was contacted.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            DispatchError::UrlComposition { .. } | DispatchError::Encoding(_)
        )
    }
}
