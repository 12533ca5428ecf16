//! Declarative HTTP requests and a dispatcher that executes them.
//!
//! # Overview
//! A `Descriptor` describes one call as data: URL pieces, method, query
//! items, headers, an optional body, and which status codes mean success or
//! a typed server error. A `Dispatcher` builds the wire request, sends it
//! once through a `Transport`, and turns the response into either a decoded
//! value or a `DispatchError`.
//!
//! # Design
//! - Body, response and error shapes are type parameters of `Descriptor`,
//!   so a mismatch between what is declared and what is decoded is a
//!   compile error.
//! - `Transport` is the only I/O seam. `UreqTransport` is the default;
//!   tests substitute an in-memory one.
//! - No retries, caching or timeouts beyond what the transport does.
//! - `AuthenticatedDispatcher` adds a token header and picks up rotated
//!   tokens from responses, guarded by an async lock.

pub mod auth;
pub mod codec;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod transport;

#[cfg(test)]
mod testing;

pub use auth::{AuthenticatedDispatcher, DEFAULT_AUTH_HEADER};
pub use codec::{DateStrategy, JsonCodec};
pub use descriptor::{Descriptor, NoBody};
pub use dispatcher::{Dispatcher, RawResponse, Response};
pub use error::{DispatchError, TransportError};
pub use http::{CachePolicy, HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, TransportConfig, UreqTransport};
