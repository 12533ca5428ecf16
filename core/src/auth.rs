//! Dispatcher that carries a rotating auth token.
//!
//! # Design
//! The current token lives behind a `tokio::sync::RwLock`, so concurrent
//! dispatches read it in parallel and token rotation is a single guarded
//! write. Rotation happens as soon as a response arrives, before status
//! classification: a server may hand out a new token on an error response
//! too. There is no retry on 401 and no refresh protocol.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, field, instrument};

use crate::descriptor::Descriptor;
use crate::dispatcher::{into_raw, Dispatcher, RawResponse, Response};
use crate::error::DispatchError;
use crate::http::HttpResponse;
use crate::transport::{Transport, UreqTransport};

/// Header used when none is given.
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

#[derive(Debug)]
pub struct AuthenticatedDispatcher<T = UreqTransport> {
    inner: Dispatcher<T>,
    header_name: String,
    token: RwLock<Option<String>>,
}

impl<T: Transport> AuthenticatedDispatcher<T> {
    /// Wrap `inner`, sending and rotating the token under `header_name`.
    pub fn new(inner: Dispatcher<T>, header_name: impl Into<String>) -> Self {
        Self {
            inner,
            header_name: header_name.into(),
            token: RwLock::new(None),
        }
    }

    /// Start with `token` already held. The value is sent verbatim, so
    /// include any scheme prefix such as `Bearer `.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        *self.token.get_mut() = Some(token.into());
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.inner
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    #[instrument(level = "debug", skip_all, fields(method = %descriptor.method(), url = field::Empty))]
    pub async fn dispatch<B, R, E>(
        &self,
        descriptor: &Descriptor<B, R, E>,
    ) -> Result<Response<R>, DispatchError<E>>
    where
        B: Serialize,
        R: DeserializeOwned,
        E: DeserializeOwned,
    {
        let response = self.exchange(descriptor).await?;
        let response = self.inner.accept(descriptor, response)?;
        self.inner.decode(response)
    }

    #[instrument(level = "debug", skip_all, fields(method = %descriptor.method(), url = field::Empty))]
    pub async fn dispatch_unit<B, R, E>(
        &self,
        descriptor: &Descriptor<B, R, E>,
    ) -> Result<(), DispatchError<E>>
    where
        B: Serialize,
        E: DeserializeOwned,
    {
        let response = self.exchange(descriptor).await?;
        self.inner.accept(descriptor, response)?;
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(method = %descriptor.method(), url = field::Empty))]
    pub async fn dispatch_raw<B, R, E>(
        &self,
        descriptor: &Descriptor<B, R, E>,
    ) -> Result<RawResponse, DispatchError<E>>
    where
        B: Serialize,
        E: DeserializeOwned,
    {
        let response = self.exchange(descriptor).await?;
        Ok(into_raw(self.inner.accept(descriptor, response)?))
    }

    /// Build, attach the token, send, and rotate the token from the response.
    async fn exchange<B, R, E>(
        &self,
        descriptor: &Descriptor<B, R, E>,
    ) -> Result<HttpResponse, DispatchError<E>>
    where
        B: Serialize,
    {
        let mut request = self.inner.prepare(descriptor)?;
        if let Some(token) = self.token().await {
            request.add_header(self.header_name.as_str(), token);
        }

        let response = self.inner.send(request).await?;

        if let Some(rotated) = response.header(&self.header_name) {
            let mut token = self.token.write().await;
            if token.as_deref() != Some(rotated) {
                debug!(header = %self.header_name, "rotating auth token");
                *token = Some(rotated.to_string());
            }
        }
        Ok(response)
    }
}
