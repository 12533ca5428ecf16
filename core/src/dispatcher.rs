//! Executes descriptors against a transport and classifies the result.
//!
//! # Design
//! One dispatch is one transport call: build the request (no I/O on
//! failure), send it once, reject responses without a real status code, then
//! branch on the descriptor's status sets. The failure set is checked first,
//! so a code declared in both sets decodes as an error.
//!
//! The three public entry points share every step and differ only in what
//! they do with a successful body: decode it, drop it, or hand it back raw.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, field, instrument, warn, Span};

use crate::codec::JsonCodec;
use crate::descriptor::Descriptor;
use crate::error::{DispatchError, TransportError};
use crate::http::{find_header, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};

/// A successful dispatch: decoded body plus status and response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<R> {
    pub body: R,
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

/// A successful dispatch whose body was left undecoded.
pub type RawResponse = Response<Vec<u8>>;

impl<R> Response<R> {
    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn into_body(self) -> R {
        self.body
    }
}

/// Stateless executor for `Descriptor`s.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher<T = UreqTransport> {
    transport: T,
    codec: JsonCodec,
}

impl Dispatcher {
    /// Dispatcher over the process-wide shared ureq agent.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            codec: JsonCodec::default(),
        }
    }

    /// Replace the codec. Bodies go through serde either way, so the codec's
    /// `DateStrategy` does not change how request or response bodies are
    /// encoded; it only applies to `codec().format_date` and `parse_date`.
    pub fn with_codec(mut self, codec: JsonCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatch and decode the success body as `R`.
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
        let request = self.prepare(descriptor)?;
        let response = self.send(request).await?;
        let response = self.accept(descriptor, response)?;
        self.decode(response)
    }

    /// Dispatch for callers that only care whether the call succeeded.
    #[instrument(level = "debug", skip_all, fields(method = %descriptor.method(), url = field::Empty))]
    pub async fn dispatch_unit<B, R, E>(
        &self,
        descriptor: &Descriptor<B, R, E>,
    ) -> Result<(), DispatchError<E>>
    where
        B: Serialize,
        E: DeserializeOwned,
    {
        let request = self.prepare(descriptor)?;
        let response = self.send(request).await?;
        self.accept(descriptor, response)?;
        Ok(())
    }

    /// Dispatch and return the success body as raw bytes.
    #[instrument(level = "debug", skip_all, fields(method = %descriptor.method(), url = field::Empty))]
    pub async fn dispatch_raw<B, R, E>(
        &self,
        descriptor: &Descriptor<B, R, E>,
    ) -> Result<RawResponse, DispatchError<E>>
    where
        B: Serialize,
        E: DeserializeOwned,
    {
        let request = self.prepare(descriptor)?;
        let response = self.send(request).await?;
        Ok(into_raw(self.accept(descriptor, response)?))
    }

    /// One transport call, with no status interpretation.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let result = self.transport.send(request).await;
        if let Err(err) = &result {
            debug!(error = %err, "transport failed");
        }
        result
    }

    pub(crate) fn prepare<B, R, E>(
        &self,
        descriptor: &Descriptor<B, R, E>,
    ) -> Result<HttpRequest, DispatchError<E>>
    where
        B: Serialize,
    {
        let request = descriptor.build(&self.codec)?;
        Span::current().record("url", request.url.as_str());
        Ok(request)
    }

    /// Validate the response and apply the descriptor's status sets.
    /// Returns the response untouched when its status is a declared success.
    pub(crate) fn accept<B, R, E>(
        &self,
        descriptor: &Descriptor<B, R, E>,
        response: HttpResponse,
    ) -> Result<HttpResponse, DispatchError<E>>
    where
        E: DeserializeOwned,
    {
        let status = response.status;
        if !response.has_valid_status() {
            warn!(status, "response has no valid status code");
            return Err(DispatchError::InvalidResponse { status });
        }

        if descriptor.is_failure(status) {
            debug!(status, "declared failure status");
            let error = self
                .codec
                .decode::<E>(&response.body)
                .map_err(|source| DispatchError::Decoding { status, source })?;
            return Err(DispatchError::Api { status, error });
        }

        if descriptor.is_success(status) {
            debug!(status, "declared success status");
            return Ok(response);
        }

        warn!(status, "status code in neither success nor failure set");
        Err(DispatchError::UnhandledStatusCode {
            status,
            body: response.body,
        })
    }

    pub(crate) fn decode<R, E>(&self, response: HttpResponse) -> Result<Response<R>, DispatchError<E>>
    where
        R: DeserializeOwned,
    {
        let status = response.status;
        let body = self
            .codec
            .decode::<R>(&response.body)
            .map_err(|source| DispatchError::Decoding { status, source })?;
        Ok(Response {
            body,
            status,
            headers: response.headers,
        })
    }
}

pub(crate) fn into_raw(response: HttpResponse) -> RawResponse {
    Response {
        body: response.body,
        status: response.status,
        headers: response.headers,
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::http::HttpMethod;
    use crate::testing::ScriptedTransport;

    const BASE: &str = "https://api.example.com";

    #[derive(Debug, PartialEq, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ApiFailure {
        error: String,
        error_code: String,
    }

    fn dispatcher(transport: &ScriptedTransport) -> Dispatcher<ScriptedTransport> {
        Dispatcher::with_transport(transport.clone())
    }

    fn user_descriptor() -> Descriptor<crate::NoBody, User, ApiFailure> {
        Descriptor::get(BASE, "/users/42")
            .response::<User>()
            .error::<ApiFailure>()
            .failure_codes([400])
    }

    #[tokio::test]
    async fn success_status_decodes_response() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"id":42,"name":"Ann"}"#);

        let response = dispatcher(&transport)
            .dispatch(&user_descriptor())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            response.body,
            User {
                id: 42,
                name: "Ann".to_string()
            }
        );

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].url, "https://api.example.com/users/42");
    }

    #[tokio::test]
    async fn failure_status_decodes_error_body() {
        let transport = ScriptedTransport::new();
        transport.respond(400, r#"{"error":"bad","errorCode":"E1"}"#);

        let err = dispatcher(&transport)
            .dispatch(&user_descriptor())
            .await
            .unwrap_err();
        match err {
            DispatchError::Api { status, error } => {
                assert_eq!(status, 400);
                assert_eq!(error.error, "bad");
                assert_eq!(error.error_code, "E1");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_error_body_is_a_decoding_error() {
        let transport = ScriptedTransport::new();
        transport.respond(400, "<html>oops</html>");

        let err = dispatcher(&transport)
            .dispatch(&user_descriptor())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Decoding { status: 400, .. }));
    }

    #[tokio::test]
    async fn undeclared_status_is_unhandled() {
        let transport = ScriptedTransport::new();
        transport.respond(404, "{}");

        let err = dispatcher(&transport)
            .dispatch(&user_descriptor())
            .await
            .unwrap_err();
        match err {
            DispatchError::UnhandledStatusCode { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, b"{}");
            }
            other => panic!("expected UnhandledStatusCode, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_success_body_is_a_decoding_error() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"id":"not-a-number"}"#);

        let err = dispatcher(&transport)
            .dispatch(&user_descriptor())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Decoding { status: 200, .. }));
    }

    #[tokio::test]
    async fn failure_set_wins_when_sets_overlap() {
        let transport = ScriptedTransport::new();
        transport.respond(409, r#"{"error":"conflict","errorCode":"E9"}"#);

        let descriptor = user_descriptor()
            .success_codes([200, 409])
            .failure_codes([409]);
        let err = dispatcher(&transport)
            .dispatch(&descriptor)
            .await
            .unwrap_err();
        assert_eq!(err.api_error().map(|e| e.error_code.as_str()), Some("E9"));
    }

    #[tokio::test]
    async fn invalid_status_is_rejected_before_classification() {
        let transport = ScriptedTransport::new();
        transport.respond(0, "");

        let err = dispatcher(&transport)
            .dispatch(&user_descriptor())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidResponse { status: 0 }));
    }

    #[tokio::test]
    async fn transport_failure_is_wrapped() {
        let transport = ScriptedTransport::new();
        transport.fail("connection refused");

        let err = dispatcher(&transport)
            .dispatch(&user_descriptor())
            .await
            .unwrap_err();
        match err {
            DispatchError::Transport(inner) => assert_eq!(inner.to_string(), "connection refused"),
            other => panic!("expected Transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn build_failure_never_reaches_transport() {
        let transport = ScriptedTransport::new();

        let descriptor = Descriptor::get("not a url", "/users");
        let err = dispatcher(&transport)
            .dispatch(&descriptor)
            .await
            .unwrap_err();
        assert!(err.is_build_error());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn unencodable_body_never_reaches_transport() {
        use std::collections::BTreeMap;

        let transport = ScriptedTransport::new();
        transport.respond(200, "{}");

        // JSON object keys must be strings.
        let body: BTreeMap<Vec<u8>, &str> = BTreeMap::from([(vec![1, 2], "x")]);
        let descriptor = Descriptor::post(BASE, "/users").body(body);
        let err = dispatcher(&transport)
            .dispatch(&descriptor)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Encoding(_)), "got {err:?}");
        assert!(err.is_build_error());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn unit_and_raw_dispatch_decode_declared_failures() {
        let transport = ScriptedTransport::new();
        transport.respond(400, r#"{"error":"bad","errorCode":"E1"}"#);
        transport.respond(400, r#"{"error":"bad","errorCode":"E2"}"#);
        let dispatcher = dispatcher(&transport);

        let err = dispatcher
            .dispatch_unit(&user_descriptor())
            .await
            .unwrap_err();
        assert_eq!(err.api_error().map(|e| e.error_code.as_str()), Some("E1"));

        let err = dispatcher
            .dispatch_raw(&user_descriptor())
            .await
            .unwrap_err();
        match err {
            DispatchError::Api { status, error } => {
                assert_eq!(status, 400);
                assert_eq!(error.error_code, "E2");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unit_and_raw_dispatch_reject_undeclared_statuses() {
        let transport = ScriptedTransport::new();
        transport.respond(404, "gone");
        transport.respond(404, "gone");
        let dispatcher = dispatcher(&transport);

        let err = dispatcher
            .dispatch_unit(&user_descriptor())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnhandledStatusCode { status: 404, .. }));

        let err = dispatcher
            .dispatch_raw(&user_descriptor())
            .await
            .unwrap_err();
        match err {
            DispatchError::UnhandledStatusCode { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, b"gone");
            }
            other => panic!("expected UnhandledStatusCode, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unit_dispatch_ignores_success_body() {
        let transport = ScriptedTransport::new();
        transport.respond(204, "");

        let descriptor = Descriptor::delete(BASE, "/users/42").success_codes([204]);
        dispatcher(&transport)
            .dispatch_unit(&descriptor)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn raw_dispatch_returns_bytes_status_and_headers() {
        let transport = ScriptedTransport::new();
        transport.respond_with(HttpResponse {
            status: 201,
            headers: vec![("Location".to_string(), "/users/43".to_string())],
            body: b"not json".to_vec(),
        });

        let descriptor = Descriptor::post(BASE, "/users").success_codes([201]);
        let raw = dispatcher(&transport)
            .dispatch_raw(&descriptor)
            .await
            .unwrap();
        assert_eq!(raw.status, 201);
        assert_eq!(raw.header("location"), Some("/users/43"));
        assert_eq!(raw.body, b"not json");
    }

    #[tokio::test]
    async fn request_body_round_trips_through_transport() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct NewUser {
            name: String,
            tags: Vec<String>,
        }

        let transport = ScriptedTransport::new();
        transport.respond(200, "{}");

        let input = NewUser {
            name: "Ann".to_string(),
            tags: vec!["admin".to_string()],
        };
        let descriptor = Descriptor::post(BASE, "/users").body(input.clone());
        dispatcher(&transport).dispatch(&descriptor).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
        let echoed: NewUser = serde_json::from_slice(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(echoed, input);
    }
}
