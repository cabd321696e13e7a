use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::header::HeaderValue;
use reqwest::{Client as ReqwestClient, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sonic_rs::{from_slice, to_vec};
use thiserror::Error;

pub type RestBytes = Bytes;
pub type RestFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
pub type RestResult<T> = Result<T, RestError>;

pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestErrorKind {
    Connect,
    Send,
    Receive,
    Timeout,
    Rejected,
    Parse,
    Internal,
}

#[derive(Clone, Debug, Error)]
#[error("rest error {kind:?} status={status:?} retryable={retryable} {message}")]
pub struct RestError {
    pub kind: RestErrorKind,
    pub status: Option<u16>,
    pub message: String,
    pub retryable: bool,
}

impl RestError {
    pub fn new(
        kind: RestErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            retryable,
        }
    }

    pub fn connect(message: impl Into<String>, status: Option<u16>, retryable: bool) -> Self {
        Self::new(RestErrorKind::Connect, status, message, retryable)
    }

    pub fn send(message: impl Into<String>, status: Option<u16>, retryable: bool) -> Self {
        Self::new(RestErrorKind::Send, status, message, retryable)
    }

    pub fn receive(message: impl Into<String>, status: Option<u16>, retryable: bool) -> Self {
        Self::new(RestErrorKind::Receive, status, message, retryable)
    }

    pub fn timeout(message: impl Into<String>, status: Option<u16>, retryable: bool) -> Self {
        Self::new(RestErrorKind::Timeout, status, message, retryable)
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        let retryable = status >= 500 || status == 429;
        Self::new(RestErrorKind::Rejected, Some(status), message, retryable)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RestErrorKind::Internal, None, message, false)
    }

    /// Maps a reqwest failure, preferring the timeout/connect classification
    /// reqwest reports over the phase the failure happened in.
    fn from_reqwest(phase: RestErrorKind, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            RestErrorKind::Timeout
        } else if err.is_connect() {
            RestErrorKind::Connect
        } else {
            phase
        };
        let status = err.status().map(|s| s.as_u16());
        let retryable = err.is_timeout() || err.is_connect() || err.is_request();
        Self::new(kind, status, err.to_string(), retryable)
    }

    pub fn kind(&self) -> RestErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// True when the request never produced a complete HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            RestErrorKind::Connect
                | RestErrorKind::Send
                | RestErrorKind::Receive
                | RestErrorKind::Timeout
        )
    }
}

impl From<sonic_rs::Error> for RestError {
    fn from(err: sonic_rs::Error) -> Self {
        Self::new(RestErrorKind::Parse, None, err.to_string(), false)
    }
}

#[derive(Clone, Debug)]
pub struct RestRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, RestBytes)>,
    pub body: Option<RestBytes>,
    pub timeout: Option<Duration>,
}

impl RestRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<RestBytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `payload` as the body and sets the JSON content type.
    pub fn with_json<T: Serialize>(self, payload: &T) -> RestResult<Self> {
        let body = to_vec(payload)?;
        Ok(self
            .with_header(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE)
            .with_body(body))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_optional_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// First value of the header `key`, compared case-insensitively.
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_ref())
    }
}

#[derive(Clone, Debug)]
pub struct RestResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
    pub elapsed: Duration,
}

impl RestResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> RestResult<T> {
        Ok(from_slice(&self.body)?)
    }

    /// Turns a non-2xx response into a `Rejected` error carrying the body text.
    pub fn error_for_status(self) -> RestResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let text = String::from_utf8_lossy(&self.body).into_owned();
        Err(RestError::rejected(self.status, text))
    }
}

pub trait RestTransport: Send + Sync {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>>;
}

pub type SharedRestTransport = dyn RestTransport + Send + Sync;

#[derive(Clone)]
pub struct Client {
    transport: Arc<SharedRestTransport>,
}

impl Client {
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    pub fn with_transport<T>(transport: T) -> Self
    where
        T: RestTransport + 'static,
    {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub async fn execute(&self, request: RestRequest) -> RestResult<RestResponse> {
        self.transport.execute(request).await
    }

    /// Decodes the body whatever the status code.
    pub async fn execute_json<T>(&self, request: RestRequest) -> RestResult<T>
    where
        T: DeserializeOwned,
    {
        self.execute(request).await?.json::<T>()
    }

    pub async fn execute_json_checked<T>(&self, request: RestRequest) -> RestResult<T>
    where
        T: DeserializeOwned,
    {
        self.execute(request).await?.error_for_status()?.json::<T>()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: ReqwestClient::new(),
        }
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RestTransport for ReqwestTransport {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let client = self.client.clone();
        Box::pin(async move {
            let start = Instant::now();
            let mut req = client.request(request.method.clone(), &request.url);

            for (key, value) in request.headers {
                let value = HeaderValue::from_bytes(value.as_ref())
                    .map_err(|err| RestError::internal(format!("invalid header {key}: {err}")))?;
                req = req.header(key, value);
            }

            if let Some(body) = request.body {
                req = req.body(body);
            }

            if let Some(timeout) = request.timeout {
                req = req.timeout(timeout);
            }

            tracing::debug!(method = %request.method, url = %request.url, "sending request");

            let resp = req
                .send()
                .await
                .map_err(|err| RestError::from_reqwest(RestErrorKind::Send, err))?;

            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), Bytes::copy_from_slice(value.as_ref())))
                .collect();
            let body = resp
                .bytes()
                .await
                .map_err(|err| RestError::from_reqwest(RestErrorKind::Receive, err))?;
            let elapsed = start.elapsed();

            tracing::debug!(
                url = %request.url,
                status,
                bytes = body.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "received response"
            );

            Ok(RestResponse {
                status,
                headers,
                body,
                elapsed,
            })
        })
    }
}
