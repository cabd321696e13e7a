//! In-memory transport that records every outbound request and answers from
//! queued responses, so item operations can be tested without a server.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use sonic_rs::to_vec;

use super::adapter::{
    RestBytes, RestError, RestErrorKind, RestFuture, RestRequest, RestResponse, RestResult,
    RestTransport,
};

#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    /// Answer from the response queues.
    #[default]
    Pass,
    /// Answer with the request body as a 200 JSON response.
    Echo,
    ConnectError {
        reason: String,
    },
    ReceiveError {
        reason: String,
    },
    TimeoutError {
        reason: String,
    },
    /// Connection closed before any response bytes arrived.
    Drop,
}

impl MockBehavior {
    pub fn echo() -> Self {
        Self::Echo
    }

    pub fn connect_error(reason: impl Into<String>) -> Self {
        Self::ConnectError {
            reason: reason.into(),
        }
    }

    pub fn receive_error(reason: impl Into<String>) -> Self {
        Self::ReceiveError {
            reason: reason.into(),
        }
    }

    pub fn timeout_error(reason: impl Into<String>) -> Self {
        Self::TimeoutError {
            reason: reason.into(),
        }
    }

    pub fn drop_response() -> Self {
        Self::Drop
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<RestBytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
    }

    pub fn json<T: Serialize>(status: u16, payload: &T) -> RestResult<Self> {
        let body = to_vec(payload)?;
        Ok(Self::new(status, body).with_header("content-type", "application/json"))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockRestStateSnapshot {
    pub request_count: usize,
    pub last_url: Option<String>,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
    pub behavior_remaining: usize,
    pub response_queue_len: usize,
}

#[derive(Debug, Default)]
struct MockRestAdapterState {
    request_count: usize,
    last_url: Option<String>,
    last_status: Option<u16>,
    last_error: Option<String>,
    behaviors: VecDeque<MockBehavior>,
    default_response_queue: VecDeque<MockResponse>,
    route_response_queues: HashMap<(Method, String), VecDeque<MockResponse>>,
    outbound_log: Vec<RestRequest>,
}

impl MockRestAdapterState {
    fn snapshot(&self) -> MockRestStateSnapshot {
        MockRestStateSnapshot {
            request_count: self.request_count,
            last_url: self.last_url.clone(),
            last_status: self.last_status,
            last_error: self.last_error.clone(),
            behavior_remaining: self.behaviors.len(),
            response_queue_len: self.default_response_queue.len()
                + self
                    .route_response_queues
                    .values()
                    .map(VecDeque::len)
                    .sum::<usize>(),
        }
    }

    fn next_response(&mut self, request: &RestRequest) -> Option<MockResponse> {
        let route_key = (request.method.clone(), request.url.clone());
        if let Some(response) = self
            .route_response_queues
            .get_mut(&route_key)
            .and_then(VecDeque::pop_front)
        {
            return Some(response);
        }
        self.default_response_queue.pop_front()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockRestAdapter {
    state: Arc<Mutex<MockRestAdapterState>>,
}

impl MockRestAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behaviors(behaviors: impl IntoIterator<Item = MockBehavior>) -> Self {
        let adapter = Self::new();
        adapter.lock().behaviors.extend(behaviors);
        adapter
    }

    pub fn echo() -> Self {
        Self::with_behaviors([MockBehavior::Echo])
    }

    fn lock(&self) -> MutexGuard<'_, MockRestAdapterState> {
        // A panicking test thread must not hide the recorded requests.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_behavior(&self, behavior: MockBehavior) {
        self.lock().behaviors.push_back(behavior);
    }

    pub fn snapshot(&self) -> MockRestStateSnapshot {
        self.lock().snapshot()
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.lock().default_response_queue.push_back(response);
    }

    pub fn queue_response_for(
        &self,
        method: Method,
        url: impl Into<String>,
        response: MockResponse,
    ) {
        self.lock()
            .route_response_queues
            .entry((method, url.into()))
            .or_default()
            .push_back(response);
    }

    pub fn queue_post_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::POST, url, response);
    }

    pub fn queue_get_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::GET, url, response);
    }

    pub fn queue_json<T: Serialize>(&self, status: u16, payload: &T) -> RestResult<()> {
        self.queue_response(MockResponse::json(status, payload)?);
        Ok(())
    }

    pub fn outbound_count(&self) -> usize {
        self.lock().outbound_log.len()
    }

    pub fn outbound_requests(&self) -> Vec<RestRequest> {
        self.lock().outbound_log.clone()
    }

    pub fn last_request(&self) -> Option<RestRequest> {
        self.lock().outbound_log.last().cloned()
    }

    pub fn clear_logs(&self) {
        self.lock().outbound_log.clear();
    }

    fn fail(&self, kind: RestErrorKind, reason: String) -> RestError {
        let error = match kind {
            RestErrorKind::Connect => RestError::connect(reason.clone(), None, true),
            RestErrorKind::Receive => RestError::receive(reason.clone(), None, false),
            RestErrorKind::Timeout => RestError::timeout(reason.clone(), None, true),
            _ => RestError::internal(reason.clone()),
        };
        let mut state = self.lock();
        state.last_error = Some(reason);
        state.last_status = None;
        error
    }

    fn respond(&self, request: &RestRequest, behavior: MockBehavior) -> RestResult<RestResponse> {
        let start = Instant::now();
        let response = match behavior {
            MockBehavior::Drop => {
                return Err(self.fail(
                    RestErrorKind::Receive,
                    "mock transport closed connection before response".to_string(),
                ));
            }
            MockBehavior::ConnectError { reason } => {
                return Err(self.fail(RestErrorKind::Connect, reason));
            }
            MockBehavior::ReceiveError { reason } => {
                return Err(self.fail(RestErrorKind::Receive, reason));
            }
            MockBehavior::TimeoutError { reason } => {
                return Err(self.fail(RestErrorKind::Timeout, reason));
            }
            MockBehavior::Echo => MockResponse::new(200, request.body.clone().unwrap_or_default())
                .with_header("content-type", "application/json"),
            // Empty 200 when nothing is queued, like a server with no body.
            MockBehavior::Pass => self
                .lock()
                .next_response(request)
                .unwrap_or_else(|| MockResponse::new(200, Bytes::new())),
        };

        let response = RestResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
            elapsed: start.elapsed(),
        };
        self.lock().last_status = Some(response.status);
        Ok(response)
    }
}

impl RestTransport for MockRestAdapter {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let adapter = self.clone();
        Box::pin(async move {
            let behavior = {
                let mut state = adapter.lock();
                state.request_count += 1;
                state.last_url = Some(request.url.clone());
                state.last_error = None;
                state.outbound_log.push(request.clone());
                state.behaviors.pop_front().unwrap_or_default()
            };
            adapter.respond(&request, behavior)
        })
    }
}
