use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{get, post};
use item_restapi::{ApiConfig, ItemsClient, ReqwestTransport, RestErrorKind, Value};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

const API_KEY: &str = "e2e-api-key";

#[derive(Debug, Deserialize, PartialEq)]
struct Echo {
    value: i64,
    date: String,
}

#[derive(Debug, Clone)]
struct SeenRequest {
    path: String,
    api_key: Option<String>,
    content_type: Option<String>,
}

#[derive(Clone, Default)]
struct AppState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

#[tokio::test]
async fn e2e_update_item_echoes_payload() {
    let server = TestServer::start().await;
    let client = server.client();

    let echoed: Echo = client
        .update_item_as("Pika", 4500, "2025-01-22")
        .await
        .expect("echo server should answer");
    assert_eq!(
        echoed,
        Echo {
            value: 4500,
            date: "2025-01-22".to_string()
        }
    );

    let seen = server.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/api/items/Pika/update");
    assert_eq!(seen[0].api_key.as_deref(), Some(API_KEY));
    assert_eq!(seen[0].content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn e2e_error_status_body_is_returned() {
    let server = TestServer::start().await;
    let client = server.client();

    let result = client
        .update_item("Missing", 1, "2025-01-22")
        .await
        .expect("500 should not raise");
    let expected: Value = sonic_rs::from_str(r#"{"error":"not found"}"#).unwrap();
    assert_eq!(result, expected);

    let err = client
        .update_item_checked("Missing", 1, "2025-01-22")
        .await
        .expect_err("checked update should reject 500");
    match err {
        item_restapi::ItemsError::Rest(err) => {
            assert_eq!(err.kind(), RestErrorKind::Rejected);
            assert_eq!(err.status(), Some(500));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn e2e_catalog_roundtrip() {
    let server = TestServer::start().await;
    let client = server.client();

    let catalog = client.catalog().await.expect("catalog should decode");
    let names: Vec<&str> = catalog
        .sorted_by_value()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["Pika", "Mera"]);
}

#[tokio::test]
async fn e2e_connection_refused_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = client_for(&format!("http://{addr}/api"), None);
    let err = client
        .update_item("Pika", 4500, "2025-01-22")
        .await
        .expect_err("nothing is listening");
    let err = expect_rest(err);
    assert_eq!(err.kind(), RestErrorKind::Connect);
    assert!(err.is_transport());
}

#[tokio::test]
async fn e2e_closed_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let task = tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            drop(socket);
        }
    });

    let client = client_for(&format!("http://{addr}/api"), None);
    let err = client
        .update_item("Pika", 4500, "2025-01-22")
        .await
        .expect_err("server hangs up without a response");
    let err = expect_rest(err);
    assert!(err.is_transport(), "expected transport error, got {err}");

    task.abort();
}

#[tokio::test]
async fn e2e_silent_server_hits_configured_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = client_for(
        &format!("http://{addr}/api"),
        Some(Duration::from_millis(200)),
    );
    let err = client
        .update_item("Pika", 4500, "2025-01-22")
        .await
        .expect_err("configured timeout should trigger");
    let err = expect_rest(err);
    assert_eq!(err.kind(), RestErrorKind::Timeout);

    task.abort();
}

fn expect_rest(err: item_restapi::ItemsError) -> item_restapi::RestError {
    match err {
        item_restapi::ItemsError::Rest(err) => err,
        other => panic!("expected rest error, got {other:?}"),
    }
}

fn client_for(base_url: &str, timeout: Option<Duration>) -> ItemsClient {
    let config = ApiConfig::new(base_url, API_KEY)
        .expect("test config should be valid")
        .with_optional_timeout(timeout);
    let transport = ReqwestTransport::with_client(
        reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("reqwest client should build"),
    );
    ItemsClient::with_transport(config, transport)
}

struct TestServer {
    base_url: String,
    state: AppState,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let state = AppState::default();
        let app = Router::new()
            .route("/api/items", get(catalog_handler))
            .route("/api/items/{name}/update", post(update_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}/api", addr);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url,
            state,
            task,
        }
    }

    fn client(&self) -> ItemsClient {
        client_for(&self.base_url, Some(Duration::from_secs(5)))
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().expect("seen lock").clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn update_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    state.seen.lock().expect("seen lock").push(SeenRequest {
        path: uri.path().to_string(),
        api_key: header(&headers, "x-api-key"),
        content_type: header(&headers, "content-type"),
    });

    if name == "Missing" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Bytes::from_static(br#"{"error":"not found"}"#),
        );
    }
    (StatusCode::OK, body)
}

async fn catalog_handler() -> (StatusCode, &'static str) {
    (
        StatusCode::OK,
        r#"{"items":{"Mera":{"rarity":"Legendary","current_value":3200,"history":[]},"Pika":{"rarity":"Mythical","current_value":4800,"history":[]}}}"#,
    )
}
