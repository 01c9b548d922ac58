//! End-to-end tests: real listeners, a real backend, files on disk.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use proxymock::{Config, ServiceConfig, ServiceCoordinator, ServiceState};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Backend answering `backend:<path and query>` and echoing the request body in a header.
async fn spawn_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                    let target = req
                        .uri()
                        .path_and_query()
                        .map(|pq| pq.as_str().to_string())
                        .unwrap_or_default();
                    let body = req.into_body().collect().await.unwrap().to_bytes();
                    let response = Response::builder()
                        .status(201)
                        .header("content-type", "text/plain")
                        .header("x-backend", "yes")
                        .header("x-request-length", body.len().to_string())
                        .body(Full::new(Bytes::from(format!("backend:{target}"))))
                        .unwrap();
                    Ok::<_, Infallible>(response)
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

struct Harness {
    mocks: TempDir,
    logs: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            mocks: TempDir::new().unwrap(),
            logs: TempDir::new().unwrap(),
        }
    }

    fn write_mock(&self, file: &str, contents: &str) {
        std::fs::write(self.mocks.path().join(file), contents).unwrap();
    }

    fn config(&self, services: Vec<ServiceConfig>) -> Config {
        let mut config = Config::with_services(services);
        config.listen_host = "127.0.0.1".to_string();
        config.mock_directory = self.mocks.path().to_path_buf();
        config.log_directory = self.logs.path().to_path_buf();
        config.tls_skip_verify = true;
        config.bind_retry_delay_ms = 20;
        config.shutdown_grace_secs = 1;
        config
    }

    fn captures(&self, service: &str) -> Vec<std::path::PathBuf> {
        let dir = self.logs.path().join(service);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut files: Vec<_> = entries.map(|e| e.unwrap().path()).collect();
        files.sort();
        files
    }
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

const USER_MOCK: &str = r#"{
  "Requests": [
    {
      "endpoint": "/users",
      "mockparams": { "call": "GetUser" },
      "response": {
        "headers": { "Content-Type": "text/json", "X-Mock-Source": "users" },
        "status-code": 200,
        "body": "{\"greeting\": \"Hello {name}\"}"
      }
    }
  ],
  "variables_for_response_body": { "name": "World" }
}"#;

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_mock_hit_is_served_without_backend() {
    let harness = Harness::new();
    harness.write_mock("json.json", USER_MOCK);

    // Nothing listens on the backend address
    let coordinator = ServiceCoordinator::new(harness.config(vec![
        ServiceConfig::new("json", "http://127.0.0.1:9").with_port(0),
    ]))
    .unwrap();
    assert_eq!(coordinator.start().await.unwrap(), 1);
    let addr = coordinator.address_of("json").unwrap();

    let response = reqwest::Client::new()
        .post(url(addr, "/users"))
        .body(r#"{"call": "GetUser", "id": 7}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/json; charset=utf-8"
    );
    assert_eq!(response.headers()["x-mock-source"], "users");
    assert_eq!(response.headers()["x-proxymock-mocked"], "true");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["greeting"], "Hello World");

    assert!(harness.captures("json").is_empty());
    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_miss_is_forwarded_and_captured() {
    let harness = Harness::new();
    harness.write_mock("json.json", USER_MOCK);
    let backend = spawn_backend().await;

    let coordinator = ServiceCoordinator::new(harness.config(vec![
        ServiceConfig::new("json", format!("http://{backend}/")).with_port(0),
    ]))
    .unwrap();
    coordinator.start().await.unwrap();
    let addr = coordinator.address_of("json").unwrap();

    let response = reqwest::Client::new()
        .post(url(addr, "/orders?id=3"))
        .header("postman-token", "abc")
        .header("x-trace", "t-1")
        .body(r#"{"call": "ListOrders"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(response.headers()["x-backend"], "yes");
    assert!(response.headers().get("x-proxymock-mocked").is_none());
    assert_eq!(response.text().await.unwrap(), "backend:/orders?id=3");

    let captures = harness.captures("json");
    assert_eq!(captures.len(), 1);
    assert!(file_name(&captures[0]).starts_with("ListOrders_"));

    let captured: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&captures[0]).unwrap()).unwrap();
    assert_eq!(captured["Endpoint"], format!("http://{backend}/orders?id=3"));
    assert_eq!(captured["Body"], r#"{"call": "ListOrders"}"#);
    assert_eq!(captured["Headers"]["x-trace"], "t-1");
    assert!(captured["Headers"].get("postman-token").is_none());
    assert!(captured["Headers"].get("host").is_none());
    assert_eq!(captured["Response"]["StatusCode"], 201);
    assert_eq!(captured["Response"]["Body"], "backend:/orders?id=3");
    assert_eq!(captured["Response"]["Headers"]["x-backend"], "yes");

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_unmatched_params_are_forwarded() {
    let harness = Harness::new();
    harness.write_mock("json.json", USER_MOCK);
    let backend = spawn_backend().await;

    let coordinator = ServiceCoordinator::new(harness.config(vec![
        ServiceConfig::new("json", format!("http://{backend}")).with_port(0),
    ]))
    .unwrap();
    coordinator.start().await.unwrap();
    let addr = coordinator.address_of("json").unwrap();

    let response = reqwest::Client::new()
        .post(url(addr, "/users"))
        .body("<request><call>DeleteUser</call></request>")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(response.text().await.unwrap(), "backend:/users");
    let captures = harness.captures("json");
    assert_eq!(captures.len(), 1);
    assert!(file_name(&captures[0]).starts_with("DeleteUser_"));

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_backend_answers_bad_gateway() {
    let harness = Harness::new();
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let coordinator = ServiceCoordinator::new(harness.config(vec![
        ServiceConfig::new("json", format!("http://{closed}")).with_port(0),
    ]))
    .unwrap();
    coordinator.start().await.unwrap();
    let addr = coordinator.address_of("json").unwrap();

    let response = reqwest::get(url(addr, "/anything")).await.unwrap();
    assert_eq!(response.status(), 502);
    assert_eq!(response.headers()["x-proxymock-backend-error"], "true");
    assert!(harness.captures("json").is_empty());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_services_use_their_own_catalogs() {
    let harness = Harness::new();
    harness.write_mock(
        "json.json",
        r#"{"Requests": [{"endpoint": "/ping", "response": {"body": "json-pong"}}]}"#,
    );
    harness.write_mock(
        "xml.json",
        r#"{"Requests": [{"endpoint": "/ping", "response": {"body": "<pong/>",
            "headers": {"Content-Type": "application/xml"}}}]}"#,
    );
    let backend = spawn_backend().await;

    let coordinator = ServiceCoordinator::new(harness.config(vec![
        ServiceConfig::new("json", format!("http://{backend}")).with_port(0),
        ServiceConfig::new("xml", format!("http://{backend}")).with_port(0),
        ServiceConfig::new("plain", format!("http://{backend}")).with_port(0),
    ]))
    .unwrap();
    assert_eq!(coordinator.start().await.unwrap(), 3);

    let json = reqwest::get(url(coordinator.address_of("json").unwrap(), "/ping"))
        .await
        .unwrap();
    assert_eq!(json.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(json.text().await.unwrap(), "json-pong");

    let xml = reqwest::get(url(coordinator.address_of("xml").unwrap(), "/ping"))
        .await
        .unwrap();
    assert_eq!(xml.headers()["content-type"], "application/xml");
    assert_eq!(xml.text().await.unwrap(), "<pong/>");

    let plain = reqwest::get(url(coordinator.address_of("plain").unwrap(), "/ping"))
        .await
        .unwrap();
    assert_eq!(plain.status(), 201);
    assert_eq!(harness.captures("plain").len(), 1);
    assert!(harness.captures("json").is_empty());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_mock_file_changes_apply_without_restart() {
    let harness = Harness::new();
    harness.write_mock(
        "json.json",
        r#"{"Requests": [{"endpoint": "/v", "response": {"body": "one"}}]}"#,
    );
    let backend = spawn_backend().await;

    let coordinator = ServiceCoordinator::new(harness.config(vec![
        ServiceConfig::new("json", format!("http://{backend}")).with_port(0),
    ]))
    .unwrap();
    coordinator.start().await.unwrap();
    let addr = coordinator.address_of("json").unwrap();
    let client = reqwest::Client::new();

    let first = client.get(url(addr, "/v")).send().await.unwrap();
    assert_eq!(first.text().await.unwrap(), "one");

    harness.write_mock(
        "json_extra.json",
        r#"{"Requests": [{"endpoint": "/w", "response": {"body": "two"}}]}"#,
    );
    let second = client.get(url(addr, "/w")).send().await.unwrap();
    assert_eq!(second.text().await.unwrap(), "two");

    std::fs::remove_file(harness.mocks.path().join("json.json")).unwrap();
    let third = client.get(url(addr, "/v")).send().await.unwrap();
    assert_eq!(third.status(), 201);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_port_conflict_only_fails_that_service() {
    let harness = Harness::new();
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken = blocker.local_addr().unwrap().port();

    let mut config = harness.config(vec![
        ServiceConfig::new("blocked", "http://127.0.0.1:9").with_port(taken),
        ServiceConfig::new("free", "http://127.0.0.1:9").with_port(0),
    ]);
    config.handler_retry_limit = 1;

    let coordinator = ServiceCoordinator::new(config).unwrap();
    assert_eq!(coordinator.start().await.unwrap(), 1);

    let statuses = coordinator.statuses();
    assert_eq!(statuses[0].name, "blocked");
    assert_eq!(statuses[0].state, ServiceState::Failed);
    assert_eq!(statuses[0].attempts, 2);
    assert!(statuses[0].error.is_some());
    assert_eq!(statuses[1].state, ServiceState::Listening);

    coordinator.shutdown().await;
    assert_eq!(coordinator.statuses()[1].state, ServiceState::Stopped);
    drop(blocker);
}
