//! HTTP server and full lifecycle against a real sqlite store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{routing::get, Router};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use memos::config::Profile;
use memos::http::{Server, ServerError, X_REQUEST_ID};
use memos::lifecycle::{Lifecycle, Outcome, Phase, Services};
use memos::store::{new_db_driver, Store};

mod common;

use common::sqlite_profile;

struct Running {
    server: Arc<Server>,
    store: Arc<Store>,
    scope: CancellationToken,
    task: JoinHandle<Result<(), ServerError>>,
    addr: SocketAddr,
}

async fn open_store(profile: Arc<Profile>) -> Arc<Store> {
    let driver = new_db_driver(&profile).await.unwrap();
    let store = Arc::new(Store::new(driver, profile));
    store.migrate(&CancellationToken::new()).await.unwrap();
    store
}

async fn wait_listening(server: &Server) -> SocketAddr {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(addr) = server.local_addr() {
                return addr;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("server never started listening")
}

async fn start(profile: Profile) -> Running {
    start_with(profile, Duration::from_secs(1), Router::new()).await
}

async fn start_with(profile: Profile, grace_period: Duration, routes: Router) -> Running {
    let profile = Arc::new(profile);
    let store = open_store(Arc::clone(&profile)).await;
    let scope = CancellationToken::new();
    let server = Arc::new(
        Server::new(&scope, profile, Arc::clone(&store))
            .unwrap()
            .with_grace_period(grace_period)
            .with_routes(routes),
    );

    let task = {
        let server = Arc::clone(&server);
        let scope = scope.clone();
        tokio::spawn(async move { server.start(&scope).await })
    };
    let addr = wait_listening(&server).await;

    Running {
        server,
        store,
        scope,
        task,
        addr,
    }
}

#[tokio::test]
async fn healthz_reports_ready_with_request_id() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(sqlite_profile(dir.path())).await;

    let response = reqwest::get(format!("http://{}/healthz", running.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok(), "{id}");
    assert_eq!(response.text().await.unwrap(), "Service ready.");

    running.server.shutdown(&running.scope).await.unwrap();
}

#[tokio::test]
async fn client_request_id_is_echoed() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(sqlite_profile(dir.path())).await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/healthz", running.addr))
        .header(X_REQUEST_ID, "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()[X_REQUEST_ID], "trace-me");

    running.server.shutdown(&running.scope).await.unwrap();
}

#[tokio::test]
async fn workspace_profile_exposes_public_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut profile = sqlite_profile(dir.path());
    profile.instance_url = "https://memos.example.com".into();
    let running = start(profile).await;

    let body: serde_json::Value = reqwest::get(format!(
        "http://{}/api/v1/workspace/profile",
        running.addr
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();

    assert_eq!(body["mode"], "prod");
    assert_eq!(body["version"], memos::version::VERSION);
    assert_eq!(body["instanceUrl"], "https://memos.example.com");
    assert!(body.get("dsn").is_none());

    running.server.shutdown(&running.scope).await.unwrap();
}

#[tokio::test]
async fn healthz_unavailable_once_store_closed() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(sqlite_profile(dir.path())).await;
    running.store.close().await;

    let response = reqwest::get(format!("http://{}/healthz", running.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 503);

    running.server.shutdown(&running.scope).await.unwrap();
}

#[tokio::test]
async fn shutdown_closes_listener_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(sqlite_profile(dir.path())).await;

    running.server.shutdown(&running.scope).await.unwrap();
    let result = running.task.await.unwrap();
    assert!(result.unwrap_err().is_closed());

    running.server.shutdown(&running.scope).await.unwrap();
    let again = running.server.start(&running.scope).await;
    assert!(again.unwrap_err().is_closed());

    assert!(reqwest::get(format!("http://{}/healthz", running.addr))
        .await
        .is_err());
}

/// `GET /slow`: signals `entered`, then answers `done` after `delay`.
fn slow_route(delay: Duration, entered: Arc<Notify>) -> Router {
    Router::new().route(
        "/slow",
        get(move || {
            let entered = Arc::clone(&entered);
            async move {
                entered.notify_one();
                tokio::time::sleep(delay).await;
                "done"
            }
        }),
    )
}

#[tokio::test]
async fn in_flight_request_completes_during_drain() {
    let dir = tempfile::tempdir().unwrap();
    let entered = Arc::new(Notify::new());
    let running = start_with(
        sqlite_profile(dir.path()),
        Duration::from_secs(5),
        slow_route(Duration::from_millis(300), Arc::clone(&entered)),
    )
    .await;

    let url = format!("http://{}/slow", running.addr);
    let request = tokio::spawn(async move {
        let response = reqwest::get(url).await?;
        let status = response.status();
        Ok::<_, reqwest::Error>((status, response.text().await?))
    });
    entered.notified().await;

    running.server.shutdown(&running.scope).await.unwrap();

    let (status, body) = request.await.unwrap().unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, "done");
    assert!(running.task.await.unwrap().unwrap_err().is_closed());
}

#[tokio::test]
async fn drain_gives_up_after_grace_period() {
    let dir = tempfile::tempdir().unwrap();
    let grace_period = Duration::from_millis(300);
    let margin = Duration::from_secs(2);
    let entered = Arc::new(Notify::new());
    let running = start_with(
        sqlite_profile(dir.path()),
        grace_period,
        slow_route(Duration::from_secs(25), Arc::clone(&entered)),
    )
    .await;

    let request = tokio::spawn(reqwest::get(format!("http://{}/slow", running.addr)));
    entered.notified().await;

    let began = Instant::now();
    running.server.shutdown(&running.scope).await.unwrap();
    let result = tokio::time::timeout(grace_period + margin, running.task)
        .await
        .expect("start did not return after the grace period")
        .unwrap();
    let elapsed = began.elapsed();

    assert!(result.unwrap_err().is_closed());
    assert!(elapsed >= grace_period, "{elapsed:?}");
    assert!(elapsed < grace_period + margin, "{elapsed:?}");
    request.abort();
}

#[tokio::test]
async fn cancelled_scope_stops_server() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(sqlite_profile(dir.path())).await;

    running.scope.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.unwrap_err().is_closed());
}

#[tokio::test]
async fn shutdown_before_start_returns_at_once() {
    let dir = tempfile::tempdir().unwrap();
    let profile = Arc::new(sqlite_profile(dir.path()));
    let store = open_store(Arc::clone(&profile)).await;
    let scope = CancellationToken::new();
    let server = Server::new(&scope, profile, store).unwrap();

    tokio::time::timeout(Duration::from_millis(500), server.shutdown(&scope))
        .await
        .unwrap()
        .unwrap();
    assert!(server.start(&scope).await.unwrap_err().is_closed());
    assert!(server.local_addr().is_none());
}

#[tokio::test]
async fn port_in_use_is_a_real_failure() {
    let dir = tempfile::tempdir().unwrap();
    let first = start(sqlite_profile(dir.path())).await;

    let mut profile = sqlite_profile(dir.path());
    profile.port = first.addr.port();
    let profile = Arc::new(profile);
    let store = open_store(Arc::clone(&profile)).await;
    let scope = CancellationToken::new();
    let second = Server::new(&scope, profile, store).unwrap();

    let err = second.start(&scope).await.unwrap_err();
    assert!(!err.is_closed());
    assert!(matches!(err, ServerError::Bind { .. }), "{err}");

    first.server.shutdown(&first.scope).await.unwrap();
}

#[tokio::test]
async fn new_rejects_cancelled_scope() {
    let dir = tempfile::tempdir().unwrap();
    let profile = Arc::new(sqlite_profile(dir.path()));
    let store = open_store(Arc::clone(&profile)).await;
    let scope = CancellationToken::new();
    scope.cancel();

    assert!(matches!(
        Server::new(&scope, profile, store),
        Err(ServerError::Closed)
    ));
}

#[tokio::test]
async fn lifecycle_migrates_and_stops_on_signal() {
    let dir = tempfile::tempdir().unwrap();
    let profile = sqlite_profile(dir.path());
    let dsn = profile.dsn.clone();

    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        Lifecycle::new(profile, Services)
            .with_greeter(|_| {})
            .run(tokio::time::sleep(Duration::from_millis(200))),
    )
    .await
    .unwrap();

    assert_eq!(outcome, Outcome::Stopped);
    assert!(std::path::Path::new(&dsn).is_file(), "{dsn}");
}

#[tokio::test]
async fn lifecycle_fails_on_unknown_driver() {
    let dir = tempfile::tempdir().unwrap();
    let mut profile = sqlite_profile(dir.path());
    profile.driver = "oracle".into();

    let outcome = Lifecycle::new(profile, Services)
        .with_greeter(|_| panic!("greeting printed after driver failure"))
        .run(std::future::pending())
        .await;

    assert_eq!(outcome, Outcome::Failed(Phase::Driver));
}
