//! `TesClient` against an in-process TES server
//!
//! The fake server keeps tasks in memory. Tasks whose invocation it can read
//! from a `file://` URL are executed on submission (only `hello` is known);
//! everything else stays `RUNNING` until cancelled.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use farcall_domain::{
    ports::TaskBackend,
    task::{Executor, Resources, TaskBackendError, TaskDescription, TaskId, TaskState},
    Invocation, InvocationBuilder, JsonCodec, PollConfig,
};
use farcall_store::LocalFileStore;
use farcall_tes::{TesClient, TesConfig};
use serde_json::{json, Value};

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, (Value, &'static str)>,
    cancels: Vec<String>,
    unavailable: bool,
}

#[derive(Clone, Default)]
struct FakeTes {
    inner: Arc<Mutex<Inner>>,
}

impl FakeTes {
    fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }

    fn submissions(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }

    fn cancels(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancels.clone()
    }
}

/// Run a `hello` invocation staged on the local filesystem
fn execute(task: &Value) -> Option<()> {
    let local = |url: &Value| url.as_str()?.strip_prefix("file://").map(str::to_string);

    let invocation_url = task["inputs"]
        .as_array()?
        .iter()
        .find(|input| input["path"].as_str().is_some_and(|p| p.ends_with("invocation.bin")))?;
    let result_url = task["outputs"]
        .as_array()?
        .iter()
        .find(|output| output["path"].as_str().is_some_and(|p| p.ends_with("result.bin")))?;

    let invocation: Invocation =
        serde_json::from_slice(&std::fs::read(local(&invocation_url["url"])?).ok()?).ok()?;
    if invocation.function() != "hello" {
        return None;
    }
    let greeting = format!("hello {}", invocation.args().first()?.as_str()?);

    let destination = std::path::PathBuf::from(local(&result_url["url"])?);
    std::fs::create_dir_all(destination.parent()?).ok()?;
    std::fs::write(destination, serde_json::to_vec(&greeting).ok()?).ok()
}

async fn create_task(State(tes): State<FakeTes>, Json(task): Json<Value>) -> Response {
    let mut inner = tes.inner.lock().unwrap();
    if inner.unavailable {
        return (StatusCode::SERVICE_UNAVAILABLE, "try again later").into_response();
    }
    if task["name"].as_str().unwrap_or_default().is_empty() {
        return (StatusCode::BAD_REQUEST, "task name is required").into_response();
    }

    let id = format!("task-{}", inner.tasks.len() + 1);
    let state = match execute(&task) {
        Some(()) => "COMPLETE",
        None => "RUNNING",
    };
    inner.tasks.insert(id.clone(), (task, state));
    Json(json!({ "id": id })).into_response()
}

async fn get_task(
    State(tes): State<FakeTes>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let inner = tes.inner.lock().unwrap();
    if inner.unavailable {
        return StatusCode::BAD_GATEWAY.into_response();
    }
    let Some((task, state)) = inner.tasks.get(&id) else {
        return (StatusCode::NOT_FOUND, "no such task").into_response();
    };

    match params.get("view").map(String::as_str) {
        Some("FULL") => {
            let mut full = task.clone();
            full["id"] = json!(id);
            full["state"] = json!(state);
            full["logs"] = json!([{ "system_logs": ["executor exited with code 1"] }]);
            Json(full).into_response()
        }
        _ => Json(json!({ "id": id, "state": state })).into_response(),
    }
}

async fn cancel_task(State(tes): State<FakeTes>, Path(action): Path<String>) -> Response {
    let Some(id) = action.strip_suffix(":cancel") else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut inner = tes.inner.lock().unwrap();
    let Some(entry) = inner.tasks.get_mut(id) else {
        return (StatusCode::NOT_FOUND, "no such task").into_response();
    };
    entry.1 = "CANCELED";
    inner.cancels.push(id.to_string());
    Json(json!({})).into_response()
}

async fn serve() -> (FakeTes, TesClient) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("farcall=debug")
        .with_test_writer()
        .try_init();

    let tes = FakeTes::default();
    let app = Router::new()
        .route("/v1/tasks", post(create_task))
        .route("/v1/tasks/:id", get(get_task).post(cancel_task))
        .with_state(tes.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = TesClient::new(&TesConfig::new(format!("http://{}", addr))).unwrap();
    (tes, client)
}

fn sleeper(name: &str) -> TaskDescription {
    TaskDescription::new(
        name,
        Executor {
            image: "alpine:3.20".to_string(),
            command: vec!["sleep".to_string(), "3600".to_string()],
            workdir: "/tmp/farcall".to_string(),
            stdout: "/tmp/farcall/stdout".to_string(),
            stderr: "/tmp/farcall/stderr".to_string(),
            env: BTreeMap::new(),
        },
        Resources::default(),
        Vec::new(),
        Vec::new(),
    )
}

#[tokio::test]
async fn test_submit_poll_and_cancel() {
    let (tes, client) = serve().await;

    let id = client.submit(&sleeper("sleeper")).await.unwrap();
    assert_eq!(id, TaskId::new("task-1"));
    assert_eq!(client.poll_status(&id).await.unwrap(), TaskState::Running);

    client.cancel(&id).await.unwrap();
    assert_eq!(client.poll_status(&id).await.unwrap(), TaskState::Canceled);
    assert_eq!(tes.cancels(), vec!["task-1".to_string()]);
}

#[tokio::test]
async fn test_full_view_is_readable_text() {
    let (_tes, client) = serve().await;
    let id = client.submit(&sleeper("diagnostics")).await.unwrap();

    let full = client.get_full(&id).await.unwrap();

    assert!(full.contains("\"name\": \"diagnostics\""));
    assert!(full.contains("executor exited with code 1"));
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let (_tes, client) = serve().await;
    let id = TaskId::new("task-404");

    assert_eq!(
        client.poll_status(&id).await.unwrap_err(),
        TaskBackendError::TaskNotFound(id.clone())
    );
    assert_eq!(
        client.cancel(&id).await.unwrap_err(),
        TaskBackendError::TaskNotFound(id)
    );
}

#[tokio::test]
async fn test_error_statuses() {
    let (tes, client) = serve().await;

    let err = client.submit(&sleeper("")).await.unwrap_err();
    assert!(matches!(err, TaskBackendError::Rejected(ref msg) if msg.contains("task name is required")));

    let id = client.submit(&sleeper("flaky")).await.unwrap();
    tes.set_unavailable(true);
    assert!(client.submit(&sleeper("flaky")).await.unwrap_err().is_transient());
    assert!(client.poll_status(&id).await.unwrap_err().is_transient());

    tes.set_unavailable(false);
    assert_eq!(client.poll_status(&id).await.unwrap(), TaskState::Running);
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = TesClient::new(
        &TesConfig::new(format!("http://{}", addr)).with_timeout(Duration::from_secs(2)),
    )
    .unwrap();

    let err = client.poll_status(&TaskId::new("any")).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_remote_call_through_tes() {
    let (tes, client) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        LocalFileStore::connect(&format!("file://{}", dir.path().display()))
            .await
            .unwrap(),
    );
    let backend = Arc::new(client);
    let codec = Arc::new(JsonCodec::<String>::new());
    let hello = Invocation::new("hello", vec![json!("world")]).unwrap();
    let poll = PollConfig {
        initial_interval: Duration::from_millis(10),
        ..PollConfig::default()
    };
    let wait = Some(Duration::from_secs(10));

    let mut first = InvocationBuilder::new(Arc::clone(&store), Arc::clone(&backend))
        .with_poll_config(poll.clone());
    first.with_call_caching("tes_cache").unwrap();
    let handle = first.run(Arc::clone(&codec), &hello).await.unwrap();
    assert_eq!(handle.result(wait).await.unwrap(), "hello world");
    assert_eq!(handle.status(), TaskState::Complete);

    let mut second = InvocationBuilder::new(store, backend).with_poll_config(poll);
    second.with_call_caching("tes_cache").unwrap();
    let cached = second.run(codec, &hello).await.unwrap();

    assert!(cached.is_cached());
    assert_eq!(cached.result(wait).await.unwrap(), "hello world");
    assert_eq!(tes.submissions(), 1);
}
