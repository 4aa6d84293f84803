//! Shared fixtures: a programmable fake inference server and fake
//! `llama-server` executables.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use lorewright::config::{LorewrightConfig, ServerTimings, GENERAL_MODEL, MATURE_MODEL};

/// Behaviour of the fake server, adjustable while it runs
pub struct FakeState {
    pub ready: AtomicBool,
    pub completion_status: AtomicU16,
    pub completion_delay_ms: AtomicU64,
    pub completion_body: Mutex<String>,
    pub completions: AtomicUsize,
    pub last_request: Mutex<Option<Value>>,
}

impl FakeState {
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_content(&self, content: &str) {
        *self.completion_body.lock().unwrap() = json!({ "content": content, "stop": true }).to_string();
    }

    pub fn set_raw_body(&self, body: &str) {
        *self.completion_body.lock().unwrap() = body.to_string();
    }

    pub fn set_status(&self, status: u16) {
        self.completion_status.store(status, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.completion_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Value> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_request()
            .and_then(|v| v.get("prompt").and_then(Value::as_str).map(str::to_string))
    }
}

/// Fake `/health` + `/completion` server on its own runtime thread
pub struct FakeServer {
    pub port: u16,
    pub state: Arc<FakeState>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FakeServer {
    /// Start a server that is healthy and answers with `content`
    pub fn start(content: &str) -> Self {
        let state = Arc::new(FakeState {
            ready: AtomicBool::new(true),
            completion_status: AtomicU16::new(200),
            completion_delay_ms: AtomicU64::new(0),
            completion_body: Mutex::new(String::new()),
            completions: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        });
        state.set_content(content);

        let (port_tx, port_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app_state = state.clone();

        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let app = Router::new()
                    .route("/health", get(health))
                    .route("/completion", post(completion))
                    .with_state(app_state);
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                port_tx.send(listener.local_addr().unwrap().port()).unwrap();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .unwrap();
            });
        });

        let port = port_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        Self {
            port,
            state,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn health(State(state): State<Arc<FakeState>>) -> Response {
    if state.ready.load(Ordering::SeqCst) {
        Json(json!({ "status": "ok" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": { "message": "Loading model" } })),
        )
            .into_response()
    }
}

async fn completion(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Response {
    state.completions.fetch_add(1, Ordering::SeqCst);
    *state.last_request.lock().unwrap() = Some(body);

    let delay = state.completion_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let status = StatusCode::from_u16(state.completion_status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = state.completion_body.lock().unwrap().clone();
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Timings small enough for tests
pub fn fast_timings() -> ServerTimings {
    ServerTimings {
        settle_ms: 0,
        health_timeout_ms: 2_000,
        poll_interval_ms: 25,
        probe_timeout_ms: 500,
        grace_ms: 1_000,
        cooldown_ms: 0,
        completion_timeout_ms: 2_000,
    }
}

/// Write an executable shell script
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A `llama-server` stand-in that stays alive until terminated
#[cfg(unix)]
pub fn sleeping_server(dir: &Path) -> PathBuf {
    write_script(dir, "llama-server", "echo \"fake server args: $*\"\nexec sleep 60")
}

/// A `llama-server` stand-in that fails while loading
#[cfg(unix)]
pub fn crashing_server(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "llama-server",
        "echo 'error: failed to load model' >&2\nexit 3",
    )
}

/// Two model files for the default identifiers
pub fn model_files(dir: &Path) -> (PathBuf, PathBuf) {
    let general = dir.join("general.gguf");
    let mature = dir.join("mature.gguf");
    std::fs::write(&general, b"GGUF").unwrap();
    std::fs::write(&mature, b"GGUF").unwrap();
    (general, mature)
}

/// Configuration pointing at `executable`, the fake server's port and two models
pub fn test_config(dir: &Path, executable: &Path, port: u16) -> LorewrightConfig {
    let (general, mature) = model_files(dir);
    let mut config = LorewrightConfig::default();
    config.server.executable_path = executable.to_path_buf();
    config.server.port = port;
    config.server.timings = fast_timings();
    config.models.clear();
    config.models.insert(GENERAL_MODEL.to_string(), general);
    config.models.insert(MATURE_MODEL.to_string(), mature);
    config.output.directory = dir.join("outputs");
    config
}
