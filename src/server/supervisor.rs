//! Process supervisor
//!
//! Owns the lifecycle of at most one inference server process: start,
//! health-check, graceful-then-forced termination. Nothing else in the crate
//! holds the process handle.
//!
//! ```text
//!   not_running ──start──► starting ──healthy──► ready ◄──► unhealthy
//!        ▲                    │                    │           │
//!        └──timeout/failure───┘◄───stop / crash────┴───────────┘
//! ```
//!
//! Switching models always goes through `not_running`; there is no direct
//! `ready -> starting` transition.

use std::path::PathBuf;
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::launcher::{request_termination, LaunchSpec, Launcher, LocalLauncher, OutputCapture};
use super::LOOPBACK_HOST;
use crate::config::ServerTimings;
use crate::LorewrightError;

/// Interval used while waiting for a terminated process to exit
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Lifecycle state of the supervised server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotRunning,
    Starting,
    Ready,
    Unhealthy,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotRunning => "not running",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Unhealthy => "unhealthy",
        };
        f.write_str(name)
    }
}

/// Snapshot of the supervisor for display
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub state: ServerState,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub model_path: Option<PathBuf>,
    pub uptime: Option<Duration>,
    pub launches: u64,
}

struct RunningServer {
    child: Child,
    output: OutputCapture,
    spec: LaunchSpec,
    started_at: Instant,
}

impl RunningServer {
    fn health_url(&self) -> String {
        format!("http://{}:{}/health", LOOPBACK_HOST, self.spec.port)
    }
}

/// Supervises a single inference server process
pub struct ProcessSupervisor {
    launcher: Box<dyn Launcher>,
    probe: reqwest::blocking::Client,
    timings: ServerTimings,
    state: ServerState,
    running: Option<RunningServer>,
    launches: u64,
}

impl ProcessSupervisor {
    /// Create a supervisor that launches processes on the local OS
    pub fn new(timings: ServerTimings) -> Self {
        Self::with_launcher(timings, LocalLauncher)
    }

    /// Create a supervisor with a custom launch adapter
    pub fn with_launcher(timings: ServerTimings, launcher: impl Launcher + 'static) -> Self {
        let probe = reqwest::blocking::Client::builder()
            .timeout(timings.probe_timeout())
            .no_proxy()
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client for health probes: {}", e);
                reqwest::blocking::Client::new()
            });

        Self {
            launcher: Box::new(launcher),
            probe,
            timings,
            state: ServerState::NotRunning,
            running: None,
            launches: 0,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn timings(&self) -> &ServerTimings {
        &self.timings
    }

    /// Number of processes launched over the supervisor's lifetime
    pub fn launches(&self) -> u64 {
        self.launches
    }

    /// Whether a process handle is currently tracked
    pub fn is_tracking(&self) -> bool {
        self.running.is_some()
    }

    pub fn status(&self) -> ServerStatus {
        let running = self.running.as_ref();
        ServerStatus {
            state: self.state,
            pid: running.map(|r| r.child.id()),
            port: running.map(|r| r.spec.port),
            model_path: running.map(|r| r.spec.model.clone()),
            uptime: running.map(|r| r.started_at.elapsed()),
            launches: self.launches,
        }
    }

    /// Base URL of the tracked server, if any
    pub fn base_url(&self) -> Option<String> {
        self.running
            .as_ref()
            .map(|r| format!("http://{}:{}", LOOPBACK_HOST, r.spec.port))
    }

    /// Stop the tracked process, if any
    ///
    /// Sends a graceful termination signal, waits up to the grace period,
    /// then force-kills. Tracked state is always cleared, and a cooldown
    /// follows so device memory is released before the next start. A no-op
    /// when nothing is tracked.
    pub fn ensure_stopped(&mut self) {
        let Some(running) = self.running.take() else {
            self.state = ServerState::NotRunning;
            return;
        };
        self.state = ServerState::NotRunning;
        let output = self.terminate(running);
        if !output.trim().is_empty() {
            debug!("Final server output:\n{}", output.trim_end());
        }
        thread::sleep(self.timings.cooldown());
        info!("Server stopped");
    }

    /// Launch the server for `spec`
    ///
    /// Fails fast, without launching, if the executable or the model file is
    /// missing. A process already tracked must be stopped first.
    pub fn start(&mut self, spec: LaunchSpec) -> Result<(), LorewrightError> {
        if let Some(running) = &self.running {
            return Err(LorewrightError::LaunchFailed(format!(
                "a server is already running (pid {}, model {}); stop it first",
                running.child.id(),
                running.spec.model.display()
            )));
        }

        if !spec.executable.is_file() {
            error!(path = %spec.executable.display(), "llama-server executable not found");
            return Err(LorewrightError::ExecutableNotFound(spec.executable));
        }
        if !spec.model.is_file() {
            error!(path = %spec.model.display(), "Model file not found");
            return Err(LorewrightError::ModelFileNotFound(spec.model));
        }

        info!("Launching: {}", spec.command_line());
        self.state = ServerState::Starting;

        let mut child = match self.launcher.launch(&spec) {
            Ok(child) => child,
            Err(e) => {
                self.state = ServerState::NotRunning;
                error!("Failed to launch server: {}", e);
                return Err(LorewrightError::LaunchFailed(e.to_string()));
            }
        };
        self.launches += 1;
        info!(pid = child.id(), port = spec.port, "Server process started");

        let output = OutputCapture::attach(&mut child);
        self.running = Some(RunningServer {
            child,
            output,
            spec,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Wait for the launched server to answer its health endpoint
    ///
    /// Sleeps the settle delay first, then probes at the configured interval
    /// until `timeout` elapses. On failure the captured output is surfaced in
    /// the error and the process is stopped.
    pub fn wait_until_healthy(&mut self, timeout: Duration) -> Result<(), LorewrightError> {
        if self.running.is_none() {
            return Err(LorewrightError::LaunchFailed(
                "no server process to wait for".to_string(),
            ));
        }

        info!(
            settle = ?self.timings.settle(),
            ?timeout,
            "Waiting for server to initialize (large models can take minutes)"
        );
        let started = Instant::now();
        thread::sleep(self.timings.settle());
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(code) = self.exit_status() {
                let output = self.stop_and_collect();
                error!(?code, "Server exited during startup");
                log_output(&output);
                return Err(LorewrightError::ProcessExited { code, output });
            }

            if self.probe_health() {
                self.state = ServerState::Ready;
                info!(elapsed = ?started.elapsed(), "Server is ready");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.timings.poll_interval().min(deadline - now));
        }

        let waited = started.elapsed();
        let output = self.stop_and_collect();
        error!(?waited, "Server failed to become healthy within timeout");
        log_output(&output);
        Err(LorewrightError::HealthTimeout { waited, output })
    }

    /// Single best-effort health probe
    ///
    /// Any network failure, non-success status or timeout counts as
    /// unhealthy. A process found to have exited is cleaned up.
    pub fn is_healthy(&mut self) -> bool {
        if self.running.is_none() {
            return false;
        }

        if let Some(code) = self.exit_status() {
            warn!(?code, "Server process exited unexpectedly");
            self.ensure_stopped();
            return false;
        }

        let healthy = self.probe_health();
        if matches!(self.state, ServerState::Ready | ServerState::Unhealthy) {
            self.state = if healthy {
                ServerState::Ready
            } else {
                ServerState::Unhealthy
            };
        }
        healthy
    }

    fn probe_health(&self) -> bool {
        let Some(running) = &self.running else {
            return false;
        };
        match self.probe.get(running.health_url()).send() {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Health probe failed: {}", e);
                false
            }
        }
    }

    /// Exit code if the tracked process has exited (`Some(None)` when killed by a signal)
    fn exit_status(&mut self) -> Option<Option<i32>> {
        let running = self.running.as_mut()?;
        match running.child.try_wait() {
            Ok(Some(status)) => Some(status.code()),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not query server process: {}", e);
                None
            }
        }
    }

    fn stop_and_collect(&mut self) -> String {
        let Some(running) = self.running.take() else {
            return String::new();
        };
        self.state = ServerState::NotRunning;
        let output = self.terminate(running);
        thread::sleep(self.timings.cooldown());
        output
    }

    fn terminate(&self, mut running: RunningServer) -> String {
        let pid = running.child.id();

        if let Ok(None) = running.child.try_wait() {
            info!(pid, "Stopping server");
            if let Err(e) = request_termination(&mut running.child) {
                warn!(pid, "Termination signal failed: {}", e);
            }

            let deadline = Instant::now() + self.timings.grace();
            loop {
                match running.child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL),
                    _ => {
                        warn!(pid, "Server did not exit within grace period, killing");
                        if let Err(e) = running.child.kill() {
                            warn!(pid, "Kill failed: {}", e);
                        }
                        break;
                    }
                }
            }
        }

        // Reap the child so the pid is released.
        if let Err(e) = running.child.wait() {
            warn!(pid, "Failed to reap server process: {}", e);
        }
        running.output.finish()
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            self.terminate(running);
        }
    }
}

fn log_output(output: &str) {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        warn!("Server produced no output");
    } else {
        warn!("Server output:\n{}", tail(trimmed, 2000));
    }
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
