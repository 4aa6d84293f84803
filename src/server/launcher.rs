//! Process launch adapter
//!
//! Spawns the inference server as a background process with captured output
//! streams. Platform differences (console flags, termination signals) live
//! here and nowhere else.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::LOOPBACK_HOST;

/// Maximum number of output lines kept for diagnostics
const CAPTURE_LINES: usize = 200;
/// Upper bound on waiting for output readers after the process exits
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything needed to launch one server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub model: PathBuf,
    pub port: u16,
    pub context_size: u32,
    pub gpu_layers: i32,
}

impl LaunchSpec {
    pub fn new(
        executable: impl Into<PathBuf>,
        model: impl Into<PathBuf>,
        port: u16,
        context_size: u32,
        gpu_layers: i32,
    ) -> Self {
        Self {
            executable: executable.into(),
            model: model.into(),
            port,
            context_size,
            gpu_layers,
        }
    }

    /// Command-line arguments passed to the server; the host is always loopback
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "-m".into(),
            self.model.clone().into_os_string(),
            "--host".into(),
            LOOPBACK_HOST.into(),
            "--port".into(),
            self.port.to_string().into(),
            "--ctx-size".into(),
            self.context_size.to_string().into(),
            "-ngl".into(),
            self.gpu_layers.to_string().into(),
        ]
    }

    /// The executable's own directory, so it can resolve its shared libraries
    pub fn working_dir(&self) -> PathBuf {
        match self.executable.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Human-readable command line for logs
    pub fn command_line(&self) -> String {
        let mut line = self.executable.display().to_string();
        for arg in self.args() {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Spawns a detached background process with piped output streams
pub trait Launcher: Send {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Child>;
}

/// Launcher for the local operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalLauncher;

impl Launcher for LocalLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Child> {
        let executable = absolute(&spec.executable)?;
        let mut cmd = Command::new(&executable);
        cmd.args(spec.args())
            .current_dir(spec.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.spawn()
    }
}

// current_dir changes how a relative program path resolves, so pin it first.
fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Bounded capture of a child's stdout and stderr
///
/// Reader threads drain both pipes continuously so a chatty server never
/// blocks on a full pipe buffer; only the last lines are retained.
#[derive(Debug, Default)]
pub struct OutputCapture {
    lines: Arc<Mutex<VecDeque<String>>>,
    readers: Vec<JoinHandle<()>>,
}

impl OutputCapture {
    /// Take the child's output pipes and start draining them
    pub fn attach(child: &mut Child) -> Self {
        let lines = Arc::new(Mutex::new(VecDeque::with_capacity(CAPTURE_LINES)));
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, "stdout", lines.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, "stderr", lines.clone()));
        }

        Self { lines, readers }
    }

    /// Captured output so far, oldest line first
    pub fn snapshot(&self) -> String {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Let the reader threads drain what is left, then snapshot
    ///
    /// Call once the process has exited. A grandchild may keep a pipe open,
    /// so the wait is bounded and unfinished readers are left detached.
    pub fn finish(mut self) -> String {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        for reader in self.readers.drain(..) {
            while !reader.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if reader.is_finished() {
                let _ = reader.join();
            }
        }
        self.snapshot()
    }
}

fn spawn_reader<R>(stream: R, name: &'static str, lines: Arc<Mutex<VecDeque<String>>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            trace!(stream = name, "{}", line);
            let mut lines = lines.lock().unwrap_or_else(|e| e.into_inner());
            if lines.len() == CAPTURE_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
        debug!(stream = name, "server output stream closed");
    })
}

/// Ask the process to exit gracefully
///
/// SIGTERM on Unix. Other platforms have no portable graceful signal for a
/// console-less child, so this falls back to an immediate kill.
pub fn request_termination(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        let pid = child.id() as libc::pid_t;
        // The pid belongs to a child we have not reaped yet, so it cannot have been recycled.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    {
        child.kill()
    }
}
