//! Inference server management
//!
//! The external `llama-server` process is a single-model, single-consumer
//! resource. [`ProcessSupervisor`] owns its handle, [`ModelRegistry`] owns the
//! answer to "which model is loaded right now". Both are plain values with an
//! explicit lifecycle; the pipeline holds one of each.

mod launcher;
mod registry;
mod supervisor;

pub use launcher::{request_termination, LaunchSpec, Launcher, LocalLauncher, OutputCapture};
pub use registry::ModelRegistry;
pub use supervisor::{ProcessSupervisor, ServerState, ServerStatus};

/// The only interface the server is ever bound to
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Default port for the inference server
pub const DEFAULT_PORT: u16 = 8081;
