//! # Lorewright
//!
//! A narrative-writing assistant driving a local `llama-server` process.
//!
//! ## Features
//!
//! - Supervises one llama.cpp inference server: loopback-only launch, health
//!   polling, graceful-then-forced shutdown
//! - Loads the requested model on demand and skips redundant reloads
//! - Renders prompts from a catalogue of content type templates with format
//!   and style directives
//! - Strips leaked instructions from completions before they are saved
//! - Frees VRAM between generations unless told to keep the model loaded
//!
//! ## Example
//!
//! ```rust,no_run
//! use lorewright::{GenerationRequest, LorewrightConfig, Pipeline};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LorewrightConfig::load_or_create(LorewrightConfig::default_path())?;
//! let mut pipeline = Pipeline::new(config)?;
//!
//! let request = GenerationRequest::new("character", "An elf ranger who distrusts magic")
//!     .format("markdown")
//!     .style("detailed");
//! let result = pipeline.generate(&request)?;
//!
//! println!("{} words in {:?}", result.word_count, result.elapsed);
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod sanitize;
pub mod server;
pub mod setup;
pub mod worker;

pub use client::CompletionClient;
pub use config::{GenerationParams, LorewrightConfig, ServerConfig, ServerTimings};
pub use error::LorewrightError;
pub use pipeline::{GenerationRequest, GenerationResult, Pipeline};
pub use prompt::{OutputFormat, PromptBuilder, StyleCatalogue};
pub use sanitize::Sanitizer;
pub use server::{ModelRegistry, ProcessSupervisor, ServerState};
pub use worker::{GenerationWorker, WorkerEvent};

pub mod prelude {
    pub use crate::{
        GenerationRequest, GenerationResult, GenerationWorker, LorewrightConfig, LorewrightError,
        OutputFormat, Pipeline, WorkerEvent,
    };
}
