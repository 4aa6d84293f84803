//! Generation pipeline
//!
//! The caller-facing entry point. One [`Pipeline`] owns the supervisor, the
//! registry and everything needed to turn a [`GenerationRequest`] into a
//! cleaned [`GenerationResult`]. Calls block; run the pipeline on a
//! [`GenerationWorker`](crate::worker::GenerationWorker) to keep a UI
//! responsive. Only one generation runs at a time because `generate` takes
//! `&mut self`.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::client::CompletionClient;
use crate::config::{GenerationParams, LorewrightConfig, GENERAL_MODEL};
use crate::prompt::{templates, OutputFormat, PromptBuilder, StyleCatalogue};
use crate::sanitize::Sanitizer;
use crate::server::{Launcher, ModelRegistry, ProcessSupervisor, ServerStatus};
use crate::LorewrightError;

/// One generation request
///
/// Generation parameters left unset come from the configuration defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub content_type: String,
    pub user_prompt: String,
    pub model: String,
    pub format: String,
    pub style: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<i32>,
    pub repeat_penalty: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Markdown output from the general-purpose model in its own voice
    pub fn new(content_type: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            user_prompt: user_prompt.into(),
            model: GENERAL_MODEL.to_string(),
            format: OutputFormat::Markdown.name().to_string(),
            style: String::new(),
            temperature: None,
            top_p: None,
            top_k: None,
            repeat_penalty: None,
            max_tokens: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn top_k(mut self, top_k: i32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn repeat_penalty(mut self, repeat_penalty: f32) -> Self {
        self.repeat_penalty = Some(repeat_penalty);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Effective parameters: overrides on top of `defaults`
    pub fn params(&self, defaults: &GenerationParams) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            repeat_penalty: self.repeat_penalty.unwrap_or(defaults.repeat_penalty),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }
}

/// A cleaned completion plus what produced it
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub elapsed: Duration,
    pub word_count: usize,
    pub content_type: String,
    pub format: OutputFormat,
    pub model: String,
}

pub struct Pipeline {
    config: LorewrightConfig,
    supervisor: ProcessSupervisor,
    registry: ModelRegistry,
    builder: PromptBuilder,
    client: CompletionClient,
    sanitizer: Sanitizer,
}

impl Pipeline {
    /// Pipeline launching the server on the local OS, with built-in styles
    pub fn new(config: LorewrightConfig) -> Result<Self, LorewrightError> {
        let supervisor = ProcessSupervisor::new(config.server.timings.clone());
        Self::assemble(config, supervisor)
    }

    /// Pipeline with a custom launch adapter
    pub fn with_launcher(
        config: LorewrightConfig,
        launcher: impl Launcher + 'static,
    ) -> Result<Self, LorewrightError> {
        let supervisor = ProcessSupervisor::with_launcher(config.server.timings.clone(), launcher);
        Self::assemble(config, supervisor)
    }

    fn assemble(
        config: LorewrightConfig,
        supervisor: ProcessSupervisor,
    ) -> Result<Self, LorewrightError> {
        config.validate()?;
        Ok(Self {
            client: CompletionClient::for_server(&config.server)?,
            registry: ModelRegistry::from_config(&config),
            builder: PromptBuilder::new(),
            sanitizer: Sanitizer::new(),
            supervisor,
            config,
        })
    }

    /// Replace the style catalogue
    pub fn with_styles(mut self, styles: StyleCatalogue) -> Self {
        self.builder = PromptBuilder::with_styles(styles);
        self
    }

    pub fn config(&self) -> &LorewrightConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn styles(&self) -> &StyleCatalogue {
        self.builder.styles()
    }

    pub fn styles_mut(&mut self) -> &mut StyleCatalogue {
        self.builder.styles_mut()
    }

    /// Identifier of the model currently loaded, if any
    pub fn loaded_model(&self) -> Option<&str> {
        self.registry.loaded()
    }

    pub fn server_status(&self) -> ServerStatus {
        self.supervisor.status()
    }

    /// Best-effort health probe of the running server
    pub fn is_server_healthy(&mut self) -> bool {
        self.supervisor.is_healthy()
    }

    /// Generate one artifact
    ///
    /// Every configuration problem is reported before any process is touched.
    /// The requested model is loaded (and verified healthy) before the
    /// completion call. A failed or empty completion leaves the model loaded;
    /// a successful one releases VRAM unless `keep_loaded` is set.
    pub fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationResult, LorewrightError> {
        let started = Instant::now();

        let content = templates::lookup(&request.content_type)
            .ok_or_else(|| LorewrightError::UnknownContentType(request.content_type.clone()))?;
        let format = OutputFormat::from_name(&request.format)
            .ok_or_else(|| LorewrightError::UnknownOutputFormat(request.format.clone()))?;
        self.registry.resolve(&request.model)?;
        let executable = &self.config.server.executable_path;
        if !executable.is_file() {
            return Err(LorewrightError::ExecutableNotFound(executable.clone()));
        }

        info!(
            content_type = content.id,
            model = %request.model,
            %format,
            "Starting generation"
        );

        self.registry
            .ensure_loaded(&request.model, &mut self.supervisor, &self.config.server)?;

        let prompt = self.builder.render(
            content.id,
            &request.user_prompt,
            format.name(),
            &request.style,
        )?;
        let params = request.params(&self.config.generation);

        let raw = self.client.try_complete(&prompt, &params).map_err(|e| {
            warn!(model = %request.model, "Generation failed, model stays loaded: {}", e);
            e
        })?;
        let text = self.sanitizer.clean(&raw, format);
        if text.is_empty() {
            warn!(model = %request.model, "Completion was only leaked instructions, model stays loaded");
            return Err(LorewrightError::MalformedResponse(
                "nothing left after removing leaked instructions".to_string(),
            ));
        }

        let result = GenerationResult {
            word_count: text.split_whitespace().count(),
            elapsed: started.elapsed(),
            content_type: content.id.to_string(),
            format,
            model: request.model.clone(),
            text,
        };
        info!(
            words = result.word_count,
            elapsed = ?result.elapsed,
            "Generation complete"
        );

        if !self.config.server.keep_loaded {
            self.release();
        }
        Ok(result)
    }

    /// Text-or-absence form of [`generate`](Self::generate)
    ///
    /// Failures are logged with their reason and collapse to `None`.
    pub fn generate_text(
        &mut self,
        content_type: &str,
        user_prompt: &str,
        model: &str,
        output_format: &str,
        style: &str,
    ) -> Option<String> {
        let request = GenerationRequest::new(content_type, user_prompt)
            .model(model)
            .format(output_format)
            .style(style);
        match self.generate(&request) {
            Ok(result) => Some(result.text),
            Err(e) => {
                error!("Generation failed: {}", e);
                None
            }
        }
    }

    /// Stop the server and free VRAM; the next generation reloads
    pub fn release(&mut self) {
        self.registry.release(&mut self.supervisor);
    }

    /// Apply a new configuration
    ///
    /// The server is stopped when any launch setting changed, so the next
    /// generation starts it with the new values.
    pub fn reload_config(&mut self, config: LorewrightConfig) -> Result<(), LorewrightError> {
        config.validate()?;

        let old = &self.config.server;
        let new = &config.server;
        let relaunch = old.executable_path != new.executable_path
            || old.port != new.port
            || old.context_size != new.context_size
            || old.gpu_layers != new.gpu_layers;

        let client = CompletionClient::for_server(&config.server)?;
        if relaunch {
            info!("Server settings changed");
            self.release();
        }

        self.registry.reload(config.models.clone());
        self.client = client;
        self.config = config;
        Ok(())
    }

    /// Stop the server; dropping the pipeline does the same
    pub fn shutdown(mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_overrides() {
        let defaults = GenerationParams::default();
        let request = GenerationRequest::new("character", "x")
            .temperature(0.3)
            .max_tokens(512);
        let params = request.params(&defaults);

        assert_eq!(params.temperature, 0.3);
        assert_eq!(params.max_tokens, 512);
        assert_eq!(params.top_p, defaults.top_p);
        assert_eq!(params.top_k, defaults.top_k);
    }

    #[test]
    fn test_configuration_errors_launch_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("general.gguf");
        std::fs::write(&model, b"gguf").unwrap();

        let mut config = LorewrightConfig::default();
        config.models.clear();
        config.models.insert(GENERAL_MODEL.to_string(), model);
        config.server.executable_path = dir.path().join("missing-server");
        let mut pipeline = Pipeline::new(config).unwrap();

        let cases = [
            GenerationRequest::new("limerick", "x"),
            GenerationRequest::new("character", "x").format("docx"),
            GenerationRequest::new("character", "x").model("other"),
            GenerationRequest::new("character", "x"),
        ];
        for request in &cases {
            let err = pipeline.generate(request).unwrap_err();
            assert!(err.is_configuration_error(), "{}", err);
        }
        assert_eq!(pipeline.server_status().launches, 0);
        assert!(pipeline.loaded_model().is_none());
        assert!(pipeline
            .generate_text("character", "x", GENERAL_MODEL, "markdown", "")
            .is_none());
    }
}
