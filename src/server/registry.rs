//! Model registry
//!
//! Maps logical model identifiers to model files and remembers which one the
//! supervised server has loaded, so repeated requests for the same model do
//! not pay for a reload.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::launcher::LaunchSpec;
use super::supervisor::ProcessSupervisor;
use crate::config::{LorewrightConfig, ServerConfig};
use crate::LorewrightError;

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, PathBuf>,
    loaded: Option<String>,
}

impl ModelRegistry {
    pub fn new(entries: BTreeMap<String, PathBuf>) -> Self {
        Self {
            entries,
            loaded: None,
        }
    }

    pub fn from_config(config: &LorewrightConfig) -> Self {
        Self::new(config.models.clone())
    }

    /// Configured identifiers, in sorted order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, PathBuf> {
        &self.entries
    }

    /// Identifier of the model the server currently has loaded
    pub fn loaded(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    /// Resolve an identifier to a model file that exists right now
    pub fn resolve(&self, identifier: &str) -> Result<&Path, LorewrightError> {
        let path = self
            .entries
            .get(identifier)
            .ok_or_else(|| LorewrightError::UnconfiguredModel(identifier.to_string()))?;
        if !path.is_file() {
            return Err(LorewrightError::ModelFileNotFound(path.clone()));
        }
        Ok(path)
    }

    /// Replace the identifier map after a configuration reload
    ///
    /// The loaded marker survives only if its identifier still maps to the
    /// same file; otherwise the next request forces a reload.
    pub fn reload(&mut self, entries: BTreeMap<String, PathBuf>) {
        if let Some(loaded) = &self.loaded {
            if entries.get(loaded) != self.entries.get(loaded) {
                debug!(model = %loaded, "Loaded model remapped by reload");
                self.loaded = None;
            }
        }
        self.entries = entries;
    }

    /// Make sure `identifier` is the model the healthy server has loaded
    ///
    /// A no-op when it already is. Otherwise the server is stopped, started
    /// with the resolved model and waited on until healthy. The loaded marker
    /// is cleared before the swap and only set again once the new model
    /// passed its health check.
    pub fn ensure_loaded(
        &mut self,
        identifier: &str,
        supervisor: &mut ProcessSupervisor,
        server: &ServerConfig,
    ) -> Result<(), LorewrightError> {
        if self.loaded.as_deref() == Some(identifier) && supervisor.is_healthy() {
            debug!(model = identifier, "Model already loaded and healthy");
            return Ok(());
        }

        let model_path = self.resolve(identifier)?.to_path_buf();

        if let Some(previous) = self.loaded.take() {
            info!(from = %previous, to = identifier, "Switching model");
        } else {
            info!(model = identifier, "Loading model");
        }

        supervisor.ensure_stopped();
        supervisor.start(LaunchSpec::new(
            &server.executable_path,
            model_path,
            server.port,
            server.context_size,
            server.gpu_layers,
        ))?;
        supervisor.wait_until_healthy(server.timings.health_timeout())?;

        self.loaded = Some(identifier.to_string());
        info!(model = identifier, "Model loaded");
        Ok(())
    }

    /// Stop the server to free VRAM and forget the loaded model
    pub fn release(&mut self, supervisor: &mut ProcessSupervisor) {
        if let Some(model) = self.loaded.take() {
            info!(model = %model, "Releasing VRAM");
        }
        supervisor.ensure_stopped();
    }
}
