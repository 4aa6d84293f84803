//! Configuration management with serde integration
//!
//! Settings for the inference server, the model identifier map, default
//! generation parameters and output location. Stored on disk as JSON; the
//! pipeline only reads these fields.
//!
//! ## Example
//!
//! ```rust
//! use lorewright::config::{LorewrightConfig, GenerationParams};
//!
//! let mut config = LorewrightConfig::default();
//! config.server.port = 8090;
//! config.generation = GenerationParams {
//!     temperature: 0.7,
//!     ..Default::default()
//! };
//!
//! let json = serde_json::to_string_pretty(&config).unwrap();
//! let loaded: LorewrightConfig = serde_json::from_str(&json).unwrap();
//! assert_eq!(loaded.server.port, 8090);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::LorewrightError;

/// Config directory name under the platform config dir
const CONFIG_DIR: &str = "lorewright";
const CONFIG_FILE: &str = "config.json";

/// Logical identifier of the default general-purpose model
pub const GENERAL_MODEL: &str = "general-purpose";
/// Logical identifier of the default mature-content model
pub const MATURE_MODEL: &str = "mature-content";

/// Complete lorewright configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LorewrightConfig {
    /// Inference server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Logical model identifier -> model file path
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, PathBuf>,
    /// Default generation parameters
    #[serde(default)]
    pub generation: GenerationParams,
    /// Where generated artifacts are written
    #[serde(default)]
    pub output: OutputConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for LorewrightConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            models: default_models(),
            generation: GenerationParams::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Inference server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the llama-server executable
    #[serde(default = "default_executable_path")]
    pub executable_path: PathBuf,
    /// Loopback port the server binds to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Context size passed to the server
    #[serde(default = "default_context_size")]
    pub context_size: u32,
    /// Number of layers offloaded to the GPU
    #[serde(default = "default_gpu_layers")]
    pub gpu_layers: i32,
    /// Keep the model resident between generations instead of releasing VRAM
    #[serde(default)]
    pub keep_loaded: bool,
    /// Startup, health and shutdown timings
    #[serde(default)]
    pub timings: ServerTimings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            executable_path: default_executable_path(),
            port: default_port(),
            context_size: default_context_size(),
            gpu_layers: default_gpu_layers(),
            keep_loaded: false,
            timings: ServerTimings::default(),
        }
    }
}

/// Timings governing the server lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTimings {
    /// Delay before the first health probe (weights take a while to map)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Overall bound on the health wait, settle delay excluded
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    /// Interval between health probes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Timeout of a single health probe
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Grace period between the termination signal and a forced kill
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Pause after stopping so device memory is released
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Total timeout of a completion request
    #[serde(default = "default_completion_timeout_ms")]
    pub completion_timeout_ms: u64,
}

impl Default for ServerTimings {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            health_timeout_ms: default_health_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            grace_ms: default_grace_ms(),
            cooldown_ms: default_cooldown_ms(),
            completion_timeout_ms: default_completion_timeout_ms(),
        }
    }
}

impl ServerTimings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }
}

/// Generation parameters sent with every completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Temperature for sampling (0.0 = deterministic, higher = more random)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Top-p (nucleus) sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Top-k sampling (0 = disabled)
    #[serde(default = "default_top_k")]
    pub top_k: i32,
    /// Repetition penalty (1.0 = no penalty)
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    /// Maximum number of tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repeat_penalty: default_repeat_penalty(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for saved artifacts
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_executable_path() -> PathBuf {
    let name = if cfg!(windows) {
        "llama-server.exe"
    } else {
        "llama-server"
    };
    home_dir().join("llama-server").join(name)
}
fn default_models() -> BTreeMap<String, PathBuf> {
    let models_dir = home_dir().join("ai-models");
    let mut models = BTreeMap::new();
    models.insert(
        GENERAL_MODEL.to_string(),
        models_dir.join("model-general.gguf"),
    );
    models.insert(
        MATURE_MODEL.to_string(),
        models_dir.join("model-mature.gguf"),
    );
    models
}
fn default_port() -> u16 {
    crate::server::DEFAULT_PORT
}
fn default_context_size() -> u32 {
    8192
}
fn default_gpu_layers() -> i32 {
    99
}
fn default_settle_ms() -> u64 {
    15_000
}
fn default_health_timeout_ms() -> u64 {
    90_000
}
fn default_poll_interval_ms() -> u64 {
    1_000
}
fn default_probe_timeout_ms() -> u64 {
    2_000
}
fn default_grace_ms() -> u64 {
    5_000
}
fn default_cooldown_ms() -> u64 {
    2_000
}
fn default_completion_timeout_ms() -> u64 {
    120_000
}
fn default_temperature() -> f32 {
    0.8
}
fn default_top_p() -> f32 {
    0.9
}
fn default_top_k() -> i32 {
    40
}
fn default_repeat_penalty() -> f32 {
    1.1
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}
fn default_log_level() -> String {
    "info".to_string()
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl LorewrightConfig {
    /// Default location of the configuration file
    ///
    /// `LOREWRIGHT_CONFIG` wins when set, then the platform config directory
    /// (`~/.config/lorewright/config.json` on Linux), then the working directory.
    pub fn default_path() -> PathBuf {
        if let Ok(custom) = std::env::var("LOREWRIGHT_CONFIG") {
            return PathBuf::from(custom);
        }
        if let Some(dir) = dirs::config_dir() {
            return dir.join(CONFIG_DIR).join(CONFIG_FILE);
        }
        PathBuf::from(CONFIG_FILE)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LorewrightError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LorewrightError::ConfigError(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| LorewrightError::ConfigError(format!("Failed to parse JSON config: {}", e)))
    }

    /// Save configuration to a JSON file, creating parent directories
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), LorewrightError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| LorewrightError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| LorewrightError::ConfigError(format!("Failed to write config file: {}", e)))
    }

    /// Load the configuration at `path`, writing the defaults there first if
    /// the file does not exist yet
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, LorewrightError> {
        let path = path.as_ref();
        if path.exists() {
            let config = Self::from_json_file(path)?;
            info!(path = %path.display(), "Configuration loaded");
            Ok(config)
        } else {
            let config = Self::default();
            config.to_json_file(path)?;
            info!(path = %path.display(), "Default configuration created");
            Ok(config)
        }
    }

    /// Override fields from `LOREWRIGHT_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), LorewrightError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), LorewrightError> {
        if let Some(path) = var("LOREWRIGHT_SERVER_PATH") {
            self.server.executable_path = PathBuf::from(path);
        }
        if let Some(port) = var("LOREWRIGHT_PORT") {
            self.server.port = parse_var("LOREWRIGHT_PORT", &port)?;
        }
        if let Some(ctx) = var("LOREWRIGHT_CONTEXT_SIZE") {
            self.server.context_size = parse_var("LOREWRIGHT_CONTEXT_SIZE", &ctx)?;
        }
        if let Some(layers) = var("LOREWRIGHT_GPU_LAYERS") {
            self.server.gpu_layers = parse_var("LOREWRIGHT_GPU_LAYERS", &layers)?;
        }
        if let Some(keep) = var("LOREWRIGHT_KEEP_LOADED") {
            self.server.keep_loaded = matches!(
                keep.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(dir) = var("LOREWRIGHT_OUTPUT_DIR") {
            self.output.directory = PathBuf::from(dir);
        }
        if let Some(temp) = var("LOREWRIGHT_TEMPERATURE") {
            self.generation.temperature = parse_var("LOREWRIGHT_TEMPERATURE", &temp)?;
        }
        if let Some(max) = var("LOREWRIGHT_MAX_TOKENS") {
            self.generation.max_tokens = parse_var("LOREWRIGHT_MAX_TOKENS", &max)?;
        }
        debug!("Environment overrides applied");
        Ok(())
    }

    /// Validate the configuration
    ///
    /// Checks value ranges only; file existence is checked at dispatch time.
    pub fn validate(&self) -> Result<(), LorewrightError> {
        if self.server.port == 0 {
            return Err(LorewrightError::ConfigError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.server.context_size == 0 {
            return Err(LorewrightError::ConfigError(
                "Context size must be greater than 0".to_string(),
            ));
        }

        if self.models.is_empty() {
            return Err(LorewrightError::ConfigError(
                "At least one model must be configured".to_string(),
            ));
        }

        if self.generation.temperature < 0.0 {
            return Err(LorewrightError::ConfigError(
                "Temperature cannot be negative".to_string(),
            ));
        }

        if self.generation.top_p <= 0.0 || self.generation.top_p > 1.0 {
            return Err(LorewrightError::ConfigError(
                "Top-p must be between 0 and 1".to_string(),
            ));
        }

        if self.generation.repeat_penalty <= 0.0 {
            return Err(LorewrightError::ConfigError(
                "Repeat penalty must be positive".to_string(),
            ));
        }

        if self.generation.max_tokens == 0 {
            return Err(LorewrightError::ConfigError(
                "Max tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the custom style directive file, next to the config file
    pub fn styles_path(config_path: &Path) -> PathBuf {
        config_path
            .parent()
            .map(|p| p.join("styles.json"))
            .unwrap_or_else(|| PathBuf::from("styles.json"))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, LorewrightError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LorewrightError::ConfigError(format!("Invalid {}: {}", key, e)))
}

/// VRAM presets for common GPU sizes
///
/// Context size dominates VRAM use (the KV cache grows linearly with it), so
/// presets mostly trade context for headroom.
pub mod presets {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum VramPreset {
        Vram8Gb,
        Vram12Gb,
        Vram16Gb,
        Vram24Gb,
    }

    impl VramPreset {
        pub const ALL: [VramPreset; 4] = [
            VramPreset::Vram8Gb,
            VramPreset::Vram12Gb,
            VramPreset::Vram16Gb,
            VramPreset::Vram24Gb,
        ];

        pub fn name(&self) -> &'static str {
            match self {
                Self::Vram8Gb => "8gb",
                Self::Vram12Gb => "12gb",
                Self::Vram16Gb => "16gb",
                Self::Vram24Gb => "24gb",
            }
        }

        pub fn from_name(name: &str) -> Option<Self> {
            let name = name.trim().to_ascii_lowercase();
            let name = name.trim_start_matches("vram").trim_start_matches(['-', '_']);
            Self::ALL.into_iter().find(|p| p.name() == name)
        }

        pub fn description(&self) -> &'static str {
            match self {
                Self::Vram8Gb => "7B-13B models at Q4_K_M; try 8192 context only for 7B",
                Self::Vram12Gb => "13B-14B models at Q4_K_M",
                Self::Vram16Gb => "13B-27B models at Q4_K_M",
                Self::Vram24Gb => "22B-35B models at Q4_K_M",
            }
        }

        /// Largest preset that fits into `vram_gb`
        pub fn for_vram_gb(vram_gb: f64) -> Self {
            if vram_gb >= 20.0 {
                Self::Vram24Gb
            } else if vram_gb >= 15.0 {
                Self::Vram16Gb
            } else if vram_gb >= 10.0 {
                Self::Vram12Gb
            } else {
                Self::Vram8Gb
            }
        }

        /// Apply this preset's server and generation values to `config`
        pub fn apply(&self, config: &mut LorewrightConfig) {
            let (context_size, max_tokens) = match self {
                Self::Vram8Gb => (4096, 1024),
                Self::Vram12Gb => (8192, 2048),
                Self::Vram16Gb => (8192, 2048),
                Self::Vram24Gb => (24576, 4096),
            };
            config.server.context_size = context_size;
            config.server.gpu_layers = 99;
            config.generation.max_tokens = max_tokens;
        }
    }

    pub fn vram_8gb() -> LorewrightConfig {
        with_preset(VramPreset::Vram8Gb)
    }

    pub fn vram_12gb() -> LorewrightConfig {
        with_preset(VramPreset::Vram12Gb)
    }

    pub fn vram_16gb() -> LorewrightConfig {
        with_preset(VramPreset::Vram16Gb)
    }

    pub fn vram_24gb() -> LorewrightConfig {
        with_preset(VramPreset::Vram24Gb)
    }

    fn with_preset(preset: VramPreset) -> LorewrightConfig {
        let mut config = LorewrightConfig::default();
        preset.apply(&mut config);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presets::VramPreset;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LorewrightConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8081);
        assert!(config.models.contains_key(GENERAL_MODEL));
        assert!(config.models.contains_key(MATURE_MODEL));
        assert!(!config.server.keep_loaded);
    }

    #[test]
    fn test_json_serialization() {
        let config = LorewrightConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: LorewrightConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.generation, deserialized.generation);
        assert_eq!(config.models, deserialized.models);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "server": { "port": 9000 }, "generation": { "max_tokens": 512 } }"#;
        let config: LorewrightConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.context_size, 8192);
        assert_eq!(config.generation.max_tokens, 512);
        assert_eq!(config.generation.top_k, 40);
        assert_eq!(config.server.timings.settle_ms, 15_000);
    }

    #[test]
    fn test_validation() {
        let mut config = LorewrightConfig::default();
        config.generation.temperature = -1.0;
        assert!(config.validate().is_err());

        let mut config = LorewrightConfig::default();
        config.generation.top_p = 1.5;
        assert!(config.validate().is_err());

        let mut config = LorewrightConfig::default();
        config.models.clear();
        assert!(config.validate().is_err());

        let mut config = LorewrightConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LOREWRIGHT_PORT", "9123"),
            ("LOREWRIGHT_KEEP_LOADED", "true"),
            ("LOREWRIGHT_TEMPERATURE", "0.3"),
        ]
        .into_iter()
        .collect();

        let mut config = LorewrightConfig::default();
        config
            .apply_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9123);
        assert!(config.server.keep_loaded);
        assert!((config.generation.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = LorewrightConfig::default();
        let result = config.apply_vars(|k| (k == "LOREWRIGHT_PORT").then(|| "eighty".to_string()));
        assert!(matches!(result, Err(LorewrightError::ConfigError(_))));
    }

    #[test]
    fn test_presets() {
        let small = presets::vram_8gb();
        assert_eq!(small.server.context_size, 4096);
        assert_eq!(small.generation.max_tokens, 1024);

        let large = presets::vram_24gb();
        assert_eq!(large.server.context_size, 24576);

        assert_eq!(VramPreset::for_vram_gb(24.0), VramPreset::Vram24Gb);
        assert_eq!(VramPreset::for_vram_gb(12.0), VramPreset::Vram12Gb);
        assert_eq!(VramPreset::for_vram_gb(6.0), VramPreset::Vram8Gb);
        assert_eq!(VramPreset::from_name("vram-16gb"), Some(VramPreset::Vram16Gb));
        assert_eq!(VramPreset::from_name("12GB"), Some(VramPreset::Vram12Gb));
    }
}
