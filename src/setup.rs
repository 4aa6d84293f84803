//! Installation checks and hardware detection
//!
//! Used by the `check`, `models --scan` and `config preset` commands to help
//! a user get from a fresh download to a working setup.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::presets::VramPreset;
use crate::config::LorewrightConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    /// Not fatal; something will be created or is merely unusual
    Warning,
    Failed,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Warning => "!",
            Self::Failed => "X",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallationReport {
    pub checks: Vec<Check>,
}

impl InstallationReport {
    /// True when no check failed; warnings are allowed
    pub fn is_ready(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Failed)
    }
}

/// Check the executable, every configured model and the output directory
///
/// A missing model is a warning; the installation only fails on models when
/// none of them is present.
pub fn check_installation(config: &LorewrightConfig) -> InstallationReport {
    let mut checks = Vec::new();

    let exe = &config.server.executable_path;
    checks.push(if exe.is_file() {
        Check::new("llama-server", CheckStatus::Ok, exe.display().to_string())
    } else {
        Check::new(
            "llama-server",
            CheckStatus::Failed,
            format!(
                "not found at {} (download a release from https://github.com/ggerganov/llama.cpp/releases)",
                exe.display()
            ),
        )
    });

    let mut present = 0;
    for (id, path) in &config.models {
        let name = format!("model '{}'", id);
        checks.push(match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                present += 1;
                Check::new(
                    name,
                    CheckStatus::Ok,
                    format!("{} ({:.1} GB)", file_name(path), meta.len() as f64 / GB),
                )
            }
            _ => Check::new(name, CheckStatus::Warning, format!("not found at {}", path.display())),
        });
    }
    if present == 0 {
        checks.push(Check::new(
            "models",
            CheckStatus::Failed,
            format!("none of the {} configured model files exist", config.models.len()),
        ));
    }

    let out = &config.output.directory;
    checks.push(match std::fs::metadata(out) {
        Ok(meta) if !meta.is_dir() => Check::new(
            "output directory",
            CheckStatus::Failed,
            format!("{} exists but is not a directory", out.display()),
        ),
        Ok(meta) if meta.permissions().readonly() => Check::new(
            "output directory",
            CheckStatus::Failed,
            format!("{} is read-only", out.display()),
        ),
        Ok(_) => Check::new("output directory", CheckStatus::Ok, out.display().to_string()),
        Err(_) => Check::new(
            "output directory",
            CheckStatus::Warning,
            format!("{} will be created on first save", out.display()),
        ),
    });

    InstallationReport { checks }
}

const GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `.gguf` files next to the configured models that no identifier maps to
pub fn scan_unconfigured_models(config: &LorewrightConfig) -> Vec<PathBuf> {
    let configured: BTreeSet<&Path> = config.models.values().map(PathBuf::as_path).collect();
    let dirs: BTreeSet<&Path> = config
        .models
        .values()
        .filter_map(|p| p.parent())
        .filter(|d| !d.as_os_str().is_empty())
        .collect();

    let mut found = BTreeSet::new();
    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(dir) else {
            debug!(dir = %dir.display(), "Model directory not readable");
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_gguf = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("gguf"))
                .unwrap_or(false);
            if is_gguf && path.is_file() && !configured.contains(path.as_path()) {
                found.insert(path);
            }
        }
    }
    found.into_iter().collect()
}

/// Identifier suggested for a model file: its lowercased stem, kebab-cased
pub fn suggest_identifier(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mut id = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c);
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }
    id.trim_matches('-').to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpuInfo {
    pub name: String,
    pub vram_mb: u64,
}

impl GpuInfo {
    pub fn vram_gb(&self) -> f64 {
        self.vram_mb as f64 / 1024.0
    }

    pub fn recommended_preset(&self) -> VramPreset {
        VramPreset::for_vram_gb(self.vram_gb())
    }
}

/// First NVIDIA GPU reported by `nvidia-smi`, if any
pub fn detect_gpu() -> Option<GpuInfo> {
    let out = Command::new("nvidia-smi")
        .args(["--query-gpu=name,memory.total", "--format=csv,noheader,nounits"])
        .output()
        .ok()?;
    if !out.status.success() {
        debug!("nvidia-smi exited with {}", out.status);
        return None;
    }
    parse_nvidia_smi(&String::from_utf8_lossy(&out.stdout))
}

/// Parse `name, memory_mb` CSV lines, taking the first GPU
pub fn parse_nvidia_smi(output: &str) -> Option<GpuInfo> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (name, memory) = line.rsplit_once(',')?;
    let vram_mb = memory.trim().parse().ok()?;
    Some(GpuInfo {
        name: name.trim().to_string(),
        vram_mb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nvidia_smi() {
        let gpu = parse_nvidia_smi("NVIDIA GeForce RTX 4070, 12282\nNVIDIA T400, 2048\n").unwrap();
        assert_eq!(gpu.name, "NVIDIA GeForce RTX 4070");
        assert_eq!(gpu.vram_mb, 12282);
        assert_eq!(gpu.recommended_preset(), VramPreset::Vram12Gb);

        assert!(parse_nvidia_smi("").is_none());
        assert!(parse_nvidia_smi("No devices were found").is_none());
    }

    #[test]
    fn test_suggest_identifier() {
        assert_eq!(
            suggest_identifier(Path::new("/m/Mistral-Nemo_12B.Q4_K_M.gguf")),
            "mistral-nemo-12b-q4-k-m"
        );
    }

    #[test]
    fn test_scan_and_check() {
        let dir = tempfile::tempdir().unwrap();
        let known = dir.path().join("known.gguf");
        let extra = dir.path().join("extra.GGUF");
        std::fs::write(&known, b"gguf").unwrap();
        std::fs::write(&extra, b"gguf").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let mut config = LorewrightConfig::default();
        config.models.clear();
        config.models.insert("known".to_string(), known);
        config.models.insert("gone".to_string(), dir.path().join("gone.gguf"));
        config.server.executable_path = dir.path().join("llama-server");
        config.output.directory = dir.path().join("outputs");

        assert_eq!(scan_unconfigured_models(&config), vec![extra]);

        let report = check_installation(&config);
        assert!(!report.is_ready());
        let failed: Vec<_> = report.failures().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, vec!["llama-server"]);
        let gone = report.checks.iter().find(|c| c.name == "model 'gone'").unwrap();
        assert_eq!(gone.status, CheckStatus::Warning);
        let output = report.checks.last().unwrap();
        assert_eq!(output.status, CheckStatus::Warning);
    }

    #[test]
    fn test_one_present_model_is_enough() {
        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("llama-server");
        let general = dir.path().join("general.gguf");
        std::fs::write(&server, b"").unwrap();
        std::fs::write(&general, b"gguf").unwrap();

        let mut config = LorewrightConfig::default();
        config.models.clear();
        config.models.insert("general-purpose".to_string(), general);
        config.models.insert("mature-content".to_string(), dir.path().join("mature.gguf"));
        config.server.executable_path = server;
        config.output.directory = dir.path().to_path_buf();

        let report = check_installation(&config);
        assert!(report.is_ready());
        assert_eq!(report.failures().count(), 0);
        assert!(report.checks.iter().any(|c| c.status == CheckStatus::Warning));
    }

    #[test]
    fn test_no_present_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("llama-server");
        std::fs::write(&server, b"").unwrap();

        let mut config = LorewrightConfig::default();
        config.models.clear();
        config.models.insert("general-purpose".to_string(), dir.path().join("general.gguf"));
        config.models.insert("mature-content".to_string(), dir.path().join("mature.gguf"));
        config.server.executable_path = server;
        config.output.directory = dir.path().to_path_buf();

        let report = check_installation(&config);
        assert!(!report.is_ready());
        let failed: Vec<_> = report.failures().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, vec!["models"]);
    }
}
