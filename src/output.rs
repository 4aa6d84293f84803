//! Saving generated artifacts

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::pipeline::GenerationResult;
use crate::prompt::{templates, OutputFormat};
use crate::LorewrightError;

/// Subdirectory for content types outside the catalogue
pub const FALLBACK_SUBDIR: &str = "misc";

/// Output subdirectory for a content type
pub fn subdir_for(content_type: &str) -> &'static str {
    templates::lookup(content_type)
        .map(|c| c.subdir)
        .unwrap_or(FALLBACK_SUBDIR)
}

/// `<content-type>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn default_filename(content_type: &str, format: OutputFormat, at: DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        content_type,
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Write `result` under `output_dir/<subdir>/` and return the file path
///
/// Without a `filename` a timestamped default name is used. Only the final
/// component of `filename` is kept, so the file never lands outside the
/// content type's directory.
pub fn save(
    result: &GenerationResult,
    output_dir: &Path,
    filename: Option<&str>,
) -> Result<PathBuf, LorewrightError> {
    let dir = output_dir.join(subdir_for(&result.content_type));
    std::fs::create_dir_all(&dir)?;

    let name = filename
        .and_then(|name| Path::new(name.trim()).file_name())
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| {
            default_filename(&result.content_type, result.format, Local::now()).into()
        });
    let path = dir.join(name);
    std::fs::write(&path, &result.text)?;

    info!(path = %path.display(), "Saved output");
    Ok(path)
}
