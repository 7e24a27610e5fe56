use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::errors::{AppError, AppResult};

/// Resolve the ffmpeg binary: explicit path first, then PATH.
pub fn locate_ffmpeg(configured: Option<&Path>) -> AppResult<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            debug!("Using configured ffmpeg at {}", path.display());
            return Ok(path.to_path_buf());
        }
        return Err(AppError::Configuration(format!(
            "Configured ffmpeg not found at {}",
            path.display()
        )));
    }

    which::which("ffmpeg")
        .map_err(|e| AppError::Configuration(format!("ffmpeg not found in PATH: {}", e)))
}

/// First line of `ffmpeg -version`, for startup diagnostics.
pub fn ffmpeg_version(path: &Path) -> AppResult<String> {
    let output = Command::new(path)
        .arg("-version")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(AppError::Configuration(format!(
            "ffmpeg -version failed with status: {}",
            output.status
        )));
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    let first_line = version_str.lines().next().unwrap_or("").to_string();
    info!("Found {}", first_line);
    Ok(first_line)
}
