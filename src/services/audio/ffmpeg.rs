use std::path::{Path, PathBuf};
use std::process::Stdio;

use bytes::Bytes;
use log::{debug, error, info};
use tokio::process::Command;

use super::filters::FilterProgram;
use crate::errors::{AppError, AppResult};
use crate::utils::tools::locate_ffmpeg;

/// Runs a [`FilterProgram`] over an encoded audio buffer.
#[async_trait::async_trait]
pub trait FilterGraphExecutor: Send + Sync {
    async fn execute(&self, input: Bytes, program: &FilterProgram) -> AppResult<Bytes>;
}

/// Executor backed by the `ffmpeg` binary, one process per call.
#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    binary: PathBuf,
    sample_rate: u32,
    output_format: String,
    temp_dir: PathBuf,
}

impl FfmpegExecutor {
    pub fn new(binary: PathBuf, sample_rate: u32, output_format: &str, temp_dir: PathBuf) -> Self {
        Self {
            binary,
            sample_rate,
            output_format: output_format.to_string(),
            temp_dir,
        }
    }

    /// Finds ffmpeg via the configured path or PATH.
    pub fn discover(
        configured: Option<&Path>,
        sample_rate: u32,
        output_format: &str,
        temp_dir: PathBuf,
    ) -> AppResult<Self> {
        let binary = locate_ffmpeg(configured)?;
        info!("Using ffmpeg at {}", binary.display());
        Ok(Self::new(binary, sample_rate, output_format, temp_dir))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait::async_trait]
impl FilterGraphExecutor for FfmpegExecutor {
    async fn execute(&self, input: Bytes, program: &FilterProgram) -> AppResult<Bytes> {
        if program.is_empty() {
            return Ok(input);
        }

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let workdir = tempfile::tempdir_in(&self.temp_dir)?;
        let input_path = workdir.path().join("input");
        let output_path = workdir.path().join(format!("output.{}", self.output_format));
        tokio::fs::write(&input_path, &input).await?;

        let graph = program.to_filter_graph(self.sample_rate);
        debug!("ffmpeg -af {}", graph);

        let output = Command::new(&self.binary)
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(&input_path)
            .arg("-af")
            .arg(&graph)
            .arg(&output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                error!("Failed to spawn ffmpeg: {}", e);
                AppError::ProviderFailure("audio processing failed".to_string())
            })?;

        if !output.status.success() {
            error!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(AppError::ProviderFailure("audio processing failed".to_string()));
        }

        let processed = tokio::fs::read(&output_path).await?;
        Ok(Bytes::from(processed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audio::filters::AudioFilter;

    #[tokio::test]
    async fn empty_program_returns_input_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // бинарь не нужен, пустая программа до него не доходит
        let executor = FfmpegExecutor::new(
            dir.path().join("missing-ffmpeg"),
            44100,
            "mp3",
            dir.path().to_path_buf(),
        );
        let input = Bytes::from_static(b"audio");
        let output = executor.execute(input.clone(), &FilterProgram::new()).await.unwrap();
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn spawn_failure_is_a_provider_failure() {
        let dir = tempfile::tempdir().unwrap();
        let executor = FfmpegExecutor::new(
            dir.path().join("missing-ffmpeg"),
            44100,
            "mp3",
            dir.path().to_path_buf(),
        );
        let program = FilterProgram::from(vec![AudioFilter::Denoise]);
        let err = executor
            .execute(Bytes::from_static(b"audio"), &program)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProviderFailure(_)));
    }
}
