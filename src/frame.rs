use crate::error::SensorError;
use async_trait::async_trait;
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

pub type Frame = DynamicImage;

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Result<Frame, SensorError>;
}

pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs an external capture command that writes a single encoded image to
/// stdout, e.g. ffmpeg reading one frame from the default camera.
#[derive(Debug, Clone)]
pub struct CommandFrameSource {
    argv: Vec<String>,
    capture_timeout: Duration,
}

impl CommandFrameSource {
    pub fn new(argv: Vec<String>, capture_timeout: Duration) -> Self {
        Self {
            argv,
            capture_timeout,
        }
    }
}

#[async_trait]
impl FrameSource for CommandFrameSource {
    async fn capture(&self) -> Result<Frame, SensorError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(SensorError::unavailable("no capture command configured"));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.capture_timeout, command.output())
            .await
            .map_err(|_| {
                SensorError::unavailable(format!(
                    "{program} timed out after {:.0}s",
                    self.capture_timeout.as_secs_f32()
                ))
            })?
            .map_err(|err| SensorError::unavailable(format!("failed to run {program}: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SensorError::unavailable(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(SensorError::unavailable(format!(
                "{program} produced no image data"
            )));
        }

        decode(output.stdout).await
    }
}

#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn capture(&self) -> Result<Frame, SensorError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
            SensorError::unavailable(format!("failed to read {}: {err}", self.path.display()))
        })?;
        decode(bytes).await
    }
}

async fn decode(bytes: Vec<u8>) -> Result<Frame, SensorError> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|err| SensorError::unavailable(format!("frame decoder failed to join: {err}")))?
        .map_err(|err| SensorError::unavailable(format!("failed to decode frame: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{CommandFrameSource, FileFrameSource, FrameSource};
    use image::{GrayImage, Luma};
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_png(path: &std::path::Path) {
        GrayImage::from_pixel(4, 3, Luma([200]))
            .save(path)
            .expect("write png");
    }

    #[tokio::test]
    async fn file_source_decodes_png() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("frame.png");
        write_png(&path);

        let frame = FileFrameSource::new(&path).capture().await.expect("frame");
        assert_eq!((frame.width(), frame.height()), (4, 3));
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let temp = tempdir().expect("tempdir");
        let err = FileFrameSource::new(temp.path().join("nope.png"))
            .capture()
            .await
            .expect_err("missing file");
        assert!(err.to_string().starts_with("camera unavailable"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_source_reads_stdout() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("frame.png");
        write_png(&path);

        let source = CommandFrameSource::new(
            vec!["cat".to_string(), path.display().to_string()],
            Duration::from_secs(5),
        );
        let frame = source.capture().await.expect("frame");
        assert_eq!(frame.width(), 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_unavailable() {
        let source = CommandFrameSource::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo busy >&2; exit 3".to_string(),
            ],
            Duration::from_secs(5),
        );
        let err = source.capture().await.expect_err("command fails");
        assert!(err.to_string().contains("busy"));
    }

    #[tokio::test]
    async fn empty_command_is_unavailable() {
        let source = CommandFrameSource::new(Vec::new(), Duration::from_secs(1));
        assert!(source.capture().await.is_err());
    }
}
