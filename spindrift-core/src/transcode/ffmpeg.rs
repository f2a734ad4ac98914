//! FFmpeg subprocess transcoder.
//!
//! Feeds the input stream into ffmpeg's stdin and lets it write the
//! encoded file directly, so no intermediate copy of the source ever
//! touches disk. Stdin feeding and child supervision run concurrently;
//! stderr is captured for error reporting.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::Command;

use super::{EncodeSettings, TranscodeError, Transcoder};

/// Production transcoder shelling out to the ffmpeg binary.
pub struct FfmpegTranscoder {
    ffmpeg_path: Option<PathBuf>,
}

impl FfmpegTranscoder {
    /// Creates a transcoder with an optional custom binary path.
    ///
    /// Without an override the binary is resolved from `PATH`.
    pub fn new(ffmpeg_path: Option<PathBuf>) -> Self {
        Self { ffmpeg_path }
    }

    fn binary(&self) -> &Path {
        self.ffmpeg_path.as_deref().unwrap_or(Path::new("ffmpeg"))
    }

    fn build_command(&self, settings: &EncodeSettings, destination: &Path) -> Command {
        let mut cmd = Command::new(self.binary());

        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg("pipe:0");

        // Audio-only output
        cmd.arg("-vn")
            .arg("-acodec")
            .arg(&settings.audio_codec)
            .arg("-b:a")
            .arg(format!("{}k", settings.effective_bitrate()))
            .arg("-id3v2_version")
            .arg(settings.id3_version.to_string())
            .arg("-f")
            .arg(&settings.container);

        cmd.arg("-y").arg(destination);

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn encode(
        &self,
        mut input: Box<dyn AsyncRead + Send + Unpin>,
        settings: &EncodeSettings,
        destination: &Path,
    ) -> Result<(), TranscodeError> {
        let mut child =
            self.build_command(settings, destination)
                .spawn()
                .map_err(|error| match error.kind() {
                    io::ErrorKind::NotFound => TranscodeError::BinaryNotFound {
                        path: self.binary().display().to_string(),
                    },
                    _ => TranscodeError::SpawnFailed {
                        reason: error.to_string(),
                    },
                })?;

        let mut stdin = child.stdin.take().ok_or_else(|| TranscodeError::SpawnFailed {
            reason: "encoder stdin unavailable".to_string(),
        })?;

        tracing::debug!(
            "encoding to {} at {}k via {}",
            destination.display(),
            settings.effective_bitrate(),
            self.binary().display()
        );

        // Feed stdin while supervising the child; dropping stdin signals
        // EOF so ffmpeg can finalize the container.
        let feed = async {
            let copied = tokio::io::copy(&mut input, &mut stdin).await;
            drop(stdin);
            copied
        };
        let (copied, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.map_err(|error| TranscodeError::SpawnFailed {
            reason: error.to_string(),
        })?;

        if !output.status.success() {
            // A stalled input is the root cause even when ffmpeg also
            // complains about the truncated stream.
            if let Err(error) = &copied {
                if error.kind() == io::ErrorKind::TimedOut {
                    return Err(TranscodeError::InputStalled {
                        reason: error.to_string(),
                    });
                }
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match stderr.trim() {
                "" => format!("ffmpeg exited with {}", output.status),
                message => message.to_string(),
            };
            return Err(TranscodeError::EncoderFailed { reason });
        }

        match copied {
            Ok(bytes) => {
                tracing::debug!("encoded {bytes} bytes into {}", destination.display());
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::TimedOut => {
                Err(TranscodeError::InputStalled {
                    reason: error.to_string(),
                })
            }
            // The encoder closed stdin early but still exited cleanly; it
            // finished with the bytes it had.
            Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            Err(error) => Err(TranscodeError::Io(error)),
        }
    }

    fn is_available(&self) -> bool {
        std::process::Command::new(self.binary())
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_command_encodes_audio_only_mp3() {
        let transcoder = FfmpegTranscoder::new(None);
        let settings = EncodeSettings::with_audio_bitrate(Some(128));
        let cmd = transcoder.build_command(&settings, Path::new("/tmp/out.mp3"));
        let args = args_of(&cmd);

        assert_eq!(cmd.as_std().get_program(), "ffmpeg");
        for expected in [
            "-i",
            "pipe:0",
            "-vn",
            "-acodec",
            "libmp3lame",
            "-b:a",
            "128k",
            "-id3v2_version",
            "4",
            "-f",
            "mp3",
            "-y",
            "/tmp/out.mp3",
        ] {
            assert!(args.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_command_uses_default_bitrate_when_unreported() {
        let transcoder = FfmpegTranscoder::new(None);
        let cmd = transcoder.build_command(&EncodeSettings::default(), Path::new("/tmp/out.mp3"));

        assert!(args_of(&cmd).contains(&"192k".to_string()));
    }

    #[test]
    fn test_binary_path_override() {
        let transcoder = FfmpegTranscoder::new(Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
        let cmd = transcoder.build_command(&EncodeSettings::default(), Path::new("/tmp/out.mp3"));

        assert_eq!(cmd.as_std().get_program(), "/opt/ffmpeg/bin/ffmpeg");
    }

    #[tokio::test]
    async fn test_missing_binary_reports_binary_not_found() {
        let dir = tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(Some(dir.path().join("no-such-ffmpeg")));

        let error = transcoder
            .encode(
                Box::new(tokio::io::empty()),
                &EncodeSettings::default(),
                &dir.path().join("out.mp3"),
            )
            .await
            .unwrap_err();

        assert!(matches!(error, TranscodeError::BinaryNotFound { .. }));
        assert!(!transcoder.is_available());
    }
}
