//! FFmpeg-based video encoding for raw RGB frames
//!
//! Frames are piped to ffmpeg's stdin; the source audio track is mapped in from the
//! original container and re-encoded as AAC.

use super::OutputSink;
use crate::error::{MediaError, MediaResult, StderrDrain};
use crate::segmentation::Frame;
use crate::source::AudioTrack;
use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};

/// Audio codec for the reattached track
pub const AUDIO_CODEC: &str = "aac";

/// Video codec for the processed frames
pub const VIDEO_CODEC: &str = "libx264";

/// What the encoder produces: frame geometry, rate, and the audio to carry over
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    /// Passed to ffmpeg's `-framerate`, e.g. "30000/1001"
    pub frame_rate: String,
    pub audio: Option<AudioTrack>,
}

impl EncodeSettings {
    pub fn new(width: u32, height: u32, frame_rate: impl Into<String>) -> Self {
        Self {
            width,
            height,
            frame_rate: frame_rate.into(),
            audio: None,
        }
    }

    /// Settings that also carry `track` into the output
    #[must_use = "the returned settings carry the audio track; the original has none"]
    pub fn with_audio(self, track: AudioTrack) -> Self {
        Self {
            audio: Some(track),
            ..self
        }
    }

    /// Full ffmpeg argument list writing to `output`
    pub fn ffmpeg_args(&self, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            // Overwrite output
            "-y",
            // Errors only, no progress output
            "-v",
            "error",
            "-nostats",
            // Input: raw rgb24 frames on stdin
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push(format!("{}x{}", self.width, self.height).into());
        args.push("-framerate".into());
        args.push(self.frame_rate.clone().into());
        args.push("-i".into());
        args.push("pipe:0".into());

        if let Some(audio) = &self.audio {
            args.push("-i".into());
            args.push(audio.source.clone().into_os_string());
        }

        args.push("-map".into());
        args.push("0:v:0".into());

        if let Some(audio) = &self.audio {
            args.push("-map".into());
            args.push(format!("1:a:{}", audio.stream_index).into());
            args.push("-c:a".into());
            args.push(AUDIO_CODEC.into());
        }

        // yuv420p needs even dimensions
        if self.width % 2 != 0 || self.height % 2 != 0 {
            args.push("-vf".into());
            args.push("pad=ceil(iw/2)*2:ceil(ih/2)*2".into());
        }

        for arg in ["-c:v", VIDEO_CODEC, "-pix_fmt", "yuv420p"] {
            args.push(arg.into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

/// FFmpeg video encoder that accepts raw RGB frames via stdin
pub struct VideoEncoder {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stderr: StderrDrain,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl VideoEncoder {
    /// Spawn a new FFmpeg encoder process writing to `output`
    pub fn new(settings: &EncodeSettings, output: &Path) -> MediaResult<Self> {
        Self::new_with("ffmpeg", settings, output)
    }

    /// Same as [`VideoEncoder::new`] with an explicit ffmpeg binary
    pub fn new_with(
        program: impl AsRef<OsStr>,
        settings: &EncodeSettings,
        output: &Path,
    ) -> MediaResult<Self> {
        tracing::info!(
            "Encoding {}x{} @ {} to {} (audio: {})",
            settings.width,
            settings.height,
            settings.frame_rate,
            output.display(),
            settings
                .audio
                .as_ref()
                .map(|a| a.codec.as_str())
                .unwrap_or("none")
        );

        let mut child = Command::new(program)
            .args(settings.ffmpeg_args(output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => MediaError::ToolNotFound("ffmpeg"),
                _ => MediaError::Io(e),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::Io(std::io::Error::other("ffmpeg encoder has no stdin")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::Io(std::io::Error::other("ffmpeg encoder has no stderr")))?;

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stderr: StderrDrain::spawn(stderr),
            width: settings.width,
            height: settings.height,
            frame_count: 0,
        })
    }

    /// Finish encoding and wait for FFmpeg to complete
    ///
    /// An ffmpeg that already exited is reported with its own stderr, even when
    /// flushing the remaining frames failed on the closed pipe.
    pub fn finish(mut self) -> MediaResult<u64> {
        // Close stdin to signal end of input
        let flushed = self.stdin.flush();
        drop(self.stdin);

        let status = self.child.wait()?;
        let stderr = self.stderr.join(5);

        if !status.success() {
            return Err(MediaError::FfmpegFailed {
                stage: "encode",
                status,
                stderr,
            });
        }

        flushed?;
        Ok(self.frame_count)
    }
}

impl OutputSink for VideoEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            let expected = self.width as usize * self.height as usize * 3;
            return Err(MediaError::FrameSize {
                expected,
                actual: frame.as_raw().len(),
            }
            .into());
        }

        self.stdin
            .write_all(frame.as_raw())
            .context("Failed to write frame to ffmpeg")?;

        self.frame_count += 1;
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
