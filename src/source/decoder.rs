//! ffmpeg-based decoding of a video stream into raw RGB frames.

use super::probe::VideoInfo;
use super::FrameSource;
use crate::error::{MediaError, MediaResult, StderrDrain};
use crate::segmentation::Frame;
use anyhow::Result;
use std::ffi::OsStr;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Reads fixed-size `rgb24` frames from a byte stream
pub struct FrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Next frame, or `None` at a clean end of stream
    ///
    /// A stream that ends partway through a frame is an error.
    pub fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        let expected = self.frame_bytes();
        let mut buf = vec![0u8; expected];
        let mut filled = 0;

        while filled < expected {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < expected {
            return Err(MediaError::FrameSize {
                expected,
                actual: filled,
            });
        }

        Frame::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or(MediaError::FrameSize {
                expected,
                actual: filled,
            })
    }
}

/// An opened source video, yielding frames in presentation order
///
/// Reopening the file starts the sequence over.
pub struct VideoDecoder {
    child: Child,
    frames: FrameReader<BufReader<ChildStdout>>,
    stderr: StderrDrain,
    frame_count: u64,
}

impl VideoDecoder {
    /// Spawn ffmpeg decoding the first video stream of `input`
    pub fn open(input: &Path, info: &VideoInfo) -> MediaResult<Self> {
        Self::open_with("ffmpeg", input, info)
    }

    /// Same as [`VideoDecoder::open`] with an explicit ffmpeg binary
    pub fn open_with(
        program: impl AsRef<OsStr>,
        input: &Path,
        info: &VideoInfo,
    ) -> MediaResult<Self> {
        tracing::info!(
            "Opening {} for decoding ({}x{} @ {})",
            input.display(),
            info.width,
            info.height,
            info.frame_rate
        );

        let mut child = Command::new(program)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(input)
            .args([
                "-map",
                "0:v:0",
                // One output frame per decoded frame: no duplication or dropping
                "-fps_mode",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => MediaError::ToolNotFound("ffmpeg"),
                _ => MediaError::Io(e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Io(std::io::Error::other("ffmpeg decoder has no stdout")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::Io(std::io::Error::other("ffmpeg decoder has no stderr")))?;

        Ok(Self {
            child,
            frames: FrameReader::new(BufReader::new(stdout), info.width, info.height),
            stderr: StderrDrain::spawn(stderr),
            frame_count: 0,
        })
    }

    /// Wait for ffmpeg to exit and report decode errors
    pub fn finish(mut self) -> MediaResult<u64> {
        // Unread frames make ffmpeg fail on a closed pipe instead of blocking
        drop(self.frames);
        let status = self.child.wait()?;
        let stderr = self.stderr.join(5);

        if !status.success() {
            return Err(MediaError::FfmpegFailed {
                stage: "decode",
                status,
                stderr,
            });
        }

        tracing::debug!("Decoder finished after {} frames", self.frame_count);
        Ok(self.frame_count)
    }

    /// Stop decoding early and reap the ffmpeg process
    pub fn abort(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = self.stderr.join(0);
    }
}

impl FrameSource for VideoDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.frames.read_frame()?;
        if frame.is_some() {
            self.frame_count += 1;
        }
        Ok(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.frames.width, self.frames.height)
    }
}
