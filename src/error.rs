use std::io::Read;
use std::path::PathBuf;
use std::thread::JoinHandle;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised while probing, decoding or encoding video through ffmpeg
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("Input video not found: {0}")]
    FileNotFound(PathBuf),

    #[error("ffprobe failed for {path}: {stderr}")]
    ProbeFailed { path: PathBuf, stderr: String },

    #[error("No video stream in {0}")]
    NoVideoStream(PathBuf),

    #[error("Invalid video metadata: {0}")]
    InvalidMetadata(String),

    #[error("ffmpeg {stage} failed with {status}:\n{stderr}")]
    FfmpegFailed {
        stage: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keep the last few lines of a tool's stderr for error reports
pub fn stderr_tail(stderr: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let tail: Vec<&str> = text.lines().rev().take(lines).collect();
    tail.into_iter().rev().collect::<Vec<_>>().join("\n")
}

/// Bytes of stderr kept for error reports
const STDERR_KEEP: usize = 16 * 1024;

/// Reads a child's stderr on its own thread so the child never blocks on a full pipe
///
/// Only the most recent output is kept.
pub struct StderrDrain {
    handle: JoinHandle<Vec<u8>>,
}

impl StderrDrain {
    pub fn spawn<R: Read + Send + 'static>(mut stderr: R) -> Self {
        let handle = std::thread::spawn(move || {
            let mut kept = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                match stderr.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        kept.extend_from_slice(&chunk[..n]);
                        if kept.len() > 2 * STDERR_KEEP {
                            kept.drain(..kept.len() - STDERR_KEEP);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            kept
        });
        Self { handle }
    }

    /// Wait for the pipe to close and return the last `lines` lines
    pub fn join(self, lines: usize) -> String {
        match self.handle.join() {
            Ok(bytes) => stderr_tail(&bytes, lines),
            Err(_) => String::from("<stderr reader panicked>"),
        }
    }
}
