//! Helpers shared by tests that drive real or stand-in ffmpeg processes.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

/// Write an executable shell script standing in for ffmpeg
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Shell snippet writing `bytes` bytes of noise to stderr
pub fn stderr_noise(bytes: usize) -> String {
    format!("head -c {bytes} /dev/zero | tr '\\000' 'x' >&2; printf '\\n' >&2")
}

/// Run `f` on another thread and fail the test if it does not return in time
pub fn within<T, F>(timeout: Duration, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout)
        .unwrap_or_else(|_| panic!("still running after {timeout:?}"))
}

/// True when `ffmpeg` and `ffprobe` are on PATH and ffmpeg can encode H.264
pub fn ffmpeg_available() -> bool {
    let ffprobe_ok = Command::new("ffprobe")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    let encoders = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stderr(Stdio::null())
        .output();

    match encoders {
        Ok(out) if ffprobe_ok && out.status.success() => {
            String::from_utf8_lossy(&out.stdout).contains("libx264")
        }
        _ => false,
    }
}
