//! ffprobe video and audio stream information.

use crate::error::{MediaError, MediaResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Source video metadata
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate as ffprobe reports it (e.g. "30000/1001"), passed verbatim to the encoder
    pub frame_rate: String,
    /// Frame rate (fps)
    pub fps: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Frame count when the container records it
    pub frame_count: Option<u64>,
    /// First audio stream, if any
    pub audio: Option<AudioTrack>,
}

/// Audio stream carried over unmodified from the source container
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    /// Container the audio is read from
    pub source: PathBuf,
    /// Index among the container's audio streams (ffmpeg `a:<index>`)
    pub stream_index: usize,
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    /// Duration in seconds
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Display rotation in degrees, from the display matrix or the legacy `rotate` tag
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.parse().ok())
            })
            .map(|r: f64| r.round() as i64)
            .unwrap_or(0)
    }
}

/// Probe a video file with ffprobe
pub fn probe_video(path: &Path) -> MediaResult<VideoInfo> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::ToolNotFound("ffprobe"),
            _ => MediaError::Io(e),
        })?;

    if !output.status.success() {
        return Err(MediaError::ProbeFailed {
            path: path.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_probe_output(path, &output.stdout)
}

/// Turn ffprobe's JSON into [`VideoInfo`]
pub fn parse_probe_output(path: &Path, json: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::NoVideoStream(path.to_path_buf()))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(MediaError::InvalidMetadata(format!(
                "video stream has no dimensions ({:?}x{:?})",
                video.width, video.height
            )))
        }
    };

    // ffmpeg autorotates while decoding, so frames come out in display orientation
    let (width, height) = if video.rotation().rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    };

    // r_frame_rate is the stream's base rate; it matches what the decoder emits with passthrough timing
    let (frame_rate, fps) = [video.r_frame_rate.as_deref(), video.avg_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|r| parse_frame_rate(r).map(|fps| (r.to_string(), fps)))
        .ok_or_else(|| MediaError::InvalidMetadata("video stream has no frame rate".to_string()))?;

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| parse_f64(f.duration.as_deref()))
        .or_else(|| parse_f64(video.duration.as_deref()))
        .unwrap_or(0.0);

    let frame_count = video.nb_frames.as_deref().and_then(|n| n.parse().ok());

    let audio = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .map(|s| AudioTrack {
            source: path.to_path_buf(),
            stream_index: 0,
            codec: s.codec_name.clone().unwrap_or_default(),
            sample_rate: s.sample_rate.as_deref().and_then(|r| r.parse().ok()),
            channels: s.channels,
            duration: parse_f64(s.duration.as_deref()),
        });

    Ok(VideoInfo {
        width,
        height,
        frame_rate,
        fps,
        duration,
        frame_count,
        audio,
    })
}

fn parse_f64(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.parse().ok())
}

/// Parse frame rate string (e.g., "30/1" or "29.97"); zero rates are rejected
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let fps = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.trim().parse().ok()?
    };
    (fps > 0.0).then_some(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "width": 1280,
                "height": 720,
                "r_frame_rate": "30000/1001",
                "avg_frame_rate": "30000/1001",
                "duration": "10.010000",
                "nb_frames": "300"
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "48000",
                "channels": 2,
                "duration": "10.005333"
            }
        ],
        "format": {
            "filename": "clip.mp4",
            "duration": "10.010000"
        }
    }"#;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("0/1"), None);
        assert_eq!(parse_frame_rate("n/a"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(Path::new("videos/clip.mp4"), PROBE_JSON.as_bytes()).unwrap();

        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.frame_rate, "30000/1001");
        assert!((info.fps - 29.97).abs() < 0.01);
        assert!((info.duration - 10.01).abs() < 1e-6);
        assert_eq!(info.frame_count, Some(300));

        let audio = info.audio.unwrap();
        assert_eq!(audio.source, PathBuf::from("videos/clip.mp4"));
        assert_eq!(audio.stream_index, 0);
        assert_eq!(audio.codec, "aac");
        assert_eq!(audio.sample_rate, Some(48000));
        assert_eq!(audio.channels, Some(2));
    }

    #[test]
    fn test_probe_without_audio() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 64, "height": 48, "r_frame_rate": "25/1"}]}"#;
        let info = parse_probe_output(Path::new("silent.mp4"), json.as_bytes()).unwrap();

        assert!(info.audio.is_none());
        assert_eq!(info.frame_rate, "25/1");
        assert_eq!(info.duration, 0.0);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn test_falls_back_to_avg_frame_rate() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 64, "height": 48, "r_frame_rate": "0/0", "avg_frame_rate": "24/1"}]}"#;
        let info = parse_probe_output(Path::new("a.mp4"), json.as_bytes()).unwrap();
        assert_eq!(info.frame_rate, "24/1");
    }

    #[test]
    fn test_rotated_stream_swaps_dimensions() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}]}"#;
        let info = parse_probe_output(Path::new("phone.mp4"), json.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "tags": {"rotate": "180"}}]}"#;
        let info = parse_probe_output(Path::new("upside_down.mp4"), json.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn test_audio_only_file_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "aac"}]}"#;
        let err = parse_probe_output(Path::new("song.mp4"), json.as_bytes()).unwrap_err();
        assert!(matches!(err, MediaError::NoVideoStream(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe_video(&dir.path().join("nope.mp4")).unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
