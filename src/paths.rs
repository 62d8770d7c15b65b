use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Suffix stripped from the input name before deriving the output name
pub const INPUT_EXTENSION: &str = ".mp4";

/// Marker inserted between the input stem and the extension
pub const OUTPUT_SUFFIX: &str = "-backgroundblur";

/// Directory next to the executable's parent, where videos live by default
pub fn default_videos_dir() -> Result<PathBuf> {
    Ok(install_root()?.join("videos"))
}

/// Default location of the selfie segmentation model
pub fn default_model_path() -> Result<PathBuf> {
    Ok(install_root()?
        .join("models")
        .join("selfie_segmentation_landscape.onnx"))
}

fn install_root() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let exe_dir = exe
        .parent()
        .context("Executable path has no parent directory")?;
    Ok(exe_dir.join(".."))
}

/// Read the video key from the first line of `reader`
pub fn read_key<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read video name from stdin")?;

    // Only the line terminator is stripped; spaces can be part of a file name
    let key = line.trim_end_matches(['\r', '\n']);
    if key.is_empty() {
        bail!("No video name given on stdin");
    }
    Ok(key.to_string())
}

pub fn resolve_input(videos_dir: &Path, key: &str) -> PathBuf {
    videos_dir.join(key)
}

/// `clip.mp4` -> `clip-backgroundblur.mp4`, in the same directory
pub fn output_path_for(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(INPUT_EXTENSION).unwrap_or(&name);
    input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}{INPUT_EXTENSION}"))
}

/// Base name printed on stdout once the output is written
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_output_path_strips_mp4() {
        let out = output_path_for(Path::new("/srv/videos/clip.mp4"));
        assert_eq!(out, PathBuf::from("/srv/videos/clip-backgroundblur.mp4"));
    }

    #[test]
    fn test_output_path_only_strips_trailing_extension() {
        let out = output_path_for(Path::new("videos/a.mp4.backup.mp4"));
        assert_eq!(out, PathBuf::from("videos/a.mp4.backup-backgroundblur.mp4"));

        // Directory names containing ".mp4" are left alone
        let out = output_path_for(Path::new("raw.mp4s/talk.mp4"));
        assert_eq!(out, PathBuf::from("raw.mp4s/talk-backgroundblur.mp4"));
    }

    #[test]
    fn test_output_path_without_extension() {
        let out = output_path_for(Path::new("videos/clip.mov"));
        assert_eq!(out, PathBuf::from("videos/clip.mov-backgroundblur.mp4"));
    }

    #[test]
    fn test_display_name_is_base_name() {
        let out = output_path_for(&resolve_input(Path::new("/data/videos"), "clip.mp4"));
        assert_eq!(display_name(&out), "clip-backgroundblur.mp4");
    }

    #[test]
    fn test_read_key_trims_newline() {
        let mut input = Cursor::new("meeting.mp4\r\nignored\n");
        assert_eq!(read_key(&mut input).unwrap(), "meeting.mp4");
    }

    #[test]
    fn test_read_key_rejects_empty_input() {
        assert!(read_key(&mut Cursor::new("")).is_err());
        assert!(read_key(&mut Cursor::new("\n")).is_err());
        assert!(read_key(&mut Cursor::new("\r\n")).is_err());
    }

    #[test]
    fn test_read_key_keeps_surrounding_spaces() {
        assert_eq!(read_key(&mut Cursor::new(" clip.mp4\n")).unwrap(), " clip.mp4");
        assert_eq!(read_key(&mut Cursor::new("my clip.mp4 ")).unwrap(), "my clip.mp4 ");
    }
}
