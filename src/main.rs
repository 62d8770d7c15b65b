mod effects;
mod error;
mod output;
mod paths;
mod segmentation;
mod source;
#[cfg(test)]
mod test_support;
mod transcode;

use anyhow::{Context, Result};
use clap::Parser;
use effects::BackgroundBlur;
use segmentation::ModelSelection;
use std::path::PathBuf;
use std::time::Instant;

/// Blur the background behind the person in a video.
///
/// Reads the video's file name from stdin and prints the output file name on stdout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding input and output videos
    /// Defaults to `videos/` one level above the executable
    #[arg(long)]
    videos_dir: Option<PathBuf>,

    /// Path to the selfie segmentation model (ONNX file)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Which selfie segmentation variant the model file is
    #[arg(long, value_enum, default_value_t = ModelSelection::Landscape)]
    model_selection: ModelSelection,

    /// Write the segmentation mask instead of the blurred composite
    #[arg(long)]
    show_mask: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for the output file name
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let key = paths::read_key(&mut std::io::stdin().lock())?;

    let videos_dir = match args.videos_dir {
        Some(dir) => dir,
        None => paths::default_videos_dir()?,
    };
    let input = paths::resolve_input(&videos_dir, &key);

    let model_path = match args.model {
        Some(path) => path,
        None => paths::default_model_path()?,
    };

    let start = Instant::now();

    // One model for the whole video
    let model = segmentation::create_default_model(&model_path, args.model_selection)
        .context("Failed to load segmentation model")?;
    let mut processor = BackgroundBlur::new(model).with_mask_preview(args.show_mask);

    let output = transcode::convert_video(&input, &mut processor)
        .with_context(|| format!("Failed to blur background of {}", input.display()))?;

    println!("{}", paths::display_name(&output));

    let total_minutes = start.elapsed().as_secs_f64() / 60.0;
    tracing::debug!("Background blur time: {:.2} min", total_minutes);

    Ok(())
}
