use crate::effects::FrameProcessor;
use crate::error::MediaResult;
use crate::output::{EncodeSettings, OutputSink, VideoEncoder, AUDIO_CODEC};
use crate::paths::output_path_for;
use crate::source::{probe_video, FrameSource, VideoDecoder};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Blur the background of every frame of `input`, keep its audio, and write the
/// result next to it. Returns the output path.
pub fn convert_video<P: FrameProcessor>(input: &Path, processor: &mut P) -> Result<PathBuf> {
    let info = probe_video(input).with_context(|| format!("Failed to probe {}", input.display()))?;
    let output = output_path_for(input);

    tracing::info!(
        "Source: {}x{} @ {:.2} fps, {:.2}s",
        info.width,
        info.height,
        info.fps,
        info.duration
    );

    let settings = EncodeSettings::new(info.width, info.height, info.frame_rate.clone());
    let settings = match info.audio.clone() {
        Some(track) => {
            tracing::info!(
                "Reattaching {} audio ({:?} Hz, {:?} channels, {:?}s) as {}",
                track.codec,
                track.sample_rate,
                track.channels,
                track.duration,
                AUDIO_CODEC
            );
            settings.with_audio(track)
        }
        None => {
            tracing::warn!("{} has no audio stream; writing video only", input.display());
            settings
        }
    };

    let mut decoder = VideoDecoder::open(input, &info).context("Failed to open video for decoding")?;
    let mut encoder = VideoEncoder::new(&settings, &output).context("Failed to start encoder")?;

    let processed = match run_pipeline(&mut decoder, processor, &mut encoder) {
        Ok(processed) => processed,
        Err(err) => {
            decoder.abort();
            return Err(with_encoder_failure(err, encoder.finish()));
        }
    };

    let decoded = decoder.finish().context("Failed to decode video")?;
    let encoded = encoder.finish().context("Failed to encode video")?;

    anyhow::ensure!(
        decoded == encoded && encoded == processed,
        "Frame count mismatch: decoded {}, processed {}, encoded {}",
        decoded,
        processed,
        encoded
    );

    if let Some(expected) = info.frame_count {
        if expected != encoded {
            tracing::warn!(
                "Container reports {} frames but {} were decoded",
                expected,
                encoded
            );
        }
    }

    tracing::info!("Wrote {} frames to {}", encoded, output.display());
    Ok(output)
}

/// A frame write fails when the encoder exits early; its exit status and stderr say why
fn with_encoder_failure(err: anyhow::Error, encoded: MediaResult<u64>) -> anyhow::Error {
    match encoded {
        Ok(_) => err,
        Err(encode_err) => err.context(format!("Encoder stopped early: {encode_err}")),
    }
}

/// Pull every frame from `source`, transform it and push it to `sink`, in order
///
/// Returns the number of frames processed.
pub fn run_pipeline<S, P, O>(source: &mut S, processor: &mut P, sink: &mut O) -> Result<u64>
where
    S: FrameSource,
    P: FrameProcessor + ?Sized,
    O: OutputSink,
{
    let mut frame_count = 0u64;
    let mut total_decode_time = Duration::ZERO;
    let mut total_process_time = Duration::ZERO;
    let mut total_encode_time = Duration::ZERO;

    let (width, height) = source.resolution();
    anyhow::ensure!(
        sink.resolution() == (width, height),
        "Output is {:?}, source is {}x{}",
        sink.resolution(),
        width,
        height
    );
    tracing::info!("Starting pipeline at {}x{}", width, height);

    loop {
        let decode_start = Instant::now();
        let Some(frame) = source.next_frame().context("Failed to decode frame")? else {
            break;
        };
        total_decode_time += decode_start.elapsed();

        let process_start = Instant::now();
        let output_frame = processor
            .process(&frame)
            .with_context(|| format!("Failed to process frame {}", frame_count))?;
        total_process_time += process_start.elapsed();

        let encode_start = Instant::now();
        sink.write_frame(&output_frame)
            .context("Failed to write frame")?;
        total_encode_time += encode_start.elapsed();

        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            let avg_decode_ms = total_decode_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_process_ms = total_process_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_encode_ms = total_encode_time.as_secs_f64() * 1000.0 / frame_count as f64;

            tracing::debug!(
                "Frame {}: decode={:.1}ms, process={:.1}ms, encode={:.1}ms",
                frame_count,
                avg_decode_ms,
                avg_process_ms,
                avg_encode_ms
            );
        }
    }

    tracing::info!("Processed {} frames", frame_count);
    Ok(frame_count)
}
