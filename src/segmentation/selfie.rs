use super::preprocess::Preprocessor;
use super::types::{Frame, SegmentationMask, SegmentationModel};
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Which selfie segmentation variant the ONNX file was exported from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModelSelection {
    /// Square 256x256 input (selection 0)
    General,
    /// Wide 256x144 input, better suited to video (selection 1)
    #[default]
    Landscape,
}

impl ModelSelection {
    /// Model input (width, height)
    pub fn input_size(self) -> (u32, u32) {
        match self {
            ModelSelection::General => (256, 256),
            ModelSelection::Landscape => (256, 144),
        }
    }
}

/// Selfie segmentation model
///
/// Stateless: every frame is segmented independently.
/// Takes a [1, H, W, 3] tensor in [0, 1] and returns a [1, H, W, 1] confidence map.
pub struct SelfieSegmentation {
    session: Session,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,
}

impl SelfieSegmentation {
    /// Load the model from an ONNX file
    pub fn new<P: AsRef<Path>>(model_path: P, selection: ModelSelection) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading selfie segmentation model ({:?}) from {}", selection, path.display());

        anyhow::ensure!(path.exists(), "Model file not found at {}", path.display());

        let model_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read model file {}", path.display()))?;

        let session = Session::builder()
            .map_err(|e| anyhow!("ORT session builder: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("ORT optimization level: {e}"))?
            .with_intra_threads(4)
            .map_err(|e| anyhow!("ORT intra threads: {e}"))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| anyhow!("Failed to load model from {}: {e}", path.display()))?;

        tracing::info!("Selfie segmentation model loaded successfully");

        let (width, height) = selection.input_size();
        let preprocessor = Preprocessor::new(width, height);

        Ok(Self {
            session,
            preprocessor,
            width,
            height,
        })
    }
}

impl SegmentationModel for SelfieSegmentation {
    fn segment(&mut self, frame: &Frame) -> Result<SegmentationMask> {
        let _span = tracing::debug_span!("selfie_segment").entered();

        let input = self.preprocessor.preprocess(frame)?;
        let shape = self.preprocessor.tensor_shape().to_vec();
        let tensor = Tensor::from_array((shape, input.into_raw_vec().into_boxed_slice()))
            .map_err(|e| anyhow!("Failed to create input tensor: {e}"))?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| anyhow!("Failed to run inference: {e}"))?;
        drop(_infer_span);

        // Single output, shape [1, H, W, 1]
        let (mask_shape, mask) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("Failed to extract mask tensor: {e}"))?;

        let (mask_height, mask_width) = match mask_shape.len() {
            3 | 4 => (mask_shape[1] as u32, mask_shape[2] as u32),
            _ => anyhow::bail!("Unexpected mask shape: {:?}", mask_shape),
        };

        let (frame_width, frame_height) = frame.dimensions();
        Preprocessor::postprocess_mask(mask, mask_width, mask_height, frame_width, frame_height)
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
