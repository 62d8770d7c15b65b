mod preprocess;
mod selfie;
pub mod types;

pub use preprocess::Preprocessor;
pub use selfie::ModelSelection;
pub use types::{Frame, SegmentationMask, SegmentationModel};

use anyhow::Result;
use selfie::SelfieSegmentation;
use std::path::Path;

/// Create the default segmentation model (selfie segmentation)
pub fn create_default_model(
    model_path: &Path,
    selection: ModelSelection,
) -> Result<Box<dyn SegmentationModel>> {
    let model = SelfieSegmentation::new(model_path, selection)?;
    Ok(Box::new(model))
}
