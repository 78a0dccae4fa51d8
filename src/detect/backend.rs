use anyhow::Result;
use image::RgbImage;

use crate::detect::result::ModelOutput;

/// Detector backend trait.
///
/// A backend wraps one loaded model. It is built once at startup and only
/// read afterwards, so `predict` takes `&self`.
///
/// # Threshold contract
///
/// `predict` must exclude every detection whose confidence is below
/// `confidence_threshold`. Detections exactly at the threshold are kept.
/// Callers do not re-filter.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on an RGB image.
    fn predict(&self, image: &RgbImage, confidence_threshold: f32) -> Result<ModelOutput>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}
