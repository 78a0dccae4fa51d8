use std::time::Instant;

use anyhow::Result;
use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, ModelOutput, Speed};

/// Stub backend. Returns a fixed raw detection set, filtered by threshold.
///
/// The image content is ignored.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    raw: Vec<Detection>,
}

impl StubBackend {
    pub fn new(raw: Vec<Detection>) -> Self {
        Self { raw }
    }

    /// Stub that never detects anything.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn predict(&self, _image: &RgbImage, confidence_threshold: f32) -> Result<ModelOutput> {
        let start = Instant::now();
        let detections: Vec<Detection> = self
            .raw
            .iter()
            .filter(|det| det.confidence >= confidence_threshold)
            .copied()
            .collect();
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;

        Ok(ModelOutput {
            detections,
            speed: Speed {
                preprocess: 0.0,
                inference: elapsed,
                postprocess: 0.0,
            },
        })
    }
}
