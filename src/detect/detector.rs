use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use image::DynamicImage;

use crate::config::{BackendKind, ModelSettings};
use crate::error::ModelLoadError;

use super::annotate::{annotate, bundled_font, load_label_font};
use super::backend::DetectorBackend;
use super::backends::StubBackend;
use super::result::DetectionResult;

/// Detector adapter: owns the single loaded backend for the process.
///
/// Built once at startup and handed to whatever serves requests. Nothing
/// here is cached globally.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    label_font: Option<FontArc>,
}

impl Detector {
    /// Wrap an already-constructed backend; boxes are labeled with the bundled font.
    pub fn new<B: DetectorBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Box::new(backend),
            label_font: bundled_font(),
        }
    }

    /// Replace the label font. `None` draws boxes only.
    pub fn with_label_font(mut self, font: Option<FontArc>) -> Self {
        self.label_font = font;
        self
    }

    /// Load the backend named in `settings` and warm it up.
    pub fn load(settings: &ModelSettings) -> Result<Self, ModelLoadError> {
        let detector = match settings.backend {
            BackendKind::Stub => Self::new(StubBackend::new(settings.stub_detections.clone())),
            BackendKind::Tract => Self::load_tract(settings)?,
        }
        .with_label_font(load_label_font(settings.label_font.as_deref()));
        detector
            .backend
            .warm_up()
            .map_err(|err| ModelLoadError::InvalidWeights {
                path: settings.weights.clone(),
                reason: format!("warm-up failed: {err:#}"),
            })?;
        log::info!("detector backend '{}' ready", detector.backend_name());
        Ok(detector)
    }

    #[cfg(feature = "backend-tract")]
    fn load_tract(settings: &ModelSettings) -> Result<Self, ModelLoadError> {
        let backend = super::backends::TractBackend::load(
            &settings.weights,
            settings.input_size,
            &settings.class_names,
        )?
        .with_iou_threshold(settings.iou_threshold)
        .with_max_detections(settings.max_detections);
        Ok(Self::new(backend))
    }

    #[cfg(not(feature = "backend-tract"))]
    fn load_tract(_settings: &ModelSettings) -> Result<Self, ModelLoadError> {
        Err(ModelLoadError::BackendUnavailable(
            BackendKind::Tract.name().to_string(),
        ))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run detection once and annotate the image with the returned boxes and labels.
    ///
    /// Threshold filtering belongs to the backend; results are not re-filtered.
    pub fn detect(&self, image: &DynamicImage, confidence_threshold: f32) -> Result<DetectionResult> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold {} is outside [0, 1]",
                confidence_threshold
            ));
        }
        let rgb = image.to_rgb8();
        let output = self
            .backend
            .predict(&rgb, confidence_threshold)
            .with_context(|| format!("{} backend failed", self.backend.name()))?;
        let annotated_image = annotate(&rgb, &output.detections, self.label_font.as_ref());

        Ok(DetectionResult {
            detections: output.detections,
            speed: output.speed,
            annotated_image,
        })
    }
}
