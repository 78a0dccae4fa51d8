#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, DetectionClass, ModelOutput, Speed};
use crate::error::ModelLoadError;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const PAD_VALUE: f32 = 114.0 / 255.0;

/// Tract-based backend for YOLOv8-style ONNX exports.
///
/// Expects one output shaped `[1, 4 + nc, N]` (or its transpose), where the
/// first four rows are `cx, cy, w, h` in letterboxed input pixels and the
/// remaining `nc` rows are per-class scores.
pub struct TractBackend {
    model: Plan,
    input_size: u32,
    classes: Vec<DetectionClass>,
    iou_threshold: f32,
    max_detections: usize,
}

/// Letterbox geometry, used to map boxes back to the source image.
#[derive(Clone, Copy, Debug)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    orig_w: f32,
    orig_h: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        input_size: u32,
        class_names: &[String],
    ) -> Result<Self, ModelLoadError> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(ModelLoadError::MissingWeights(model_path.to_path_buf()));
        }
        let classes = class_names
            .iter()
            .map(|name| {
                DetectionClass::from_label(name)
                    .ok_or_else(|| ModelLoadError::UnknownClass(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let invalid = |err: anyhow::Error| ModelLoadError::InvalidWeights {
            path: PathBuf::from(model_path),
            reason: format!("{err:#}"),
        };
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .context("failed to parse ONNX model")
            .map_err(invalid)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")
            .map_err(invalid)?
            .into_optimized()
            .context("failed to optimize ONNX model")
            .map_err(invalid)?
            .into_runnable()
            .context("failed to build runnable ONNX model")
            .map_err(invalid)?;

        Ok(Self {
            model,
            input_size,
            classes,
            iou_threshold: 0.7,
            max_detections: 300,
        })
    }

    /// Override the NMS IoU threshold.
    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    /// Override the cap on detections per image.
    pub fn with_max_detections(mut self, max_detections: usize) -> Self {
        self.max_detections = max_detections;
        self
    }

    fn build_input(&self, image: &RgbImage) -> Result<(Tensor, Letterbox)> {
        let (orig_w, orig_h) = image.dimensions();
        if orig_w == 0 || orig_h == 0 {
            return Err(anyhow!("image has zero size {}x{}", orig_w, orig_h));
        }
        let side = self.input_size;
        let scale = (side as f32 / orig_w as f32).min(side as f32 / orig_h as f32);
        let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, side);
        let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, side);
        let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

        let offset_x = ((side - new_w) / 2) as usize;
        let offset_y = ((side - new_h) / 2) as usize;
        let side = side as usize;
        let mut input = tract_ndarray::Array4::<f32>::from_elem((1, 3, side, side), PAD_VALUE);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (px, py) = (x as usize + offset_x, y as usize + offset_y);
            for channel in 0..3 {
                input[[0, channel, py, px]] = pixel.0[channel] as f32 / 255.0;
            }
        }

        let letterbox = Letterbox {
            scale,
            pad_x: offset_x as f32,
            pad_y: offset_y as f32,
            orig_w: orig_w as f32,
            orig_h: orig_h as f32,
        };
        Ok((input.into_tensor(), letterbox))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        letterbox: Letterbox,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output must have rank 3")?;

        let attrs = 4 + self.classes.len();
        let shape = view.shape();
        let (count, channels_first) = if shape[1] == attrs {
            (shape[2], true)
        } else if shape[2] == attrs {
            (shape[1], false)
        } else {
            return Err(anyhow!(
                "model output shape {:?} does not match {} classes",
                shape,
                self.classes.len()
            ));
        };
        let at = |attr: usize, idx: usize| -> f32 {
            if channels_first {
                view[[0, attr, idx]]
            } else {
                view[[0, idx, attr]]
            }
        };

        let mut candidates = Vec::new();
        for idx in 0..count {
            let (class_idx, score) = (0..self.classes.len())
                .map(|c| (c, at(4 + c, idx)))
                .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !score.is_finite() || score < confidence_threshold {
                continue;
            }
            let (cx, cy, w, h) = (at(0, idx), at(1, idx), at(2, idx), at(3, idx));
            let x1 = ((cx - w / 2.0 - letterbox.pad_x) / letterbox.scale).clamp(0.0, letterbox.orig_w);
            let y1 = ((cy - h / 2.0 - letterbox.pad_y) / letterbox.scale).clamp(0.0, letterbox.orig_h);
            let x2 = ((cx + w / 2.0 - letterbox.pad_x) / letterbox.scale).clamp(0.0, letterbox.orig_w);
            let y2 = ((cy + h / 2.0 - letterbox.pad_y) / letterbox.scale).clamp(0.0, letterbox.orig_h);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            candidates.push(Detection {
                class: self.classes[class_idx],
                confidence: score.min(1.0),
                bbox: BoundingBox::from_corners(x1, y1, x2, y2),
            });
        }

        let mut kept = nms(candidates, self.iou_threshold);
        kept.truncate(self.max_detections);
        Ok(kept)
    }
}

/// Class-aware greedy NMS. Output is sorted by confidence, descending.
pub(crate) fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut suppressed = vec![false; detections.len()];
    let mut kept = Vec::new();
    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(detections[i]);
        for j in (i + 1)..detections.len() {
            if !suppressed[j]
                && detections[j].class == detections[i].class
                && detections[i].bbox.iou(&detections[j].bbox) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }
    kept
}

fn millis_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn predict(&self, image: &RgbImage, confidence_threshold: f32) -> Result<ModelOutput> {
        let start = Instant::now();
        let (input, letterbox) = self.build_input(image)?;
        let preprocess = millis_since(start);

        let start = Instant::now();
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let inference = millis_since(start);

        let start = Instant::now();
        let detections = self.decode(outputs, letterbox, confidence_threshold)?;
        let postprocess = millis_since(start);

        Ok(ModelOutput {
            detections,
            speed: Speed {
                preprocess,
                inference,
                postprocess,
            },
        })
    }

    fn warm_up(&self) -> Result<()> {
        let blank = RgbImage::new(self.input_size, self.input_size);
        self.predict(&blank, 1.0).map(|_| ())
    }
}
