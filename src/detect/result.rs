use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Object classes the fire/smoke model reports.
///
/// The order of [`DetectionClass::ALL`] is the presentation order used by
/// every summary and chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionClass {
    Fire,
    Smoke,
}

impl DetectionClass {
    pub const ALL: [DetectionClass; 2] = [DetectionClass::Fire, DetectionClass::Smoke];

    /// Lowercase model label.
    pub fn label(self) -> &'static str {
        match self {
            DetectionClass::Fire => "fire",
            DetectionClass::Smoke => "smoke",
        }
    }

    /// Capitalized label for display.
    pub fn display_name(self) -> &'static str {
        match self {
            DetectionClass::Fire => "Fire",
            DetectionClass::Smoke => "Smoke",
        }
    }

    /// CSS color of the label in detection rows.
    pub fn text_color(self) -> &'static str {
        match self {
            DetectionClass::Fire => "red",
            DetectionClass::Smoke => "blue",
        }
    }

    /// Fill color used by both charts.
    pub fn chart_color(self) -> &'static str {
        match self {
            DetectionClass::Fire => "#ff9999",
            DetectionClass::Smoke => "#66b2ff",
        }
    }

    /// Box stroke color on the annotated image.
    pub fn stroke_rgb(self) -> [u8; 3] {
        match self {
            DetectionClass::Fire => [255, 0, 0],
            DetectionClass::Smoke => [0, 0, 255],
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.label().eq_ignore_ascii_case(label.trim()))
    }
}

/// Box in original image pixels, center + size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            center_x: (x1 + x2) / 2.0,
            center_y: (y1 + y2) / 2.0,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Returns `(x1, y1, x2, y2)`.
    pub fn corners(&self) -> (f32, f32, f32, f32) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        (
            self.center_x - half_w,
            self.center_y - half_h,
            self.center_x + half_w,
            self.center_y + half_h,
        )
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let (ax1, ay1, ax2, ay2) = self.corners();
        let (bx1, by1, bx2, by2) = other.corners();
        let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        let inter = inter_w * inter_h;
        if inter == 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectionClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Per-stage timings in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Speed {
    pub preprocess: f64,
    pub inference: f64,
    pub postprocess: f64,
}

/// Raw output of a backend: threshold-filtered detections plus timings.
#[derive(Clone, Debug, Default)]
pub struct ModelOutput {
    pub detections: Vec<Detection>,
    pub speed: Speed,
}

/// Result of one `Detector::detect` call.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    /// Detections in backend order.
    pub detections: Vec<Detection>,
    pub speed: Speed,
    /// Input image with every detection drawn on it.
    pub annotated_image: RgbImage,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
