mod annotate;
mod backend;
mod backends;
mod detector;
mod result;

pub use annotate::{annotate, bundled_font, label_scale, line_width, load_label_font};
pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use detector::Detector;
pub use result::{BoundingBox, Detection, DetectionClass, DetectionResult, ModelOutput, Speed};
