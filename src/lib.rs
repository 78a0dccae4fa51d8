//! firewatch - fire and smoke detection demo
//!
//! Runs a pre-trained fire/smoke detector over a single image and presents
//! the result as an annotated image, per-detection rows, per-class counts,
//! two summary charts and stage timings.
//!
//! # Module Structure
//!
//! - `detect`: Detector adapter (`Detector`) over a `DetectorBackend`
//! - `present`: Result presenter (summaries, charts, HTML/text rendering)
//! - `web`: Synchronous page server hosting the upload flow
//! - `config`: File + environment configuration
//! - `upload`: Accepted image types and decoding

pub mod config;
pub mod detect;
pub mod error;
pub mod present;
pub mod ui;
pub mod upload;
pub mod web;

pub use config::{AppConfig, BackendKind, ConfidenceSlider, ModelSettings};
pub use detect::{
    BoundingBox, Detection, DetectionClass, DetectionResult, Detector, DetectorBackend,
    ModelOutput, Speed, StubBackend,
};
pub use error::{ModelLoadError, UploadError};
pub use present::{build_report, Report, NO_DETECTIONS_MESSAGE};
