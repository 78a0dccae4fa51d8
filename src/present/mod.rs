//! Result presenter: turns one `DetectionResult` into display artifacts.

pub mod chart;
pub mod html;
mod report;
mod summary;
pub mod text;

pub use chart::{Bar, BarChart, PieChart, PieSlice};
pub use report::{build_report, timing_lines, DetectedReport, DetectionRow, Report, TimingLine};
pub use summary::{ClassSummary, Summary};

/// Shown instead of rows and charts when nothing was detected.
pub const NO_DETECTIONS_MESSAGE: &str = "No fire or smoke detected.";
