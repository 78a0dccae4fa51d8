use std::io::Cursor;

use anyhow::{Context, Result};
use image::ImageFormat;

use crate::detect::{BoundingBox, Detection, DetectionClass, DetectionResult, Speed};

use super::chart::{bar_chart, pie_chart, BarChart, PieChart};
use super::summary::Summary;
use super::NO_DETECTIONS_MESSAGE;

/// One line of the per-detection listing.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRow {
    pub class: DetectionClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl DetectionRow {
    fn from_detection(det: &Detection) -> Self {
        Self {
            class: det.class,
            confidence: det.confidence,
            bbox: det.bbox,
        }
    }

    pub fn label(&self) -> &'static str {
        self.class.display_name()
    }

    pub fn color(&self) -> &'static str {
        self.class.text_color()
    }

    pub fn confidence_text(&self) -> String {
        format!("{:.2}", self.confidence)
    }

    /// Raw `[center_x, center_y, width, height]`.
    pub fn coordinates_text(&self) -> String {
        format!(
            "[{}, {}, {}, {}]",
            self.bbox.center_x, self.bbox.center_y, self.bbox.width, self.bbox.height
        )
    }
}

/// A timing entry, formatted to 2 decimals.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingLine {
    pub label: &'static str,
    pub millis: f64,
}

impl TimingLine {
    pub fn value_text(&self) -> String {
        format!("{:.2} ms", self.millis)
    }
}

pub fn timing_lines(speed: &Speed) -> [TimingLine; 3] {
    [
        TimingLine {
            label: "Preprocess Time",
            millis: speed.preprocess,
        },
        TimingLine {
            label: "Inference Time",
            millis: speed.inference,
        },
        TimingLine {
            label: "Postprocess Time",
            millis: speed.postprocess,
        },
    ]
}

#[derive(Clone, Debug)]
pub struct DetectedReport {
    pub rows: Vec<DetectionRow>,
    pub summary: Summary,
    pub bar_chart: BarChart,
    pub pie_chart: PieChart,
    pub timings: [TimingLine; 3],
    /// PNG encoding of the annotated image.
    pub annotated_png: Vec<u8>,
}

impl DetectedReport {
    pub fn total_lines(&self) -> [String; 2] {
        [
            format!(
                "Total Fires Detected: {}",
                self.summary.count(DetectionClass::Fire)
            ),
            format!(
                "Total Smokes Detected: {}",
                self.summary.count(DetectionClass::Smoke)
            ),
        ]
    }
}

/// Everything shown for one detection run.
#[derive(Clone, Debug)]
pub enum Report {
    Empty { message: &'static str },
    Detected(Box<DetectedReport>),
}

impl Report {
    pub fn is_empty(&self) -> bool {
        matches!(self, Report::Empty { .. })
    }
}

/// Build the display artifacts for a result. Charts are only built when
/// there is at least one detection.
pub fn build_report(result: &DetectionResult) -> Result<Report> {
    if result.is_empty() {
        return Ok(Report::Empty {
            message: NO_DETECTIONS_MESSAGE,
        });
    }

    let rows = result
        .detections
        .iter()
        .map(DetectionRow::from_detection)
        .collect();
    let summary = Summary::from_detections(&result.detections);
    let bar_chart = bar_chart(&summary);
    let pie_chart = pie_chart(&summary);

    let mut annotated_png = Vec::new();
    result
        .annotated_image
        .write_to(&mut Cursor::new(&mut annotated_png), ImageFormat::Png)
        .context("failed to encode annotated image")?;

    Ok(Report::Detected(Box::new(DetectedReport {
        rows,
        summary,
        bar_chart,
        pie_chart,
        timings: timing_lines(&result.speed),
        annotated_png,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn result(dets: Vec<Detection>) -> DetectionResult {
        DetectionResult {
            detections: dets,
            speed: Speed {
                preprocess: 1.234,
                inference: 45.678,
                postprocess: 0.5,
            },
            annotated_image: RgbImage::new(4, 4),
        }
    }

    fn det(class: DetectionClass, confidence: f32) -> Detection {
        Detection {
            class,
            confidence,
            bbox: BoundingBox {
                center_x: 120.5,
                center_y: 80.0,
                width: 40.0,
                height: 22.25,
            },
        }
    }

    #[test]
    fn empty_result_yields_message_only() {
        let report = build_report(&result(vec![])).unwrap();
        match report {
            Report::Empty { message } => assert_eq!(message, "No fire or smoke detected."),
            Report::Detected(_) => panic!("expected empty report"),
        }
    }

    #[test]
    fn rows_follow_result_order_with_class_colors() {
        let report = build_report(&result(vec![
            det(DetectionClass::Fire, 0.92),
            det(DetectionClass::Smoke, 0.81),
            det(DetectionClass::Fire, 0.77),
        ]))
        .unwrap();
        let Report::Detected(report) = report else {
            panic!("expected detections");
        };

        let rows: Vec<(&str, &str, String)> = report
            .rows
            .iter()
            .map(|r| (r.label(), r.color(), r.confidence_text()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Fire", "red", "0.92".to_string()),
                ("Smoke", "blue", "0.81".to_string()),
                ("Fire", "red", "0.77".to_string()),
            ]
        );
        assert_eq!(report.rows[0].coordinates_text(), "[120.5, 80, 40, 22.25]");
        assert_eq!(
            report.total_lines(),
            [
                "Total Fires Detected: 2".to_string(),
                "Total Smokes Detected: 1".to_string()
            ]
        );
        assert!(report.pie_chart.is_drawn());
        assert!(report.annotated_png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn timings_are_formatted_to_two_decimals() {
        let lines = timing_lines(&Speed {
            preprocess: 1.234,
            inference: 45.678,
            postprocess: 0.5,
        });
        let texts: Vec<String> = lines.iter().map(TimingLine::value_text).collect();
        assert_eq!(texts, vec!["1.23 ms", "45.68 ms", "0.50 ms"]);
        assert_eq!(lines[1].label, "Inference Time");
    }
}
