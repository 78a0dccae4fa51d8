//! Plain-text and JSON rendering for the command-line tool.

use std::fmt::Write as _;

use serde_json::{json, Value};

use crate::detect::DetectionResult;

use super::chart::PieChart;
use super::report::Report;

pub fn render_text(report: &Report) -> String {
    let report = match report {
        Report::Empty { message } => return format!("{message}\n"),
        Report::Detected(report) => report,
    };

    let mut out = String::from("Detection Results\n");
    for row in &report.rows {
        let _ = writeln!(
            out,
            "  {} - Confidence: {} - Coordinates: {}",
            row.label(),
            row.confidence_text(),
            row.coordinates_text()
        );
    }
    for line in report.total_lines() {
        let _ = writeln!(out, "{line}");
    }
    for timing in &report.timings {
        let _ = writeln!(out, "{}: {}", timing.label, timing.value_text());
    }

    out.push_str("Average Confidence per Class\n");
    for bar in &report.bar_chart.bars {
        let _ = writeln!(out, "  {}: {:.2}", bar.class.display_name(), bar.height);
    }
    out.push_str("Class Distribution\n");
    match &report.pie_chart {
        PieChart::Drawn { slices, .. } => {
            for slice in slices {
                let _ = writeln!(
                    out,
                    "  {}: {}",
                    slice.class.display_name(),
                    slice.percent_label()
                );
            }
        }
        PieChart::NoDetections => {
            let _ = writeln!(out, "  {}", report.pie_chart.message().unwrap_or_default());
        }
    }
    out
}

pub fn render_json(result: &DetectionResult, report: &Report) -> Value {
    let classes: Vec<Value> = match report {
        Report::Empty { .. } => Vec::new(),
        Report::Detected(report) => report
            .summary
            .classes()
            .iter()
            .map(|s| {
                json!({
                    "label": s.class.label(),
                    "count": s.count,
                    "average_confidence": s.average_confidence(),
                })
            })
            .collect(),
    };
    let message = match report {
        Report::Empty { message } => Some(*message),
        Report::Detected(_) => None,
    };
    json!({
        "detections": result.detections,
        "speed": result.speed,
        "classes": classes,
        "message": message,
    })
}
