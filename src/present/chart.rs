//! SVG renderings of the two summary charts.

use std::f64::consts::PI;
use std::fmt::Write as _;

use crate::detect::DetectionClass;

use super::summary::Summary;
use super::NO_DETECTIONS_MESSAGE;

pub const BAR_CHART_TITLE: &str = "Average Confidence per Class";
pub const BAR_CHART_Y_LABEL: &str = "Average Confidence";
pub const PIE_CHART_TITLE: &str = "Distribution of Detected Classes";

const BAR_WIDTH: f64 = 640.0;
const BAR_HEIGHT: f64 = 400.0;
const BAR_MARGIN_LEFT: f64 = 80.0;
const BAR_MARGIN_RIGHT: f64 = 20.0;
const BAR_MARGIN_TOP: f64 = 50.0;
const BAR_MARGIN_BOTTOM: f64 = 50.0;

const PIE_SIZE: f64 = 440.0;
const PIE_RADIUS: f64 = 150.0;
const PIE_CENTER_Y: f64 = 240.0;
const PIE_START_DEG: f64 = 90.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    pub class: DetectionClass,
    /// Average confidence in [0, 1].
    pub height: f64,
}

#[derive(Clone, Debug)]
pub struct BarChart {
    pub bars: Vec<Bar>,
    pub svg: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PieSlice {
    pub class: DetectionClass,
    pub count: usize,
    pub percent: f64,
}

impl PieSlice {
    pub fn percent_label(&self) -> String {
        format!("{:.1}%", self.percent)
    }
}

#[derive(Clone, Debug)]
pub enum PieChart {
    Drawn { slices: Vec<PieSlice>, svg: String },
    /// Every count is zero; nothing is drawn.
    NoDetections,
}

impl PieChart {
    pub fn is_drawn(&self) -> bool {
        matches!(self, PieChart::Drawn { .. })
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            PieChart::Drawn { .. } => None,
            PieChart::NoDetections => Some(NO_DETECTIONS_MESSAGE),
        }
    }
}

/// One bar per class in fixed order, y-axis pinned to [0, 1].
pub fn bar_chart(summary: &Summary) -> BarChart {
    let bars: Vec<Bar> = summary
        .classes()
        .iter()
        .map(|s| Bar {
            class: s.class,
            height: s.average_confidence().clamp(0.0, 1.0),
        })
        .collect();

    let plot_w = BAR_WIDTH - BAR_MARGIN_LEFT - BAR_MARGIN_RIGHT;
    let plot_h = BAR_HEIGHT - BAR_MARGIN_TOP - BAR_MARGIN_BOTTOM;
    let baseline = BAR_MARGIN_TOP + plot_h;

    let mut svg = svg_open(BAR_WIDTH, BAR_HEIGHT);
    title(&mut svg, BAR_WIDTH / 2.0, 30.0, BAR_CHART_TITLE);

    for step in 0..=5 {
        let value = step as f64 * 0.2;
        let y = baseline - value * plot_h;
        let _ = write!(
            svg,
            r##"<line x1="{x0:.2}" y1="{y:.2}" x2="{x1:.2}" y2="{y:.2}" stroke="#dddddd"/><text x="{tx:.2}" y="{ty:.2}" font-size="12" text-anchor="end">{value:.1}</text>"##,
            x0 = BAR_MARGIN_LEFT,
            x1 = BAR_MARGIN_LEFT + plot_w,
            tx = BAR_MARGIN_LEFT - 8.0,
            ty = y + 4.0,
        );
    }

    let slot = plot_w / bars.len().max(1) as f64;
    for (idx, bar) in bars.iter().enumerate() {
        let bar_w = slot * 0.8;
        let x = BAR_MARGIN_LEFT + slot * idx as f64 + (slot - bar_w) / 2.0;
        let h = bar.height * plot_h;
        let _ = write!(
            svg,
            r#"<rect class="bar" data-class="{label}" data-value="{value:.4}" x="{x:.2}" y="{y:.2}" width="{bar_w:.2}" height="{h:.2}" fill="{color}"/><text x="{lx:.2}" y="{ly:.2}" font-size="13" text-anchor="middle">{name}</text>"#,
            label = bar.class.label(),
            value = bar.height,
            y = baseline - h,
            color = bar.class.chart_color(),
            lx = x + bar_w / 2.0,
            ly = baseline + 20.0,
            name = bar.class.display_name(),
        );
    }

    let _ = write!(
        svg,
        r##"<line x1="{x:.2}" y1="{top:.2}" x2="{x:.2}" y2="{baseline:.2}" stroke="#333333"/><line x1="{x:.2}" y1="{baseline:.2}" x2="{right:.2}" y2="{baseline:.2}" stroke="#333333"/><text x="20" y="{mid:.2}" font-size="13" text-anchor="middle" transform="rotate(-90 20 {mid:.2})">{ylabel}</text>"##,
        x = BAR_MARGIN_LEFT,
        top = BAR_MARGIN_TOP,
        right = BAR_MARGIN_LEFT + plot_w,
        mid = BAR_MARGIN_TOP + plot_h / 2.0,
        ylabel = BAR_CHART_Y_LABEL,
    );
    svg.push_str("</svg>");

    BarChart { bars, svg }
}

/// Slices for every class with a nonzero count.
pub fn pie_slices(summary: &Summary) -> Vec<PieSlice> {
    let total = summary.total();
    if total == 0 {
        return Vec::new();
    }
    summary
        .classes()
        .iter()
        .filter(|s| s.count > 0)
        .map(|s| PieSlice {
            class: s.class,
            count: s.count,
            percent: s.count as f64 * 100.0 / total as f64,
        })
        .collect()
}

/// Class distribution pie, or `NoDetections` when every count is zero.
pub fn pie_chart(summary: &Summary) -> PieChart {
    let slices = pie_slices(summary);
    if slices.is_empty() {
        return PieChart::NoDetections;
    }

    let cx = PIE_SIZE / 2.0;
    let cy = PIE_CENTER_Y;
    let mut svg = svg_open(PIE_SIZE, PIE_SIZE);
    title(&mut svg, cx, 30.0, PIE_CHART_TITLE);

    let mut start = PIE_START_DEG;
    for slice in &slices {
        let sweep = slice.percent / 100.0 * 360.0;
        let end = start + sweep;
        let mid = start + sweep / 2.0;
        let common = format!(
            r#"class="slice" data-class="{}" data-percent="{:.1}" fill="{}" stroke="white""#,
            slice.class.label(),
            slice.percent,
            slice.class.chart_color()
        );
        if slice.count == summary.total() {
            let _ = write!(
                svg,
                r#"<circle {common} cx="{cx:.2}" cy="{cy:.2}" r="{PIE_RADIUS:.2}"/>"#
            );
        } else {
            let (sx, sy) = polar(cx, cy, PIE_RADIUS, start);
            let (ex, ey) = polar(cx, cy, PIE_RADIUS, end);
            let large_arc = u8::from(sweep > 180.0);
            let _ = write!(
                svg,
                r#"<path {common} d="M {cx:.2} {cy:.2} L {sx:.2} {sy:.2} A {PIE_RADIUS:.2} {PIE_RADIUS:.2} 0 {large_arc} 0 {ex:.2} {ey:.2} Z"/>"#
            );
        }
        let (px, py) = polar(cx, cy, PIE_RADIUS * 0.6, mid);
        let (nx, ny) = polar(cx, cy, PIE_RADIUS * 1.12, mid);
        let _ = write!(
            svg,
            r#"<text x="{px:.2}" y="{py:.2}" font-size="14" text-anchor="middle">{pct}</text><text x="{nx:.2}" y="{ny:.2}" font-size="14" text-anchor="middle">{name}</text>"#,
            pct = slice.percent_label(),
            name = slice.class.display_name(),
        );
        start = end;
    }
    svg.push_str("</svg>");

    PieChart::Drawn { slices, svg }
}

/// Point at `deg` degrees, counterclockwise from the +x axis, in SVG space.
fn polar(cx: f64, cy: f64, r: f64, deg: f64) -> (f64, f64) {
    let rad = deg * PI / 180.0;
    (cx + r * rad.cos(), cy - r * rad.sin())
}

fn svg_open(width: f64, height: f64) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="100%" font-family="sans-serif">"#
    )
}

fn title(svg: &mut String, x: f64, y: f64, text: &str) {
    let _ = write!(
        svg,
        r#"<text x="{x:.2}" y="{y:.2}" font-size="16" font-weight="bold" text-anchor="middle">{text}</text>"#
    );
}
