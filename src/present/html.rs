//! HTML rendering for the page server.

use std::fmt::Write as _;

use base64::Engine as _;

use crate::config::{ConfidenceSlider, PageSettings};
use crate::upload::ACCEPTED_EXTENSIONS;

use super::chart::{PieChart, BAR_CHART_TITLE};
use super::report::{DetectedReport, Report};

const UPLOAD_CAPTION: &str =
    r#"Upload a photo and then click the "Detect Objects" button to view the results."#;

pub struct PageContext<'a> {
    pub page: &'a PageSettings,
    pub slider: ConfidenceSlider,
    /// Set when the model failed to load; detection is disabled.
    pub model_error: Option<&'a str>,
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Full page: sidebar controls, model card table, preview and results columns.
pub fn page(ctx: &PageContext<'_>) -> String {
    let title = escape_html(&ctx.page.title);
    let accept = ACCEPTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    let mut card = String::new();
    for entry in &ctx.page.model_card {
        let _ = write!(
            card,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&entry.param),
            escape_html(&entry.value)
        );
    }

    let banner = match ctx.model_error {
        Some(err) => format!(
            r#"<div class="error" id="model-error">Unable to load detection model. Check the configured weights path.<br>{}</div>"#,
            escape_html(err)
        ),
        None => String::new(),
    };
    let disabled = if ctx.model_error.is_some() {
        r#" data-model-failed="true""#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 0; display: flex; }}
aside {{ width: 280px; padding: 1rem; background: #f0f2f6; min-height: 100vh; box-sizing: border-box; }}
main {{ flex: 1; padding: 1rem 2rem; }}
.columns {{ display: flex; gap: 2rem; }}
.columns > div {{ flex: 1; min-width: 0; }}
img {{ max-width: 100%; }}
.error {{ background: #ffe0e0; color: #900; padding: 0.75rem; border-radius: 4px; margin-bottom: 1rem; }}
table {{ border-collapse: collapse; }}
td {{ border: 1px solid #ddd; padding: 0.25rem 0.5rem; }}
details {{ margin: 0.5rem 0; }}
</style>
</head>
<body>
<aside>
<h2>Image Config</h2>
<label for="file">Upload an image...</label><br>
<input type="file" id="file" accept="{accept}"><br><br>
<label for="confidence">Select Model Confidence: <span id="confidence-value">{default}</span></label><br>
<input type="range" id="confidence" min="{min}" max="{max}" value="{default}"><br><br>
<button id="detect" disabled{disabled}>Detect Objects</button>
</aside>
<main>
{banner}<h1>{title}</h1>
<p class="caption">{caption}</p>
<p>Model Characteristics:</p>
<table id="model-card"><tr><th>Param</th><th>Value</th></tr>{card}</table>
<p class="caption">{upload_caption}</p>
<div class="columns">
<div id="uploaded"></div>
<div id="results"></div>
</div>
</main>
<script>
const file = document.getElementById('file');
const slider = document.getElementById('confidence');
const button = document.getElementById('detect');
const modelFailed = button.dataset.modelFailed === 'true';
slider.addEventListener('input', () => {{
  document.getElementById('confidence-value').textContent = slider.value;
}});
file.addEventListener('change', () => {{
  const chosen = file.files[0];
  const uploaded = document.getElementById('uploaded');
  uploaded.innerHTML = '';
  button.disabled = modelFailed || !chosen;
  if (!chosen) return;
  const img = document.createElement('img');
  img.src = URL.createObjectURL(chosen);
  img.alt = 'Uploaded Image';
  uploaded.appendChild(img);
  const caption = document.createElement('p');
  caption.textContent = 'Uploaded Image';
  uploaded.appendChild(caption);
}});
button.addEventListener('click', async () => {{
  const chosen = file.files[0];
  if (!chosen || modelFailed) return;
  button.disabled = true;
  try {{
    const resp = await fetch('/detect?confidence=' + encodeURIComponent(slider.value), {{
      method: 'POST',
      headers: {{ 'Content-Type': chosen.type || 'application/octet-stream' }},
      body: chosen,
    }});
    document.getElementById('results').innerHTML = await resp.text();
  }} finally {{
    button.disabled = false;
  }}
}});
</script>
</body>
</html>
"#,
        caption = escape_html(&ctx.page.caption),
        min = ctx.slider.min,
        max = ctx.slider.max,
        default = ctx.slider.default,
        upload_caption = escape_html(UPLOAD_CAPTION),
    )
}

/// Results column for one detection run.
pub fn result_fragment(report: &Report) -> String {
    match report {
        Report::Empty { message } => format!(r#"<p class="no-detections">{message}</p>"#),
        Report::Detected(report) => detected_fragment(report),
    }
}

/// Inline error shown in the results column.
pub fn error_fragment(message: &str) -> String {
    format!(r#"<div class="error">{}</div>"#, escape_html(message))
}

fn detected_fragment(report: &DetectedReport) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<img id="annotated" src="{}" alt="Detected Image"><p>Detected Image</p>"#,
        data_uri("image/png", &report.annotated_png)
    );

    out.push_str(r#"<details open><summary>Detection Results</summary><div id="detections">"#);
    for row in &report.rows {
        let _ = write!(
            out,
            "<p class=\"row\"><span style='color:{}'>{}</span> - Confidence: {} - Coordinates: {}</p>",
            row.color(),
            row.label(),
            row.confidence_text(),
            row.coordinates_text()
        );
    }
    out.push_str("</div>");
    for line in report.total_lines() {
        let _ = write!(out, "<p>{line}</p>");
    }
    let timings: Vec<String> = report
        .timings
        .iter()
        .map(|t| format!("<span style='color:green'>{}:</span> {}", t.label, t.value_text()))
        .collect();
    let _ = write!(out, r#"<p id="timings">{}</p>"#, timings.join("<br>"));
    out.push_str("</details>");

    out.push_str(r#"<div class="columns">"#);
    let _ = write!(
        out,
        r#"<div><details open><summary>{BAR_CHART_TITLE}</summary><div id="bar-chart">{}</div></details></div>"#,
        report.bar_chart.svg
    );
    out.push_str(r#"<div><details open><summary>Class Distribution</summary>"#);
    match &report.pie_chart {
        PieChart::Drawn { svg, .. } => {
            let _ = write!(out, r#"<div id="pie-chart">{svg}</div>"#);
        }
        PieChart::NoDetections => {
            let _ = write!(
                out,
                r#"<p class="no-detections">{}</p>"#,
                report.pie_chart.message().unwrap_or_default()
            );
        }
    }
    out.push_str("</details></div></div>");
    out
}
