use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::result::Detection;

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

const LABEL_PAD: u32 = 2;
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

/// Line width scaled to image size, minimum 2px.
pub fn line_width(width: u32, height: u32) -> u32 {
    let scaled = ((width as f64 + height as f64) / 2.0 * 0.003).round() as u32;
    scaled.max(2)
}

/// Label text height scaled to image size, minimum 12px.
pub fn label_scale(width: u32, height: u32) -> f32 {
    ((width as f32 + height as f32) / 2.0 * 0.035).round().max(12.0)
}

/// The DejaVu Sans face shipped in `assets/`.
pub fn bundled_font() -> Option<FontArc> {
    FontArc::try_from_slice(BUNDLED_FONT).ok()
}

/// Resolve the label font. A font that cannot be read leaves boxes unlabeled.
pub fn load_label_font(path: Option<&Path>) -> Option<FontArc> {
    let Some(path) = path else {
        return bundled_font();
    };
    let loaded = std::fs::read(path)
        .map_err(|err| err.to_string())
        .and_then(|data| FontArc::try_from_vec(data).map_err(|err| err.to_string()));
    match loaded {
        Ok(font) => Some(font),
        Err(err) => {
            log::warn!(
                "label font {} unusable, drawing boxes without labels: {}",
                path.display(),
                err
            );
            None
        }
    }
}

/// Draw every detection as a hollow box in its class color, with a
/// `"{label} {confidence}"` tag above it when a font is available.
pub fn annotate(image: &RgbImage, detections: &[Detection], font: Option<&FontArc>) -> RgbImage {
    let mut canvas = image.clone();
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return canvas;
    }
    let thickness = line_width(w, h);
    let scale = PxScale::from(label_scale(w, h));

    for det in detections {
        let Some([x0, y0, x1, y1]) = clip_box(det, w, h) else {
            continue;
        };
        let color = Rgb(det.class.stroke_rgb());
        for t in 0..thickness {
            let (xx0, yy0) = (x0 + t, y0 + t);
            let (xx1, yy1) = (x1.saturating_sub(t), y1.saturating_sub(t));
            if xx0 > xx1 || yy0 > yy1 {
                break;
            }
            let rect = Rect::at(xx0 as i32, yy0 as i32).of_size(xx1 - xx0 + 1, yy1 - yy0 + 1);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
        if let Some(font) = font {
            draw_label(&mut canvas, det, [x0, y0], color, scale, font);
        }
    }
    canvas
}

fn draw_label(
    canvas: &mut RgbImage,
    det: &Detection,
    [x0, y0]: [u32; 2],
    color: Rgb<u8>,
    scale: PxScale,
    font: &FontArc,
) {
    let (w, _) = canvas.dimensions();
    let text = format!("{} {:.2}", det.class.label(), det.confidence);
    let (tw, th) = text_size(scale, font, &text);
    let (lw, lh) = (tw + 2 * LABEL_PAD, th + 2 * LABEL_PAD);

    // above the box, or just inside its top edge when there is no room
    let top = if y0 >= lh { y0 - lh } else { y0 };
    let left = x0.min(w.saturating_sub(lw));

    draw_filled_rect_mut(canvas, Rect::at(left as i32, top as i32).of_size(lw, lh), color);
    draw_text_mut(
        canvas,
        LABEL_TEXT,
        (left + LABEL_PAD) as i32,
        (top + LABEL_PAD) as i32,
        scale,
        font,
        &text,
    );
}

fn clip_box(det: &Detection, w: u32, h: u32) -> Option<[u32; 4]> {
    let (x1, y1, x2, y2) = det.bbox.corners();
    if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
        return None;
    }
    let clamp = |v: f32, max: u32| -> u32 { v.round().clamp(0.0, (max - 1) as f32) as u32 };
    let bx0 = clamp(x1, w);
    let by0 = clamp(y1, h);
    let bx1 = clamp(x2, w);
    let by1 = clamp(y2, h);
    if bx0 > bx1 || by0 > by1 {
        return None;
    }
    Some([bx0, by0, bx1, by1])
}
