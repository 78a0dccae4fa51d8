use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::Detection;

const DEFAULT_ADDR: &str = "127.0.0.1:8501";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_WEIGHTS: &str = "weights/best.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_MAX_DETECTIONS: usize = 300;
const DEFAULT_CLASS_NAMES: [&str; 2] = ["fire", "smoke"];
const DEFAULT_SLIDER_MIN: u8 = 15;
const DEFAULT_SLIDER_MAX: u8 = 100;
const DEFAULT_SLIDER_VALUE: u8 = 20;
const DEFAULT_TITLE: &str = "Fire and Smoke Detection using YOLOv8";
const DEFAULT_CAPTION: &str = "Using custom dataset";
const DEFAULT_MODEL_CARD: [(&str, &str); 6] = [
    (
        "Dataset",
        "https://universe.roboflow.com/ds/Ng1WjvLh9i?key=JBrja8Xhvb",
    ),
    ("Images", "3974"),
    ("Epochs", "50"),
    ("IMG_SIZE", "640"),
    ("BATCH_SIZE", "16"),
    ("LR", "0.01"),
];

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FirewatchConfigFile {
    addr: Option<String>,
    max_upload_bytes: Option<usize>,
    model: Option<ModelConfigFile>,
    slider: Option<SliderConfigFile>,
    page: Option<PageConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    backend: Option<String>,
    weights: Option<PathBuf>,
    input_size: Option<u32>,
    iou_threshold: Option<f32>,
    max_detections: Option<usize>,
    class_names: Option<Vec<String>>,
    label_font: Option<PathBuf>,
    stub_detections: Option<Vec<Detection>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SliderConfigFile {
    min: Option<u8>,
    max: Option<u8>,
    default: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PageConfigFile {
    title: Option<String>,
    caption: Option<String>,
    model_card: Option<Vec<ModelCardEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelCardEntry {
    pub param: String,
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Tract,
    Stub,
}

impl BackendKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tract" => Ok(BackendKind::Tract),
            "stub" => Ok(BackendKind::Stub),
            other => Err(anyhow!("unknown detector backend '{}'", other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Tract => "tract",
            BackendKind::Stub => "stub",
        }
    }
}

/// Everything `Detector::load` needs.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: BackendKind,
    pub weights: PathBuf,
    pub input_size: u32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub class_names: Vec<String>,
    /// TrueType font for box labels; the bundled DejaVu Sans when unset.
    pub label_font: Option<PathBuf>,
    pub stub_detections: Vec<Detection>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Tract,
            weights: PathBuf::from(DEFAULT_WEIGHTS),
            input_size: DEFAULT_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
            class_names: DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            label_font: None,
            stub_detections: Vec::new(),
        }
    }
}

/// Confidence slider bounds, in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceSlider {
    pub min: u8,
    pub max: u8,
    pub default: u8,
}

impl Default for ConfidenceSlider {
    fn default() -> Self {
        Self {
            min: DEFAULT_SLIDER_MIN,
            max: DEFAULT_SLIDER_MAX,
            default: DEFAULT_SLIDER_VALUE,
        }
    }
}

impl ConfidenceSlider {
    pub fn validate(&self) -> Result<()> {
        if self.max == 0 || self.max > 100 {
            return Err(anyhow!("slider max must be within 1..=100"));
        }
        if self.min > self.max {
            return Err(anyhow!(
                "slider min {} exceeds max {}",
                self.min,
                self.max
            ));
        }
        if self.default < self.min || self.default > self.max {
            return Err(anyhow!(
                "slider default {} is outside {}..={}",
                self.default,
                self.min,
                self.max
            ));
        }
        Ok(())
    }

    /// Convert a slider position to a threshold fraction in [0, 1].
    pub fn fraction(&self, percent: u8) -> Result<f32> {
        if percent < self.min || percent > self.max {
            return Err(anyhow!(
                "confidence {} is outside {}..={}",
                percent,
                self.min,
                self.max
            ));
        }
        Ok(f32::from(percent) / 100.0)
    }

    /// Parse a raw slider value; `None` selects the default position.
    pub fn parse_fraction(&self, raw: Option<&str>) -> Result<f32> {
        let percent = match raw.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => value
                .parse::<u8>()
                .map_err(|_| anyhow!("confidence must be a whole percent, got '{}'", value))?,
            None => self.default,
        };
        self.fraction(percent)
    }
}

#[derive(Debug, Clone)]
pub struct PageSettings {
    pub title: String,
    pub caption: String,
    pub model_card: Vec<ModelCardEntry>,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            caption: DEFAULT_CAPTION.to_string(),
            model_card: default_model_card(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
    pub model: ModelSettings,
    pub slider: ConfidenceSlider,
    pub page: PageSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            model: ModelSettings::default(),
            slider: ConfidenceSlider::default(),
            page: PageSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FIREWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FirewatchConfigFile) -> Result<Self> {
        let defaults = AppConfig::default();
        let model_file = file.model.unwrap_or_default();
        let backend = match model_file.backend.as_deref() {
            Some(name) => BackendKind::parse(name)?,
            None => defaults.model.backend,
        };
        let model = ModelSettings {
            backend,
            weights: model_file.weights.unwrap_or(defaults.model.weights),
            input_size: model_file.input_size.unwrap_or(defaults.model.input_size),
            iou_threshold: model_file
                .iou_threshold
                .unwrap_or(defaults.model.iou_threshold),
            max_detections: model_file
                .max_detections
                .unwrap_or(defaults.model.max_detections),
            class_names: model_file
                .class_names
                .unwrap_or(defaults.model.class_names),
            label_font: model_file.label_font,
            stub_detections: model_file.stub_detections.unwrap_or_default(),
        };
        let slider_file = file.slider.unwrap_or_default();
        let slider = ConfidenceSlider {
            min: slider_file.min.unwrap_or(defaults.slider.min),
            max: slider_file.max.unwrap_or(defaults.slider.max),
            default: slider_file.default.unwrap_or(defaults.slider.default),
        };
        let page_file = file.page.unwrap_or_default();
        let page = PageSettings {
            title: page_file.title.unwrap_or(defaults.page.title),
            caption: page_file.caption.unwrap_or(defaults.page.caption),
            model_card: page_file.model_card.unwrap_or(defaults.page.model_card),
        };
        Ok(Self {
            addr: file.addr.unwrap_or(defaults.addr),
            max_upload_bytes: file.max_upload_bytes.unwrap_or(defaults.max_upload_bytes),
            model,
            slider,
            page,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("FIREWATCH_ADDR") {
            if !addr.trim().is_empty() {
                self.addr = addr;
            }
        }
        if let Ok(backend) = std::env::var("FIREWATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.model.backend = BackendKind::parse(&backend)?;
            }
        }
        if let Ok(weights) = std::env::var("FIREWATCH_WEIGHTS") {
            if !weights.trim().is_empty() {
                self.model.weights = PathBuf::from(weights);
            }
        }
        if let Ok(limit) = std::env::var("FIREWATCH_MAX_UPLOAD_BYTES") {
            if !limit.trim().is_empty() {
                self.max_upload_bytes = limit.trim().parse().map_err(|_| {
                    anyhow!("FIREWATCH_MAX_UPLOAD_BYTES must be an integer byte count")
                })?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("max_upload_bytes must be greater than zero"));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model input_size must be greater than zero"));
        }
        if !(self.model.iou_threshold > 0.0 && self.model.iou_threshold <= 1.0) {
            return Err(anyhow!("model iou_threshold must be within (0, 1]"));
        }
        if self.model.class_names.is_empty() {
            return Err(anyhow!("model class_names must not be empty"));
        }
        for det in &self.model.stub_detections {
            if !(0.0..=1.0).contains(&det.confidence) {
                return Err(anyhow!(
                    "stub detection confidence {} is outside [0, 1]",
                    det.confidence
                ));
            }
        }
        self.slider.validate()?;
        Ok(())
    }
}

fn default_model_card() -> Vec<ModelCardEntry> {
    DEFAULT_MODEL_CARD
        .iter()
        .map(|(param, value)| ModelCardEntry {
            param: param.to_string(),
            value: value.to_string(),
        })
        .collect()
}

fn read_config_file(path: &Path) -> Result<FirewatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_slider_matches_demo_bounds() {
        let slider = ConfidenceSlider::default();
        assert_eq!((slider.min, slider.max, slider.default), (15, 100, 20));
        slider.validate().unwrap();
        assert_eq!(slider.parse_fraction(None).unwrap(), 0.2);
        assert_eq!(slider.parse_fraction(Some("45")).unwrap(), 0.45);
        assert_eq!(slider.parse_fraction(Some("100")).unwrap(), 1.0);
    }

    #[test]
    fn slider_rejects_out_of_bounds_values() {
        let slider = ConfidenceSlider::default();
        assert!(slider.fraction(10).is_err());
        assert!(slider.fraction(101).is_err());
        assert!(slider.parse_fraction(Some("abc")).is_err());
        assert!(slider.parse_fraction(Some("-5")).is_err());
    }

    #[test]
    fn slider_validation_checks_ordering() {
        let bad = ConfidenceSlider {
            min: 50,
            max: 40,
            default: 45,
        };
        assert!(bad.validate().is_err());
        let bad_default = ConfidenceSlider {
            min: 15,
            max: 100,
            default: 5,
        };
        assert!(bad_default.validate().is_err());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = AppConfig::from_file(FirewatchConfigFile::default()).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.addr, DEFAULT_ADDR);
        assert_eq!(cfg.model.backend, BackendKind::Tract);
        assert_eq!(cfg.model.weights, PathBuf::from("weights/best.onnx"));
        assert_eq!(cfg.model.class_names, vec!["fire", "smoke"]);
        assert_eq!(cfg.page.model_card.len(), 6);
        assert_eq!(cfg.page.model_card[1].value, "3974");
    }

    #[test]
    fn parses_stub_detections_from_toml() {
        let file: FirewatchConfigFile = toml::from_str(
            r#"
            [model]
            backend = "stub"

            [[model.stub_detections]]
            class = "smoke"
            confidence = 0.81
            bbox = { center_x = 10.0, center_y = 12.0, width = 4.0, height = 6.0 }
            "#,
        )
        .unwrap();
        let cfg = AppConfig::from_file(file).unwrap();
        assert_eq!(cfg.model.backend, BackendKind::Stub);
        assert_eq!(cfg.model.stub_detections.len(), 1);
        assert_eq!(
            cfg.model.stub_detections[0].class,
            crate::detect::DetectionClass::Smoke
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(BackendKind::parse("gpu").is_err());
        assert_eq!(BackendKind::parse(" Stub ").unwrap(), BackendKind::Stub);
    }
}
