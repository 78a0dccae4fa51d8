//! detect_image - run fire/smoke detection on one local image

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use firewatch::present::text::{render_json, render_text};
use firewatch::ui::{Ui, UiMode};
use firewatch::upload::{decode_upload, ImageKind};
use firewatch::{build_report, AppConfig, Detector};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to run detection on (jpg, jpeg, png, bmp, webp).
    image: PathBuf,
    /// Model confidence in whole percent; defaults to the slider default.
    #[arg(long)]
    confidence: Option<u8>,
    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Progress display on stderr.
    #[arg(long, value_enum, default_value_t = UiMode::Auto)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::for_stderr(args.ui);

    let config = AppConfig::load()?;
    let threshold = match args.confidence {
        Some(percent) => config.slider.fraction(percent)?,
        None => config.slider.parse_fraction(None)?,
    };

    let kind = ImageKind::from_path(&args.image)?;
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let image = decode_upload(&bytes, kind)?;

    let stage = ui.stage("load model");
    let detector = match Detector::load(&config.model) {
        Ok(detector) => {
            drop(stage);
            detector
        }
        Err(err) => {
            stage.fail(err.to_string());
            return Err(anyhow!(
                "unable to load model. Check the specified path: {}: {}",
                config.model.weights.display(),
                err
            ));
        }
    };

    let result = {
        let _stage = ui.stage("detect objects");
        detector.detect(&image, threshold)?
    };
    let report = build_report(&result)?;

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&render_json(&result, &report))?
        ),
    }
    Ok(())
}
