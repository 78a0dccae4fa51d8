//! firewatch - page server for the fire/smoke detection demo
//!
//! This daemon:
//! 1. Loads configuration and the detection model once
//! 2. Serves the upload page and the detect endpoint
//! 3. Keeps serving with detection disabled if the model fails to load

use anyhow::Result;
use std::sync::mpsc;

use firewatch::web::{WebConfig, WebServer};
use firewatch::{AppConfig, Detector};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    let loaded = Detector::load(&config.model);
    match &loaded {
        Ok(detector) => log::info!(
            "model loaded from {} (backend {})",
            config.model.weights.display(),
            detector.backend_name()
        ),
        Err(err) => log::error!(
            "unable to load model, detection disabled. Check the specified path: {}: {}",
            config.model.weights.display(),
            err
        ),
    }

    let handle = WebServer::new(WebConfig::from(&config), loaded).spawn()?;
    log::info!("firewatch listening on http://{}", handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;

    log::info!("firewatch waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping page server...");
    handle.stop()?;

    Ok(())
}
