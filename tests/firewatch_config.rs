use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use firewatch::config::AppConfig;
use firewatch::{BackendKind, DetectionClass};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FIREWATCH_CONFIG",
        "FIREWATCH_ADDR",
        "FIREWATCH_BACKEND",
        "FIREWATCH_WEIGHTS",
        "FIREWATCH_MAX_UPLOAD_BYTES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        addr = "0.0.0.0:9000"
        max_upload_bytes = 1048576

        [model]
        backend = "tract"
        weights = "weights/fire_v2.onnx"
        input_size = 320
        iou_threshold = 0.5
        class_names = ["smoke", "fire"]

        [slider]
        min = 20
        max = 90
        default = 40

        [page]
        title = "Wildfire Watch"
        model_card = [
            { param = "Dataset", value = "internal" },
            { param = "Epochs", value = "80" },
        ]
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("FIREWATCH_CONFIG", file.path());
    std::env::set_var("FIREWATCH_BACKEND", "stub");
    std::env::set_var("FIREWATCH_MAX_UPLOAD_BYTES", "2048");

    let cfg = AppConfig::load().expect("load config");

    assert_eq!(cfg.addr, "0.0.0.0:9000");
    assert_eq!(cfg.max_upload_bytes, 2048);
    assert_eq!(cfg.model.backend, BackendKind::Stub);
    assert_eq!(cfg.model.weights, PathBuf::from("weights/fire_v2.onnx"));
    assert_eq!(cfg.model.input_size, 320);
    assert_eq!(cfg.model.iou_threshold, 0.5);
    assert_eq!(cfg.model.class_names, vec!["smoke", "fire"]);
    assert_eq!((cfg.slider.min, cfg.slider.max, cfg.slider.default), (20, 90, 40));
    assert_eq!(cfg.page.title, "Wildfire Watch");
    assert_eq!(cfg.page.caption, "Using custom dataset");
    assert_eq!(cfg.page.model_card.len(), 2);
    assert_eq!(cfg.page.model_card[1].value, "80");

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load defaults");
    assert_eq!(cfg.addr, "127.0.0.1:8501");
    assert_eq!(cfg.model.backend, BackendKind::Tract);
    assert_eq!(cfg.model.weights, PathBuf::from("weights/best.onnx"));
    assert_eq!(cfg.model.input_size, 640);
    assert_eq!((cfg.slider.min, cfg.slider.max, cfg.slider.default), (15, 100, 20));
    assert!(cfg.model.stub_detections.is_empty());
    assert!(cfg.model.label_font.is_none());
}

#[test]
fn stub_detections_are_read_from_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        [model]
        backend = "stub"

        [[model.stub_detections]]
        class = "fire"
        confidence = 0.92
        bbox = { center_x = 40.0, center_y = 30.0, width = 20.0, height = 10.0 }

        [[model.stub_detections]]
        class = "smoke"
        confidence = 0.3
        bbox = { center_x = 10.0, center_y = 10.0, width = 8.0, height = 8.0 }
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("FIREWATCH_CONFIG", file.path());

    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.model.stub_detections.len(), 2);
    assert_eq!(cfg.model.stub_detections[0].class, DetectionClass::Fire);
    assert_eq!(cfg.model.stub_detections[1].bbox.width, 8.0);

    clear_env();
}

#[test]
fn blank_env_overrides_keep_file_and_default_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(
        &mut file,
        b"max_upload_bytes = 4096\n[model]\nlabel_font = \"fonts/label.ttf\"\n",
    )
    .expect("write config");
    std::env::set_var("FIREWATCH_CONFIG", file.path());
    std::env::set_var("FIREWATCH_MAX_UPLOAD_BYTES", "  ");
    std::env::set_var("FIREWATCH_BACKEND", "");

    let cfg = AppConfig::load().expect("blank overrides are ignored");
    assert_eq!(cfg.max_upload_bytes, 4096);
    assert_eq!(cfg.model.backend, BackendKind::Tract);
    assert_eq!(cfg.model.label_font, Some(PathBuf::from("fonts/label.ttf")));

    clear_env();
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(
        &mut file,
        b"[slider]\nmin = 60\nmax = 40\ndefault = 50\n",
    )
    .expect("write config");
    std::env::set_var("FIREWATCH_CONFIG", file.path());
    assert!(AppConfig::load().is_err());

    clear_env();
    std::env::set_var("FIREWATCH_MAX_UPLOAD_BYTES", "lots");
    assert!(AppConfig::load().is_err());

    clear_env();
    std::env::set_var("FIREWATCH_BACKEND", "cuda");
    assert!(AppConfig::load().is_err());

    clear_env();
}
