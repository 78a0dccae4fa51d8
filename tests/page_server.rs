use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::io::{Cursor, Read, Write};
use std::net::TcpStream;

use firewatch::web::{ModelState, WebConfig, WebHandle, WebServer};
use firewatch::{
    BoundingBox, Detection, DetectionClass, Detector, ModelLoadError, StubBackend,
    NO_DETECTIONS_MESSAGE,
};

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(64, 48, Rgb([30, 90, 30]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

fn det(class: DetectionClass, confidence: f32) -> Detection {
    Detection {
        class,
        confidence,
        bbox: BoundingBox {
            center_x: 32.0,
            center_y: 24.0,
            width: 20.0,
            height: 16.0,
        },
    }
}

fn read_response(stream: &mut TcpStream) -> Result<(String, String)> {
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let mut parts = response.splitn(2, "\r\n\r\n");
    let headers = parts.next().unwrap_or("").to_string();
    let body = parts.next().unwrap_or("").to_string();
    Ok((headers, body))
}

fn send(handle: &WebHandle, request: &str) -> Result<(String, String)> {
    let mut stream = TcpStream::connect(handle.addr)?;
    stream.write_all(request.as_bytes())?;
    read_response(&mut stream)
}

fn get(handle: &WebHandle, path: &str) -> Result<(String, String)> {
    send(
        handle,
        &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"),
    )
}

fn post_image(
    handle: &WebHandle,
    path: &str,
    content_type: &str,
    body: &[u8],
) -> Result<(String, String)> {
    let mut stream = TcpStream::connect(handle.addr)?;
    let head = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(body)?;
    read_response(&mut stream)
}

struct TestServer {
    handle: Option<WebHandle>,
}

impl TestServer {
    fn new(model: impl Into<ModelState>) -> Result<Self> {
        Self::with_config(WebConfig::default(), model)
    }

    fn with_config(mut cfg: WebConfig, model: impl Into<ModelState>) -> Result<Self> {
        cfg.addr = "127.0.0.1:0".to_string();
        let handle = WebServer::new(cfg, model).spawn()?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    fn stub(raw: Vec<Detection>) -> Result<Self> {
        Self::new(ModelState::Ready(Detector::new(StubBackend::new(raw))))
    }

    fn handle(&self) -> &WebHandle {
        self.handle
            .as_ref()
            .expect("test server handle should be initialized")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().expect("failed to stop page server");
        }
    }
}

#[test]
fn index_page_renders_controls() -> Result<()> {
    let server = TestServer::stub(vec![])?;
    let (headers, body) = get(server.handle(), "/")?;
    assert!(headers.contains("200 OK"));
    assert!(headers.contains("text/html"));
    assert!(body.contains("Detect Objects"));
    assert!(body.contains("Model Characteristics:"));
    assert!(body.contains(r#"type="range" id="confidence" min="15" max="100" value="20""#));
    Ok(())
}

#[test]
fn health_reports_model_state() -> Result<()> {
    let server = TestServer::stub(vec![])?;
    let (headers, body) = get(server.handle(), "/health")?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["model"], "ready");
    Ok(())
}

#[test]
fn detect_renders_rows_charts_and_timings() -> Result<()> {
    let server = TestServer::stub(vec![
        det(DetectionClass::Fire, 0.92),
        det(DetectionClass::Smoke, 0.81),
        det(DetectionClass::Fire, 0.77),
        det(DetectionClass::Smoke, 0.10),
    ])?;
    let (headers, body) = post_image(
        server.handle(),
        "/detect?confidence=50",
        "image/png",
        &png_bytes(),
    )?;
    assert!(headers.contains("200 OK"));
    assert!(body.contains("<span style='color:red'>Fire</span> - Confidence: 0.92"));
    assert!(body.contains("<span style='color:blue'>Smoke</span> - Confidence: 0.81"));
    assert!(!body.contains("Confidence: 0.10"));
    assert!(body.contains("Total Fires Detected: 2"));
    assert!(body.contains("Total Smokes Detected: 1"));
    assert!(body.contains("Preprocess Time:"));
    assert!(body.contains("data:image/png;base64,"));
    assert!(body.contains(r#"id="bar-chart""#));
    assert!(body.contains(r#"id="pie-chart""#));
    assert!(body.contains(">66.7%<"));
    assert!(body.contains(">33.3%<"));
    Ok(())
}

#[test]
fn detect_without_detections_shows_message_and_no_charts() -> Result<()> {
    let server = TestServer::stub(vec![det(DetectionClass::Fire, 0.2)])?;
    let (headers, body) = post_image(
        server.handle(),
        "/detect?confidence=60",
        "image/png",
        &png_bytes(),
    )?;
    assert!(headers.contains("200 OK"));
    assert!(body.contains(NO_DETECTIONS_MESSAGE));
    assert!(!body.contains("<svg"));
    Ok(())
}

#[test]
fn unsupported_file_type_is_rejected_without_detection() -> Result<()> {
    let server = TestServer::stub(vec![det(DetectionClass::Fire, 0.9)])?;
    let (headers, body) = post_image(server.handle(), "/detect", "image/gif", b"GIF89a")?;
    assert!(headers.contains("415 Unsupported Media Type"));
    assert!(body.contains("Unsupported file type"));
    Ok(())
}

#[test]
fn empty_upload_is_a_no_op() -> Result<()> {
    let server = TestServer::stub(vec![det(DetectionClass::Fire, 0.9)])?;
    let (headers, body) = post_image(server.handle(), "/detect", "image/png", b"")?;
    assert!(headers.contains("400 Bad Request"));
    assert!(body.contains("Upload an image first."));
    assert!(!body.contains("Total Fires Detected"));
    Ok(())
}

#[test]
fn empty_upload_without_content_type_asks_for_an_image() -> Result<()> {
    let server = TestServer::stub(vec![det(DetectionClass::Fire, 0.9)])?;
    let (headers, body) = send(
        server.handle(),
        "POST /detect HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n",
    )?;
    assert!(headers.contains("400 Bad Request"));
    assert!(body.contains("Upload an image first."));
    assert!(!body.contains("Unsupported file type"));
    Ok(())
}

#[test]
fn out_of_range_confidence_is_rejected() -> Result<()> {
    let server = TestServer::stub(vec![])?;
    let (headers, _body) = post_image(
        server.handle(),
        "/detect?confidence=5",
        "image/png",
        &png_bytes(),
    )?;
    assert!(headers.contains("400 Bad Request"));
    Ok(())
}

#[test]
fn oversized_upload_is_rejected() -> Result<()> {
    let cfg = WebConfig {
        max_upload_bytes: 16,
        ..WebConfig::default()
    };
    let server = TestServer::with_config(
        cfg,
        ModelState::Ready(Detector::new(StubBackend::empty())),
    )?;
    let (headers, _body) = post_image(server.handle(), "/detect", "image/png", &png_bytes())?;
    assert!(headers.contains("413 Payload Too Large"));
    Ok(())
}

#[test]
fn model_load_failure_disables_detection() -> Result<()> {
    let failed: Result<Detector, ModelLoadError> = Err(ModelLoadError::MissingWeights(
        "weights/best.onnx".into(),
    ));
    let server = TestServer::new(failed)?;

    let (_headers, page) = get(server.handle(), "/")?;
    assert!(page.contains(r#"id="model-error""#));
    assert!(page.contains("model weights not found at weights/best.onnx"));

    let (headers, body) = get(server.handle(), "/health")?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["model"], "unavailable");

    let (headers, body) = post_image(server.handle(), "/detect", "image/png", &png_bytes())?;
    assert!(headers.contains("503 Service Unavailable"));
    assert!(body.contains("Detection is disabled"));
    Ok(())
}

#[test]
fn unknown_paths_and_methods_are_refused() -> Result<()> {
    let server = TestServer::stub(vec![])?;
    let (headers, _) = get(server.handle(), "/events")?;
    assert!(headers.contains("404 Not Found"));
    let (headers, _) = get(server.handle(), "/detect")?;
    assert!(headers.contains("405 Method Not Allowed"));
    Ok(())
}
