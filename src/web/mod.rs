//! Page server: serves the demo page and runs one detection per request.
//!
//! Requests are handled one at a time on a single server thread. The
//! `Detector` is moved into that thread and only read from there.

use crate::config::{AppConfig, ConfidenceSlider, PageSettings};
use crate::detect::Detector;
use crate::error::{ModelLoadError, UploadError};
use crate::present::{self, html};
use crate::upload::{decode_upload, ImageKind};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_HEADER_BYTES: usize = 8192;

#[derive(Clone, Debug)]
pub struct WebConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
    pub slider: ConfidenceSlider,
    pub page: PageSettings,
}

impl Default for WebConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        Self::from(&app)
    }
}

impl From<&AppConfig> for WebConfig {
    fn from(app: &AppConfig) -> Self {
        Self {
            addr: app.addr.clone(),
            max_upload_bytes: app.max_upload_bytes,
            slider: app.slider,
            page: app.page.clone(),
        }
    }
}

#[derive(Debug)]
pub struct WebHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WebHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("page server thread panicked"))?;
        }
        Ok(())
    }
}

/// Detector state handed to the server: loaded, or the reason it is not.
pub enum ModelState {
    Ready(Detector),
    Failed(String),
}

impl From<Result<Detector, ModelLoadError>> for ModelState {
    fn from(loaded: Result<Detector, ModelLoadError>) -> Self {
        match loaded {
            Ok(detector) => ModelState::Ready(detector),
            Err(err) => ModelState::Failed(err.to_string()),
        }
    }
}

impl ModelState {
    fn error(&self) -> Option<&str> {
        match self {
            ModelState::Ready(_) => None,
            ModelState::Failed(err) => Some(err),
        }
    }
}

pub struct WebServer {
    cfg: WebConfig,
    model: ModelState,
}

impl WebServer {
    pub fn new(cfg: WebConfig, model: impl Into<ModelState>) -> Self {
        Self {
            cfg,
            model: model.into(),
        }
    }

    pub fn spawn(self) -> Result<WebHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_server(listener, &self.cfg, &self.model, shutdown_thread) {
                log::error!("page server stopped: {}", err);
            }
        });

        Ok(WebHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(
    listener: TcpListener,
    cfg: &WebConfig,
    model: &ModelState,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, cfg, model) {
                    log::warn!("page request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, cfg: &WebConfig, model: &ModelState) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut request = read_request(&mut stream)?;

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") => {
            let body = html::page(&html::PageContext {
                page: &cfg.page,
                slider: cfg.slider,
                model_error: model.error(),
            });
            write_html_response(&mut stream, 200, &body)
        }
        ("GET", "/health") => {
            let model_status = if model.error().is_none() {
                "ready"
            } else {
                "unavailable"
            };
            let body = serde_json::json!({ "status": "ok", "model": model_status });
            write_response(
                &mut stream,
                200,
                "application/json",
                body.to_string().as_bytes(),
            )
        }
        ("POST", "/detect") => {
            let (status, body) = handle_detect(&mut stream, &mut request, cfg, model);
            write_html_response(&mut stream, status, &body)?;
            request.discard_unread_body(&mut stream);
            Ok(())
        }
        (_, "/") | (_, "/health") | (_, "/detect") => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

/// Returns the status and HTML fragment for one detection request.
fn handle_detect(
    stream: &mut TcpStream,
    request: &mut HttpRequest,
    cfg: &WebConfig,
    model: &ModelState,
) -> (u16, String) {
    let detector = match model {
        ModelState::Ready(detector) => detector,
        ModelState::Failed(err) => {
            log::warn!("detect requested but model is unavailable: {}", err);
            return (
                503,
                html::error_fragment(&format!("Detection is disabled: {err}")),
            );
        }
    };

    let threshold = match cfg.slider.parse_fraction(request.query_param("confidence")) {
        Ok(threshold) => threshold,
        Err(err) => {
            log::warn!("detect rejected: {}", err);
            return (400, html::error_fragment(&err.to_string()));
        }
    };

    if request.content_length() == 0 {
        return upload_failure(UploadError::Empty);
    }

    let kind = match ImageKind::from_mime(request.header("content-type").unwrap_or("")) {
        Ok(kind) => kind,
        Err(err) => return upload_failure(err),
    };

    let bytes = match request.read_body(stream, cfg.max_upload_bytes) {
        Ok(bytes) => bytes,
        Err(err) => return upload_failure(err),
    };

    let image = match decode_upload(&bytes, kind) {
        Ok(image) => image,
        Err(err) => return upload_failure(err),
    };

    let result = match detector.detect(&image, threshold) {
        Ok(result) => result,
        Err(err) => {
            log::error!("detection failed: {:#}", err);
            return (500, html::error_fragment(&format!("Detection failed: {err}")));
        }
    };
    log::info!(
        "detected {} object(s) at confidence {:.2} (preprocess {:.2} ms, inference {:.2} ms, postprocess {:.2} ms)",
        result.detections.len(),
        threshold,
        result.speed.preprocess,
        result.speed.inference,
        result.speed.postprocess
    );

    match present::build_report(&result) {
        Ok(report) => (200, html::result_fragment(&report)),
        Err(err) => {
            log::error!("failed to render report: {:#}", err);
            (500, html::error_fragment(&err.to_string()))
        }
    }
}

fn upload_failure(err: UploadError) -> (u16, String) {
    log::warn!("upload rejected: {}", err);
    let status = match err {
        UploadError::UnsupportedFileType(_) => 415,
        UploadError::TooLarge { .. } => 413,
        UploadError::Empty | UploadError::Decode(_) => 400,
    };
    (status, html::error_fragment(&err.to_string()))
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("request headers too large"));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before headers completed"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let leftover = data[header_end + 4..].to_vec();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
        raw_path: raw_path.to_string(),
        leftover,
        body_read: false,
    })
}

fn write_html_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "text/html; charset=utf-8", body.as_bytes())
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        415 => "HTTP/1.1 415 Unsupported Media Type",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    raw_path: String,
    /// Body bytes that arrived together with the headers.
    leftover: Vec<u8>,
    body_read: bool,
}

impl HttpRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    fn query_param(&self, key: &str) -> Option<&str> {
        let query = self.raw_path.split_once('?')?.1;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Read exactly `Content-Length` body bytes, bounded by `limit`.
    fn read_body(&mut self, stream: &mut TcpStream, limit: usize) -> Result<Vec<u8>, UploadError> {
        let len = self.content_length();
        if len == 0 {
            return Err(UploadError::Empty);
        }
        if len > limit {
            return Err(UploadError::TooLarge { limit });
        }
        self.body_read = true;
        let mut body = std::mem::take(&mut self.leftover);
        body.truncate(len);
        let mut remaining = len - body.len();
        let mut buf = [0u8; 8192];
        while remaining > 0 {
            let want = remaining.min(buf.len());
            let n = stream
                .read(&mut buf[..want])
                .map_err(|e| UploadError::Decode(format!("failed to read upload: {e}")))?;
            if n == 0 {
                return Err(UploadError::Decode("upload ended early".to_string()));
            }
            body.extend_from_slice(&buf[..n]);
            remaining -= n;
        }
        Ok(body)
    }

    fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Consume a body that was never read so closing the socket does not
    /// reset the connection before the client sees the response.
    fn discard_unread_body(&self, stream: &mut TcpStream) {
        if self.body_read {
            return;
        }
        let _ = stream.shutdown(Shutdown::Write);
        let _ = stream.set_read_timeout(Some(Duration::from_secs(1)));
        let mut remaining = self.content_length().saturating_sub(self.leftover.len());
        let mut buf = [0u8; 8192];
        while remaining > 0 {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => remaining = remaining.saturating_sub(n),
            }
        }
    }
}
