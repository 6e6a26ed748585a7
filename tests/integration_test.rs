use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::io::Cursor;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

// Use atomic counter to give each test a unique port
static PORT_COUNTER: AtomicU16 = AtomicU16::new(9400);

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct InfoResponse {
    version: String,
    languages: Vec<String>,
    use_accelerator: bool,
    engine_ready: bool,
    pdf_render_scale: f32,
    max_file_size_bytes: usize,
    max_request_size_bytes: usize,
}

struct TestServer {
    child: Child,
    port: u16,
}

impl TestServer {
    /// Start with a lazy engine so no models are loaded until an OCR request needs them
    fn start() -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);

        let child = Command::new(env!("CARGO_BIN_EXE_ocr-text-server"))
            .args([
                "--host",
                "127.0.0.1",
                "--port",
                &port.to_string(),
                "--lazy-engine",
            ])
            .spawn()
            .expect("Failed to start server");

        // Wait for server to be ready
        std::thread::sleep(Duration::from_secs(2));

        Self { child, port }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn file_part(bytes: Vec<u8>, filename: &str, mime_type: &str) -> Part {
    Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime_type)
        .unwrap()
}

fn blank_png() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(200, 80, image::Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start();
    let client = reqwest::Client::new();

    let response: serde_json::Value = client
        .get(server.url("/health"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response, serde_json::json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_root_endpoint() {
    let server = TestServer::start();
    let client = reqwest::Client::new();

    let response: serde_json::Value = client
        .get(server.url("/"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    let message = response["message"].as_str().expect("message field");
    assert!(message.contains("OCR server is running"));
}

#[tokio::test]
async fn test_info_endpoint_before_first_request() {
    let server = TestServer::start();
    let client = reqwest::Client::new();

    let info: InfoResponse = client
        .get(server.url("/info"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert!(!info.version.is_empty());
    assert_eq!(info.languages, vec!["vi", "en"]);
    assert!(!info.engine_ready);
    assert_eq!(info.pdf_render_scale, 2.0);
    assert_eq!(info.max_file_size_bytes, 52_428_800);
}

#[tokio::test]
async fn test_ocr_without_files_is_rejected() {
    let server = TestServer::start();
    let client = reqwest::Client::new();

    let form = Form::new().text("note", "no files here");
    let response = client
        .post(server.url("/ocr"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.code, "NO_FILES");
}

#[tokio::test]
async fn test_ocr_pdf_rejects_other_extensions() {
    let server = TestServer::start();
    let client = reqwest::Client::new();

    let form = Form::new().part("file", file_part(blank_png(), "scan.png", "image/png"));
    let response = client
        .post(server.url("/ocr-pdf"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.code, "WRONG_FILE_TYPE");
    assert!(body.error.contains("scan.png"));
}

#[tokio::test]
async fn test_ocr_pdf_rejects_non_pdf_content() {
    let server = TestServer::start();
    let client = reqwest::Client::new();

    let form = Form::new().part(
        "file",
        file_part(b"definitely not a pdf".to_vec(), "x.pdf", "application/pdf"),
    );
    let response = client
        .post(server.url("/ocr-pdf"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.code, "INVALID_DOCUMENT");

    // Validation happens before the engine is needed
    let info: InfoResponse = client
        .get(server.url("/info"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert!(!info.engine_ready);
}

// Needs the recognition models (downloaded on first use)
#[tokio::test]
#[ignore]
async fn test_ocr_blank_image_returns_empty_text() {
    let server = TestServer::start();
    let client = reqwest::Client::new();

    let form = Form::new()
        .part("first", file_part(blank_png(), "a.png", "image/png"))
        .part("second", file_part(blank_png(), "b.png", "image/png"));
    let response = client
        .post(server.url("/ocr"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: OcrResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.text, "");

    let info: InfoResponse = client
        .get(server.url("/info"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(info.engine_ready);
}

// Needs the recognition models
#[tokio::test]
#[ignore]
async fn test_ocr_base64_parts() {
    use base64::Engine as _;

    let server = TestServer::start();
    let client = reqwest::Client::new();

    let encoded = base64::engine::general_purpose::STANDARD.encode(blank_png());
    let response = client
        .post(server.url("/ocr"))
        .json(&serde_json::json!({
            "imageParts": [{ "mimeType": "image/png", "data": encoded }]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: OcrResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.text, "");
}
