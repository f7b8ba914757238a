#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use serde_json::{Value, json};
use shop_backend::config::{AppConfig, UploadConfig};
use shop_backend::infrastructure::database;
use shop_backend::{AppState, create_app};
use std::io::Cursor;
use std::path::Path;
use tower::ServiceExt;

pub const BOUNDARY: &str = "---------------------------974767299852498929531610575";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub upload_dir: tempfile::TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::development()).await
}

pub async fn spawn_app_with(mut config: AppConfig) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    config.upload = UploadConfig {
        upload_dir: upload_dir.path().to_path_buf(),
        ..config.upload
    };

    let db = database::setup_in_memory().await.unwrap();
    let state = AppState::new(db, config);
    let app = create_app(state.clone());

    TestApp {
        app,
        state,
        upload_dir,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Registers a customer and returns its token
pub async fn register(app: &Router, email: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/auth/register",
            None,
            json!({ "email": email, "password": "password123", "name": name }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

pub async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": email, "password": password }),
        ),
    )
    .await
}

pub fn multipart_request(
    token: Option<&str>,
    field: &str,
    file_name: Option<&str>,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let disposition = match file_name {
        Some(name) => format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, name
        ),
        None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", field),
    };

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder().method("POST").uri("/upload").header(
        "Content-Type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

/// A real JPEG padded with zeros up to `len` bytes
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let img = RgbImage::from_fn(64, 48, |x, y| image::Rgb([(x * 4) as u8, (y * 5) as u8, 90]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageOutputFormat::Jpeg(90))
        .unwrap();
    let mut bytes = buf.into_inner();
    assert!(bytes.len() <= len);
    bytes.resize(len, 0);
    bytes
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}
