//! Shared test helpers for integration tests.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use chunkhub_api::{AppState, build_router};
use chunkhub_core::config::AppConfig;

const BOUNDARY: &str = "chunkhub-test-boundary";

/// Test application over a throwaway upload directory
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Application config
    pub config: AppConfig,
    /// Upload root; removed on drop
    pub dir: TempDir,
}

/// Response with the body parsed as JSON
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub bytes: Bytes,
    /// Parsed JSON body (`Null` when not JSON)
    pub body: Value,
}

impl TestApp {
    /// Create a new test application with default settings
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a new test application, adjusting the config first
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = AppConfig::default();
        config.storage.upload_root = dir.path().to_string_lossy().into_owned();
        adjust(&mut config);

        let state = AppState::new(config.clone())
            .await
            .expect("Failed to build app state");

        Self {
            router: build_router(state),
            config,
            dir,
        }
    }

    /// Send a request and collect the response
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024 * 1024)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }

    /// Make a JSON request
    pub async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body_str))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// POST a multipart chunk upload with the given text fields
    pub async fn post_multipart(&self, fields: &[(&str, &str)], chunk: Option<&[u8]>) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri("/api/upload/chunk")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields, chunk)))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Upload chunk `index` of `file_id`
    pub async fn upload_chunk(
        &self,
        file_id: &str,
        file_name: &str,
        index: u32,
        total_chunks: u32,
        data: &[u8],
    ) -> TestResponse {
        let hash = format!("{file_id}-{index}");
        let index = index.to_string();
        let total = total_chunks.to_string();
        self.post_multipart(
            &[
                ("hash", &hash),
                ("index", &index),
                ("fileId", file_id),
                ("fileName", file_name),
                ("totalChunks", &total),
            ],
            Some(data),
        )
        .await
    }

    /// Request a merge
    pub async fn merge(
        &self,
        file_id: &str,
        file_name: &str,
        total_chunks: u32,
        file_size: u64,
    ) -> TestResponse {
        self.request(
            "POST",
            "/api/upload/merge",
            Some(json!({
                "fileId": file_id,
                "fileName": file_name,
                "totalChunks": total_chunks,
                "fileSize": file_size,
            })),
        )
        .await
    }

    /// Whether the server holds chunk `index` of `file_id`
    pub async fn chunk_exists(&self, file_id: &str, index: u32) -> bool {
        let response = self
            .request("GET", &format!("/api/upload/check/{file_id}-{index}"), None)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        response.body["exists"].as_bool().expect("exists flag")
    }

    /// Upload `data` in `chunk_size` pieces and merge it as `file_name`
    pub async fn upload_file(&self, file_id: &str, file_name: &str, data: &[u8], chunk_size: usize) {
        let chunks: Vec<&[u8]> = data.chunks(chunk_size).collect();
        let total = chunks.len() as u32;
        for (i, chunk) in chunks.iter().enumerate() {
            let response = self
                .upload_chunk(file_id, file_name, i as u32, total, chunk)
                .await;
            assert_eq!(response.status, StatusCode::OK);
        }
        let response = self.merge(file_id, file_name, total, data.len() as u64).await;
        assert_eq!(response.status, StatusCode::OK, "merge failed: {}", response.body);
    }
}

/// Hand-built `multipart/form-data` body
pub fn multipart_body(fields: &[(&str, &str)], chunk: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(data) = chunk {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"chunk\"; filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Deterministic test content
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
