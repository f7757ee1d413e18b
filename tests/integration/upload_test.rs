//! Integration tests for chunk upload and probe.

mod helpers;

use axum::http::StatusCode;

#[tokio::test]
async fn test_upload_chunk_then_probe() {
    let app = helpers::TestApp::new().await;

    let response = app
        .upload_chunk("notes.txt-10-1700", "notes.txt", 0, 2, b"hello")
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["hash"], "notes.txt-10-1700-0");
    assert_eq!(response.body["index"], 0);

    assert!(app.chunk_exists("notes.txt-10-1700", 0).await);
    assert!(!app.chunk_exists("notes.txt-10-1700", 1).await);
}

#[tokio::test]
async fn test_reupload_overwrites_chunk() {
    let app = helpers::TestApp::new().await;

    for data in [b"first".as_slice(), b"again".as_slice()] {
        let response = app.upload_chunk("f-5-1", "f", 0, 1, data).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = app.merge("f-5-1", "f", 1, 5).await;
    assert_eq!(response.status, StatusCode::OK);
    let download = app.request("GET", "/api/upload/download/f", None).await;
    assert_eq!(download.bytes.as_ref(), b"again");
}

#[tokio::test]
async fn test_upload_without_chunk_part() {
    let app = helpers::TestApp::new().await;

    let response = app
        .post_multipart(&[("fileId", "f-1-1"), ("index", "0")], None)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "没有接收到文件");
}

#[tokio::test]
async fn test_upload_missing_file_id() {
    let app = helpers::TestApp::new().await;

    let response = app
        .post_multipart(&[("index", "0")], Some(b"data"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "VALIDATION");
}

#[tokio::test]
async fn test_upload_index_out_of_range() {
    let app = helpers::TestApp::new().await;

    let response = app.upload_chunk("f-1-1", "f", 3, 3, b"x").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_non_numeric_index() {
    let app = helpers::TestApp::new().await;

    let response = app
        .post_multipart(&[("fileId", "f-1-1"), ("index", "first")], Some(b"x"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_probe_malformed_key() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request("GET", "/api/upload/check/no-index-here", None)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_chunk_request_rejected() {
    let app = helpers::TestApp::with_config(|c| c.storage.max_chunk_request_bytes = 1024).await;

    let response = app
        .upload_chunk("big-4096-1", "big", 0, 1, &helpers::content(4096))
        .await;

    assert!(response.status.is_client_error());
    assert!(!app.chunk_exists("big-4096-1", 0).await);
}

#[tokio::test]
async fn test_health() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["storage"], "available");
}
