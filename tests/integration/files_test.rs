//! Integration tests for the assembled file catalog.

mod helpers;

use axum::http::{StatusCode, header};

#[tokio::test]
async fn test_list_files_empty() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/upload/files", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["files"], serde_json::json!([]));
}

#[tokio::test]
async fn test_list_files_after_merge() {
    let app = helpers::TestApp::new().await;
    app.upload_file("a-3-1", "a.txt", b"abc", 2).await;
    app.upload_file("b-1-1", "b.txt", b"b", 2).await;

    let response = app.request("GET", "/api/upload/files", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let files = response.body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "a.txt");
    assert_eq!(files[0]["size"], 3);
    assert!(files[0]["uploadTime"].is_string());
    assert!(files[0]["path"].as_str().unwrap().ends_with("a.txt"));
}

#[tokio::test]
async fn test_download_headers() {
    let app = helpers::TestApp::new().await;
    app.upload_file("n-5-1", "my notes.txt", b"hello", 1024).await;

    let response = app
        .request("GET", "/api/upload/download/my%20notes.txt", None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.bytes.as_ref(), b"hello");
    assert!(
        response.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert_eq!(
        response.headers[header::CONTENT_DISPOSITION],
        "attachment; filename*=UTF-8''my%20notes.txt"
    );
    assert_eq!(response.headers[header::CONTENT_LENGTH], "5");
}

#[tokio::test]
async fn test_download_missing_file() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/upload/download/nope.txt", None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "文件不存在");
}

#[tokio::test]
async fn test_delete_file() {
    let app = helpers::TestApp::new().await;
    app.upload_file("d-4-1", "d.bin", b"data", 4).await;

    let response = app.request("DELETE", "/api/upload/files/d.bin", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);

    let download = app.request("GET", "/api/upload/download/d.bin", None).await;
    assert_eq!(download.status, StatusCode::NOT_FOUND);

    let again = app.request("DELETE", "/api/upload/files/d.bin", None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
    assert_eq!(again.body["error"], "文件不存在");
}
