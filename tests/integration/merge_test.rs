//! Integration tests for chunk merging.

mod helpers;

use axum::http::StatusCode;

#[tokio::test]
async fn test_merge_assembles_in_index_order() {
    let app = helpers::TestApp::new().await;
    let data = helpers::content(2500);
    let parts: Vec<&[u8]> = data.chunks(1000).collect();

    // Arrival order does not matter.
    for i in [2usize, 0, 1] {
        let response = app
            .upload_chunk("r.bin-2500-9", "r.bin", i as u32, 3, parts[i])
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = app.merge("r.bin-2500-9", "r.bin", 3, 2500).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["fileName"], "r.bin");
    assert_eq!(response.body["fileSize"], 2500);
    assert!(response.body["filePath"].as_str().unwrap().ends_with("r.bin"));

    let download = app.request("GET", "/api/upload/download/r.bin", None).await;
    assert_eq!(download.bytes.as_ref(), data.as_slice());

    // The holding area is gone after a successful merge.
    assert!(!app.chunk_exists("r.bin-2500-9", 0).await);
}

#[tokio::test]
async fn test_merge_reports_missing_chunks() {
    let app = helpers::TestApp::new().await;
    app.upload_chunk("m-30-1", "m.bin", 0, 3, &[1; 10]).await;
    app.upload_chunk("m-30-1", "m.bin", 2, 3, &[3; 10]).await;

    let response = app.merge("m-30-1", "m.bin", 3, 30).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "缺少切片");
    assert_eq!(response.body["missingChunks"], serde_json::json!([1]));

    let files = app.request("GET", "/api/upload/files", None).await;
    assert_eq!(files.body["files"], serde_json::json!([]));
    assert!(app.chunk_exists("m-30-1", 0).await);
}

#[tokio::test]
async fn test_merge_rejects_size_mismatch() {
    let app = helpers::TestApp::new().await;
    app.upload_chunk("s-10-1", "s.bin", 0, 1, &[7; 8]).await;

    let response = app.merge("s-10-1", "s.bin", 1, 10).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "文件大小不匹配");
    assert_eq!(response.body["expected"], 10);
    assert_eq!(response.body["actual"], 8);

    let download = app.request("GET", "/api/upload/download/s.bin", None).await;
    assert_eq!(download.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_merge_rejects_unsafe_names() {
    let app = helpers::TestApp::new().await;
    app.upload_chunk("u-1-1", "x", 0, 1, b"x").await;

    for name in ["../escape", "a/b", ""] {
        let response = app.merge("u-1-1", name, 1, 1).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "name {name:?}");
    }
}

#[tokio::test]
async fn test_merge_rejects_oversized_declaration() {
    let app = helpers::TestApp::with_config(|c| c.storage.max_upload_size_bytes = 100).await;

    let response = app.merge("o-1000-1", "o.bin", 1, 1000).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_merge_invalid_body() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/api/upload/merge",
            Some(serde_json::json!({ "fileName": "x" })),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_merge_replaces_existing_file() {
    let app = helpers::TestApp::new().await;
    app.upload_file("v1-3-1", "same.txt", b"one", 2).await;
    app.upload_file("v2-5-1", "same.txt", b"three", 2).await;

    let download = app.request("GET", "/api/upload/download/same.txt", None).await;
    assert_eq!(download.bytes.as_ref(), b"three");
}
