//! End-to-end tests: the real server on an ephemeral port driven by the
//! upload client over HTTP.

mod helpers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use chunkhub_api::{AppState, build_router};
use chunkhub_client::{
    AddOutcome, ChunkStore, FileSource, FsChunkStore, HttpTransport, SplitterPool, Transport,
    UploadScheduler, UploadStatus,
};
use chunkhub_core::config::{AppConfig, ClientConfig, RetryConfig};
use chunkhub_core::error::ErrorKind;
use chunkhub_core::protocol::MergeRequest;

const MIB: usize = 1024 * 1024;

struct Server {
    addr: SocketAddr,
    dir: TempDir,
}

impl Server {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.upload_root = dir.path().join("server").to_string_lossy().into_owned();
        let state = AppState::new(config).await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, dir }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_url: self.url(),
            chunk_size_bytes: MIB as u64,
            concurrency: 3,
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 10,
                max_backoff_ms: 50,
                multiplier: 2.0,
            },
            ..ClientConfig::default()
        }
    }

    fn transport(&self) -> HttpTransport {
        HttpTransport::new(&self.url(), Duration::from_secs(10)).unwrap()
    }

    async fn scheduler(&self) -> UploadScheduler {
        let store = FsChunkStore::open(self.dir.path().join("state")).await.unwrap();
        UploadScheduler::new(
            self.client_config(),
            Arc::new(store),
            Arc::new(self.transport()),
            Arc::new(SplitterPool::new(2).unwrap()),
        )
    }

    async fn source(&self, name: &str, len: usize) -> FileSource {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, helpers::content(len)).await.unwrap();
        FileSource::from_path(&path).await.unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_download_round_trip() {
    let server = Server::start().await;
    let scheduler = server.scheduler().await;
    let len = 5 * MIB / 2;

    let source = server.source("report.pdf", len).await;
    let outcomes = scheduler.add_files(vec![source], true).await;
    let AddOutcome::Added(id) = &outcomes[0] else {
        panic!("expected Added, got {:?}", outcomes[0]);
    };

    let record = scheduler.wait_idle(id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Success);
    assert_eq!(record.total_chunks, 3);

    let transport = server.transport();
    let files = transport.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "report.pdf");
    assert_eq!(files[0].size, len as u64);

    let dest = server.dir.path().join("downloaded.pdf");
    let written = transport.download_file("report.pdf", &dest).await.unwrap();
    assert_eq!(written, len as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), helpers::content(len));

    transport.delete_file("report.pdf").await.unwrap();
    assert!(transport.list_files().await.unwrap().is_empty());
    let err = transport.delete_file("report.pdf").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_resumes_after_restart() {
    let server = Server::start().await;
    let source = server.source("resume.bin", 2 * MIB + 17).await;

    let id = {
        let first = server.scheduler().await;
        let outcomes = first.add_files(vec![source], false).await;
        let AddOutcome::Added(id) = &outcomes[0] else {
            panic!("expected Added, got {:?}", outcomes[0]);
        };
        id.clone()
    };

    let second = server.scheduler().await;
    assert_eq!(second.restore_uploads().await.unwrap(), 1);
    assert_eq!(second.file(&id).await.unwrap().status, UploadStatus::Paused);

    second.resume_upload(&id).await.unwrap();
    let record = second.wait_idle(&id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Success);

    let files = server.transport().list_files().await.unwrap();
    assert_eq!(files[0].size, (2 * MIB + 17) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_merge_rejections_are_classified_over_http() {
    let server = Server::start().await;
    let transport = server.transport();

    let err = transport
        .merge_file(&MergeRequest {
            file_id: "ghost-10-1".to_string(),
            file_name: "ghost.bin".to_string(),
            total_chunks: 2,
            file_size: 10,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::MissingChunks);
    assert_eq!(err.missing_chunk_indices(), Some(vec![0, 1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_server_fails_upload() {
    let dir = tempfile::tempdir().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = ClientConfig {
        server_url: url.clone(),
        chunk_size_bytes: 1024,
        retry: RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            multiplier: 2.0,
        },
        ..ClientConfig::default()
    };
    let store = Arc::new(FsChunkStore::open(dir.path().join("state")).await.unwrap());
    let scheduler = UploadScheduler::new(
        config,
        store.clone(),
        Arc::new(HttpTransport::new(&url, Duration::from_secs(2)).unwrap()),
        Arc::new(SplitterPool::new(1).unwrap()),
    );

    let path = dir.path().join("offline.bin");
    tokio::fs::write(&path, helpers::content(3000)).await.unwrap();
    let source = FileSource::from_path(&path).await.unwrap();
    let outcomes = scheduler.add_files(vec![source], true).await;
    let AddOutcome::Added(id) = &outcomes[0] else {
        panic!("expected Added, got {:?}", outcomes[0]);
    };

    let record = scheduler.wait_idle(id).await.unwrap();
    assert_eq!(record.status, UploadStatus::Error);
    assert!(record.last_error.is_some());

    // Chunks stay on disk for a later resume.
    assert_eq!(store.chunks_for_file(id).await.unwrap().len(), 3);
}
