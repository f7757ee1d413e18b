//! Network side of the upload client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, Url};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::protocol::{
    ChunkAck, ErrorBody, FileListResponse, MergeRequest, MergeResponse, ProbeResponse,
    StoredFile, fields,
};
use chunkhub_core::result::AppResult;
use chunkhub_core::types::ChunkKey;

/// One chunk ready to send.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub key: ChunkKey,
    pub file_name: String,
    pub total_chunks: u32,
    pub payload: Bytes,
}

/// The three exchanges the scheduler needs from the server.
///
/// Failures that may succeed on retry are [`ErrorKind::Transport`]; merge
/// rejections are [`ErrorKind::MissingChunks`] or [`ErrorKind::SizeMismatch`].
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug + 'static {
    /// Whether the server already holds the chunk.
    async fn probe_chunk(&self, key: &ChunkKey) -> AppResult<bool>;

    async fn upload_chunk(&self, upload: ChunkUpload) -> AppResult<ChunkAck>;

    async fn merge_file(&self, request: &MergeRequest) -> AppResult<MergeResponse>;
}

/// [`Transport`] over HTTP, plus the file catalog endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

fn transport_error(e: reqwest::Error) -> AppError {
    AppError::with_source(ErrorKind::Transport, format!("HTTP error: {e}"), e)
}

impl HttpTransport {
    /// Client for the server at `server_url` with a per-request timeout.
    pub fn new(server_url: &str, timeout: Duration) -> AppResult<Self> {
        let base_url = Url::parse(server_url).map_err(|e| {
            AppError::configuration(format!("Invalid server URL '{server_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::configuration(format!(
                "Server URL cannot be used as a base: {server_url}"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self { http, base_url })
    }

    /// `{base}/api/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::configuration("Server URL cannot be used as a base"))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    /// Turn a non-2xx response into an error.
    async fn check(resp: Response) -> AppResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::not_found(message));
        }
        Err(
            AppError::transport(format!("Server returned {status}: {message}"))
                .with_details(serde_json::json!({ "status": status.as_u16() })),
        )
    }

    /// All assembled files on the server.
    pub async fn list_files(&self) -> AppResult<Vec<StoredFile>> {
        let resp = self
            .http
            .get(self.endpoint(&["upload", "files"])?)
            .send()
            .await
            .map_err(transport_error)?;
        let list: FileListResponse = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(list.files)
    }

    /// Stream an assembled file into `dest`. Returns the bytes written.
    pub async fn download_file(&self, file_name: &str, dest: &Path) -> AppResult<u64> {
        let resp = self
            .http
            .get(self.endpoint(&["upload", "download", file_name])?)
            .send()
            .await
            .map_err(transport_error)?;
        let resp = Self::check(resp).await?;

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Persistence,
                format!("Failed to create {}", dest.display()),
                e,
            )
        })?;

        let mut written = 0u64;
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport_error)?;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Persistence, "Failed to write download", e)
            })?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| {
            AppError::with_source(ErrorKind::Persistence, "Failed to flush download", e)
        })?;

        debug!(file_name, bytes = written, "Downloaded file");
        Ok(written)
    }

    /// Delete an assembled file on the server.
    pub async fn delete_file(&self, file_name: &str) -> AppResult<()> {
        let resp = self
            .http
            .delete(self.endpoint(&["upload", "files", file_name])?)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe_chunk(&self, key: &ChunkKey) -> AppResult<bool> {
        let resp = self
            .http
            .get(self.endpoint(&["upload", "check", &key.to_string()])?)
            .send()
            .await
            .map_err(transport_error)?;
        let probe: ProbeResponse = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(probe.exists)
    }

    async fn upload_chunk(&self, upload: ChunkUpload) -> AppResult<ChunkAck> {
        let key = upload.key.to_string();
        let part = Part::bytes(upload.payload.to_vec()).file_name(key.clone());
        let form = Form::new()
            .text(fields::HASH, key)
            .text(fields::INDEX, upload.key.index.to_string())
            .text(fields::FILE_ID, upload.key.file_id.to_string())
            .text(fields::FILE_NAME, upload.file_name)
            .text(fields::TOTAL_CHUNKS, upload.total_chunks.to_string())
            .part(fields::CHUNK, part);

        let resp = self
            .http
            .post(self.endpoint(&["upload", "chunk"])?)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(resp)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }

    async fn merge_file(&self, request: &MergeRequest) -> AppResult<MergeResponse> {
        let resp = self
            .http
            .post(self.endpoint(&["upload", "merge"])?)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status.is_success() {
            return resp.json().await.map_err(transport_error);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(merge_rejection(status, &body))
    }
}

/// Classify a failed merge response body.
fn merge_rejection(status: StatusCode, body: &str) -> AppError {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return AppError::transport(format!("Merge failed with {status}: {body}"));
    };

    if let Some(missing) = parsed
        .details
        .get("missingChunks")
        .and_then(|v| serde_json::from_value::<Vec<u32>>(v.clone()).ok())
    {
        return AppError::missing_chunks(missing);
    }

    let expected = parsed.details.get("expected").and_then(|v| v.as_u64());
    let actual = parsed.details.get("actual").and_then(|v| v.as_u64());
    if let (Some(expected), Some(actual)) = (expected, actual) {
        return AppError::size_mismatch(expected, actual);
    }

    AppError::transport(format!("Merge failed with {status}: {}", parsed.error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_chunk_keys() {
        let transport =
            HttpTransport::new("http://127.0.0.1:3001/", Duration::from_secs(1)).unwrap();
        let url = transport
            .endpoint(&["upload", "check", "my report.pdf-10-1-0"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:3001/api/upload/check/my%20report.pdf-10-1-0"
        );
    }

    #[test]
    fn invalid_server_url_is_a_configuration_error() {
        let err = HttpTransport::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn merge_rejections_are_classified() {
        let err = merge_rejection(
            StatusCode::BAD_REQUEST,
            r#"{"error":"缺少切片","code":"MISSING_CHUNKS","missingChunks":[1,3]}"#,
        );
        assert_eq!(err.missing_chunk_indices(), Some(vec![1, 3]));

        let err = merge_rejection(
            StatusCode::BAD_REQUEST,
            r#"{"error":"文件大小不匹配","expected":10,"actual":7}"#,
        );
        assert_eq!(err.kind, ErrorKind::SizeMismatch);

        let err = merge_rejection(StatusCode::BAD_GATEWAY, "<html>proxy</html>");
        assert_eq!(err.kind, ErrorKind::Transport);
        assert!(err.is_retryable());
    }
}
