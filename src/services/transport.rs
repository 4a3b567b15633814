use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::SourceFile;

/// Byte-level progress callback, invoked with a 0..=100 percentage.
/// Values are monotonically non-decreasing over one upload.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

pub fn noop_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// What the archive destination reports back about the stored file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub storage_path: Option<String>,
    #[serde(rename = "downloadURL")]
    pub download_url: Option<String>,
    pub file_name: Option<String>,
}

/// A single portable upload capability. The original file is archived once,
/// against exactly one shipment id, even when the batch targets several.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(
        &self,
        file: &SourceFile,
        shipment_id: &str,
        on_progress: ProgressFn,
    ) -> Result<UploadReceipt, IngestError>;

    fn name(&self) -> &'static str;
}

fn content_type_for(file: &SourceFile) -> &'static str {
    match file.extension().as_deref() {
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        Some("csv") => "text/csv",
        _ => mime::APPLICATION_OCTET_STREAM.essence_str(),
    }
}

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Primary path: stream the file to the server-mediated upload endpoint as
/// a multipart form (`file` + `shipmentId`), reporting progress on every
/// chunk handed to the wire.
pub struct HttpUploadTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpUploadTransport {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    fn progress_body(file: &SourceFile, on_progress: ProgressFn) -> reqwest::Body {
        let bytes = file.bytes.clone();
        let total = bytes.len().max(1) as u64;
        let stream = async_stream::stream! {
            let mut sent: u64 = 0;
            for chunk in bytes.chunks(UPLOAD_CHUNK_SIZE) {
                sent += chunk.len() as u64;
                on_progress((sent * 100 / total) as u8);
                yield Ok::<_, std::io::Error>(Bytes::copy_from_slice(chunk));
            }
        };
        reqwest::Body::wrap_stream(stream)
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn upload(
        &self,
        file: &SourceFile,
        shipment_id: &str,
        on_progress: ProgressFn,
    ) -> Result<UploadReceipt, IngestError> {
        let part = reqwest::multipart::Part::stream_with_length(
            Self::progress_body(file, on_progress),
            file.bytes.len() as u64,
        )
        .file_name(file.name.clone())
        .mime_str(content_type_for(file))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("shipmentId", shipment_id.to_string());

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Endpoint {
                status: status.as_u16(),
                message: endpoint_message(&body),
            });
        }

        let receipt: UploadReceipt = response.json().await?;
        tracing::info!(
            file = %file.name,
            path = receipt.storage_path.as_deref().unwrap_or("-"),
            "archived source file via upload endpoint"
        );
        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Pulls a human-readable failure out of a non-2xx body, which may carry
/// `{ message }` or `{ error }`.
pub(crate) fn endpoint_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "no response body".to_string()
            } else {
                body.trim().to_string()
            }
        })
}

/// Fallback path: client-direct upload to the storage backend. No progress
/// while the transfer runs; the fallback decorator reports 100% after it
/// succeeds.
pub struct S3UploadTransport {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3UploadTransport {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl UploadTransport for S3UploadTransport {
    async fn upload(
        &self,
        file: &SourceFile,
        shipment_id: &str,
        _on_progress: ProgressFn,
    ) -> Result<UploadReceipt, IngestError> {
        let key = format!("production/{}/{}_{}", shipment_id, Uuid::new_v4(), file.name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type_for(file))
            .body(aws_sdk_s3::primitives::ByteStream::from(
                file.bytes.to_vec(),
            ))
            .send()
            .await
            .map_err(|e| IngestError::Upload(anyhow!(e).to_string()))?;

        tracing::info!(file = %file.name, key = %key, "archived source file direct to storage");
        Ok(UploadReceipt {
            download_url: Some(format!("{}/{}", self.bucket, key)),
            storage_path: Some(key),
            file_name: Some(file.name.clone()),
        })
    }

    fn name(&self) -> &'static str {
        "s3-direct"
    }
}

/// Try primary, fall back to secondary exactly once. On secondary success
/// the caller's progress callback is brought to 100% synthetically since
/// the direct path reports none of its own.
pub struct FallbackUploadTransport {
    primary: Arc<dyn UploadTransport>,
    secondary: Arc<dyn UploadTransport>,
}

impl FallbackUploadTransport {
    pub fn new(primary: Arc<dyn UploadTransport>, secondary: Arc<dyn UploadTransport>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl UploadTransport for FallbackUploadTransport {
    async fn upload(
        &self,
        file: &SourceFile,
        shipment_id: &str,
        on_progress: ProgressFn,
    ) -> Result<UploadReceipt, IngestError> {
        let primary_err = match self
            .primary
            .upload(file, shipment_id, on_progress.clone())
            .await
        {
            Ok(receipt) => return Ok(receipt),
            Err(e) => e,
        };

        tracing::warn!(
            transport = self.primary.name(),
            error = %primary_err,
            "primary upload failed, trying {}",
            self.secondary.name()
        );

        match self
            .secondary
            .upload(file, shipment_id, on_progress.clone())
            .await
        {
            Ok(receipt) => {
                on_progress(100);
                Ok(receipt)
            }
            Err(secondary_err) => Err(IngestError::Upload(format!(
                "{}: {}; {}: {}",
                self.primary.name(),
                primary_err,
                self.secondary.name(),
                secondary_err
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "fallback-chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubTransport {
        calls: AtomicU32,
        fail: bool,
    }

    impl StubTransport {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl UploadTransport for StubTransport {
        async fn upload(
            &self,
            file: &SourceFile,
            _shipment_id: &str,
            _on_progress: ProgressFn,
        ) -> Result<UploadReceipt, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(IngestError::Upload("stub down".to_string()))
            } else {
                Ok(UploadReceipt {
                    storage_path: Some("stub/key".to_string()),
                    download_url: None,
                    file_name: Some(file.name.clone()),
                })
            }
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn recorded_progress() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));
        (callback, seen)
    }

    fn source() -> SourceFile {
        SourceFile::new("cases.csv", Bytes::from_static(b"Case No\n"))
    }

    #[tokio::test]
    async fn test_fallback_invoked_once_and_reports_full_progress() {
        let primary = StubTransport::new(true);
        let secondary = StubTransport::new(false);
        let chain = FallbackUploadTransport::new(primary.clone(), secondary.clone());
        let (progress, seen) = recorded_progress();

        let receipt = chain.upload(&source(), "SHP-1", progress).await.unwrap();

        assert_eq!(receipt.storage_path.as_deref(), Some("stub/key"));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
        assert!(seen.lock().unwrap().contains(&100));
    }

    #[tokio::test]
    async fn test_secondary_untouched_when_primary_succeeds() {
        let primary = StubTransport::new(false);
        let secondary = StubTransport::new(true);
        let chain = FallbackUploadTransport::new(primary.clone(), secondary.clone());

        chain
            .upload(&source(), "SHP-1", noop_progress())
            .await
            .unwrap();
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_both_paths_failing_surfaces_combined_error() {
        let chain = FallbackUploadTransport::new(StubTransport::new(true), StubTransport::new(true));

        let err = chain
            .upload(&source(), "SHP-1", noop_progress())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("stub down"));
    }

    #[test]
    fn test_endpoint_message_extraction() {
        assert_eq!(endpoint_message(r#"{"message":"bucket gone"}"#), "bucket gone");
        assert_eq!(endpoint_message(r#"{"error":"denied"}"#), "denied");
        assert_eq!(endpoint_message("plain text"), "plain text");
        assert_eq!(endpoint_message(""), "no response body");
    }

    #[test]
    fn test_content_type_mapping() {
        let xlsx = SourceFile::new("a.xlsx", Bytes::new());
        assert!(content_type_for(&xlsx).contains("spreadsheetml"));
        let csv = SourceFile::new("a.csv", Bytes::new());
        assert_eq!(content_type_for(&csv), "text/csv");
    }

    #[tokio::test]
    async fn test_progress_body_is_monotonic_and_ends_at_100() {
        use futures::StreamExt;
        use http_body_util::BodyExt;

        let file = SourceFile::new("big.csv", Bytes::from(vec![b'x'; UPLOAD_CHUNK_SIZE * 3 + 17]));
        let (progress, seen) = recorded_progress();
        let body = HttpUploadTransport::progress_body(&file, progress);

        // drain the stream the way the HTTP client would
        let mut stream = BodyExt::into_data_stream(body);
        while let Some(chunk) = stream.next().await {
            chunk.unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(*seen.last().unwrap(), 100);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
