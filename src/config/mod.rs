use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_UPLOAD_URL: &str = "http://localhost:4000/api/production/upload";
const DEFAULT_PROCESSING_URL: &str = "http://localhost:4000/api/production/cases";
const DEFAULT_SHIPMENTS_URL: &str = "http://localhost:4000/api/shipments";

/// Ingestion pipeline configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Server-mediated upload endpoint (primary archive path)
    pub upload_url: Url,

    /// Processing endpoint for case submission and deletion
    pub processing_url: Url,

    /// Console endpoint listing shipments (lock flags)
    pub shipments_url: Url,

    /// Maximum source file size in bytes (default: 10 MiB)
    pub max_file_size: usize,

    /// Hard per-attempt timeout on the processing endpoint (default: 25 s)
    pub request_timeout: Duration,

    /// Retries after the first submission attempt (default: 2 ⇒ 3 attempts)
    pub max_retries: u32,

    /// First backoff delay; doubles per attempt (default: 500 ms)
    pub retry_base_delay: Duration,

    /// Bucket for the client-direct fallback upload
    pub s3_bucket: String,

    /// Optional S3-compatible endpoint override (e.g. MinIO)
    pub s3_endpoint: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_url: Url::parse(DEFAULT_UPLOAD_URL).expect("default upload URL is valid"),
            processing_url: Url::parse(DEFAULT_PROCESSING_URL)
                .expect("default processing URL is valid"),
            shipments_url: Url::parse(DEFAULT_SHIPMENTS_URL)
                .expect("default shipments URL is valid"),
            max_file_size: 10 * 1024 * 1024,
            request_timeout: Duration::from_secs(25),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
            s3_bucket: "production-uploads".to_string(),
            s3_endpoint: None,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_url: env_url("UPLOAD_URL").unwrap_or(default.upload_url),

            processing_url: env_url("PROCESSING_URL").unwrap_or(default.processing_url),

            shipments_url: env_url("SHIPMENTS_URL").unwrap_or(default.shipments_url),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            request_timeout: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.request_timeout),

            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_retries),

            retry_base_delay: env::var("RETRY_BASE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.retry_base_delay),

            s3_bucket: env::var("S3_BUCKET").unwrap_or(default.s3_bucket),

            s3_endpoint: env::var("S3_ENDPOINT").ok(),
        }
    }

    /// Config for development and tests: tight timeouts, fast backoff.
    pub fn development() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            retry_base_delay: Duration::from_millis(50),
            ..Self::default()
        }
    }
}

fn env_url(name: &str) -> Option<Url> {
    let raw = env::var(name).ok()?;
    match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!("{} is not a valid URL ({}), using default", name, e);
            None
        }
    }
}
