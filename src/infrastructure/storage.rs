use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

use crate::config::IngestConfig;
use crate::services::transport::S3UploadTransport;

/// Builds the client-direct storage transport used when the
/// server-mediated upload path is down. Credentials come from the
/// standard AWS environment; `S3_ENDPOINT` switches to an S3-compatible
/// store such as MinIO.
pub async fn setup_storage(config: &IngestConfig) -> Arc<S3UploadTransport> {
    let region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    let mut loader = aws_config::from_env().region(Region::new(region));
    if let Some(endpoint) = &config.s3_endpoint {
        info!("☁️  Direct storage: {} (Bucket: {})", endpoint, config.s3_bucket);
        loader = loader.endpoint_url(endpoint);
    } else {
        info!("☁️  Direct storage: AWS S3 (Bucket: {})", config.s3_bucket);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    Arc::new(S3UploadTransport::new(s3_client, config.s3_bucket.clone()))
}
