pub mod config;
pub mod error;
pub mod infrastructure;
pub mod ingest;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

pub use config::IngestConfig;
pub use error::IngestError;
pub use models::{CaseRecord, Shipment, SourceFile};
pub use services::pipeline::{IngestPipeline, PreparedBatch};

use services::submission::ProcessingClient;
use services::transport::{FallbackUploadTransport, HttpUploadTransport};

/// Wires the default pipeline: server-mediated upload first, client-direct
/// storage as fallback, both sharing one HTTP client.
pub async fn build_pipeline(config: IngestConfig) -> IngestPipeline {
    let http = infrastructure::http::build_client();

    let primary = Arc::new(HttpUploadTransport::new(
        http.clone(),
        config.upload_url.clone(),
    ));
    let secondary = infrastructure::storage::setup_storage(&config).await;
    let transport = Arc::new(FallbackUploadTransport::new(primary, secondary));

    let client = ProcessingClient::new(http, &config);
    IngestPipeline::new(config, transport, client)
}
