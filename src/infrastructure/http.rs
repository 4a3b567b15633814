use std::time::Duration;

/// Shared HTTP client for the upload and processing endpoints.
///
/// Only the connect phase is bounded here; per-attempt deadlines are
/// enforced by the submission client so an upload in progress is never
/// cut off by a blanket request timeout.
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("case-ingest/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("HTTP client construction only fails on invalid builder settings")
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_client_builds() {
        let _ = super::build_client();
    }
}
