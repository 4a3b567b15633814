use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::models::{
    CaseRecord, DeletePayload, DeleteResult, IngestPayload, Shipment, SubmissionResult, UploadMeta,
};
use crate::services::transport::endpoint_message;
use crate::utils::retry::{RetryPolicy, with_retry};

/// Client for the processing endpoint (and the console's shipment
/// directory). Submission attempts run under a hard per-attempt timeout
/// and are retried with exponential backoff; deletes are never retried.
pub struct ProcessingClient {
    client: reqwest::Client,
    processing_url: Url,
    shipments_url: Url,
    timeout: Duration,
    policy: RetryPolicy,
}

impl ProcessingClient {
    pub fn new(client: reqwest::Client, config: &IngestConfig) -> Self {
        Self {
            client,
            processing_url: config.processing_url.clone(),
            shipments_url: config.shipments_url.clone(),
            timeout: config.request_timeout,
            policy: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay,
                factor: 2,
            },
        }
    }

    /// Submits the batch, retrying transient failures. After the policy is
    /// exhausted the last underlying error is propagated, never swallowed.
    pub async fn submit(&self, payload: &IngestPayload) -> Result<SubmissionResult, IngestError> {
        let attempts = self.policy.max_retries + 1;
        with_retry(self.policy, |attempt| self.attempt_submit(payload, attempt))
            .await
            .map_err(|last| IngestError::SubmissionFailed {
                attempts,
                last_error: last.to_string(),
            })
    }

    async fn attempt_submit(
        &self,
        payload: &IngestPayload,
        attempt: u32,
    ) -> Result<SubmissionResult, IngestError> {
        tracing::info!(
            attempt = attempt + 1,
            shipments = payload.shipments.len(),
            rows = payload.meta.row_count,
            "submitting production batch"
        );

        let send = self
            .client
            .post(self.processing_url.clone())
            .json(payload)
            .send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| IngestError::Timeout(self.timeout))??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Endpoint {
                status: status.as_u16(),
                message: endpoint_message(&body),
            });
        }

        Ok(response.json().await?)
    }

    /// One DELETE call, surfaced directly on failure. The server treats
    /// each call as all-or-nothing; `total_deletes` confirms what was
    /// removed.
    pub async fn delete(&self, payload: &DeletePayload) -> Result<DeleteResult, IngestError> {
        let send = self
            .client
            .delete(self.processing_url.clone())
            .json(payload)
            .send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| IngestError::DeletionFailed(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| IngestError::DeletionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::DeletionFailed(format!(
                "source responded {}: {}",
                status.as_u16(),
                endpoint_message(&body)
            )));
        }

        let result: DeleteResult = response
            .json()
            .await
            .map_err(|e| IngestError::DeletionFailed(e.to_string()))?;
        tracing::info!(total_deletes = result.total_deletes, "compensating delete applied");
        Ok(result)
    }

    /// Reads the current shipment records so lock flags reflect the
    /// server's view before a batch is confirmed.
    pub async fn fetch_shipments(&self, ids: &[String]) -> Result<Vec<Shipment>, IngestError> {
        let mut url = self.shipments_url.clone();
        url.query_pairs_mut().append_pair("ids", &ids.join(","));

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Endpoint {
                status: status.as_u16(),
                message: endpoint_message(&body),
            });
        }
        Ok(response.json().await?)
    }
}

/// Every selected shipment receives the same full record set (fan-out,
/// not partition).
pub fn fan_out_payload(
    shipment_ids: &[String],
    records: &[CaseRecord],
    meta: UploadMeta,
) -> IngestPayload {
    let shipments: HashMap<String, Vec<CaseRecord>> = shipment_ids
        .iter()
        .map(|id| (id.clone(), records.to_vec()))
        .collect();
    IngestPayload { shipments, meta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WIPE_ALL;

    fn record(case: &str) -> CaseRecord {
        CaseRecord {
            case_number: case.to_string(),
            critical_parts: 1,
            total_lines: 2,
            domestic_lines: 1,
            bulk_lines: 1,
            source_row: 2,
        }
    }

    fn meta(shipment_ids: Vec<String>) -> UploadMeta {
        UploadMeta {
            file_name: "prod.xlsx".into(),
            file_url: None,
            storage_path: None,
            header_row_index: 0,
            column_map: vec![],
            row_count: 2,
            shipment_ids,
        }
    }

    #[test]
    fn test_fan_out_duplicates_full_record_set_per_shipment() {
        let ids = vec!["SHP-1".to_string(), "SHP-2".to_string()];
        let records = vec![record("CASE-001"), record("CASE-002")];
        let payload = fan_out_payload(&ids, &records, meta(ids.clone()));

        assert_eq!(payload.shipments.len(), 2);
        for id in &ids {
            assert_eq!(payload.shipments[id], records);
        }
        let total: usize = payload.shipments.values().map(|v| v.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_wipe_payload_shape() {
        let payload = DeletePayload {
            shipments: HashMap::from([("SHP-1".to_string(), vec![WIPE_ALL.to_string()])]),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["shipments"]["SHP-1"][0], "*");
    }
}
