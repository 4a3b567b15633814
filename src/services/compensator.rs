use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::IngestError;
use crate::models::{DeletePayload, DeleteResult, LastUpload};
use crate::services::submission::ProcessingClient;

/// Holds the one `LastUpload` snapshot that a compensating delete may act
/// on. Each successful submission overwrites it; a successful delete
/// clears it. The delete is scoped exactly to the snapshot's shipments ×
/// case numbers so a stale snapshot can never cause collateral loss.
#[derive(Debug, Default)]
pub struct DeletionCompensator {
    snapshot: Mutex<Option<LastUpload>>,
}

impl DeletionCompensator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a successful submission, replacing any
    /// previous snapshot.
    pub fn record(&self, shipment_ids: Vec<String>, case_numbers: Vec<String>) {
        let mut slot = self.snapshot.lock().unwrap();
        *slot = Some(LastUpload {
            shipment_ids,
            case_numbers,
            recorded_at: Utc::now(),
        });
    }

    pub fn last(&self) -> Option<LastUpload> {
        self.snapshot.lock().unwrap().clone()
    }

    /// Issues one compensating delete for the most recent submission.
    /// Not retried; the snapshot survives a failed attempt so the
    /// operator can try again.
    pub async fn compensate(&self, client: &ProcessingClient) -> Result<DeleteResult, IngestError> {
        let snapshot = self.last().ok_or(IngestError::NothingToCompensate)?;

        let payload = DeletePayload {
            shipments: snapshot
                .shipment_ids
                .iter()
                .map(|id| (id.clone(), snapshot.case_numbers.clone()))
                .collect::<HashMap<_, _>>(),
        };

        tracing::info!(
            shipments = snapshot.shipment_ids.len(),
            cases = snapshot.case_numbers.len(),
            "reversing last submission"
        );
        let result = client.delete(&payload).await?;

        let mut slot = self.snapshot.lock().unwrap();
        *slot = None;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_overwritten_not_accumulated() {
        let compensator = DeletionCompensator::new();
        compensator.record(vec!["SHP-1".into()], vec!["CASE-001".into()]);
        compensator.record(vec!["SHP-2".into()], vec!["CASE-002".into()]);

        let last = compensator.last().unwrap();
        assert_eq!(last.shipment_ids, vec!["SHP-2"]);
        assert_eq!(last.case_numbers, vec!["CASE-002"]);
    }

    #[tokio::test]
    async fn test_compensate_without_snapshot_refuses() {
        let compensator = DeletionCompensator::new();
        let client = ProcessingClient::new(
            reqwest::Client::new(),
            &crate::config::IngestConfig::development(),
        );
        assert!(matches!(
            compensator.compensate(&client).await,
            Err(IngestError::NothingToCompensate)
        ));
    }
}
