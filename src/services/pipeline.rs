use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::ingest::{acceptor, header, parser, rows};
use crate::models::{
    DeletePayload, DeleteResult, LastUpload, Shipment, SourceFile, SubmissionResult, UploadMeta,
    WIPE_ALL,
};
use crate::services::compensator::DeletionCompensator;
use crate::services::submission::{ProcessingClient, fan_out_payload};
use crate::services::transport::{ProgressFn, UploadReceipt, UploadTransport};
use crate::utils::guard::InFlightGuard;

/// A parsed and validated batch awaiting the operator's confirmation.
/// Row errors are carried alongside the valid records so the caller can
/// surface them inline before deciding to proceed.
#[derive(Debug)]
pub struct PreparedBatch {
    pub records: Vec<crate::models::CaseRecord>,
    pub row_errors: BTreeMap<u32, Vec<String>>,
    pub header_row_index: u32,
}

impl PreparedBatch {
    pub fn case_numbers(&self) -> Vec<String> {
        self.records.iter().map(|r| r.case_number.clone()).collect()
    }
}

/// Orchestrates one ingestion session: accept → parse → match → validate,
/// then (after confirmation) archive the file and submit the batch.
/// Upload strictly precedes submission because the payload's meta needs
/// the archived file URL, if any.
pub struct IngestPipeline {
    config: IngestConfig,
    transport: Arc<dyn UploadTransport>,
    client: ProcessingClient,
    guard: InFlightGuard,
    compensator: DeletionCompensator,
}

impl IngestPipeline {
    pub fn new(
        config: IngestConfig,
        transport: Arc<dyn UploadTransport>,
        client: ProcessingClient,
    ) -> Self {
        Self {
            config,
            transport,
            client,
            guard: InFlightGuard::new(),
            compensator: DeletionCompensator::new(),
        }
    }

    /// Runs the structural and row-level stages. Fails fast on structural
    /// problems (bad extension, oversize, empty file, header mismatch);
    /// row-level failures are collected, not fatal.
    pub fn prepare(&self, file: &SourceFile) -> Result<PreparedBatch, IngestError> {
        let rejections = acceptor::check(file, self.config.max_file_size);
        if !rejections.is_empty() {
            return Err(IngestError::SourceRejected(rejections));
        }

        let grid = parser::parse(file)?;

        if !header::matches(&grid[0]) {
            return Err(IngestError::HeaderMismatch);
        }

        let outcome = rows::validate(&grid, 0);
        tracing::info!(
            file = %file.name,
            valid = outcome.records.len(),
            rejected = outcome.errors.len(),
            "validated production rows"
        );

        Ok(PreparedBatch {
            records: outcome.records,
            row_errors: outcome.errors,
            header_row_index: 0,
        })
    }

    /// Archives the source file and submits the confirmed batch to every
    /// selected shipment. Refuses locked shipments and overlapping
    /// submissions before any network call is made.
    pub async fn ingest(
        &self,
        file: &SourceFile,
        batch: &PreparedBatch,
        shipments: &[Shipment],
        on_progress: ProgressFn,
    ) -> Result<SubmissionResult, IngestError> {
        if shipments.is_empty() {
            return Err(IngestError::NoShipmentsSelected);
        }
        if batch.records.is_empty() {
            return Err(IngestError::NoValidRows);
        }

        let locked: Vec<String> = shipments
            .iter()
            .filter(|s| s.production_uploaded)
            .map(|s| s.id.clone())
            .collect();
        if !locked.is_empty() {
            return Err(IngestError::ShipmentLocked(locked));
        }

        // preserve selection order, tolerate duplicate ids
        let mut ids: Vec<String> = Vec::with_capacity(shipments.len());
        for shipment in shipments {
            if !ids.contains(&shipment.id) {
                ids.push(shipment.id.clone());
            }
        }
        let _token = self.guard.acquire(&ids)?;

        // The file is archived once, against the first selected shipment,
        // even when the batch fans out to several.
        let receipt = match self.transport.upload(file, &ids[0], on_progress).await {
            Ok(receipt) => receipt,
            Err(e) => {
                // Losing the audit copy must not block processing of the
                // parsed records.
                tracing::warn!(error = %e, "all upload paths failed, submitting without file reference");
                UploadReceipt::default()
            }
        };

        let meta = UploadMeta {
            file_name: receipt.file_name.unwrap_or_else(|| file.name.clone()),
            file_url: receipt.download_url,
            storage_path: receipt.storage_path,
            header_row_index: batch.header_row_index,
            column_map: header::column_map(),
            row_count: batch.records.len() as u32,
            shipment_ids: ids.clone(),
        };

        let payload = fan_out_payload(&ids, &batch.records, meta);
        let result = self.client.submit(&payload).await?;

        self.compensator.record(ids, batch.case_numbers());
        tracing::info!(total_items = result.total_items, "batch accepted by processing endpoint");
        Ok(result)
    }

    /// Reverses the most recent successful submission of this session.
    pub async fn compensate(&self) -> Result<DeleteResult, IngestError> {
        self.compensator.compensate(&self.client).await
    }

    /// Deletes ALL production records for one shipment (the `"*"`
    /// wildcard), used before re-ingesting into a locked shipment.
    pub async fn wipe(&self, shipment_id: &str) -> Result<DeleteResult, IngestError> {
        let payload = DeletePayload {
            shipments: std::iter::once((shipment_id.to_string(), vec![WIPE_ALL.to_string()]))
                .collect(),
        };
        self.client.delete(&payload).await
    }

    /// Current shipment records, including server-owned lock flags.
    pub async fn shipments(&self, ids: &[String]) -> Result<Vec<Shipment>, IngestError> {
        self.client.fetch_shipments(ids).await
    }

    pub fn last_upload(&self) -> Option<LastUpload> {
        self.compensator.last()
    }
}
