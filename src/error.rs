use thiserror::Error;

use crate::ingest::header::expected_schema;

/// Error taxonomy for the ingestion pipeline.
///
/// Structural errors are fatal to the current attempt and never retried;
/// transport errors degrade through the fallback chain before surfacing;
/// submission errors are retried with backoff and carry the last
/// underlying failure once retries are exhausted.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid file: {}", .0.join("; "))]
    SourceRejected(Vec<String>),

    #[error("the file contains no rows")]
    EmptyWorkbook,

    #[error("unrecognized header row. Expected columns: {}", expected_schema())]
    HeaderMismatch,

    #[error("no valid rows to submit")]
    NoValidRows,

    #[error("no shipments selected")]
    NoShipmentsSelected,

    #[error("production data already uploaded for shipment(s) {}: delete it first, then re-upload", .0.join(", "))]
    ShipmentLocked(Vec<String>),

    #[error("another submission is already in flight for shipment {0}")]
    SubmissionInFlight(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("submission failed after {attempts} attempt(s): {last_error}")]
    SubmissionFailed { attempts: u32, last_error: String },

    #[error("delete failed: {0}")]
    DeletionFailed(String),

    #[error("nothing to delete: no submission recorded in this session")]
    NothingToCompensate,

    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("source responded {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_operator_readable() {
        let err = IngestError::SourceRejected(vec![
            "unsupported file type".into(),
            "file exceeds 10 MiB".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid file: unsupported file type; file exceeds 10 MiB"
        );

        let err = IngestError::ShipmentLocked(vec!["SHP-1".into(), "SHP-2".into()]);
        assert!(err.to_string().contains("SHP-1, SHP-2"));

        let err = IngestError::SubmissionFailed {
            attempts: 3,
            last_error: "source responded 500".into(),
        };
        assert!(err.to_string().contains("3 attempt(s)"));
        assert!(err.to_string().contains("source responded 500"));
    }

    #[test]
    fn test_header_mismatch_describes_the_expected_template() {
        let message = IngestError::HeaderMismatch.to_string();
        assert!(message.contains("A: Case Number"));
        assert!(message.contains("E: EKM"));
    }
}
