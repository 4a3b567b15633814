use dashmap::DashMap;
use std::sync::Arc;

use crate::error::IngestError;

/// Keyed try-lock preventing two submissions from being in flight for the
/// same shipment at once. Advisory and client-side only: concurrent
/// sessions are serialized by the server's `productionUploaded`
/// transition, not by this guard.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    in_flight: Arc<DashMap<String, ()>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims every shipment in the batch, or refuses with the first one
    /// already claimed. The claim is released when the token drops.
    pub fn acquire(&self, shipment_ids: &[String]) -> Result<InFlightToken, IngestError> {
        let mut claimed = Vec::with_capacity(shipment_ids.len());
        for id in shipment_ids {
            // entry() would deadlock with itself on duplicate ids in one
            // batch; insert() reports the prior claim instead.
            if self.in_flight.insert(id.clone(), ()).is_some() {
                for earlier in &claimed {
                    self.in_flight.remove(earlier);
                }
                return Err(IngestError::SubmissionInFlight(id.clone()));
            }
            claimed.push(id.clone());
        }
        Ok(InFlightToken {
            guard: self.in_flight.clone(),
            keys: claimed,
        })
    }
}

/// RAII claim over a set of shipment ids.
pub struct InFlightToken {
    guard: Arc<DashMap<String, ()>>,
    keys: Vec<String>,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        for key in &self.keys {
            self.guard.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_second_claim_is_refused_until_release() {
        let guard = InFlightGuard::new();
        let token = guard.acquire(&ids(&["SHP-1"])).unwrap();

        match guard.acquire(&ids(&["SHP-1"])) {
            Err(IngestError::SubmissionInFlight(id)) => assert_eq!(id, "SHP-1"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected refusal"),
        }

        drop(token);
        assert!(guard.acquire(&ids(&["SHP-1"])).is_ok());
    }

    #[test]
    fn test_partial_claim_rolls_back() {
        let guard = InFlightGuard::new();
        let _held = guard.acquire(&ids(&["SHP-2"])).unwrap();

        assert!(guard.acquire(&ids(&["SHP-1", "SHP-2"])).is_err());
        // SHP-1 must not stay claimed by the failed acquisition
        assert!(guard.acquire(&ids(&["SHP-1"])).is_ok());
    }

    #[test]
    fn test_disjoint_claims_coexist() {
        let guard = InFlightGuard::new();
        let _a = guard.acquire(&ids(&["SHP-1"])).unwrap();
        assert!(guard.acquire(&ids(&["SHP-2"])).is_ok());
    }
}
