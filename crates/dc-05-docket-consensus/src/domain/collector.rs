//! Signature collection for one docket.

use shared_types::{DocketId, DocketSignature, ValidatorId};
use std::collections::HashSet;

/// Result of offering a signature to the collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Counted; still below the minimum threshold.
    Pending,
    /// Minimum threshold met.
    ThresholdReached,
    /// Maximum threshold met.
    CapReached,
    /// Validator already counted.
    Duplicate,
    /// Signature belongs to another docket.
    Foreign,
}

impl CollectOutcome {
    pub fn is_complete(self) -> bool {
        matches!(self, Self::ThresholdReached | Self::CapReached)
    }
}

/// Collects verified signatures for one docket, one per validator.
///
/// The initiator's own signature counts toward the threshold.
#[derive(Debug)]
pub struct SignatureCollector {
    docket_id: DocketId,
    threshold_min: usize,
    threshold_max: usize,
    signatures: Vec<DocketSignature>,
    seen: HashSet<ValidatorId>,
}

impl SignatureCollector {
    pub fn new(
        docket_id: DocketId,
        threshold_min: usize,
        threshold_max: usize,
        initiator: DocketSignature,
    ) -> Self {
        let mut seen = HashSet::new();
        seen.insert(initiator.validator_id.clone());
        Self {
            docket_id,
            threshold_min,
            threshold_max,
            signatures: vec![initiator],
            seen,
        }
    }

    /// Count a signature that has already been verified.
    pub fn add(&mut self, docket_id: &DocketId, signature: DocketSignature) -> CollectOutcome {
        if *docket_id != self.docket_id {
            return CollectOutcome::Foreign;
        }
        if !self.seen.insert(signature.validator_id.clone()) {
            return CollectOutcome::Duplicate;
        }
        self.signatures.push(signature);
        self.status()
    }

    /// Threshold state without adding anything.
    pub fn status(&self) -> CollectOutcome {
        let count = self.signatures.len();
        if count >= self.threshold_max {
            CollectOutcome::CapReached
        } else if count >= self.threshold_min {
            CollectOutcome::ThresholdReached
        } else {
            CollectOutcome::Pending
        }
    }

    pub fn has_signed(&self, validator_id: &str) -> bool {
        self.seen.contains(validator_id)
    }

    pub fn count(&self) -> usize {
        self.signatures.len()
    }

    pub fn threshold_min(&self) -> usize {
        self.threshold_min
    }

    pub fn into_signatures(self) -> Vec<DocketSignature> {
        self.signatures
    }
}
