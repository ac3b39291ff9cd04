//! # Bad Actor Detector
//!
//! Counts rejected proposals per initiator so that governance can review
//! validators that keep proposing invalid dockets. Reports are advisory:
//! nothing here suspends a validator.

use super::error::RejectionReason;
use serde::{Deserialize, Serialize};
use shared_types::{RegisterId, Timestamp, ValidatorId};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Reports kept for governance before the oldest are dropped.
const MAX_PENDING_REPORTS: usize = 256;

/// Running rejection counts of one initiator on one register.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RejectionTally {
    total: u32,
    by_reason: BTreeMap<&'static str, u32>,
    last_rejected_at: Timestamp,
}

impl RejectionTally {
    fn add(&mut self, reason: &RejectionReason, at: Timestamp) {
        self.total = self.total.saturating_add(1);
        let count = self.by_reason.entry(reason.label()).or_insert(0);
        *count = count.saturating_add(1);
        self.last_rejected_at = self.last_rejected_at.max(at);
    }

    fn report(&self, register_id: &str, validator_id: &str) -> BadActorReport {
        BadActorReport {
            register_id: register_id.to_string(),
            validator_id: validator_id.to_string(),
            rejections: self.total,
            by_reason: self
                .by_reason
                .iter()
                .map(|(label, count)| (label.to_string(), *count))
                .collect(),
            last_rejected_at: self.last_rejected_at,
        }
    }
}

/// Evidence for governance review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadActorReport {
    pub register_id: RegisterId,
    pub validator_id: ValidatorId,
    pub rejections: u32,
    /// Rejection count per reason label.
    pub by_reason: BTreeMap<String, u32>,
    pub last_rejected_at: Timestamp,
}

/// Rejection tallies keyed by (register, initiator). Memory per initiator
/// is bounded by the number of rejection reasons.
#[derive(Debug)]
pub struct BadActorDetector {
    tallies: HashMap<(RegisterId, ValidatorId), RejectionTally>,
    pending_reports: VecDeque<BadActorReport>,
    /// Rejections after which a report is queued.
    report_threshold: u32,
}

impl BadActorDetector {
    pub fn new(report_threshold: u32) -> Self {
        Self {
            tallies: HashMap::new(),
            pending_reports: VecDeque::new(),
            report_threshold: report_threshold.max(1),
        }
    }

    /// Record a rejection. Returns the report queued when the initiator
    /// crosses the threshold, once per multiple of it.
    pub fn record(
        &mut self,
        register_id: &str,
        initiator_id: &str,
        reason: RejectionReason,
        at: Timestamp,
    ) -> Option<BadActorReport> {
        let key = (register_id.to_string(), initiator_id.to_string());
        let tally = self.tallies.entry(key).or_default();
        tally.add(&reason, at);

        if tally.total % self.report_threshold != 0 {
            return None;
        }
        let report = tally.report(register_id, initiator_id);
        if self.pending_reports.len() == MAX_PENDING_REPORTS {
            self.pending_reports.pop_front();
        }
        self.pending_reports.push_back(report.clone());
        Some(report)
    }

    /// Total rejections of an initiator across registers.
    pub fn rejections_for(&self, initiator_id: &str) -> u32 {
        self.tallies
            .iter()
            .filter(|((_, validator), _)| validator == initiator_id)
            .fold(0u32, |sum, (_, tally)| sum.saturating_add(tally.total))
    }

    /// Initiators with at least `min_rejections` on some register, most
    /// rejected first.
    pub fn suspects(&self, min_rejections: u32) -> Vec<BadActorReport> {
        let mut reports: Vec<_> = self
            .tallies
            .iter()
            .filter(|(_, tally)| tally.total >= min_rejections)
            .map(|((register, validator), tally)| tally.report(register, validator))
            .collect();
        reports.sort_by(|a, b| {
            b.rejections
                .cmp(&a.rejections)
                .then_with(|| a.validator_id.cmp(&b.validator_id))
        });
        reports
    }

    /// Take queued reports.
    pub fn drain_reports(&mut self) -> Vec<BadActorReport> {
        self.pending_reports.drain(..).collect()
    }
}
