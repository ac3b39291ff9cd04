//! Leader liveness signal.

use serde::{Deserialize, Serialize};
use shared_types::{RegisterId, Timestamp, ValidatorId};

/// Sent by the leader every heartbeat interval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub register_id: RegisterId,
    pub leader_id: ValidatorId,
    pub term: u64,
    pub timestamp: Timestamp,
    pub latest_docket_sequence: Option<u64>,
}
