//! Consensus configuration sourced from a register's governance definition.

use super::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

/// Leader election mechanism
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderElectionMechanism {
    /// `leader = orderedActive[term mod count]`
    #[default]
    Rotating,
}

/// Consensus parameters for one register.
///
/// Durations travel as milliseconds in the governance JSON
/// (`docketTimeoutMs`, `heartbeatIntervalMs`, ...).
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsensusConfig {
    /// Signatures (initiator included) needed to commit
    pub signature_threshold_min: usize,

    /// Signature cap; reaching it commits immediately
    pub signature_threshold_max: usize,

    /// Time allowed for signature collection
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "docketTimeoutMs")]
    pub docket_timeout: Duration,

    /// Upper bound on transactions per docket
    pub max_transactions_per_docket: usize,

    /// Pause between build cycles
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "docketBuildIntervalMs")]
    pub docket_build_interval: Duration,

    pub leader_election_mechanism: LeaderElectionMechanism,

    /// Leader heartbeat period
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "heartbeatIntervalMs")]
    pub heartbeat_interval: Duration,

    /// Silence after which followers advance the term
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "leaderTimeoutMs")]
    pub leader_timeout: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            signature_threshold_min: 2,
            signature_threshold_max: 10,
            docket_timeout: Duration::from_secs(30),
            max_transactions_per_docket: 1000,
            docket_build_interval: Duration::from_millis(100),
            leader_election_mechanism: LeaderElectionMechanism::Rotating,
            heartbeat_interval: Duration::from_secs(1),
            leader_timeout: Duration::from_secs(5),
        }
    }
}

impl ConsensusConfig {
    /// Check internal consistency.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.signature_threshold_min == 0 {
            return Err(RegistryError::InvalidConfig(
                "signatureThresholdMin must be at least 1".into(),
            ));
        }
        if self.signature_threshold_max < self.signature_threshold_min {
            return Err(RegistryError::InvalidConfig(format!(
                "signatureThresholdMax ({}) below signatureThresholdMin ({})",
                self.signature_threshold_max, self.signature_threshold_min
            )));
        }
        if self.max_transactions_per_docket == 0 {
            return Err(RegistryError::InvalidConfig(
                "maxTransactionsPerDocket must be at least 1".into(),
            ));
        }
        if self.docket_timeout.is_zero() || self.heartbeat_interval.is_zero() {
            return Err(RegistryError::InvalidConfig(
                "docketTimeout and heartbeatInterval must be non-zero".into(),
            ));
        }
        if self.leader_timeout <= self.heartbeat_interval {
            return Err(RegistryError::InvalidConfig(format!(
                "leaderTimeout ({:?}) must exceed heartbeatInterval ({:?})",
                self.leader_timeout, self.heartbeat_interval
            )));
        }
        Ok(())
    }

    /// Parse from a governance definition document.
    ///
    /// Reads the `consensus` object when present, otherwise the document
    /// itself. Missing fields take their defaults.
    pub fn from_governance_json(document: &serde_json::Value) -> RegistryResult<Self> {
        let section = document.get("consensus").unwrap_or(document);
        let config: Self = serde_json::from_value(section.clone())
            .map_err(|e| RegistryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration suited to fast unit tests.
    pub fn for_testing() -> Self {
        Self {
            signature_threshold_min: 3,
            signature_threshold_max: 5,
            docket_timeout: Duration::from_secs(30),
            max_transactions_per_docket: 100,
            docket_build_interval: Duration::from_millis(50),
            leader_election_mechanism: LeaderElectionMechanism::Rotating,
            heartbeat_interval: Duration::from_millis(200),
            leader_timeout: Duration::from_millis(1000),
        }
    }
}

/// A consensus configuration tagged with its governance version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedConfig {
    pub version: u64,
    pub config: ConsensusConfig,
}

impl VersionedConfig {
    pub fn new(version: u64, config: ConsensusConfig) -> Self {
        Self { version, config }
    }

    /// Parse `{"version": n, "consensus": {...}}`.
    pub fn from_governance_json(document: &serde_json::Value) -> RegistryResult<Self> {
        let version = document
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| RegistryError::InvalidConfig("missing governance version".into()))?;
        Ok(Self {
            version,
            config: ConsensusConfig::from_governance_json(document)?,
        })
    }
}
