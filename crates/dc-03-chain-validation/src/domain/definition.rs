//! # Workflow Definitions
//!
//! A definition lists the participants of a workflow and the actions they
//! may perform. Definitions are versioned by publication on the register;
//! the validator only ever sees the version the provider resolves.

use super::condition::Condition;
use serde::{Deserialize, Serialize};

/// A party allowed to act in a workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub public_key: Vec<u8>,
}

/// Fields of an action's data revealed to a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disclosure {
    pub participant: String,
    /// JSON pointers into the action data.
    #[serde(default)]
    pub fields: Vec<String>,
}

/// One step of a workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    /// Participants permitted to submit this action. Empty allows any
    /// participant of the definition.
    #[serde(default)]
    pub senders: Vec<String>,
    #[serde(default)]
    pub data_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub disclosures: Vec<Disclosure>,
}

impl ActionDefinition {
    pub fn permits(&self, sender: &str) -> bool {
        self.senders.is_empty() || self.senders.iter().any(|s| s == sender)
    }
}

/// A published workflow definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub id: String,
    pub version: u32,
    pub register_id: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

impl Definition {
    pub fn action(&self, action_id: u32) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Parse a definition carried in a publication's data.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        serde_json::from_value(value.clone()).map_err(|e| e.to_string())
    }
}
