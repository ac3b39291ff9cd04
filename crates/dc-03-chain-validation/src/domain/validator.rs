//! # Transaction Validation
//!
//! `validate` is a pure function of the transaction, its definition, the
//! chain view and the verifier. Checks run in a fixed order and stop at the
//! first failure:
//!
//! 1. content-derived id
//! 2. action resolution
//! 3. chain continuity
//! 4. previous data continuity
//! 5. data schema
//! 6. action condition
//! 7. sender authorization and disclosure rules
//! 8. sender signature
//!
//! Identical inputs always produce the identical result, so every
//! confirmer reaches the initiator's verdict.

use super::definition::{ActionDefinition, Definition};
use super::errors::ValidationError;
use super::schema::validate_schema;
use crate::ports::ChainLookup;
use shared_crypto::SignatureVerifier;
use shared_types::{short_hex, Transaction, TransactionKind, TxId};

/// A transaction that passed every check.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidTransaction {
    transaction: Transaction,
}

impl ValidTransaction {
    pub fn id(&self) -> TxId {
        self.transaction.id
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn into_inner(self) -> Transaction {
        self.transaction
    }
}

/// Validate a transaction for inclusion in a docket.
///
/// `definition` is required for actions and ignored for anchors and
/// publications.
pub fn validate(
    transaction: &Transaction,
    definition: Option<&Definition>,
    chain: &dyn ChainLookup,
    verifier: &dyn SignatureVerifier,
) -> Result<ValidTransaction, ValidationError> {
    if transaction.compute_id() != transaction.id {
        return Err(ValidationError::IdMismatch(transaction.id));
    }
    let action = resolve_action(transaction, definition)?;
    let previous = check_chain(transaction, chain)?;

    if let Some(claimed) = &transaction.previous_data {
        match &previous {
            Some(prior) if prior.data == *claimed => {}
            _ => return Err(ValidationError::PreviousDataMismatch),
        }
    }

    if let Some((_, action)) = action {
        if let Some(schema) = &action.data_schema {
            validate_schema(schema, &transaction.data)?;
        }
        if let Some(condition) = &action.condition {
            if !condition.evaluate(&transaction.data) {
                return Err(ValidationError::ConditionNotMet(action.id));
            }
        }
    }

    let sender_key = authorize_sender(transaction, action, chain)?;

    if !verifier.verify(
        &transaction.signing_hash(),
        &transaction.signature,
        &sender_key,
    ) {
        return Err(ValidationError::InvalidSignature(transaction.sender.clone()));
    }

    Ok(ValidTransaction {
        transaction: transaction.clone(),
    })
}

fn resolve_action<'d>(
    transaction: &Transaction,
    definition: Option<&'d Definition>,
) -> Result<Option<(&'d Definition, &'d ActionDefinition)>, ValidationError> {
    if transaction.kind != TransactionKind::Action {
        return Ok(None);
    }
    let definition = definition
        .filter(|d| d.id == transaction.definition_id)
        .ok_or_else(|| ValidationError::DefinitionMissing(transaction.definition_id.clone()))?;
    let action = transaction
        .action_id
        .and_then(|id| definition.action(id))
        .ok_or_else(|| ValidationError::ActionNotFound {
            definition_id: definition.id.clone(),
            action_id: transaction.action_id,
        })?;
    Ok(Some((definition, action)))
}

/// Resolve the back-reference and check it is allowed for the kind.
fn check_chain(
    transaction: &Transaction,
    chain: &dyn ChainLookup,
) -> Result<Option<Transaction>, ValidationError> {
    let resolved = transaction
        .previous_id
        .and_then(|id| chain.get_transaction(&id))
        .filter(|prior| prior.register_id == transaction.register_id);

    match transaction.kind {
        TransactionKind::GenesisAnchor => match transaction.previous_id {
            None => Ok(None),
            Some(_) => Err(ValidationError::InvalidPreviousId(transaction.id)),
        },
        TransactionKind::DefinitionPublication => {
            let prior = resolved.ok_or(ValidationError::InvalidPreviousId(transaction.id))?;
            let kind = prior.kind;
            match kind {
                TransactionKind::GenesisAnchor => Ok(Some(prior)),
                TransactionKind::DefinitionPublication
                    if prior.definition_id == transaction.definition_id =>
                {
                    Ok(Some(prior))
                }
                TransactionKind::DefinitionPublication => {
                    Err(ValidationError::InvalidVersionChain {
                        definition_id: transaction.definition_id.clone(),
                        found: prior.definition_id,
                    })
                }
                TransactionKind::Action => Err(ValidationError::InvalidPreviousId(transaction.id)),
            }
        }
        TransactionKind::Action => {
            let prior = resolved.ok_or_else(|| ValidationError::BrokenChain {
                reason: match transaction.previous_id {
                    Some(id) => format!("previous {} not found", short_hex(&id)),
                    None => "missing previous id".to_string(),
                },
            })?;
            let prior = if transaction.action_id == Some(0) {
                check_first_action(transaction, prior)?
            } else {
                check_next_action(transaction, prior)?
            };
            Ok(Some(prior))
        }
    }
}

fn check_first_action(
    transaction: &Transaction,
    prior: Transaction,
) -> Result<Transaction, ValidationError> {
    if prior.kind != TransactionKind::DefinitionPublication {
        return Err(ValidationError::BrokenChain {
            reason: "first action must follow a definition publication".to_string(),
        });
    }
    if prior.definition_id != transaction.definition_id {
        return Err(ValidationError::BrokenChain {
            reason: format!(
                "first action of {} follows publication of {}",
                transaction.definition_id, prior.definition_id
            ),
        });
    }
    Ok(prior)
}

fn check_next_action(
    transaction: &Transaction,
    prior: Transaction,
) -> Result<Transaction, ValidationError> {
    if prior.kind != TransactionKind::Action {
        return Err(ValidationError::BrokenChain {
            reason: "action must follow a prior action".to_string(),
        });
    }
    if prior.definition_id != transaction.definition_id {
        return Err(ValidationError::BrokenChain {
            reason: format!(
                "action of {} follows action of {}",
                transaction.definition_id, prior.definition_id
            ),
        });
    }
    if prior.instance_id != transaction.instance_id {
        return Err(ValidationError::BrokenChain {
            reason: "action belongs to a different instance".to_string(),
        });
    }
    Ok(prior)
}

/// Returns the key the transaction signature must verify against.
fn authorize_sender(
    transaction: &Transaction,
    action: Option<(&Definition, &ActionDefinition)>,
    chain: &dyn ChainLookup,
) -> Result<Vec<u8>, ValidationError> {
    let Some((definition, action)) = action else {
        return chain
            .sender_key(&transaction.register_id, &transaction.sender)
            .ok_or_else(|| ValidationError::UnknownParticipant(transaction.sender.clone()));
    };

    let participant = definition
        .participant(&transaction.sender)
        .ok_or_else(|| ValidationError::UnknownParticipant(transaction.sender.clone()))?;
    if !action.permits(&participant.id) {
        return Err(ValidationError::UnauthorizedSender {
            sender: participant.id.clone(),
            action_id: action.id,
        });
    }
    if let Some(rule) = action
        .disclosures
        .iter()
        .find(|rule| definition.participant(&rule.participant).is_none())
    {
        return Err(ValidationError::InvalidDisclosure(rule.participant.clone()));
    }
    Ok(participant.public_key.clone())
}
