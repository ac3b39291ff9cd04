//! Ed25519 docket signer.

use crate::ports::DocketSigner;
use shared_crypto::Ed25519KeyPair;
use shared_types::{Hash, ValidatorId};

pub struct Ed25519Signer {
    validator_id: ValidatorId,
    keypair: Ed25519KeyPair,
}

impl Ed25519Signer {
    pub fn new(validator_id: impl Into<ValidatorId>, keypair: Ed25519KeyPair) -> Self {
        Self {
            validator_id: validator_id.into(),
            keypair,
        }
    }

    /// Registry form of the public key.
    pub fn public_key(&self) -> Vec<u8> {
        self.keypair.public_key().as_bytes().to_vec()
    }
}

impl DocketSigner for Ed25519Signer {
    fn validator_id(&self) -> &ValidatorId {
        &self.validator_id
    }

    fn sign(&self, docket_hash: &Hash) -> Result<Vec<u8>, String> {
        Ok(self.keypair.sign(docket_hash).to_vec())
    }
}
