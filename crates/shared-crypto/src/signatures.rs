//! # Ed25519 Signatures
//!
//! Twisted Edwards curve signatures with deterministic nonces. Used for
//! participant transaction signatures and validator docket signatures.
//!
//! Keys and signatures travel as raw byte vectors in ledger entities, so the
//! verifier accepts slices and checks lengths before touching the curve.

use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

/// Public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Verifies a signature over a message against a raw public key.
///
/// Implementations return `false` for any malformed input.
pub trait SignatureVerifier: Send + Sync {
    /// Returns true when `signature` is valid for `message` under `public_key`.
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519PublicKey([u8; 32]);

impl Ed25519PublicKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Create from a slice of unknown length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            })?;
        Self::from_bytes(array)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Create from a slice of unknown length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        Ok(Self(array))
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Copy into an owned vector for storage in ledger entities.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Ed25519 keypair.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self { signing_key }
    }

    /// Get public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        Ed25519PublicKey(verifying_key.to_bytes())
    }

    /// Sign a message (deterministic - no RNG needed).
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// Stateless Ed25519 verifier over raw byte slices.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let Ok(key) = Ed25519PublicKey::from_slice(public_key) else {
            return false;
        };
        let Ok(sig) = Ed25519Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &sig).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = Ed25519KeyPair::generate();
        let message = b"docket header";

        let signature = keypair.sign(message);
        let result = keypair.public_key().verify(message, &signature);

        assert!(result.is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = Ed25519KeyPair::generate();

        let signature = keypair.sign(b"message1");
        let result = keypair.public_key().verify(b"message2", &signature);

        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair1 = Ed25519KeyPair::generate();
        let keypair2 = Ed25519KeyPair::generate();

        let signature = keypair1.sign(b"test");
        let result = keypair2.public_key().verify(b"test", &signature);

        assert!(result.is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Ed25519KeyPair::from_seed([0xABu8; 32]);

        let sig1 = keypair.sign(b"deterministic");
        let sig2 = keypair.sign(b"deterministic");

        assert_eq!(hex::encode(sig1.as_bytes()), hex::encode(sig2.as_bytes()));
    }

    #[test]
    fn test_verifier_accepts_valid_slices() {
        let keypair = Ed25519KeyPair::from_seed([1u8; 32]);
        let sig = keypair.sign(b"payload").to_vec();
        let key = keypair.public_key().as_bytes().to_vec();

        assert!(Ed25519Verifier.verify(b"payload", &sig, &key));
        assert!(!Ed25519Verifier.verify(b"other", &sig, &key));
    }

    #[test]
    fn test_verifier_rejects_malformed_input() {
        let keypair = Ed25519KeyPair::from_seed([2u8; 32]);
        let sig = keypair.sign(b"payload").to_vec();
        let key = keypair.public_key().as_bytes().to_vec();

        assert!(!Ed25519Verifier.verify(b"payload", &sig[..10], &key));
        assert!(!Ed25519Verifier.verify(b"payload", &sig, &key[..31]));
        assert!(!Ed25519Verifier.verify(b"payload", &[], &[]));
    }

    #[test]
    fn test_from_slice_reports_length() {
        let err = Ed25519PublicKey::from_slice(&[0u8; 5]).unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 5
            }
        );
    }
}
