//! Cryptographic traits for signing and verification.
//!
//! This module defines abstract traits for the two signature schemes the
//! beacon protocol consumes: a Schnorr-style scheme whose verifier recovers
//! the signer's public key from the signature, and a VRF whose output doubles
//! as the signer's proposal.

use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug, Clone)]
pub enum CryptoError {
    /// The signature is invalid.
    #[error("invalid signature")]
    InvalidSignature,

    /// The public key is malformed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The message is too long or malformed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Generic cryptographic error.
    #[error("crypto error: {0}")]
    Internal(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// A cryptographic signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(pub Bytes);

impl Signature {
    /// Create a signature from raw bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes of the signature.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to owned bytes.
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A public key for signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(pub Bytes);

impl PublicKey {
    /// Create a public key from raw bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes of the public key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to owned bytes.
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Trait for digital signature creation over protocol messages.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait Signer: Send + Sync {
    /// Sign a message and return the signature.
    fn sign(&self, message: &[u8]) -> Signature;

    /// Get the public key corresponding to this signer.
    fn public_key(&self) -> PublicKey;
}

/// Trait for signature verification with public-key extraction.
///
/// The scheme is Schnorr-style: verification recovers the signer's public
/// key from the message and signature, so protocol messages do not carry an
/// explicit sender field.
pub trait VerifyExtractor: Send + Sync {
    /// Verify a signature and extract the public key that produced it.
    ///
    /// Returns `Err(CryptoError::InvalidSignature)` when the signature does
    /// not verify for any key.
    fn extract(&self, message: &[u8], signature: &Signature) -> CryptoResult<PublicKey>;
}

/// Trait for VRF signing.
///
/// A VRF signature over a message is an unpredictable-yet-verifiable byte
/// string bound to the signer; the beacon protocol uses it directly as the
/// node's proposal.
pub trait VrfSigner: Send + Sync {
    /// Produce the VRF signature for a message.
    fn sign(&self, message: &[u8]) -> Signature;

    /// Get the VRF public key corresponding to this signer.
    fn public_key(&self) -> PublicKey;
}

/// Trait for VRF verification.
pub trait VrfVerifier: Send + Sync {
    /// Check that `signature` is the VRF output of `public_key` over
    /// `message`.
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_from_bytes() {
        let sig = Signature::from_bytes(vec![1, 2, 3, 4]);
        assert_eq!(sig.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn public_key_from_bytes() {
        let pk = PublicKey::from_bytes(vec![5, 6, 7, 8]);
        assert_eq!(pk.as_bytes(), &[5, 6, 7, 8]);
    }
}
