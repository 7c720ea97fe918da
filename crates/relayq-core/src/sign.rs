// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signature providers.
//!
//! The cloud-style broker verifies payload authenticity before dispatch.
//! Verification plug-ins are external collaborators; this module carries
//! the trait plus the accept-all default and a keyed SHA-256 digest
//! implementation.

use sha2::{Digest, Sha256};

/// Signs and verifies message payloads.
pub trait SignatureProvider: Send + Sync {
    /// Produce a signature for `payload`, or `None` when the provider does
    /// not sign.
    fn sign(&self, payload: &[u8]) -> Option<String>;

    /// Check `signature` against `payload`.
    fn verify(&self, payload: &[u8], signature: Option<&str>) -> bool;
}

/// Accept-all provider used when signatures are not in play.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVerifier;

impl SignatureProvider for NullVerifier {
    fn sign(&self, _payload: &[u8]) -> Option<String> {
        None
    }

    fn verify(&self, _payload: &[u8], _signature: Option<&str>) -> bool {
        true
    }
}

/// Keyed SHA-256 digest provider: `hex(sha256(secret || payload))`.
///
/// A missing or mismatching signature fails verification.
#[derive(Debug, Clone)]
pub struct KeyedSha256Verifier {
    secret: String,
}

impl KeyedSha256Verifier {
    /// Create a provider with the given shared secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn digest(&self, payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(payload);
        format!("{:x}", hasher.finalize())
    }
}

impl SignatureProvider for KeyedSha256Verifier {
    fn sign(&self, payload: &[u8]) -> Option<String> {
        Some(self.digest(payload))
    }

    fn verify(&self, payload: &[u8], signature: Option<&str>) -> bool {
        signature.is_some_and(|sig| sig == self.digest(payload))
    }
}
