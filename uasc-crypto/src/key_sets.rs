// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Symmetric key sets derived from the channel nonces.

use crate::secret_buffer::SecretBuffer;

/// The triple of secrets protecting one direction of a channel under one
/// token: a MAC key, a cipher key and the cipher IV.
#[derive(Debug, Clone)]
pub struct SecurityKeySet {
    /// HMAC signing key.
    pub signing_key: SecretBuffer,
    /// AES encryption key.
    pub encryption_key: SecretBuffer,
    /// Initialisation vector, one cipher block long.
    pub initialisation_vector: SecretBuffer,
}

impl SecurityKeySet {
    /// Assemble a key set from raw derived material.
    pub fn new(signing_key: &[u8], encryption_key: &[u8], initialisation_vector: &[u8]) -> Self {
        Self {
            signing_key: SecretBuffer::from_exposed(signing_key),
            encryption_key: SecretBuffer::from_exposed(encryption_key),
            initialisation_vector: SecretBuffer::from_exposed(initialisation_vector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_inputs() {
        let ks = SecurityKeySet::new(&[0u8; 32], &[0u8; 16], &[0u8; 16]);
        assert_eq!(ks.signing_key.len(), 32);
        assert_eq!(ks.encryption_key.len(), 16);
        assert_eq!(ks.initialisation_vector.len(), 16);
    }
}
