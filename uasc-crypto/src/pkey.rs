// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! RSA private and public key wrappers.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use uasc_types::{EncodingResult, Error, StatusCode};

/// Size introspection common to both halves of an RSA key pair.
pub trait KeySize {
    /// Key modulus length in bytes. This is also the asymmetric cipher block
    /// and signature size.
    fn size(&self) -> usize;

    /// Key modulus length in bits.
    fn bit_length(&self) -> usize {
        self.size() * 8
    }
}

/// An RSA private key.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    key: RsaPrivateKey,
}

impl KeySize for PrivateKey {
    fn size(&self) -> usize {
        self.key.size()
    }
}

impl PrivateKey {
    /// Parse a private key from PEM, accepting both PKCS#8 and PKCS#1
    /// encapsulation.
    pub fn from_pem(pem: &str) -> EncodingResult<Self> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map(|key| Self { key })
            .map_err(|e| {
                Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    format!("failed to parse private key: {e}"),
                )
            })
    }

    /// Generate a fresh key pair, used by tests and self-signed setups.
    pub fn new(bit_length: usize) -> EncodingResult<Self> {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, bit_length)
            .map(|key| Self { key })
            .map_err(|e| {
                Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    format!("failed to generate private key: {e}"),
                )
            })
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: self.key.to_public_key(),
        }
    }

    pub(crate) fn inner(&self) -> &RsaPrivateKey {
        &self.key
    }
}

/// An RSA public key, typically extracted from a peer certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicKey {
    key: RsaPublicKey,
}

impl KeySize for PublicKey {
    fn size(&self) -> usize {
        self.key.size()
    }
}

impl PublicKey {
    pub(crate) fn from_inner(key: RsaPublicKey) -> Self {
        Self { key }
    }

    pub(crate) fn inner(&self) -> &RsaPublicKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_sizes() {
        let key = PrivateKey::new(2048).unwrap();
        assert_eq!(key.size(), 256);
        assert_eq!(key.bit_length(), 2048);
        assert_eq!(key.public_key().size(), 256);
    }
}
