// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Security policies: named algorithm bundles with their key lengths,
//! paddings and primitive operations.

use std::fmt;
use std::str::FromStr;

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rsa::{Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tracing::error;

use uasc_types::{ByteString, EncodingResult, Error, StatusCode};

use crate::key_sets::SecurityKeySet;
use crate::pkey::{KeySize, PrivateKey, PublicKey};
use crate::{hash, random, AES_BLOCK_SIZE, SHA1_SIZE, SHA256_SIZE};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// URI of the None security policy.
pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
/// URI of the Basic128Rsa15 security policy.
pub const SECURITY_POLICY_BASIC_128_RSA_15_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15";
/// URI of the Basic256 security policy.
pub const SECURITY_POLICY_BASIC_256_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256";
/// URI of the Basic256Sha256 security policy.
pub const SECURITY_POLICY_BASIC_256_SHA_256_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
/// URI of the Aes128-Sha256-RsaOaep security policy.
pub const SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
/// URI of the Aes256-Sha256-RsaPss security policy.
pub const SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";

/// The padding scheme a policy uses for asymmetric encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaPadding {
    /// PKCS#1 v1.5.
    Pkcs1,
    /// OAEP with SHA-1 label hash.
    OaepSha1,
    /// OAEP with SHA-256 label hash.
    OaepSha256,
}

impl RsaPadding {
    /// Per-block overhead in bytes: cipher block size minus the plaintext
    /// that fits in it.
    pub fn block_overhead(&self) -> usize {
        match self {
            RsaPadding::Pkcs1 => 11,
            RsaPadding::OaepSha1 => 2 * SHA1_SIZE + 2,
            RsaPadding::OaepSha256 => 2 * SHA256_SIZE + 2,
        }
    }
}

/// A named algorithm bundle. `None` disables protection entirely; `Unknown`
/// is produced when a peer proposes a URI this stack does not speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityPolicy {
    /// Unrecognized policy URI.
    Unknown,
    /// No protection.
    None,
    /// AES-128-CBC, HMAC-SHA1, RSA PKCS#1 v1.5.
    Basic128Rsa15,
    /// AES-256-CBC, HMAC-SHA1, RSA OAEP. Deprecated by the standard but
    /// still widely deployed.
    Basic256,
    /// AES-256-CBC, HMAC-SHA256, RSA OAEP.
    Basic256Sha256,
    /// AES-128-CBC, HMAC-SHA256, RSA OAEP.
    Aes128Sha256RsaOaep,
    /// AES-256-CBC, HMAC-SHA256, RSA OAEP-SHA256 / PSS signatures.
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SecurityPolicy::Unknown => "Unknown",
            SecurityPolicy::None => "None",
            SecurityPolicy::Basic128Rsa15 => "Basic128Rsa15",
            SecurityPolicy::Basic256 => "Basic256",
            SecurityPolicy::Basic256Sha256 => "Basic256Sha256",
            SecurityPolicy::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            SecurityPolicy::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        })
    }
}

impl FromStr for SecurityPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            SECURITY_POLICY_NONE_URI | "None" => SecurityPolicy::None,
            SECURITY_POLICY_BASIC_128_RSA_15_URI | "Basic128Rsa15" => SecurityPolicy::Basic128Rsa15,
            SECURITY_POLICY_BASIC_256_URI | "Basic256" => SecurityPolicy::Basic256,
            SECURITY_POLICY_BASIC_256_SHA_256_URI | "Basic256Sha256" => {
                SecurityPolicy::Basic256Sha256
            }
            SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI | "Aes128Sha256RsaOaep" => {
                SecurityPolicy::Aes128Sha256RsaOaep
            }
            SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI | "Aes256Sha256RsaPss" => {
                SecurityPolicy::Aes256Sha256RsaPss
            }
            _ => SecurityPolicy::Unknown,
        })
    }
}

impl SecurityPolicy {
    /// The policy URI as it appears in asymmetric security headers.
    pub fn to_uri(&self) -> &'static str {
        match self {
            SecurityPolicy::Unknown => "",
            SecurityPolicy::None => SECURITY_POLICY_NONE_URI,
            SecurityPolicy::Basic128Rsa15 => SECURITY_POLICY_BASIC_128_RSA_15_URI,
            SecurityPolicy::Basic256 => SECURITY_POLICY_BASIC_256_URI,
            SecurityPolicy::Basic256Sha256 => SECURITY_POLICY_BASIC_256_SHA_256_URI,
            SecurityPolicy::Aes128Sha256RsaOaep => SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI,
            SecurityPolicy::Aes256Sha256RsaPss => SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI,
        }
    }

    /// `true` for every policy this stack can actually run.
    pub fn is_supported(&self) -> bool {
        !matches!(self, SecurityPolicy::Unknown)
    }

    /// Length of the symmetric HMAC signature.
    pub fn symmetric_signature_size(&self) -> usize {
        match self {
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => SHA1_SIZE,
            _ => SHA256_SIZE,
        }
    }

    /// Derived key length schedule: signing key, encryption key, IV, in that
    /// order.
    pub fn derived_key_schedule(&self) -> (usize, usize, usize) {
        match self {
            SecurityPolicy::Basic128Rsa15 => (16, 16, AES_BLOCK_SIZE),
            SecurityPolicy::Basic256 => (24, 32, AES_BLOCK_SIZE),
            SecurityPolicy::Basic256Sha256 => (32, 32, AES_BLOCK_SIZE),
            SecurityPolicy::Aes128Sha256RsaOaep => (32, 16, AES_BLOCK_SIZE),
            SecurityPolicy::Aes256Sha256RsaPss => (32, 32, AES_BLOCK_SIZE),
            SecurityPolicy::None | SecurityPolicy::Unknown => (0, 0, 0),
        }
    }

    /// The symmetric cipher block size, zero when the policy does not
    /// encrypt.
    pub fn symmetric_block_size(&self) -> usize {
        match self {
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
            _ => AES_BLOCK_SIZE,
        }
    }

    /// Length of the nonce each side contributes at open and renew: the
    /// symmetric encryption key length of the policy.
    pub fn secure_channel_nonce_length(&self) -> usize {
        self.derived_key_schedule().1
    }

    /// The asymmetric encryption padding of this policy.
    pub fn asymmetric_padding(&self) -> Option<RsaPadding> {
        match self {
            SecurityPolicy::None | SecurityPolicy::Unknown => None,
            SecurityPolicy::Basic128Rsa15 => Some(RsaPadding::Pkcs1),
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep => Some(RsaPadding::OaepSha1),
            SecurityPolicy::Aes256Sha256RsaPss => Some(RsaPadding::OaepSha256),
        }
    }

    /// Accepted asymmetric key lengths in bits, inclusive.
    pub fn asymmetric_key_length_range(&self) -> (usize, usize) {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => (1024, 2048),
            _ => (2048, 4096),
        }
    }

    /// Asymmetric signature length for the given key: the key modulus size.
    pub fn asymmetric_signature_size(&self, key: &dyn KeySize) -> usize {
        match self {
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
            _ => key.size(),
        }
    }

    /// Plaintext bytes that fit in one asymmetric cipher block.
    pub fn asymmetric_plain_block_size(&self, key: &dyn KeySize) -> usize {
        match self.asymmetric_padding() {
            Some(padding) => key.size() - padding.block_overhead(),
            None => 0,
        }
    }

    /// A fresh random nonce of the policy's nonce length.
    pub fn random_nonce(&self) -> ByteString {
        match self {
            SecurityPolicy::None | SecurityPolicy::Unknown => ByteString::null(),
            _ => random::byte_string(self.secure_channel_nonce_length()),
        }
    }

    /// Stretch the two channel nonces into a symmetric key set with the
    /// policy's pseudo-random function, split per the derived key schedule.
    pub fn make_security_keys(&self, secret: &[u8], seed: &[u8]) -> SecurityKeySet {
        let (signing_len, encryption_len, iv_len) = self.derived_key_schedule();
        let material = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                hash::p_sha1(secret, seed, signing_len + encryption_len + iv_len)
            }
            _ => hash::p_sha256(secret, seed, signing_len + encryption_len + iv_len),
        };
        SecurityKeySet::new(
            &material[..signing_len],
            &material[signing_len..signing_len + encryption_len],
            &material[signing_len + encryption_len..],
        )
    }

    /// HMAC `data` with `key`.
    pub fn symmetric_sign(&self, key: &[u8], data: &[u8]) -> EncodingResult<Vec<u8>> {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
                    .expect("HMAC can take a key of any size");
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            SecurityPolicy::None | SecurityPolicy::Unknown => Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                "policy cannot sign",
            )),
            _ => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
                    .expect("HMAC can take a key of any size");
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }

    /// Verify an HMAC signature in constant time. A mismatch is a
    /// `BadSecurityChecksFailed`.
    pub fn symmetric_verify_signature(
        &self,
        key: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> EncodingResult<()> {
        let verified = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
                    .expect("HMAC can take a key of any size");
                mac.update(data);
                mac.verify_slice(signature).is_ok()
            }
            SecurityPolicy::None | SecurityPolicy::Unknown => false,
            _ => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
                    .expect("HMAC can take a key of any size");
                mac.update(data);
                mac.verify_slice(signature).is_ok()
            }
        };
        if verified {
            Ok(())
        } else {
            error!("Symmetric chunk signature does not verify");
            Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "symmetric signature mismatch",
            ))
        }
    }

    /// AES-CBC encrypt `src` in place into a new vector. `src` must be a
    /// whole number of cipher blocks; the chunk layer owns padding.
    pub fn symmetric_encrypt(&self, key: &[u8], iv: &[u8], src: &[u8]) -> EncodingResult<Vec<u8>> {
        if src.len() % AES_BLOCK_SIZE != 0 {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "plaintext is not block aligned",
            ));
        }
        let mut buf = src.to_vec();
        let len = buf.len();
        match self.derived_key_schedule().1 {
            16 => {
                let cipher = Aes128CbcEnc::new_from_slices(key, iv).map_err(bad_key_material)?;
                cipher
                    .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                    .map_err(|_| bad_crypt("encryption failed"))?;
            }
            32 => {
                let cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(bad_key_material)?;
                cipher
                    .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                    .map_err(|_| bad_crypt("encryption failed"))?;
            }
            _ => {
                return Err(Error::new(
                    StatusCode::BadSecurityPolicyRejected,
                    "policy cannot encrypt",
                ))
            }
        }
        Ok(buf)
    }

    /// AES-CBC decrypt `src` into a new vector.
    pub fn symmetric_decrypt(&self, key: &[u8], iv: &[u8], src: &[u8]) -> EncodingResult<Vec<u8>> {
        if src.len() % AES_BLOCK_SIZE != 0 {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "ciphertext is not block aligned",
            ));
        }
        let mut buf = src.to_vec();
        match self.derived_key_schedule().1 {
            16 => {
                let cipher = Aes128CbcDec::new_from_slices(key, iv).map_err(bad_key_material)?;
                cipher
                    .decrypt_padded_mut::<NoPadding>(&mut buf)
                    .map_err(|_| bad_crypt("decryption failed"))?;
            }
            32 => {
                let cipher = Aes256CbcDec::new_from_slices(key, iv).map_err(bad_key_material)?;
                cipher
                    .decrypt_padded_mut::<NoPadding>(&mut buf)
                    .map_err(|_| bad_crypt("decryption failed"))?;
            }
            _ => {
                return Err(Error::new(
                    StatusCode::BadSecurityPolicyRejected,
                    "policy cannot decrypt",
                ))
            }
        }
        Ok(buf)
    }

    /// Sign `data` with the private key using the policy's signature
    /// algorithm.
    pub fn asymmetric_sign(&self, key: &PrivateKey, data: &[u8]) -> EncodingResult<Vec<u8>> {
        let result = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                let digest = Sha1::digest(data);
                key.inner().sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            }
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                let digest = Sha256::digest(data);
                key.inner().sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                let digest = Sha256::digest(data);
                key.inner()
                    .sign_with_rng(&mut rand::thread_rng(), Pss::new::<Sha256>(), &digest)
            }
            SecurityPolicy::None | SecurityPolicy::Unknown => {
                return Err(Error::new(
                    StatusCode::BadSecurityPolicyRejected,
                    "policy cannot sign",
                ))
            }
        };
        result.map_err(|e| bad_crypt(format!("asymmetric signing failed: {e}")))
    }

    /// Verify an asymmetric signature. A mismatch is a
    /// `BadSecurityChecksFailed`.
    pub fn asymmetric_verify_signature(
        &self,
        key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> EncodingResult<()> {
        let result = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                let digest = Sha1::digest(data);
                key.inner()
                    .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, signature)
            }
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                let digest = Sha256::digest(data);
                key.inner()
                    .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                let digest = Sha256::digest(data);
                key.inner().verify(Pss::new::<Sha256>(), &digest, signature)
            }
            SecurityPolicy::None | SecurityPolicy::Unknown => {
                return Err(Error::new(
                    StatusCode::BadSecurityPolicyRejected,
                    "policy cannot verify",
                ))
            }
        };
        result.map_err(|_| {
            error!("Asymmetric chunk signature does not verify");
            Error::new(
                StatusCode::BadSecurityChecksFailed,
                "asymmetric signature mismatch",
            )
        })
    }

    /// Encrypt `src` block-wise with the recipient's public key.
    pub fn asymmetric_encrypt(&self, key: &PublicKey, src: &[u8]) -> EncodingResult<Vec<u8>> {
        let padding = self.asymmetric_padding().ok_or_else(|| {
            Error::new(StatusCode::BadSecurityPolicyRejected, "policy cannot encrypt")
        })?;
        let plain_block = self.asymmetric_plain_block_size(key);
        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity(src.len() + key.size());
        for block in src.chunks(plain_block) {
            let encrypted = match padding {
                RsaPadding::Pkcs1 => key.inner().encrypt(&mut rng, Pkcs1v15Encrypt, block),
                RsaPadding::OaepSha1 => key.inner().encrypt(&mut rng, Oaep::new::<Sha1>(), block),
                RsaPadding::OaepSha256 => {
                    key.inner().encrypt(&mut rng, Oaep::new::<Sha256>(), block)
                }
            }
            .map_err(|e| bad_crypt(format!("asymmetric encryption failed: {e}")))?;
            out.extend_from_slice(&encrypted);
        }
        Ok(out)
    }

    /// Decrypt `src` block-wise with the local private key.
    pub fn asymmetric_decrypt(&self, key: &PrivateKey, src: &[u8]) -> EncodingResult<Vec<u8>> {
        let padding = self.asymmetric_padding().ok_or_else(|| {
            Error::new(StatusCode::BadSecurityPolicyRejected, "policy cannot decrypt")
        })?;
        let cipher_block = key.size();
        if src.is_empty() || src.len() % cipher_block != 0 {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "ciphertext is not a whole number of key-size blocks",
            ));
        }
        let mut out = Vec::with_capacity(src.len());
        for block in src.chunks(cipher_block) {
            let decrypted = match padding {
                RsaPadding::Pkcs1 => key.inner().decrypt(Pkcs1v15Encrypt, block),
                RsaPadding::OaepSha1 => key.inner().decrypt(Oaep::new::<Sha1>(), block),
                RsaPadding::OaepSha256 => key.inner().decrypt(Oaep::new::<Sha256>(), block),
            }
            .map_err(|_| {
                // Deliberately detail-free, padding oracles love verbose errors.
                Error::new(StatusCode::BadSecurityChecksFailed, "decryption failed")
            })?;
            out.extend_from_slice(&decrypted);
        }
        Ok(out)
    }
}

fn bad_key_material(_: aes::cipher::InvalidLength) -> Error {
    Error::new(StatusCode::BadSecurityChecksFailed, "invalid key material")
}

fn bad_crypt(context: impl Into<String>) -> Error {
    Error::new(StatusCode::BadSecurityChecksFailed, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uris_round_trip() {
        for policy in [
            SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            assert_eq!(SecurityPolicy::from_str(policy.to_uri()), Ok(policy));
        }
        assert_eq!(
            SecurityPolicy::from_str("http://opcfoundation.org/UA/SecurityPolicy#Bogus"),
            Ok(SecurityPolicy::Unknown)
        );
    }

    #[test]
    fn derived_keys_pair_up() {
        let policy = SecurityPolicy::Basic256Sha256;
        let client_nonce = policy.random_nonce();
        let server_nonce = policy.random_nonce();
        assert_eq!(client_nonce.len(), 32);

        // The client's sender keys must be the server's receiver keys.
        let client_sender =
            policy.make_security_keys(server_nonce.as_ref(), client_nonce.as_ref());
        let server_receiver =
            policy.make_security_keys(server_nonce.as_ref(), client_nonce.as_ref());
        assert_eq!(
            &*client_sender.signing_key.expose(),
            &*server_receiver.signing_key.expose()
        );

        // And the two directions must not share material.
        let server_sender =
            policy.make_security_keys(client_nonce.as_ref(), server_nonce.as_ref());
        assert_ne!(
            &*client_sender.encryption_key.expose(),
            &*server_sender.encryption_key.expose()
        );
    }

    #[test]
    fn symmetric_sign_and_verify() {
        let policy = SecurityPolicy::Basic256Sha256;
        let key = [7u8; 32];
        let signature = policy.symmetric_sign(&key, b"some chunk bytes").unwrap();
        assert_eq!(signature.len(), policy.symmetric_signature_size());
        policy
            .symmetric_verify_signature(&key, b"some chunk bytes", &signature)
            .unwrap();
        let err = policy
            .symmetric_verify_signature(&key, b"tampered bytes", &signature)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BadSecurityChecksFailed);
    }

    #[test]
    fn symmetric_encrypt_round_trip() {
        let policy = SecurityPolicy::Aes128Sha256RsaOaep;
        let key = [3u8; 16];
        let iv = [9u8; 16];
        let plain = [0x5au8; 64];
        let cipher = policy.symmetric_encrypt(&key, &iv, &plain).unwrap();
        assert_eq!(cipher.len(), plain.len());
        assert_ne!(&cipher[..], &plain[..]);
        let decrypted = policy.symmetric_decrypt(&key, &iv, &cipher).unwrap();
        assert_eq!(&decrypted[..], &plain[..]);
    }

    #[test]
    fn unaligned_plaintext_is_rejected() {
        let policy = SecurityPolicy::Basic256Sha256;
        let err = policy
            .symmetric_encrypt(&[0u8; 32], &[0u8; 16], &[1u8; 17])
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BadSecurityChecksFailed);
    }

    #[test]
    fn asymmetric_sign_and_crypt() {
        let key = PrivateKey::new(2048).unwrap();
        let public = key.public_key();

        for policy in [
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            let signature = policy.asymmetric_sign(&key, b"open request").unwrap();
            assert_eq!(signature.len(), policy.asymmetric_signature_size(&key));
            policy
                .asymmetric_verify_signature(&public, b"open request", &signature)
                .unwrap();
            assert!(policy
                .asymmetric_verify_signature(&public, b"other bytes", &signature)
                .is_err());

            // Two plain blocks worth of data.
            let plain = vec![0x11u8; policy.asymmetric_plain_block_size(&public) + 5];
            let cipher = policy.asymmetric_encrypt(&public, &plain).unwrap();
            assert_eq!(cipher.len(), 2 * public.size());
            let decrypted = policy.asymmetric_decrypt(&key, &cipher).unwrap();
            assert_eq!(decrypted, plain);
        }
    }
}
