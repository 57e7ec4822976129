// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! X.509 certificate wrapper. Certificates are carried as DER byte strings on
//! the wire; this type parses them once and answers the questions the channel
//! layer asks: thumbprint, public key, validity window.

use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::RsaPublicKey;
use sha1::{Digest, Sha1};
use x509_cert::der::Decode;
use x509_cert::Certificate;

use uasc_types::{ByteString, EncodingResult, Error, StatusCode};

use crate::pkey::PublicKey;

/// SHA-1 digest of a certificate's DER form, used in asymmetric security
/// headers to identify the receiver certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbprint {
    value: [u8; 20],
}

impl Thumbprint {
    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    /// The digest as a wire byte string.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(self.value.as_slice())
    }
}

/// A parsed X.509 certificate plus its original DER bytes.
#[derive(Debug, Clone)]
pub struct X509 {
    der: Vec<u8>,
    certificate: Certificate,
}

impl X509 {
    /// Parse a certificate from DER bytes.
    pub fn from_der(der: &[u8]) -> EncodingResult<Self> {
        let certificate = Certificate::from_der(der).map_err(|e| {
            Error::new(
                StatusCode::BadCertificateInvalid,
                format!("failed to parse certificate: {e}"),
            )
        })?;
        Ok(Self {
            der: der.to_vec(),
            certificate,
        })
    }

    /// Parse a certificate from a wire byte string.
    pub fn from_byte_string(bytes: &ByteString) -> EncodingResult<Self> {
        match bytes.value() {
            Some(der) if !der.is_empty() => Self::from_der(der),
            _ => Err(Error::new(
                StatusCode::BadCertificateInvalid,
                "certificate byte string is null or empty",
            )),
        }
    }

    /// The DER bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The DER bytes as a wire byte string.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(self.der.as_slice())
    }

    /// SHA-1 thumbprint of the DER bytes.
    pub fn thumbprint(&self) -> Thumbprint {
        let digest = Sha1::digest(&self.der);
        let mut value = [0u8; 20];
        value.copy_from_slice(&digest);
        Thumbprint { value }
    }

    /// The RSA public key carried by the certificate.
    pub fn public_key(&self) -> EncodingResult<PublicKey> {
        let spki = &self.certificate.tbs_certificate.subject_public_key_info;
        let bits = spki.subject_public_key.as_bytes().ok_or_else(|| {
            Error::new(
                StatusCode::BadCertificateInvalid,
                "certificate public key is not byte aligned",
            )
        })?;
        RsaPublicKey::from_pkcs1_der(bits)
            .map(PublicKey::from_inner)
            .map_err(|e| {
                Error::new(
                    StatusCode::BadCertificateInvalid,
                    format!("certificate does not carry an RSA public key: {e}"),
                )
            })
    }

    /// Check the validity window against `now`. Returns `Good` or
    /// `BadCertificateTimeInvalid`.
    pub fn is_time_valid(&self, now: &DateTime<Utc>) -> StatusCode {
        let validity = &self.certificate.tbs_certificate.validity;
        let not_before: DateTime<Utc> = validity.not_before.to_system_time().into();
        let not_after: DateTime<Utc> = validity.not_after.to_system_time().into();
        if *now < not_before || *now > not_after {
            StatusCode::BadCertificateTimeInvalid
        } else {
            StatusCode::Good
        }
    }
}

impl PartialEq for X509 {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

/// Create a self-signed certificate for the given key. Enough for tests,
/// samples and commissioning; real deployments bring their own PKI.
pub fn create_self_signed(
    key: &crate::pkey::PrivateKey,
    common_name: &str,
    validity_days: u64,
) -> EncodingResult<X509> {
    use rsa::pkcs8::EncodePublicKey;
    use std::str::FromStr;
    use x509_cert::builder::{Builder, CertificateBuilder, Profile};
    use x509_cert::der::Encode;
    use x509_cert::name::Name;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::SubjectPublicKeyInfoOwned;
    use x509_cert::time::Validity;

    let cert_err =
        |e: String| Error::new(StatusCode::BadCertificateInvalid, e);

    let spki_der = key
        .public_key()
        .inner()
        .to_public_key_der()
        .map_err(|e| cert_err(format!("cannot encode public key: {e}")))?;
    let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes())
        .map_err(|e| cert_err(format!("cannot re-parse public key: {e}")))?;
    let subject = Name::from_str(&format!("CN={common_name}"))
        .map_err(|e| cert_err(format!("invalid subject name: {e}")))?;
    let validity =
        Validity::from_now(std::time::Duration::from_secs(validity_days * 24 * 60 * 60))
            .map_err(|e| cert_err(format!("invalid validity window: {e}")))?;

    let signer = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(key.inner().clone());
    let builder = CertificateBuilder::new(
        Profile::Root,
        SerialNumber::from(1u32),
        validity,
        subject,
        spki,
        &signer,
    )
    .map_err(|e| cert_err(format!("cannot build certificate: {e}")))?;
    let certificate = builder
        .build::<rsa::pkcs1v15::Signature>()
        .map_err(|e| cert_err(format!("cannot sign certificate: {e}")))?;
    let der = certificate
        .to_der()
        .map_err(|e| cert_err(format!("cannot serialize certificate: {e}")))?;
    X509::from_der(&der)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkey::{KeySize, PrivateKey};

    #[test]
    fn self_signed_round_trip() {
        let key = PrivateKey::new(2048).unwrap();
        let cert = create_self_signed(&key, "UASC test", 365).unwrap();

        let reparsed = X509::from_byte_string(&cert.as_byte_string()).unwrap();
        assert_eq!(reparsed, cert);
        assert_eq!(reparsed.thumbprint(), cert.thumbprint());
        assert_eq!(cert.thumbprint().as_bytes().len(), 20);

        let public = cert.public_key().unwrap();
        assert_eq!(public.size(), key.size());
        assert_eq!(cert.is_time_valid(&Utc::now()), StatusCode::Good);
    }

    #[test]
    fn null_byte_string_is_rejected() {
        let err = X509::from_byte_string(&ByteString::null()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadCertificateInvalid);
    }
}
