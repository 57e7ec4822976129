// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Holds the endpoint's own certificate and key and answers the one question
//! the channel layer asks about a peer certificate: do we accept it right
//! now. Chain building, CRLs and trust-list management are the application's
//! PKI concern and stay outside this crate.

use std::path::Path;

use chrono::Utc;
use tracing::warn;

use uasc_types::{EncodingResult, Error, StatusCode};

use crate::pkey::PrivateKey;
use crate::x509::{Thumbprint, X509};

/// Certificate store for one endpoint.
#[derive(Debug)]
pub struct CertificateStore {
    own_certificate: Option<X509>,
    own_private_key: Option<PrivateKey>,
    /// Accept any time-valid peer certificate. Useful for commissioning,
    /// unfit for production.
    trust_unknown_certs: bool,
    trusted_thumbprints: Vec<Thumbprint>,
}

impl CertificateStore {
    /// An empty store that trusts nothing, suitable for policy `None`.
    pub fn new() -> Self {
        Self {
            own_certificate: None,
            own_private_key: None,
            trust_unknown_certs: false,
            trusted_thumbprints: Vec::new(),
        }
    }

    /// A store with the given identity.
    pub fn new_with_identity(certificate: X509, private_key: PrivateKey) -> Self {
        Self {
            own_certificate: Some(certificate),
            own_private_key: Some(private_key),
            trust_unknown_certs: false,
            trusted_thumbprints: Vec::new(),
        }
    }

    /// Load the identity from a DER certificate file and a PEM key file.
    pub fn load_identity(
        &mut self,
        certificate_path: &Path,
        private_key_path: &Path,
    ) -> EncodingResult<()> {
        let der = std::fs::read(certificate_path).map_err(|e| {
            Error::new(
                StatusCode::BadSecurityChecksFailed,
                format!("cannot read certificate {}: {e}", certificate_path.display()),
            )
        })?;
        let pem = std::fs::read_to_string(private_key_path).map_err(|e| {
            Error::new(
                StatusCode::BadSecurityChecksFailed,
                format!("cannot read private key {}: {e}", private_key_path.display()),
            )
        })?;
        self.own_certificate = Some(X509::from_der(&der)?);
        self.own_private_key = Some(PrivateKey::from_pem(&pem)?);
        Ok(())
    }

    /// Accept any time-valid peer certificate without a trust check.
    pub fn set_trust_unknown_certs(&mut self, trust: bool) {
        if trust {
            warn!("Certificate store trusts unknown certificates, this is not suitable for production");
        }
        self.trust_unknown_certs = trust;
    }

    /// Pin a peer certificate thumbprint as trusted.
    pub fn add_trusted_thumbprint(&mut self, thumbprint: Thumbprint) {
        self.trusted_thumbprints.push(thumbprint);
    }

    /// The endpoint's own certificate.
    pub fn read_own_cert(&self) -> Option<&X509> {
        self.own_certificate.as_ref()
    }

    /// The endpoint's own private key.
    pub fn read_own_pkey(&self) -> Option<&PrivateKey> {
        self.own_private_key.as_ref()
    }

    /// Validate a peer certificate: time window first, then trust.
    pub fn validate_peer_cert(&self, certificate: &X509) -> StatusCode {
        let now = Utc::now();
        let time_status = certificate.is_time_valid(&now);
        if time_status.is_bad() {
            return time_status;
        }
        if self.trust_unknown_certs {
            return StatusCode::Good;
        }
        let thumbprint = certificate.thumbprint();
        if self.trusted_thumbprints.contains(&thumbprint) {
            StatusCode::Good
        } else {
            StatusCode::BadCertificateUntrusted
        }
    }
}

impl Default for CertificateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::create_self_signed;

    #[test]
    fn trust_decisions() {
        let key = PrivateKey::new(2048).unwrap();
        let cert = create_self_signed(&key, "UASC test", 365).unwrap();

        let mut store = CertificateStore::new();
        assert_eq!(
            store.validate_peer_cert(&cert),
            StatusCode::BadCertificateUntrusted
        );

        store.add_trusted_thumbprint(cert.thumbprint());
        assert_eq!(store.validate_peer_cert(&cert), StatusCode::Good);

        let mut permissive = CertificateStore::new();
        permissive.set_trust_unknown_certs(true);
        assert_eq!(permissive.validate_peer_cert(&cert), StatusCode::Good);
    }
}
