// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Endpoint URL helpers.

use url::Url;

/// Scheme of OPC UA TCP binary endpoints.
pub const OPC_TCP_SCHEME: &str = "opc.tcp";

/// `true` if the string parses as an `opc.tcp` URL.
pub fn is_opc_ua_binary_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(url) => url.scheme() == OPC_TCP_SCHEME,
        Err(_) => false,
    }
}

/// Compare two endpoint URLs ignoring the host part, which commonly differs
/// between what a client dialed and what a server advertises.
pub fn url_matches_except_host(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme() && a.port() == b.port() && a.path() == b.path()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_check() {
        assert!(is_opc_ua_binary_url("opc.tcp://localhost:4840/"));
        assert!(!is_opc_ua_binary_url("http://localhost:4840/"));
        assert!(!is_opc_ua_binary_url("not a url"));
    }

    #[test]
    fn host_is_ignored() {
        assert!(url_matches_except_host(
            "opc.tcp://localhost:4840/uasc",
            "opc.tcp://10.0.0.7:4840/uasc"
        ));
        assert!(!url_matches_except_host(
            "opc.tcp://localhost:4840/uasc",
            "opc.tcp://localhost:4841/uasc"
        ));
    }
}
