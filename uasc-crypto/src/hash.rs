// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! The P-SHA pseudo-random function used to stretch the channel nonces into
//! key material, as defined by TLS 1.0 P_hash.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

macro_rules! p_hash_impl {
    ($name:ident, $mac:ty, $doc:expr) => {
        #[doc = $doc]
        pub fn $name(secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
            fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
                let mut mac =
                    <$mac>::new_from_slice(key).expect("HMAC can take a key of any size");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }

            let mut out = Vec::with_capacity(length);
            // A(1) = HMAC(secret, seed); A(n) = HMAC(secret, A(n-1));
            // output block n = HMAC(secret, A(n) | seed)
            let mut a = hmac(secret, seed);
            while out.len() < length {
                let mut mac =
                    <$mac>::new_from_slice(secret).expect("HMAC can take a key of any size");
                mac.update(&a);
                mac.update(seed);
                out.extend_from_slice(&mac.finalize().into_bytes());
                a = hmac(secret, &a);
            }
            out.truncate(length);
            out
        }
    };
}

p_hash_impl!(p_sha1, HmacSha1, "P_SHA1(secret, seed) stretched to `length` bytes.");
p_hash_impl!(
    p_sha256,
    HmacSha256,
    "P_SHA256(secret, seed) stretched to `length` bytes."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_length_is_honored() {
        for length in [1, 20, 21, 64, 80, 100] {
            assert_eq!(p_sha1(b"secret", b"seed", length).len(), length);
            assert_eq!(p_sha256(b"secret", b"seed", length).len(), length);
        }
    }

    #[test]
    fn deterministic_and_keyed() {
        let a = p_sha256(b"secret", b"seed", 48);
        let b = p_sha256(b"secret", b"seed", 48);
        let c = p_sha256(b"other", b"seed", 48);
        let d = p_sha256(b"secret", b"other", 48);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn prefix_property() {
        // Stretching further only appends; the prefix is stable.
        let short = p_sha1(b"secret", b"seed", 16);
        let long = p_sha1(b"secret", b"seed", 64);
        assert_eq!(&long[..16], &short[..]);
    }
}
