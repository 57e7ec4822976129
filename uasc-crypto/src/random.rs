// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Entropy helpers for nonces and padding filler.

use rand::RngCore;

use uasc_types::ByteString;

/// Fill `bytes` with random data.
pub fn bytes(bytes: &mut [u8]) {
    rand::thread_rng().fill_bytes(bytes);
}

/// A random byte string of the given length.
pub fn byte_string(number_of_bytes: usize) -> ByteString {
    let mut b = vec![0u8; number_of_bytes];
    bytes(&mut b);
    ByteString::from(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_differ() {
        let a = byte_string(32);
        let b = byte_string(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
