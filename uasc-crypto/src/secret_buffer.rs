// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Owned container for keying material, zeroed on destruction.

use std::fmt;
use std::ops::Deref;

/// A byte buffer holding secret material. The backing store is wiped with
/// volatile writes when the buffer is dropped, and the bytes can only be
/// reached through a scoped [`SecretBuffer::expose`] borrow.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBuffer {
    bytes: Vec<u8>,
}

impl SecretBuffer {
    /// Copy `bytes` into a new secret buffer. The caller remains responsible
    /// for clearing the source.
    pub fn from_exposed(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// A zero-filled secret buffer of the given length.
    pub fn with_len(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow the secret bytes. The borrow should live no longer than one
    /// primitive call.
    pub fn expose(&self) -> ExposedSecret<'_> {
        ExposedSecret(&self.bytes)
    }

}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        for b in self.bytes.iter_mut() {
            // Volatile so the wipe is not optimized away.
            unsafe { std::ptr::write_volatile(b, 0) };
        }
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer({} bytes)", self.bytes.len())
    }
}

/// Scoped read access to the bytes of a [`SecretBuffer`].
pub struct ExposedSecret<'a>(&'a [u8]);

impl Deref for ExposedSecret<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_matches_source() {
        let secret = SecretBuffer::from_exposed(&[1, 2, 3, 4]);
        assert_eq!(secret.len(), 4);
        assert_eq!(&*secret.expose(), &[1, 2, 3, 4]);
    }

    #[test]
    fn debug_does_not_leak() {
        let secret = SecretBuffer::from_exposed(&[0xAA; 16]);
        let formatted = format!("{secret:?}");
        assert!(!formatted.contains("170"));
        assert!(formatted.contains("16 bytes"));
    }
}
