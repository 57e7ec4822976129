// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Synchronization primitives. The stack uses parking_lot locks throughout;
//! the `trace_*_lock` macros exist so lock acquisition can be traced when
//! debugging deadlocks.

pub use parking_lot::{Mutex, RwLock};

/// Take a read lock, tracing the acquisition.
#[macro_export]
macro_rules! trace_read_lock {
    ( $x:expr ) => {{
        tracing::trace!(target: "locks", "read lock {} at {}:{}", stringify!($x), file!(), line!());
        $x.read()
    }};
}

/// Take a write lock, tracing the acquisition.
#[macro_export]
macro_rules! trace_write_lock {
    ( $x:expr ) => {{
        tracing::trace!(target: "locks", "write lock {} at {}:{}", stringify!($x), file!(), line!());
        $x.write()
    }};
}

/// Take a mutex, tracing the acquisition.
#[macro_export]
macro_rules! trace_lock {
    ( $x:expr ) => {{
        tracing::trace!(target: "locks", "lock {} at {}:{}", stringify!($x), file!(), line!());
        $x.lock()
    }};
}
