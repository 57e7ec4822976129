// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Contains the implementation of `DateTime`.

use std::fmt;
use std::io::{Read, Write};

use chrono::{Duration, TimeZone, Utc};

use crate::encoding::{
    read_i64, write_i64, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// Ticks are 100 nanosecond intervals.
const TICKS_PER_SECOND: i64 = 10_000_000;
/// Seconds between 1601-01-01 (the OPC UA / Windows epoch) and 1970-01-01.
const EPOCH_DELTA_SECONDS: i64 = 11_644_473_600;
/// The largest tick value the codec will produce, 9999-12-31 23:59:59.
const MAX_TICKS: i64 = 2_650_467_743_990_000_000;

/// An OPC UA timestamp: 100 ns ticks since 1601-01-01 UTC, `i64` on the wire.
/// Zero is the null timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime {
    ticks: i64,
}

impl Default for DateTime {
    fn default() -> Self {
        Self::null()
    }
}

impl DateTime {
    /// The null timestamp.
    pub fn null() -> Self {
        Self { ticks: 0 }
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// The current time shifted by `offset`, used to compensate clock skew
    /// against the peer.
    pub fn now_with_offset(offset: Duration) -> Self {
        Self::from(Utc::now() + offset)
    }

    /// `true` if this is the null timestamp.
    pub fn is_null(&self) -> bool {
        self.ticks == 0
    }

    /// Raw tick count.
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Convert to a chrono UTC time.
    pub fn as_chrono(&self) -> chrono::DateTime<Utc> {
        let secs = self.ticks / TICKS_PER_SECOND - EPOCH_DELTA_SECONDS;
        let nanos = (self.ticks % TICKS_PER_SECOND) * 100;
        Utc.timestamp_opt(secs, nanos as u32)
            .single()
            .unwrap_or_default()
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(value: chrono::DateTime<Utc>) -> Self {
        let secs = value.timestamp() + EPOCH_DELTA_SECONDS;
        let ticks = secs * TICKS_PER_SECOND + i64::from(value.timestamp_subsec_nanos()) / 100;
        Self {
            ticks: ticks.clamp(0, MAX_TICKS),
        }
    }
}

impl std::ops::Sub for DateTime {
    type Output = Duration;
    fn sub(self, rhs: Self) -> Duration {
        Duration::microseconds((self.ticks - rhs.ticks) / 10)
    }
}

impl std::ops::Sub<Duration> for DateTime {
    type Output = DateTime;
    fn sub(self, rhs: Duration) -> DateTime {
        DateTime {
            ticks: (self.ticks - rhs.num_microseconds().unwrap_or(0) * 10).clamp(0, MAX_TICKS),
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_chrono().to_rfc3339())
    }
}

impl BinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i64(stream, self.ticks)
    }
}

impl BinaryDecodable for DateTime {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let ticks = read_i64(stream)?.clamp(0, MAX_TICKS);
        let dt = DateTime { ticks };
        if dt.is_null() || options.client_offset.is_zero() {
            Ok(dt)
        } else {
            Ok(dt - options.client_offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip() {
        let now = DateTime::now();
        let mut buf = Vec::new();
        now.encode(&mut buf).unwrap();
        let decoded = DateTime::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, now);
    }

    #[test]
    fn unix_epoch_ticks() {
        let epoch = DateTime::from(Utc.timestamp_opt(0, 0).single().unwrap());
        assert_eq!(epoch.ticks(), EPOCH_DELTA_SECONDS * TICKS_PER_SECOND);
    }

    #[test]
    fn negative_ticks_clamp_to_null() {
        let mut buf = Vec::new();
        write_i64(&mut buf, -1).unwrap();
        let decoded = DateTime::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert!(decoded.is_null());
    }
}
