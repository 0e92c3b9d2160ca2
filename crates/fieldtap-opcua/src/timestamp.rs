// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol timestamp conversion.
//!
//! OPC UA timestamps count 100-nanosecond ticks since 1601-01-01T00:00:00Z.
//! [`to_utc`] turns them into Unix seconds plus microseconds using plain
//! truncating integer arithmetic so emitted timestamps are bit-identical
//! across implementations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticks per second (100ns resolution).
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Days between 1601-01-01 and 1970-01-01.
pub const EPOCH_OFFSET_DAYS: i64 = 134_774;

/// Seconds between 1601-01-01 and 1970-01-01.
pub const EPOCH_OFFSET_SECONDS: i64 = EPOCH_OFFSET_DAYS * 86_400;

// =============================================================================
// UtcTimestamp
// =============================================================================

/// UTC wall-clock time with microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp {
    /// Seconds since 1970-01-01T00:00:00Z.
    pub seconds: i64,
    /// Microseconds within the second.
    ///
    /// Negative only for inputs before 1601, where the truncating
    /// arithmetic leaves a negative remainder.
    pub microseconds: i64,
}

impl UtcTimestamp {
    /// Creates a timestamp.
    pub const fn new(seconds: i64, microseconds: i64) -> Self {
        Self {
            seconds,
            microseconds,
        }
    }

    /// Returns the current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Converts a chrono timestamp, truncating to microseconds.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            microseconds: i64::from(dt.timestamp_subsec_micros()),
        }
    }

    /// Converts to a chrono timestamp.
    ///
    /// A negative microsecond remainder borrows from the seconds. Returns
    /// `None` outside chrono's representable range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let (mut seconds, mut micros) = (self.seconds, self.microseconds);
        if micros < 0 {
            seconds -= 1;
            micros += 1_000_000;
        }
        let nanos = u32::try_from(micros * 1_000).ok()?;
        DateTime::from_timestamp(seconds, nanos)
    }

    /// Formats as `YYYY-MM-DD HH:MM:SS.ssssss+00:00`.
    pub fn format(self) -> Option<String> {
        self.to_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string())
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format() {
            Some(s) => f.write_str(&s),
            None => write!(f, "{}.{:06}", self.seconds, self.microseconds),
        }
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Converts 100ns ticks since 1601 to Unix seconds and microseconds.
///
/// ```
/// use fieldtap_opcua::timestamp::{to_utc, EPOCH_OFFSET_SECONDS, TICKS_PER_SECOND};
///
/// let unix_epoch = to_utc(EPOCH_OFFSET_SECONDS * TICKS_PER_SECOND);
/// assert_eq!((unix_epoch.seconds, unix_epoch.microseconds), (0, 0));
/// ```
pub fn to_utc(ticks: i64) -> UtcTimestamp {
    let micro100 = ticks % TICKS_PER_SECOND;
    let whole_seconds_1601 = (ticks - micro100) / TICKS_PER_SECOND;
    UtcTimestamp {
        seconds: whole_seconds_1601 - EPOCH_OFFSET_SECONDS,
        microseconds: micro100 / 10,
    }
}

/// Converts a Unix timestamp back to ticks since 1601.
pub fn from_utc(timestamp: UtcTimestamp) -> i64 {
    (timestamp.seconds + EPOCH_OFFSET_SECONDS) * TICKS_PER_SECOND + timestamp.microseconds * 10
}

// =============================================================================
// Tests
// =============================================================================
