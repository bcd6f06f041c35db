//! MVCC timestamps and the wall-clock helpers used by retention.

use std::{fmt, time::Duration};

/// Number of low bits reserved for the per-second counter.
pub const TIMESTAMP_COUNTER_WIDTH: u32 = 30;

/// Version marker attached to versioned cells, writes and deletes.
///
/// The high bits carry unix seconds, the low [`TIMESTAMP_COUNTER_WIDTH`] bits a
/// counter that orders commits within the same second.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// "Unset" marker; orders before every real timestamp.
    pub const NULL: Self = Self(0);
    /// Least real timestamp.
    pub const MIN: Self = Self(1);
    /// Greatest possible timestamp (used for key columns and open-ended bounds).
    pub const MAX: Self = Self(0x3fff_ffff_ffff_ff00);

    /// Construct a timestamp from a raw `u64`.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Timestamp of the first commit within `seconds` since the unix epoch.
    #[inline]
    pub const fn from_seconds(seconds: u64) -> Self {
        Self(seconds << TIMESTAMP_COUNTER_WIDTH)
    }

    /// Returns the raw `u64` value backing this timestamp.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Unix seconds encoded in the high bits.
    #[inline]
    pub const fn seconds(self) -> u64 {
        self.0 >> TIMESTAMP_COUNTER_WIDTH
    }

    /// Returns true for [`Timestamp::NULL`].
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Timestamp").field(&self.0).finish()
    }
}

/// Bounds on the wall time elapsed between `lo` and `hi`.
///
/// Only whole seconds are encoded, so the true distance lies within
/// `[first, second]`. Returns zero durations when `hi <= lo`.
pub fn timestamp_diff_to_duration(lo: Timestamp, hi: Timestamp) -> (Duration, Duration) {
    if hi <= lo {
        return (Duration::ZERO, Duration::ZERO);
    }
    let seconds = hi.seconds() - lo.seconds();
    (
        Duration::from_secs(seconds.saturating_sub(1)),
        Duration::from_secs(seconds + 1),
    )
}

/// Returns true when `timestamp` is older than `ttl` as seen from `current`.
pub(crate) fn is_expired(timestamp: Timestamp, current: Timestamp, ttl: Duration) -> bool {
    timestamp < current && timestamp_diff_to_duration(timestamp, current).0 > ttl
}
