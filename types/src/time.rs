//! Network epoch time.
//!
//! Block and transaction timestamps count seconds since the network epoch
//! (2013-11-24 12:00:00 UTC) and fit in 32 bits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time of the network epoch, in seconds.
pub const EPOCH_BEGINNING_UNIX: u64 = 1_385_294_400;

/// Seconds since the network epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u32);

impl Timestamp {
    /// The epoch itself; genesis payments carry this timestamp.
    pub const EPOCH: Self = Self(0);

    pub const fn new(secs: u32) -> Self {
        Self(secs)
    }

    /// Current wall-clock time in epoch seconds. A clock set before the epoch
    /// reads as the epoch.
    pub fn now() -> Self {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::from_unix(unix)
    }

    pub fn from_unix(unix_secs: u64) -> Self {
        let secs = unix_secs.saturating_sub(EPOCH_BEGINNING_UNIX);
        Self(u32::try_from(secs).unwrap_or(u32::MAX))
    }

    pub const fn as_secs(&self) -> u32 {
        self.0
    }

    pub fn plus(&self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn minus(&self, secs: u32) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Signed distance `self - earlier` in seconds.
    pub fn diff(&self, earlier: Timestamp) -> i64 {
        i64::from(self.0) - i64::from(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of the current time. The node reads time only through this, so
/// tests can drive it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_before_epoch_clamps_to_zero() {
        assert_eq!(Timestamp::from_unix(0), Timestamp::EPOCH);
        assert_eq!(Timestamp::from_unix(EPOCH_BEGINNING_UNIX + 60).as_secs(), 60);
    }

    #[test]
    fn diff_is_signed() {
        assert_eq!(Timestamp::new(10).diff(Timestamp::new(25)), -15);
    }
}
