//! Nullable clock: deterministic time for testing.

use std::sync::atomic::{AtomicU32, Ordering};

use xel_types::{Clock, Timestamp};

/// A clock that only moves when told to. Shareable across threads so the
/// engine and the test can hold the same instance.
#[derive(Debug, Default)]
pub struct NullClock {
    current: AtomicU32,
}

impl NullClock {
    pub fn new(initial_secs: u32) -> Self {
        Self {
            current: AtomicU32::new(initial_secs),
        }
    }

    /// Advance time by a number of seconds.
    pub fn advance(&self, secs: u32) {
        self.current.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, secs: u32) {
        self.current.store(secs, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current.load(Ordering::SeqCst))
    }
}
