//! Nullable infrastructure for deterministic testing.
//!
//! The node reaches the outside world through a clock, its peers and the
//! chain store. This crate provides stand-ins for each that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network

pub mod clock;
pub mod peer;
pub mod store;

pub use clock::NullClock;
pub use peer::NullPeer;
pub use store::NullBlockStore;
