//! Fundamental types for the XEL node.
//!
//! This crate defines the types shared by every other crate in the workspace:
//! account/block/transaction ids, hashes, NQT amounts, keys, epoch timestamps,
//! chain parameters and the height-gated consensus rule table.

pub mod amount;
pub mod codec;
pub mod event;
pub mod hash;
pub mod ids;
pub mod keys;
pub mod network;
pub mod params;
pub mod rules;
pub mod time;

pub use amount::{Amount, ONE_XEL};
pub use codec::{ByteReader, ByteWriter, CodecError};
pub use event::{LedgerEvent, LedgerHolding};
pub use hash::Hash256;
pub use ids::{AccountId, BlockId, TransactionId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::NetworkId;
pub use params::ChainParams;
pub use rules::{EffectiveBalanceRule, FeeRule, RuleTable};
pub use time::{Clock, SystemClock, Timestamp};
