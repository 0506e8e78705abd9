//! 64-bit identifiers for accounts, blocks and transactions.
//!
//! Every id is the leading eight bytes of a sha256 digest. The network shows
//! them as unsigned decimal strings; legacy constants are often written as
//! signed 64-bit values, hence `from_signed`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const ZERO: Self = Self(0);

            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Reinterpret a two's-complement signed id.
            pub const fn from_signed(raw: i64) -> Self {
                Self(raw as u64)
            }

            pub const fn raw(&self) -> u64 {
                self.0
            }

            pub const fn is_zero(&self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Account identity, derived from the account's public key.
    AccountId
);
id_type!(
    /// Block identity, derived from the signed block bytes.
    BlockId
);
id_type!(
    /// Transaction identity, derived from the transaction's full hash.
    TransactionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_ids_display_unsigned() {
        let id = AccountId::from_signed(-1);
        assert_eq!(id.to_string(), "18446744073709551615");
    }

    #[test]
    fn parse_round_trips_display() {
        let id = BlockId::from_signed(-6336019433117180774);
        let parsed: BlockId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
