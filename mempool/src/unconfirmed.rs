use std::cmp::Reverse;
use xel_transactions::Transaction;
use xel_types::{Timestamp, TransactionId};

/// A pool entry: the transaction plus what the pool knew when it arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnconfirmedTransaction {
    pub tx: Transaction,
    pub arrival: Timestamp,
    /// Fee in NQT per serialized byte, rounded down.
    pub fee_per_byte: i64,
    /// Chain height when the entry was created.
    pub height: u32,
}

impl UnconfirmedTransaction {
    pub fn new(tx: Transaction, arrival: Timestamp, height: u32) -> Self {
        let size = tx.size().max(1) as i64;
        let fee_per_byte = tx.fee().nqt() / size;
        Self {
            tx,
            arrival,
            fee_per_byte,
            height,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tx.id()
    }

    pub fn key(&self) -> PoolKey {
        PoolKey {
            height: self.height,
            fee_per_byte: Reverse(self.fee_per_byte),
            arrival: self.arrival,
            id: self.tx.id(),
        }
    }
}

/// Selection priority. The derived order is the order block assembly takes
/// candidates in: older height first, then higher fee per byte, then earlier
/// arrival, then lower id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolKey {
    pub height: u32,
    pub fee_per_byte: Reverse<i64>,
    pub arrival: Timestamp,
    pub id: TransactionId,
}
