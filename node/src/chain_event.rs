//! Notifications fired around block handling.
//!
//! Around a push the order is `BeforeBlockAccept`, `BeforeBlockApply`,
//! `AfterBlockApply`, `AfterBlockAccept`, `BlockPushed`. Listeners run inline
//! while the chain is locked for writing: they may look at what they are
//! handed but must not call back into the engine.

use std::sync::{PoisonError, RwLock};

use xel_ledger::{AccountStore, Block};
use xel_mempool::AdmissionFault;
use xel_transactions::Transaction;
use xel_types::TransactionId;

use crate::error::BlockFault;

#[derive(Clone, Copy, Debug)]
pub enum ChainEvent<'a> {
    BeforeBlockAccept(&'a Block),
    BeforeBlockApply(&'a Block),
    /// The block's effects are in `accounts` but not yet committed.
    AfterBlockApply {
        block: &'a Block,
        accounts: &'a AccountStore,
    },
    AfterBlockAccept(&'a Block),
    BlockPushed(&'a Block),
    BlockPopped(&'a Block),
    BlockScanned(&'a Block),
    BlockGenerated(&'a Block),
    BlockRejected {
        block: &'a Block,
        fault: &'a BlockFault,
    },
    ForkResolved {
        common_height: u32,
        kept_fork: bool,
    },
    RescanBegin { height: u32 },
    RescanEnd { height: u32 },
    AddedUnconfirmed(&'a [Transaction]),
    RemovedUnconfirmed(&'a [Transaction]),
    ExpiredUnconfirmed(&'a [Transaction]),
    AddedConfirmed(&'a [Transaction]),
    TransactionRejected {
        id: TransactionId,
        fault: &'a AdmissionFault,
    },
}

type Listener = Box<dyn Fn(&ChainEvent<'_>) + Send + Sync>;

/// Synchronous fan-out to every subscriber, in subscription order.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&ChainEvent<'_>) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    pub fn emit(&self, event: ChainEvent<'_>) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let bus = EventBus::new();

        let c1 = Arc::clone(&counter);
        bus.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&counter);
        bus.subscribe(move |event| {
            if let ChainEvent::RescanBegin { height } = event {
                c2.fetch_add(10 * *height as usize, Ordering::SeqCst);
            }
        });

        bus.emit(ChainEvent::RescanBegin { height: 3 });
        assert_eq!(counter.load(Ordering::SeqCst), 31);
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn emit_with_no_listeners_is_noop() {
        EventBus::new().emit(ChainEvent::RescanEnd { height: 0 });
    }
}
