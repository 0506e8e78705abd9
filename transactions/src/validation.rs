//! Contextual validation of a single transaction.
//!
//! `validate` is a pure function of the transaction, the chain parameters and
//! a read-only view of chain state. It never mutates balances; the ledger's
//! `apply_unconfirmed` decides whether the sender can pay.

use crate::attachment::{Attachment, SupernodeAnnouncement};
use crate::error::TransactionError;
use crate::fee::minimum_fee;
use crate::transaction::Transaction;
use xel_types::{AccountId, Amount, BlockId, ChainParams, Hash256, PublicKey};

/// What validation needs to know about an existing account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountView {
    pub unconfirmed_balance: Amount,
    pub is_supernode: bool,
}

/// The external work marketplace, as far as consensus is concerned.
pub trait WorkRegistry: Send + Sync {
    /// Submissions the work can still pay for; `None` if the work is unknown
    /// or closed.
    fn remaining_submissions(&self, work_id: u64) -> Option<u64>;

    /// Whether this solution was already accepted on chain.
    fn is_solution_known(&self, _solution: &Hash256) -> bool {
        false
    }
}

/// A registry without any open work: every submission is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWork;

impl WorkRegistry for NoWork {
    fn remaining_submissions(&self, _work_id: u64) -> Option<u64> {
        None
    }
}

/// Read-only chain state consulted by validation.
pub trait ValidationContext {
    fn params(&self) -> &ChainParams;
    /// Height of the current chain head.
    fn height(&self) -> u32;
    fn block_id_at_height(&self, height: u32) -> Option<BlockId>;
    fn public_key(&self, account: AccountId) -> Option<PublicKey>;
    fn account(&self, account: AccountId) -> Option<AccountView>;
    fn genesis_creator(&self) -> AccountId;
    fn work_registry(&self) -> &dyn WorkRegistry;
}

pub fn validate(tx: &Transaction, ctx: &dyn ValidationContext) -> Result<(), TransactionError> {
    let params = ctx.params();
    let ty = tx.transaction_type();
    let (fee, amount) = (tx.fee(), tx.amount());

    let bad_timing_or_fee = if tx.timestamp().as_secs() == 0 {
        tx.deadline() != 0 || !fee.is_zero()
    } else {
        (tx.deadline() < 1 && !ty.is_zero_fee())
            || (!ty.is_zero_fee() && fee.nqt() <= 0)
            || (ty.is_zero_fee() && !fee.is_zero())
    };
    let bad_parameters = bad_timing_or_fee
        || fee > params.max_balance
        || amount.is_negative()
        || amount > params.max_balance;
    if bad_parameters {
        return Err(TransactionError::not_valid(format!(
            "invalid transaction parameters: type {ty}, timestamp {}, deadline {}, fee {fee}, amount {amount}",
            tx.timestamp(),
            tx.deadline()
        )));
    }
    if amount.checked_add(fee).is_none() {
        return Err(TransactionError::not_valid("amount plus fee overflows"));
    }

    if !ty.can_have_recipient() && !tx.recipient().is_zero() {
        return Err(TransactionError::not_valid(format!(
            "{ty} transactions must not have a recipient"
        )));
    }
    if ty.must_have_recipient() && tx.version() > 0 && tx.recipient().is_zero() {
        return Err(TransactionError::not_valid(format!(
            "{ty} transactions must have a recipient"
        )));
    }

    validate_attachment(tx, ctx)?;

    if tx.size() > params.max_payload_length() {
        return Err(TransactionError::not_valid(format!(
            "transaction size {} exceeds maximum payload size",
            tx.size()
        )));
    }

    let height = ctx.height();
    let min_fee = minimum_fee(tx, height, &params.rules);
    if !ty.is_zero_fee() && fee < min_fee {
        return Err(TransactionError::not_currently_valid(format!(
            "fee {fee} is below the minimum {min_fee} at height {height}"
        )));
    }

    if !tx.ec_block_id().is_zero() {
        if height < tx.ec_block_height() {
            return Err(TransactionError::not_currently_valid(format!(
                "ec block height {} exceeds chain height {height}",
                tx.ec_block_height()
            )));
        }
        if ctx.block_id_at_height(tx.ec_block_height()) != Some(tx.ec_block_id()) {
            return Err(TransactionError::not_currently_valid(format!(
                "ec block {} at height {} is not on this chain, transaction was generated on a fork",
                tx.ec_block_id(),
                tx.ec_block_height()
            )));
        }
    }
    Ok(())
}

fn validate_attachment(tx: &Transaction, ctx: &dyn ValidationContext) -> Result<(), TransactionError> {
    let params = ctx.params();
    match tx.attachment() {
        Attachment::OrdinaryPayment => {
            if tx.amount().nqt() <= 0 || tx.amount() >= params.max_balance {
                return Err(TransactionError::not_valid("invalid ordinary payment"));
            }
        }
        Attachment::AccountInfo(info) => {
            if info.name.chars().count() > params.max_account_name_length
                || info.description.chars().count() > params.max_account_description_length
            {
                return Err(TransactionError::not_valid("invalid account info length"));
            }
        }
        Attachment::EffectiveBalanceLeasing(lease) => {
            if tx.sender_id() == tx.recipient() {
                return Err(TransactionError::not_valid("account cannot lease balance to itself"));
            }
            if !tx.amount().is_zero() {
                return Err(TransactionError::not_valid(
                    "amount must be 0 for effective balance leasing",
                ));
            }
            let period = u32::from(lease.period);
            if period < params.min_lease_period || period > params.max_lease_period {
                return Err(TransactionError::not_valid(format!(
                    "invalid effective balance leasing period {period}"
                )));
            }
            if ctx.public_key(tx.recipient()).is_none() {
                return Err(TransactionError::not_currently_valid(format!(
                    "lessee {} not found or has no public key",
                    tx.recipient()
                )));
            }
            if tx.recipient() == ctx.genesis_creator() {
                return Err(TransactionError::not_valid("leasing to the genesis account is not allowed"));
            }
        }
        Attachment::SupernodeAnnouncement(announcement) => {
            validate_announcement(tx, announcement, ctx)?;
        }
        Attachment::ProofOfWork(pow) => {
            if tx.deadline() != 3 {
                return Err(TransactionError::not_valid(
                    "proof of work submissions must have a deadline of 3 minutes",
                ));
            }
            let registry = ctx.work_registry();
            if registry.remaining_submissions(pow.work_id).is_none() {
                return Err(TransactionError::not_currently_valid(format!(
                    "work {} is unknown or closed",
                    pow.work_id
                )));
            }
            if registry.is_solution_known(&pow.solution_hash(tx.sender_public_key())) {
                return Err(TransactionError::not_currently_valid(
                    "proof of work was already submitted",
                ));
            }
        }
    }
    Ok(())
}

fn validate_announcement(
    tx: &Transaction,
    announcement: &SupernodeAnnouncement,
    ctx: &dyn ValidationContext,
) -> Result<(), TransactionError> {
    let params = ctx.params();
    let uri_count = announcement.uris.len();
    let is_guard_decision = !announcement.guard_target.is_zero();
    if !is_guard_decision && (uri_count == 0 || uri_count > params.max_supernode_announcement_uris) {
        return Err(TransactionError::not_valid(format!("invalid uri count {uri_count}")));
    }
    if is_guard_decision && uri_count != 0 {
        return Err(TransactionError::not_valid(
            "guard node decisions must not carry uris",
        ));
    }
    for uri in &announcement.uris {
        if uri.len() > params.max_supernode_announcement_uri_length {
            return Err(TransactionError::not_valid(format!("invalid uri length {}", uri.len())));
        }
        if !is_ipv4_address(uri) {
            return Err(TransactionError::not_valid(format!(
                "uri {uri:?} is not an IPv4 address"
            )));
        }
    }

    let sender = tx.sender_id();
    let Some(account) = ctx.account(sender) else {
        return Err(TransactionError::not_valid(format!(
            "sender {sender} has no prior activity"
        )));
    };
    let is_guard = params.is_guard_node(sender);
    if !is_guard_decision
        && !account.is_supernode
        && !is_guard
        && account.unconfirmed_balance < params.supernode_deposit
    {
        return Err(TransactionError::not_valid(
            "unconfirmed balance does not cover the supernode deposit",
        ));
    }
    if is_guard_decision && !is_guard {
        return Err(TransactionError::not_valid("sender is not a guard node"));
    }
    Ok(())
}

/// Dotted quad, each octet 1-3 decimal digits with value at most 255.
pub fn is_ipv4_address(s: &str) -> bool {
    let mut octets = 0;
    for part in s.split('.') {
        octets += 1;
        let valid = (1..=3).contains(&part.len())
            && part.bytes().all(|b| b.is_ascii_digit())
            && part.parse::<u16>().is_ok_and(|v| v <= 255);
        if !valid {
            return false;
        }
    }
    octets == 4
}
