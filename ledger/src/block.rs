//! Blocks and their canonical header encoding.
//!
//! Header layout (little-endian, 232 bytes):
//!
//! | field                 | bytes |
//! |-----------------------|-------|
//! | version               | 4     |
//! | timestamp             | 4     |
//! | previous block id     | 8     |
//! | transaction count     | 4     |
//! | total amount          | 8     |
//! | total fee             | 8     |
//! | payload length        | 4     |
//! | payload hash          | 32    |
//! | generator public key  | 32    |
//! | generation signature  | 32    |
//! | previous block hash   | 32    |
//! | block signature       | 64    |
//!
//! The block id is the leading eight bytes of sha256 over the signed header.
//! Height, base target and cumulative difficulty are not part of the
//! encoding; they are assigned when the block is attached to its parent.

use xel_crypto::{account_id, id_from_digest, sha256, sign_message, verify_signature};
use xel_store::{StoredBlock, StoredTransaction};
use xel_transactions::Transaction;
use xel_types::{
    AccountId, Amount, BlockId, ByteReader, ByteWriter, ChainParams, CodecError, Hash256,
    KeyPair, PrivateKey, PublicKey, Signature, Timestamp,
};

use crate::forging;

pub const BLOCK_VERSION: i32 = 1;
pub const GENESIS_BLOCK_VERSION: i32 = 0;
pub const HEADER_SIZE: usize = 232;
const SIGNATURE_OFFSET: usize = HEADER_SIZE - 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    version: i32,
    timestamp: Timestamp,
    previous_block_id: BlockId,
    total_amount: Amount,
    total_fee: Amount,
    payload_length: u32,
    payload_hash: Hash256,
    generator_public_key: PublicKey,
    generation_signature: Hash256,
    previous_block_hash: Hash256,
    block_signature: Signature,
    transactions: Vec<Transaction>,

    id: BlockId,
    generator_id: AccountId,

    height: u32,
    base_target: u64,
    cumulative_difficulty: u128,
}

/// Header fields chosen by the generator; the rest is derived.
pub(crate) struct Draft {
    pub version: i32,
    pub timestamp: Timestamp,
    pub previous_block_id: BlockId,
    pub previous_block_hash: Hash256,
    pub generation_signature: Hash256,
    pub generator_public_key: PublicKey,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build and sign a child of `previous`. The result is not yet attached.
    pub fn forge(
        previous: &Block,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
        generator: &KeyPair,
    ) -> Block {
        let draft = Draft {
            version: BLOCK_VERSION,
            timestamp,
            previous_block_id: previous.id,
            previous_block_hash: sha256(&previous.bytes()),
            generation_signature: forging::generation_signature(
                &previous.generation_signature,
                &generator.public,
            ),
            generator_public_key: generator.public,
            transactions,
        };
        Self::sign_draft(draft, &generator.private)
    }

    pub(crate) fn sign_draft(draft: Draft, private_key: &PrivateKey) -> Block {
        let mut block = Block {
            version: draft.version,
            timestamp: draft.timestamp,
            previous_block_id: draft.previous_block_id,
            total_amount: draft.transactions.iter().map(Transaction::amount).sum(),
            total_fee: draft.transactions.iter().map(Transaction::fee).sum(),
            payload_length: draft.transactions.iter().map(Transaction::size).sum::<usize>() as u32,
            payload_hash: payload_hash(&draft.transactions),
            generator_public_key: draft.generator_public_key,
            generation_signature: draft.generation_signature,
            previous_block_hash: draft.previous_block_hash,
            block_signature: Signature::ZERO,
            transactions: draft.transactions,
            id: BlockId::ZERO,
            generator_id: account_id(&draft.generator_public_key),
            height: 0,
            base_target: 0,
            cumulative_difficulty: 0,
        };
        block.block_signature = sign_message(&block.unsigned_bytes(), private_key);
        block.id = block_id(&block.bytes());
        block
    }

    /// Decode a signed header and pair it with the block's transactions.
    pub fn parse(header: &[u8], transactions: Vec<Transaction>) -> Result<Block, CodecError> {
        let mut r = ByteReader::new(header);
        let version = r.read_i32()?;
        let timestamp = Timestamp::new(r.read_u32()?);
        let previous_block_id = BlockId::new(r.read_u64()?);
        let count = r.read_u32()? as usize;
        let total_amount = Amount::from_nqt(r.read_i64()?);
        let total_fee = Amount::from_nqt(r.read_i64()?);
        let payload_length = r.read_u32()?;
        let payload_hash = r.read_hash()?;
        let generator_public_key = PublicKey(r.read_array()?);
        let generation_signature = r.read_hash()?;
        let previous_block_hash = r.read_hash()?;
        let block_signature = Signature(r.read_array()?);
        r.finish()?;
        if count != transactions.len() {
            return Err(CodecError::Invalid(format!(
                "header declares {count} transactions, got {}",
                transactions.len()
            )));
        }
        Ok(Block {
            version,
            timestamp,
            previous_block_id,
            total_amount,
            total_fee,
            payload_length,
            payload_hash,
            generator_public_key,
            generation_signature,
            previous_block_hash,
            block_signature,
            transactions,
            id: block_id(header),
            generator_id: account_id(&generator_public_key),
            height: 0,
            base_target: 0,
            cumulative_difficulty: 0,
        })
    }

    /// Header followed by each transaction as a u32 length and its bytes.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(HEADER_SIZE + self.payload_length as usize);
        w.put_slice(&self.bytes());
        for tx in &self.transactions {
            let bytes = tx.bytes();
            w.put_u32(bytes.len() as u32);
            w.put_slice(&bytes);
        }
        w.finish()
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Block, CodecError> {
        let mut r = ByteReader::new(bytes);
        let header = r.read_slice(HEADER_SIZE)?;
        let count = u32::from_le_bytes([header[16], header[17], header[18], header[19]]) as usize;
        let mut transactions = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            let len = r.read_u32()? as usize;
            let tx = Transaction::parse(r.read_slice(len)?)
                .map_err(|e| CodecError::Invalid(e.reason().to_string()))?;
            transactions.push(tx);
        }
        r.finish()?;
        Block::parse(header, transactions)
    }

    pub fn from_stored(
        stored: &StoredBlock,
        transactions: &[StoredTransaction],
    ) -> Result<Block, CodecError> {
        let transactions = transactions
            .iter()
            .map(|t| {
                Transaction::parse(&t.bytes)
                    .map_err(|e| CodecError::Invalid(e.reason().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut block = Block::parse(&stored.bytes, transactions)?;
        if block.id != stored.id {
            return Err(CodecError::Invalid(format!(
                "stored block {} decodes to id {}",
                stored.id, block.id
            )));
        }
        block.height = stored.height;
        block.base_target = stored.base_target;
        block.cumulative_difficulty = stored.cumulative_difficulty;
        Ok(block)
    }

    pub fn to_stored(&self) -> (StoredBlock, Vec<StoredTransaction>) {
        let stored = StoredBlock {
            id: self.id,
            height: self.height,
            previous_block_id: self.previous_block_id,
            timestamp: self.timestamp,
            base_target: self.base_target,
            cumulative_difficulty: self.cumulative_difficulty,
            bytes: self.bytes(),
            transaction_ids: self.transactions.iter().map(Transaction::id).collect(),
        };
        let transactions = self
            .transactions
            .iter()
            .enumerate()
            .map(|(index, tx)| StoredTransaction {
                id: tx.id(),
                full_hash: *tx.full_hash(),
                block_id: self.id,
                height: self.height,
                index: index as u16,
                timestamp: tx.timestamp(),
                bytes: tx.bytes(),
            })
            .collect();
        (stored, transactions)
    }

    /// Assign height, base target and cumulative difficulty from the parent.
    /// `three_back` is the timestamp of the block at `previous.height - 2`,
    /// used when the base target is retargeted.
    pub fn attach(&mut self, previous: &Block, three_back: Timestamp, params: &ChainParams) {
        self.height = previous.height + 1;
        self.base_target = forging::next_base_target(
            params,
            previous.base_target,
            previous.height,
            self.timestamp.as_secs(),
            three_back.as_secs(),
        );
        self.cumulative_difficulty =
            forging::cumulative_difficulty(previous.cumulative_difficulty, self.base_target);
    }

    pub(crate) fn set_chain_position(&mut self, height: u32, base_target: u64, cumulative_difficulty: u128) {
        self.height = height;
        self.base_target = base_target;
        self.cumulative_difficulty = cumulative_difficulty;
    }

    pub fn verify_block_signature(&self) -> bool {
        verify_signature(&self.unsigned_bytes(), &self.block_signature, &self.generator_public_key)
    }

    /// The generation signature must chain from the parent's, and its hit
    /// must fall inside the generator's target window.
    pub fn verify_generation_signature(&self, previous: &Block, effective_balance: i64) -> bool {
        let expected = forging::generation_signature(
            &previous.generation_signature,
            &self.generator_public_key,
        );
        if expected != self.generation_signature {
            return false;
        }
        forging::verify_hit(
            forging::hit(&self.generation_signature),
            effective_balance,
            previous.base_target,
            self.timestamp.diff(previous.timestamp),
        )
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.encode(&self.block_signature)
    }

    /// Header with the signature left out; this is what the generator signs.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut bytes = self.encode(&Signature::ZERO);
        bytes.truncate(SIGNATURE_OFFSET);
        bytes
    }

    fn encode(&self, signature: &Signature) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(HEADER_SIZE);
        w.put_i32(self.version);
        w.put_u32(self.timestamp.as_secs());
        w.put_u64(self.previous_block_id.raw());
        w.put_u32(self.transactions.len() as u32);
        w.put_i64(self.total_amount.nqt());
        w.put_i64(self.total_fee.nqt());
        w.put_u32(self.payload_length);
        w.put_hash(&self.payload_hash);
        w.put_slice(self.generator_public_key.as_bytes());
        w.put_hash(&self.generation_signature);
        w.put_hash(&self.previous_block_hash);
        debug_assert_eq!(w.len(), SIGNATURE_OFFSET);
        w.put_slice(signature.as_bytes());
        w.finish()
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn previous_block_id(&self) -> BlockId {
        self.previous_block_id
    }

    pub fn previous_block_hash(&self) -> &Hash256 {
        &self.previous_block_hash
    }

    pub fn total_amount(&self) -> Amount {
        self.total_amount
    }

    pub fn total_fee(&self) -> Amount {
        self.total_fee
    }

    pub fn payload_length(&self) -> u32 {
        self.payload_length
    }

    pub fn payload_hash(&self) -> &Hash256 {
        &self.payload_hash
    }

    pub fn generator_public_key(&self) -> &PublicKey {
        &self.generator_public_key
    }

    pub fn generator_id(&self) -> AccountId {
        self.generator_id
    }

    pub fn generation_signature(&self) -> &Hash256 {
        &self.generation_signature
    }

    pub fn block_signature(&self) -> &Signature {
        &self.block_signature
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn base_target(&self) -> u64 {
        self.base_target
    }

    pub fn cumulative_difficulty(&self) -> u128 {
        self.cumulative_difficulty
    }
}

/// sha256 over the concatenated transaction encodings.
pub fn payload_hash(transactions: &[Transaction]) -> Hash256 {
    let mut payload = Vec::new();
    for tx in transactions {
        payload.extend_from_slice(&tx.bytes());
    }
    sha256(&payload)
}

fn block_id(signed_header: &[u8]) -> BlockId {
    BlockId::new(id_from_digest(&sha256(signed_header)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use xel_crypto::keypair_from_secret_phrase;
    use xel_transactions::{Attachment, TransactionBuilder};

    pub(crate) fn payment(secret: &str, recipient: u64, amount: i64, ts: u32) -> Transaction {
        let keys = keypair_from_secret_phrase(secret);
        TransactionBuilder::new(keys.public, Timestamp::new(ts), Attachment::OrdinaryPayment)
            .recipient(AccountId::new(recipient))
            .amount(Amount::from_xel(amount))
            .fee(Amount::from_xel(1))
            .sign(&keys.private)
    }

    fn parent() -> Block {
        let keys = keypair_from_secret_phrase("parent");
        let draft = Draft {
            version: GENESIS_BLOCK_VERSION,
            timestamp: Timestamp::EPOCH,
            previous_block_id: BlockId::ZERO,
            previous_block_hash: Hash256::ZERO,
            generation_signature: Hash256::ZERO,
            generator_public_key: keys.public,
            transactions: vec![],
        };
        let mut block = Block::sign_draft(draft, &keys.private);
        block.set_chain_position(0, ChainParams::mainnet().initial_base_target, 0);
        block
    }

    #[test]
    fn forged_block_links_to_parent() {
        let prev = parent();
        let keys = keypair_from_secret_phrase("forger");
        let txs = vec![payment("alice", 7, 10, 5), payment("bob", 8, 20, 6)];
        let block = Block::forge(&prev, Timestamp::new(60), txs.clone(), &keys);

        assert_eq!(block.previous_block_id(), prev.id());
        assert_eq!(*block.previous_block_hash(), sha256(&prev.bytes()));
        assert_eq!(block.total_amount(), Amount::from_xel(30));
        assert_eq!(block.total_fee(), Amount::from_xel(2));
        assert_eq!(block.payload_length() as usize, txs.iter().map(Transaction::size).sum::<usize>());
        assert_eq!(*block.payload_hash(), payload_hash(&txs));
        assert_eq!(block.bytes().len(), HEADER_SIZE);
        assert!(block.verify_block_signature());
        assert_eq!(block.generator_id(), account_id(&keys.public));
    }

    #[test]
    fn header_and_wire_reencode() {
        let prev = parent();
        let keys = keypair_from_secret_phrase("forger");
        let block = Block::forge(&prev, Timestamp::new(60), vec![payment("alice", 7, 10, 5)], &keys);

        let parsed = Block::parse(&block.bytes(), block.transactions().to_vec()).unwrap();
        assert_eq!(parsed.id(), block.id());
        assert_eq!(parsed.bytes(), block.bytes());

        let wire = Block::from_wire(&block.wire_bytes()).unwrap();
        assert_eq!(wire, parsed);
    }

    #[test]
    fn tampered_header_fails_signature() {
        let prev = parent();
        let keys = keypair_from_secret_phrase("forger");
        let block = Block::forge(&prev, Timestamp::new(60), vec![], &keys);
        let mut bytes = block.bytes();
        bytes[4] ^= 1;
        let tampered = Block::parse(&bytes, vec![]).unwrap();
        assert_ne!(tampered.id(), block.id());
        assert!(!tampered.verify_block_signature());
    }

    #[test]
    fn parse_rejects_count_mismatch_and_short_input() {
        let prev = parent();
        let keys = keypair_from_secret_phrase("forger");
        let block = Block::forge(&prev, Timestamp::new(60), vec![payment("a", 1, 1, 1)], &keys);
        assert!(Block::parse(&block.bytes(), vec![]).is_err());
        assert!(Block::parse(&block.bytes()[..100], vec![]).is_err());
        assert!(Block::from_wire(&block.wire_bytes()[..HEADER_SIZE + 2]).is_err());
    }

    #[test]
    fn stored_round_trip_keeps_chain_position() {
        let prev = parent();
        let keys = keypair_from_secret_phrase("forger");
        let mut block = Block::forge(&prev, Timestamp::new(60), vec![payment("a", 1, 1, 1)], &keys);
        block.attach(&prev, prev.timestamp(), &ChainParams::mainnet());
        assert_eq!(block.height(), 1);
        assert_eq!(block.base_target(), prev.base_target());
        assert!(block.cumulative_difficulty() > prev.cumulative_difficulty());

        let (stored, txs) = block.to_stored();
        assert_eq!(txs[0].block_id, block.id());
        let back = Block::from_stored(&stored, &txs).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn generation_signature_must_chain() {
        let prev = parent();
        let keys = keypair_from_secret_phrase("forger");
        let block = Block::forge(&prev, Timestamp::new(4000), vec![], &keys);
        // Past the hit window any hit below the target wins.
        let stake = i64::MAX / prev.base_target() as i64;
        assert!(block.verify_generation_signature(&prev, stake));
        assert!(!block.verify_generation_signature(&prev, 0));

        let other = Block::forge(&block, Timestamp::new(4100), vec![], &keys);
        assert!(!other.verify_generation_signature(&prev, stake));
    }
}
