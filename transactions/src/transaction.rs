//! Signed transactions and their canonical encoding.
//!
//! Layout (little-endian, 176 bytes before the attachment):
//!
//! | field                      | bytes |
//! |----------------------------|-------|
//! | type                       | 1     |
//! | version << 4 \| subtype    | 1     |
//! | timestamp                  | 4     |
//! | deadline (minutes)         | 2     |
//! | sender public key          | 32    |
//! | recipient id               | 8     |
//! | amount                     | 8     |
//! | fee                        | 8     |
//! | referenced full hash       | 32    |
//! | signature                  | 64    |
//! | flags                      | 4     |
//! | ec block height            | 4     |
//! | ec block id                | 8     |

use crate::attachment::Attachment;
use crate::error::TransactionError;
use crate::types::TransactionType;
use xel_crypto::{account_id, id_from_digest, sha256, sha256_multi, sign_message, verify_signature};
use xel_types::{
    AccountId, Amount, BlockId, ByteReader, ByteWriter, Hash256, PrivateKey, PublicKey, Signature,
    Timestamp, TransactionId,
};

pub const TRANSACTION_VERSION: u8 = 1;
pub const BASE_SIZE: usize = 176;
const SIGNATURE_OFFSET: usize = 96;

/// An immutable, signed transaction. Construct with [`TransactionBuilder`]
/// or [`Transaction::parse`]; both derive the id from the signed bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    version: u8,
    timestamp: Timestamp,
    deadline: u16,
    sender_public_key: PublicKey,
    recipient: AccountId,
    amount: Amount,
    fee: Amount,
    referenced_full_hash: Option<Hash256>,
    signature: Signature,
    ec_block_height: u32,
    ec_block_id: BlockId,
    attachment: Attachment,

    id: TransactionId,
    full_hash: Hash256,
    sender_id: AccountId,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn full_hash(&self) -> &Hash256 {
        &self.full_hash
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.attachment.transaction_type()
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn deadline(&self) -> u16 {
        self.deadline
    }

    /// `timestamp + 60 * deadline`.
    pub fn expiration(&self) -> Timestamp {
        self.timestamp.plus(u32::from(self.deadline) * 60)
    }

    pub fn sender_public_key(&self) -> &PublicKey {
        &self.sender_public_key
    }

    pub fn sender_id(&self) -> AccountId {
        self.sender_id
    }

    /// `AccountId::ZERO` when the type takes no recipient.
    pub fn recipient(&self) -> AccountId {
        self.recipient
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    pub fn referenced_full_hash(&self) -> Option<&Hash256> {
        self.referenced_full_hash.as_ref()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn ec_block_height(&self) -> u32 {
        self.ec_block_height
    }

    pub fn ec_block_id(&self) -> BlockId {
        self.ec_block_id
    }

    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    pub fn size(&self) -> usize {
        BASE_SIZE + self.attachment.size()
    }

    /// Canonical signed encoding.
    pub fn bytes(&self) -> Vec<u8> {
        encode(self, &self.signature)
    }

    /// Encoding with a zeroed signature; this is what the sender signs.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        encode(self, &Signature::ZERO)
    }

    pub fn verify_signature(&self) -> bool {
        verify_signature(&self.unsigned_bytes(), &self.signature, &self.sender_public_key)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut r = ByteReader::new(bytes);
        let type_byte = r.read_u8()?;
        let packed = r.read_u8()?;
        let (version, subtype) = (packed >> 4, packed & 0x0F);
        let ty = TransactionType::from_bytes(type_byte, subtype).ok_or_else(|| {
            TransactionError::not_valid(format!("unknown transaction type {type_byte}/{subtype}"))
        })?;
        let timestamp = Timestamp::new(r.read_u32()?);
        let deadline = r.read_u16()?;
        let sender_public_key = PublicKey(r.read_array()?);
        let recipient = AccountId::new(r.read_u64()?);
        let amount = Amount::from_nqt(r.read_i64()?);
        let fee = Amount::from_nqt(r.read_i64()?);
        let referenced = r.read_hash()?;
        let signature = Signature(r.read_array()?);
        let flags = r.read_u32()?;
        if flags != 0 {
            return Err(TransactionError::not_valid(format!(
                "unsupported appendix flags {flags:#x}"
            )));
        }
        let ec_block_height = r.read_u32()?;
        let ec_block_id = BlockId::new(r.read_u64()?);
        let attachment = Attachment::parse(ty, &mut r)?;
        r.finish()?;

        Ok(seal(Unsealed {
            version,
            timestamp,
            deadline,
            sender_public_key,
            recipient,
            amount,
            fee,
            referenced_full_hash: (!referenced.is_zero()).then_some(referenced),
            ec_block_height,
            ec_block_id,
            attachment,
        }, signature))
    }
}

#[derive(Clone, Debug)]
struct Unsealed {
    version: u8,
    timestamp: Timestamp,
    deadline: u16,
    sender_public_key: PublicKey,
    recipient: AccountId,
    amount: Amount,
    fee: Amount,
    referenced_full_hash: Option<Hash256>,
    ec_block_height: u32,
    ec_block_id: BlockId,
    attachment: Attachment,
}

fn seal(u: Unsealed, signature: Signature) -> Transaction {
    let mut tx = Transaction {
        version: u.version,
        timestamp: u.timestamp,
        deadline: u.deadline,
        sender_id: account_id(&u.sender_public_key),
        sender_public_key: u.sender_public_key,
        recipient: u.recipient,
        amount: u.amount,
        fee: u.fee,
        referenced_full_hash: u.referenced_full_hash,
        signature,
        ec_block_height: u.ec_block_height,
        ec_block_id: u.ec_block_id,
        attachment: u.attachment,
        id: TransactionId::ZERO,
        full_hash: Hash256::ZERO,
    };
    let signature_hash = sha256(signature.as_bytes());
    tx.full_hash = sha256_multi(&[&tx.unsigned_bytes(), signature_hash.as_bytes()]);
    tx.id = TransactionId::new(id_from_digest(&tx.full_hash));
    tx
}

fn encode(tx: &Transaction, signature: &Signature) -> Vec<u8> {
    let ty = tx.transaction_type();
    let mut w = ByteWriter::with_capacity(tx.size());
    w.put_u8(ty.type_byte());
    w.put_u8((tx.version << 4) | ty.subtype());
    w.put_u32(tx.timestamp.as_secs());
    w.put_u16(tx.deadline);
    w.put_slice(tx.sender_public_key.as_bytes());
    w.put_u64(tx.recipient.raw());
    w.put_i64(tx.amount.nqt());
    w.put_i64(tx.fee.nqt());
    debug_assert_eq!(w.len(), SIGNATURE_OFFSET - 32);
    w.put_hash(tx.referenced_full_hash.as_ref().unwrap_or(&Hash256::ZERO));
    w.put_slice(signature.as_bytes());
    w.put_u32(0);
    w.put_u32(tx.ec_block_height);
    w.put_u64(tx.ec_block_id.raw());
    tx.attachment.write(&mut w);
    w.finish()
}

/// Assembles an unsigned transaction. Nothing is observable until
/// [`TransactionBuilder::sign`] produces the id.
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    inner: Unsealed,
}

impl TransactionBuilder {
    pub fn new(sender_public_key: PublicKey, timestamp: Timestamp, attachment: Attachment) -> Self {
        Self {
            inner: Unsealed {
                version: TRANSACTION_VERSION,
                timestamp,
                deadline: 1440,
                sender_public_key,
                recipient: AccountId::ZERO,
                amount: Amount::ZERO,
                fee: Amount::ZERO,
                referenced_full_hash: None,
                ec_block_height: 0,
                ec_block_id: BlockId::ZERO,
                attachment,
            },
        }
    }

    pub fn version(mut self, version: u8) -> Self {
        self.inner.version = version;
        self
    }

    pub fn deadline(mut self, minutes: u16) -> Self {
        self.inner.deadline = minutes;
        self
    }

    pub fn recipient(mut self, recipient: AccountId) -> Self {
        self.inner.recipient = recipient;
        self
    }

    pub fn amount(mut self, amount: Amount) -> Self {
        self.inner.amount = amount;
        self
    }

    pub fn fee(mut self, fee: Amount) -> Self {
        self.inner.fee = fee;
        self
    }

    pub fn referenced_full_hash(mut self, hash: Hash256) -> Self {
        self.inner.referenced_full_hash = Some(hash);
        self
    }

    pub fn ec_block(mut self, height: u32, id: BlockId) -> Self {
        self.inner.ec_block_height = height;
        self.inner.ec_block_id = id;
        self
    }

    pub fn sign(self, private_key: &PrivateKey) -> Transaction {
        let unsigned = seal(self.inner.clone(), Signature::ZERO);
        let signature = sign_message(&unsigned.unsigned_bytes(), private_key);
        seal(self.inner, signature)
    }
}
