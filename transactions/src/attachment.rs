//! Type-specific transaction payloads.

use crate::types::TransactionType;
use serde::{Deserialize, Serialize};
use xel_types::{AccountId, ByteReader, ByteWriter, CodecError, Hash256, PublicKey};

/// Length caps applied while decoding; validation applies the chain limits.
const NAME_CAP: usize = 100;
const DESCRIPTION_CAP: usize = 1000;
const URI_CAP: usize = 255;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attachment {
    OrdinaryPayment,
    SupernodeAnnouncement(SupernodeAnnouncement),
    AccountInfo(AccountInfo),
    EffectiveBalanceLeasing(EffectiveBalanceLeasing),
    ProofOfWork(ProofOfWork),
}

/// Announces (or refreshes) a supernode, or, when sent by a guard node with
/// a non-zero `guard_target`, forfeits that account's deposit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupernodeAnnouncement {
    pub uris: Vec<String>,
    pub guard_target: AccountId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub name: String,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveBalanceLeasing {
    pub period: u16,
}

/// A solution submitted to an externally managed work package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    pub work_id: u64,
    pub multiplicator: [u8; 32],
}

impl ProofOfWork {
    /// Identifies a submission: the same multiplicator from the same sender
    /// for the same work is the same solution.
    pub fn solution_hash(&self, sender: &PublicKey) -> Hash256 {
        xel_crypto::sha256_multi(&[
            &self.work_id.to_le_bytes(),
            &self.multiplicator,
            sender.as_bytes(),
        ])
    }
}

impl Attachment {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Self::OrdinaryPayment => TransactionType::OrdinaryPayment,
            Self::SupernodeAnnouncement(_) => TransactionType::SupernodeAnnouncement,
            Self::AccountInfo(_) => TransactionType::AccountInfo,
            Self::EffectiveBalanceLeasing(_) => TransactionType::EffectiveBalanceLeasing,
            Self::ProofOfWork(_) => TransactionType::ProofOfWork,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::OrdinaryPayment => 0,
            Self::SupernodeAnnouncement(a) => {
                1 + a.uris.iter().map(|u| 2 + u.len()).sum::<usize>() + 8
            }
            Self::AccountInfo(a) => 1 + a.name.len() + 2 + a.description.len(),
            Self::EffectiveBalanceLeasing(_) => 2,
            Self::ProofOfWork(_) => 8 + 32,
        }
    }

    pub fn write(&self, w: &mut ByteWriter) {
        match self {
            Self::OrdinaryPayment => {}
            Self::SupernodeAnnouncement(a) => {
                w.put_u8(a.uris.len() as u8);
                for uri in &a.uris {
                    w.put_u16(uri.len() as u16);
                    w.put_slice(uri.as_bytes());
                }
                w.put_u64(a.guard_target.raw());
            }
            Self::AccountInfo(a) => {
                w.put_u8(a.name.len() as u8);
                w.put_slice(a.name.as_bytes());
                w.put_u16(a.description.len() as u16);
                w.put_slice(a.description.as_bytes());
            }
            Self::EffectiveBalanceLeasing(a) => w.put_u16(a.period),
            Self::ProofOfWork(a) => {
                w.put_u64(a.work_id);
                w.put_slice(&a.multiplicator);
            }
        }
    }

    pub fn parse(ty: TransactionType, r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(match ty {
            TransactionType::OrdinaryPayment => Self::OrdinaryPayment,
            TransactionType::SupernodeAnnouncement => {
                let count = r.read_u8()? as usize;
                let mut uris = Vec::with_capacity(count);
                for _ in 0..count {
                    let len = r.read_u16()? as usize;
                    uris.push(r.read_string(len, URI_CAP, "uri")?);
                }
                let guard_target = AccountId::new(r.read_u64()?);
                Self::SupernodeAnnouncement(SupernodeAnnouncement { uris, guard_target })
            }
            TransactionType::AccountInfo => {
                let name_len = r.read_u8()? as usize;
                let name = r.read_string(name_len, NAME_CAP, "account name")?;
                let desc_len = r.read_u16()? as usize;
                let description = r.read_string(desc_len, DESCRIPTION_CAP, "account description")?;
                Self::AccountInfo(AccountInfo { name, description })
            }
            TransactionType::EffectiveBalanceLeasing => {
                Self::EffectiveBalanceLeasing(EffectiveBalanceLeasing {
                    period: r.read_u16()?,
                })
            }
            TransactionType::ProofOfWork => Self::ProofOfWork(ProofOfWork {
                work_id: r.read_u64()?,
                multiplicator: r.read_array()?,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(a: &Attachment) -> Vec<u8> {
        let mut w = ByteWriter::default();
        a.write(&mut w);
        w.finish()
    }

    #[test]
    fn size_matches_encoding() {
        let samples = [
            Attachment::OrdinaryPayment,
            Attachment::SupernodeAnnouncement(SupernodeAnnouncement {
                uris: vec!["10.0.0.1".into(), "192.168.1.20".into()],
                guard_target: AccountId::ZERO,
            }),
            Attachment::AccountInfo(AccountInfo {
                name: "miner".into(),
                description: "gpu rig".into(),
            }),
            Attachment::EffectiveBalanceLeasing(EffectiveBalanceLeasing { period: 1440 }),
            Attachment::ProofOfWork(ProofOfWork {
                work_id: 7,
                multiplicator: [3; 32],
            }),
        ];
        for a in samples {
            let bytes = encode(&a);
            assert_eq!(bytes.len(), a.size(), "{:?}", a.transaction_type());
            let mut r = ByteReader::new(&bytes);
            assert_eq!(Attachment::parse(a.transaction_type(), &mut r).unwrap(), a);
            r.finish().unwrap();
        }
    }

    #[test]
    fn overlong_name_is_rejected() {
        let mut w = ByteWriter::default();
        w.put_u8(101);
        w.put_slice(&[b'a'; 101]);
        w.put_u16(0);
        let bytes = w.finish();
        let err = Attachment::parse(TransactionType::AccountInfo, &mut ByteReader::new(&bytes));
        assert!(matches!(err, Err(CodecError::TooLong { .. })));
    }

    #[test]
    fn solution_hash_depends_on_sender() {
        let pow = ProofOfWork {
            work_id: 1,
            multiplicator: [9; 32],
        };
        assert_ne!(
            pow.solution_hash(&PublicKey([1; 32])),
            pow.solution_hash(&PublicKey([2; 32]))
        );
    }
}
