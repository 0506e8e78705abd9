//! SHA-256 hashing and id derivation.

use sha2::{Digest, Sha256};
use xel_types::{AccountId, Hash256, PublicKey};

/// SHA-256 of arbitrary data.
pub fn sha256(data: &[u8]) -> Hash256 {
    Hash256::new(Sha256::digest(data).into())
}

/// SHA-256 over several slices fed in order, without concatenating them.
pub fn sha256_multi(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash256::new(hasher.finalize().into())
}

/// Leading eight bytes of a digest as a little-endian id.
pub fn id_from_digest(digest: &Hash256) -> u64 {
    digest.leading_u64()
}

/// Account id of a public key.
pub fn account_id(public_key: &PublicKey) -> AccountId {
    AccountId::new(sha256(public_key.as_bytes()).leading_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256(b"abc").to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn multi_equals_concatenation() {
        let joined = sha256(b"helloworld");
        let parts = sha256_multi(&[b"hello", b"world"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn account_id_is_stable() {
        let key = PublicKey([7u8; 32]);
        assert_eq!(account_id(&key), account_id(&key));
        assert_ne!(account_id(&key), account_id(&PublicKey([8u8; 32])));
    }
}
