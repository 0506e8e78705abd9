//! Account key derivation. XEL accounts are controlled by a secret phrase;
//! the Ed25519 seed is the SHA-256 of its UTF-8 bytes.

use ed25519_dalek::SigningKey;
use sha2::{Digest, Sha256};
use xel_types::{KeyPair, PrivateKey, PublicKey};

pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// Key pair of the forging or sending account behind `secret_phrase`.
pub fn keypair_from_secret_phrase(secret_phrase: &str) -> KeyPair {
    let seed: [u8; 32] = Sha256::digest(secret_phrase.as_bytes()).into();
    keypair_from_seed(&seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_seed_is_its_sha256() {
        let from_phrase = keypair_from_secret_phrase("forging phrase");
        let seed: [u8; 32] = Sha256::digest(b"forging phrase").into();
        assert_eq!(from_phrase.public, keypair_from_seed(&seed).public);
        assert_eq!(from_phrase.private.0, seed);
    }

    #[test]
    fn distinct_phrases_give_distinct_accounts() {
        let a = keypair_from_secret_phrase("forging phrase");
        let c = keypair_from_secret_phrase("other phrase");
        assert_ne!(a.public, c.public);
        assert_ne!(a.public, PublicKey::ZERO);
    }
}
