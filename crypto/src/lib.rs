//! Cryptographic primitives for the XEL node.
//!
//! - **Ed25519** for transaction and block signatures
//! - **SHA-256** for block linkage, payload digests and full hashes
//! - 64-bit ids taken from the leading bytes of a SHA-256 digest

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{account_id, id_from_digest, sha256, sha256_multi};
pub use keys::{keypair_from_secret_phrase, keypair_from_seed};
pub use sign::{sign_message, verify_signature};
