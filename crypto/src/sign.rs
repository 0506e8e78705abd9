//! Ed25519 message signing and verification.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use xel_types::{PrivateKey, PublicKey, Signature};

/// Sign a message with a private key.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key. Malformed keys
/// verify as `false`.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_secret_phrase;

    #[test]
    fn sign_and_verify() {
        let kp = keypair_from_secret_phrase("alice");
        let msg = b"block bytes";
        let sig = sign_message(msg, &kp.private);
        assert!(verify_signature(msg, &sig, &kp.public));
    }

    #[test]
    fn wrong_message_fails() {
        let kp = keypair_from_secret_phrase("alice");
        let sig = sign_message(b"one", &kp.private);
        assert!(!verify_signature(b"two", &sig, &kp.public));
    }

    #[test]
    fn wrong_key_fails() {
        let alice = keypair_from_secret_phrase("alice");
        let bob = keypair_from_secret_phrase("bob");
        let sig = sign_message(b"payload", &alice.private);
        assert!(!verify_signature(b"payload", &sig, &bob.public));
    }

    #[test]
    fn zero_signature_fails() {
        let kp = keypair_from_secret_phrase("alice");
        assert!(!verify_signature(b"payload", &Signature::ZERO, &kp.public));
    }
}
