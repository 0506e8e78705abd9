use proptest::prelude::*;
use xel_crypto::keypair_from_secret_phrase;
use xel_transactions::{Attachment, Transaction, TransactionBuilder};
use xel_types::{AccountId, Amount, Timestamp};

proptest! {
    #[test]
    fn parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..400)) {
        let _ = Transaction::parse(&bytes);
    }

    #[test]
    fn signed_payment_survives_reencoding(
        ts in 1u32..1_000_000,
        amount in 1i64..1_000_000_000,
        recipient in 1u64..u64::MAX,
        deadline in 1u16..1440,
    ) {
        let kp = keypair_from_secret_phrase("prop");
        let tx = TransactionBuilder::new(kp.public, Timestamp::new(ts), Attachment::OrdinaryPayment)
            .recipient(AccountId::new(recipient))
            .amount(Amount::from_nqt(amount))
            .fee(Amount::from_xel(1))
            .deadline(deadline)
            .sign(&kp.private);
        let parsed = Transaction::parse(&tx.bytes()).unwrap();
        prop_assert_eq!(parsed.id(), tx.id());
        prop_assert!(parsed.verify_signature());
    }
}
