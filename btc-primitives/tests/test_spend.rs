//! End-to-end P2PKH flow: fund a key, spend the output with a signature
//! produced by this library, validate the spend, and make sure tampering
//! breaks it.

use btc_primitives::hash::H256;
use btc_primitives::keys::PrivateKey;
use btc_primitives::script::{Cmd, Script, SIGHASH_ALL};
use btc_primitives::tx::{MemoryFetcher, Transaction, TxIn, TxOut};
use btc_primitives::U256;

fn key(secret: u64) -> PrivateKey {
    PrivateKey::new(U256::from(secret)).unwrap()
}

/// A transaction paying `amount` satoshis to `recipient`'s compressed key
/// hash, funded by a made-up outpoint nobody will ever look up.
fn funding_tx(recipient: &PrivateKey, amount: i64) -> Transaction {
    Transaction {
        version: 1,
        tx_ins: vec![TxIn {
            prev_tx: H256([0x11; 32]),
            prev_index: 0,
            script_sig: Script::default(),
            sequence: 0xffff_ffff,
            witness: Vec::new(),
        }],
        tx_outs: vec![TxOut {
            amount,
            script_pubkey: Script::p2pkh(&recipient.public_key().hash160(true)),
        }],
        locktime: 0,
        segwit: false,
    }
}

/// Builds and signs a spend of `funding`'s first output.
fn signed_spend(funding: &Transaction, owner: &PrivateKey, to: &PrivateKey, amount: i64) -> Transaction {
    let mut spend = Transaction {
        version: 1,
        tx_ins: vec![TxIn {
            prev_tx: funding.hash(),
            prev_index: 0,
            script_sig: Script::default(),
            sequence: 0xffff_fffe,
            witness: Vec::new(),
        }],
        tx_outs: vec![TxOut {
            amount,
            script_pubkey: Script::p2pkh(&to.public_key().hash160(true)),
        }],
        locktime: 0,
        segwit: false,
    };

    let z = spend
        .sig_hash(0, &funding.tx_outs[0].script_pubkey)
        .unwrap();
    let mut sig = owner.sign(z).der();
    sig.push(SIGHASH_ALL);
    spend.tx_ins[0].script_sig = Script::new(vec![
        Cmd::Push(sig),
        Cmd::Push(owner.public_key().sec(true)),
    ]);
    spend
}

#[test]
fn valid_spend_passes_validation() {
    let alice = key(0x1234_5678_9abc);
    let bob = key(0xfeed_beef);

    let funding = funding_tx(&alice, 50_000);
    let spend = signed_spend(&funding, &alice, &bob, 49_000);

    let mut fetcher = MemoryFetcher::new();
    fetcher.insert(funding);

    assert_eq!(spend.fee(&fetcher).unwrap(), 1_000);
    assert!(spend.validate(&fetcher).unwrap());
}

#[test]
fn tampered_signature_fails_validation() {
    let alice = key(0xa11ce);
    let bob = key(0xb0b);

    let funding = funding_tx(&alice, 50_000);
    let spend = signed_spend(&funding, &alice, &bob, 49_000);

    let mut fetcher = MemoryFetcher::new();
    fetcher.insert(funding);

    // Corrupt one byte in the DER signature push.
    let mut tampered = spend.clone();
    let Cmd::Push(sig) = &spend.tx_ins[0].script_sig.cmds()[0] else {
        panic!("script_sig starts with the signature push");
    };
    let mut sig = sig.clone();
    let mid = sig.len() / 2;
    sig[mid] ^= 0x01;
    let Cmd::Push(sec) = &spend.tx_ins[0].script_sig.cmds()[1] else {
        panic!("script_sig ends with the pubkey push");
    };
    tampered.tx_ins[0].script_sig =
        Script::new(vec![Cmd::Push(sig), Cmd::Push(sec.clone())]);

    assert!(spend.validate(&fetcher).unwrap());
    assert!(!tampered.validate(&fetcher).unwrap());
}

#[test]
fn wrong_owner_fails_validation() {
    let alice = key(0xaaaa);
    let mallory = key(0x4444);
    let bob = key(0xbbbb);

    let funding = funding_tx(&alice, 10_000);
    // Mallory signs with her key against Alice's locking script.
    let spend = signed_spend(&funding, &mallory, &bob, 9_000);

    let mut fetcher = MemoryFetcher::new();
    fetcher.insert(funding);

    assert!(!spend.validate(&fetcher).unwrap());
}

#[test]
fn overspending_fails_validation() {
    let alice = key(0xcafe);
    let bob = key(0xf00d);

    let funding = funding_tx(&alice, 10_000);
    let spend = signed_spend(&funding, &alice, &bob, 11_000);

    let mut fetcher = MemoryFetcher::new();
    fetcher.insert(funding);

    assert_eq!(spend.fee(&fetcher).unwrap(), -1_000);
    assert!(!spend.validate(&fetcher).unwrap());
}

#[test]
fn missing_funding_tx_is_an_error() {
    let alice = key(0x777);
    let bob = key(0x888);

    let funding = funding_tx(&alice, 10_000);
    let spend = signed_spend(&funding, &alice, &bob, 9_000);

    // Fetcher never saw the funding transaction.
    let fetcher = MemoryFetcher::new();
    assert!(spend.validate(&fetcher).is_err());
}

#[test]
fn signature_commits_to_the_outputs() {
    let alice = key(0x5555);
    let bob = key(0x6666);
    let carol = key(0x7777);

    let funding = funding_tx(&alice, 50_000);
    let spend = signed_spend(&funding, &alice, &bob, 49_000);

    // Redirect the payment without re-signing.
    let mut redirected = spend.clone();
    redirected.tx_outs[0].script_pubkey = Script::p2pkh(&carol.public_key().hash160(true));

    let mut fetcher = MemoryFetcher::new();
    fetcher.insert(funding);

    assert!(spend.validate(&fetcher).unwrap());
    assert!(!redirected.validate(&fetcher).unwrap());
}
