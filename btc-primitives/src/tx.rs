//! Transactions: legacy and SegWit wire forms, txids, the legacy
//! SIGHASH_ALL digest, and P2PKH input validation against a caller-supplied
//! source of previous transactions.

use std::collections::HashMap;
use std::io::Read;

use log::debug;

use crate::encode::{
    read_array, read_i64_le, read_u32_le, read_varbytes, read_varint, read_varint_tail,
    write_varbytes, write_varint,
};
use crate::error::{Error, Result};
use crate::hash::{hash256, H256};
use crate::script::{Script, SIGHASH_ALL};
use crate::u256::U256;

/// Where `validate` finds the transactions its inputs spend. The core is
/// indifferent to the implementation: an in-memory map, an explorer, a
/// peer.
pub trait TxFetcher {
    /// Returns the transaction with the given id (internal byte order).
    fn fetch(&self, txid: &H256) -> Result<Transaction>;
}

/// A preloaded txid -> transaction map; the fetcher used by tests and by
/// anything that has already gathered its dependencies.
#[derive(Default)]
pub struct MemoryFetcher {
    txs: HashMap<H256, Transaction>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a transaction under its computed id.
    pub fn insert(&mut self, tx: Transaction) {
        self.txs.insert(tx.hash(), tx);
    }
}

impl TxFetcher for MemoryFetcher {
    fn fetch(&self, txid: &H256) -> Result<Transaction> {
        self.txs
            .get(txid)
            .cloned()
            .ok_or_else(|| Error::Parse(format!("unknown transaction {}", txid.to_display_hex())))
    }
}

/// One spend: the funding outpoint, the unlocking script, and the sequence
/// field. SegWit inputs additionally carry a witness stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    /// Funding transaction id, internal byte order.
    pub prev_tx: H256,
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    pub fn parse(reader: &mut impl Read) -> Result<TxIn> {
        Ok(TxIn {
            prev_tx: H256(read_array(reader)?),
            prev_index: read_u32_le(reader)?,
            script_sig: Script::parse(reader)?,
            sequence: read_u32_le(reader)?,
            witness: Vec::new(),
        })
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.prev_tx.0);
        out.extend_from_slice(&self.prev_index.to_le_bytes());
        out.extend_from_slice(&self.script_sig.serialize());
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    /// Satoshis.
    pub amount: i64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn parse(reader: &mut impl Read) -> Result<TxOut> {
        Ok(TxOut {
            amount: read_i64_le(reader)?,
            script_pubkey: Script::parse(reader)?,
        })
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.script_pubkey.serialize());
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
    pub locktime: u32,
    /// Whether the wire form carried the SegWit marker and witnesses.
    pub segwit: bool,
}

impl Transaction {
    /// Parses either wire form. A zero byte where the input count belongs
    /// is the SegWit marker; the flag byte after it must be 0x01.
    pub fn parse(reader: &mut impl Read) -> Result<Transaction> {
        let version = read_u32_le(reader)?;

        let first = read_array::<1>(reader)?[0];
        let (segwit, n_inputs) = if first == 0x00 {
            let flag = read_array::<1>(reader)?[0];
            if flag != 0x01 {
                return Err(Error::Parse(format!("bad segwit flag 0x{flag:02x}")));
            }
            (true, read_varint(reader)?)
        } else {
            (false, read_varint_tail(first, reader)?)
        };

        let mut tx_ins = Vec::with_capacity(n_inputs.min(1024) as usize);
        for _ in 0..n_inputs {
            tx_ins.push(TxIn::parse(reader)?);
        }

        let n_outputs = read_varint(reader)?;
        let mut tx_outs = Vec::with_capacity(n_outputs.min(1024) as usize);
        for _ in 0..n_outputs {
            tx_outs.push(TxOut::parse(reader)?);
        }

        if segwit {
            for tx_in in &mut tx_ins {
                let items = read_varint(reader)?;
                for _ in 0..items {
                    tx_in.witness.push(read_varbytes(reader)?);
                }
            }
        }

        let locktime = read_u32_le(reader)?;

        Ok(Transaction {
            version,
            tx_ins,
            tx_outs,
            locktime,
            segwit,
        })
    }

    /// The wire form this transaction arrived in: marker, flag, and
    /// witnesses included when the segwit flag is set.
    pub fn serialize(&self) -> Vec<u8> {
        if !self.segwit {
            return self.serialize_legacy();
        }
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(0x00);
        out.push(0x01);
        self.serialize_body(&mut out);
        for tx_in in &self.tx_ins {
            write_varint(&mut out, tx_in.witness.len() as u64);
            for item in &tx_in.witness {
                write_varbytes(&mut out, item);
            }
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    /// The legacy form: no marker, no witnesses. This is what txids and
    /// legacy sighashes are computed over, for SegWit transactions too.
    pub fn serialize_legacy(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        self.serialize_body(&mut out);
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    fn serialize_body(&self, out: &mut Vec<u8>) {
        write_varint(out, self.tx_ins.len() as u64);
        for tx_in in &self.tx_ins {
            tx_in.serialize(out);
        }
        write_varint(out, self.tx_outs.len() as u64);
        for tx_out in &self.tx_outs {
            tx_out.serialize(out);
        }
    }

    /// Transaction id, internal byte order: HASH256 of the legacy form.
    pub fn hash(&self) -> H256 {
        hash256(&self.serialize_legacy())
    }

    /// The id as the familiar big-endian hex string.
    pub fn id(&self) -> String {
        self.hash().to_display_hex()
    }

    /// The legacy SIGHASH_ALL digest for signing input `input_index`
    /// against its funding script.
    ///
    /// Built from a serializing walk rather than by mutating the
    /// transaction: every script_sig is replaced by an empty script except
    /// the signed input's, which carries the funding script_pubkey; the
    /// 4-byte sighash type is appended, and the digest is HASH256 read
    /// big-endian.
    pub fn sig_hash(&self, input_index: usize, script_pubkey: &Script) -> Result<U256> {
        if input_index >= self.tx_ins.len() {
            return Err(Error::Invariant(format!(
                "sighash input {input_index} out of range ({} inputs)",
                self.tx_ins.len()
            )));
        }

        let mut preimage = Vec::new();
        preimage.extend_from_slice(&self.version.to_le_bytes());
        write_varint(&mut preimage, self.tx_ins.len() as u64);
        for (i, tx_in) in self.tx_ins.iter().enumerate() {
            preimage.extend_from_slice(&tx_in.prev_tx.0);
            preimage.extend_from_slice(&tx_in.prev_index.to_le_bytes());
            if i == input_index {
                preimage.extend_from_slice(&script_pubkey.serialize());
            } else {
                write_varint(&mut preimage, 0);
            }
            preimage.extend_from_slice(&tx_in.sequence.to_le_bytes());
        }
        write_varint(&mut preimage, self.tx_outs.len() as u64);
        for tx_out in &self.tx_outs {
            tx_out.serialize(&mut preimage);
        }
        preimage.extend_from_slice(&self.locktime.to_le_bytes());
        preimage.extend_from_slice(&u32::from(SIGHASH_ALL).to_le_bytes());

        Ok(U256::from_be_bytes(&hash256(&preimage).0))
    }

    /// Input value minus output value. Errors if a funding transaction or
    /// output is missing.
    pub fn fee(&self, fetcher: &impl TxFetcher) -> Result<i64> {
        let mut input_value: i64 = 0;
        for tx_in in &self.tx_ins {
            input_value += self.funding_output(tx_in, fetcher)?.amount;
        }
        let output_value: i64 = self.tx_outs.iter().map(|o| o.amount).sum();
        Ok(input_value - output_value)
    }

    /// Checks one input's unlocking script against its funding script.
    pub fn validate_input(&self, input_index: usize, fetcher: &impl TxFetcher) -> Result<bool> {
        let tx_in = self.tx_ins.get(input_index).ok_or_else(|| {
            Error::Invariant(format!("input {input_index} out of range"))
        })?;
        let script_pubkey = self.funding_output(tx_in, fetcher)?.script_pubkey;
        let z = self.sig_hash(input_index, &script_pubkey)?;
        let combined = tx_in.script_sig.clone() + script_pubkey;
        Ok(combined.evaluate(z))
    }

    /// Full P2PKH validation: the fee must not be negative and every
    /// input's script must evaluate true. Script failure is a `false`
    /// verdict; only missing data is an error.
    pub fn validate(&self, fetcher: &impl TxFetcher) -> Result<bool> {
        if self.fee(fetcher)? < 0 {
            debug!(target: "tx", "{}: outputs exceed inputs", self.id());
            return Ok(false);
        }
        for input_index in 0..self.tx_ins.len() {
            if !self.validate_input(input_index, fetcher)? {
                debug!(target: "tx", "{}: input {input_index} failed", self.id());
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn funding_output(&self, tx_in: &TxIn, fetcher: &impl TxFetcher) -> Result<TxOut> {
        let prev = fetcher.fetch(&tx_in.prev_tx)?;
        prev.tx_outs
            .get(tx_in.prev_index as usize)
            .cloned()
            .ok_or_else(|| {
                Error::Parse(format!(
                    "output {} of {} does not exist",
                    tx_in.prev_index,
                    tx_in.prev_tx.to_display_hex()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The worked example transaction: one P2PKH input, two outputs,
    /// locktime 410393.
    const TX_HEX: &str = "0100000001813f79011acb80925dfe69b3def355fe914bd1d96a3f5f71bf8303c6a989c7d1000000006b483045022100ed81ff192e75a3fd2304004dcadb746fa5e24c5031ccfcf21320b0277457c98f02207a986d955c6e0cb35d446a89d3f56100f4d7f67801c31967743a9c8e10615bed01210349fc4e631e3624a545de3f89f5d8684c7b8138bd94bdd531d2e213bf016b278afeffffff02a135ef01000000001976a914bc3b654dca7e56b04dca18f2566cdaf02e8d9ada88ac99c39800000000001976a9141c4bc762dd5423e332166702cb75f40df79fea1288ac19430600";

    fn worked_example() -> Transaction {
        let bytes = hex::decode(TX_HEX).unwrap();
        Transaction::parse(&mut bytes.as_slice()).unwrap()
    }

    #[test]
    fn parses_the_worked_example() {
        let tx = worked_example();
        assert_eq!(tx.version, 1);
        assert!(!tx.segwit);
        assert_eq!(tx.tx_ins.len(), 1);
        assert_eq!(tx.tx_ins[0].prev_index, 0);
        assert_eq!(tx.tx_ins[0].sequence, 0xffff_fffe);
        assert_eq!(
            tx.tx_ins[0].prev_tx.to_display_hex(),
            "d1c789a9c60383bf715f3f6ad9d14b91fe55f3deb369fe5d9280cb1a01793f81"
        );
        assert_eq!(tx.tx_outs.len(), 2);
        assert_eq!(tx.tx_outs[0].amount, 32_454_049);
        assert_eq!(tx.tx_outs[1].amount, 10_011_545);
        assert_eq!(tx.locktime, 410_393);
    }

    #[test]
    fn reserializes_identically() {
        let bytes = hex::decode(TX_HEX).unwrap();
        let tx = Transaction::parse(&mut bytes.as_slice()).unwrap();
        assert_eq!(tx.serialize(), bytes);
        assert_eq!(tx.serialize_legacy(), bytes);
    }

    #[test]
    fn truncated_input_is_a_parse_error() {
        let bytes = hex::decode(TX_HEX).unwrap();
        assert!(Transaction::parse(&mut bytes[..40].as_ref()).is_err());
    }

    #[test]
    fn bad_segwit_flag_is_a_parse_error() {
        // version, marker 0x00, flag 0x02.
        let bytes = hex::decode("010000000002").unwrap();
        assert!(matches!(
            Transaction::parse(&mut bytes.as_slice()),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn segwit_round_trip_and_txid_ignores_witness() {
        let legacy = worked_example();
        let mut segwit = legacy.clone();
        segwit.segwit = true;
        segwit.tx_ins[0].witness = vec![vec![0xde, 0xad], vec![0xbe, 0xef, 0x01]];

        let wire = segwit.serialize();
        assert_eq!(&wire[4..6], &[0x00, 0x01]);
        let parsed = Transaction::parse(&mut wire.as_slice()).unwrap();
        assert_eq!(parsed, segwit);

        // Marker, flag, and witnesses drop out of the txid.
        assert_eq!(parsed.hash(), legacy.hash());
    }

    #[test]
    fn sighash_substitutes_scripts() {
        let tx = worked_example();
        let script_a = Script::p2pkh(&[0x11; 20]);
        let script_b = Script::p2pkh(&[0x22; 20]);
        let za = tx.sig_hash(0, &script_a).unwrap();
        let zb = tx.sig_hash(0, &script_b).unwrap();
        assert_ne!(za, zb);
        assert!(tx.sig_hash(1, &script_a).is_err());
    }

    #[test]
    fn memory_fetcher_round_trip() {
        let tx = worked_example();
        let id = tx.hash();
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert(tx.clone());
        assert_eq!(fetcher.fetch(&id).unwrap(), tx);
        assert!(fetcher.fetch(&H256::ZERO).is_err());
    }
}
