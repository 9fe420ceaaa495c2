//! Script byte encoding and a stack VM over the P2PKH opcode subset.
//!
//! A script is a sequence of commands, each either an opcode or a data
//! push. Evaluation failure is a `false` result, never an error: an input
//! that fails its script is invalid, not malformed.

use std::io::Read;
use std::ops::Add;

use log::debug;

use crate::ecdsa::Signature;
use crate::encode::{read_array, read_bytes, read_u16_le, read_u32_le, read_varint, write_varint};
use crate::error::{Error, Result};
use crate::hash::hash160;
use crate::keys::PublicKey;
use crate::u256::U256;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Sighash type this core signs and checks: everything committed.
pub const SIGHASH_ALL: u8 = 0x01;

/// One script command: an opcode, or bytes destined for the stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cmd {
    Op(u8),
    Push(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Script {
    cmds: Vec<Cmd>,
}

impl Script {
    pub fn new(cmds: Vec<Cmd>) -> Script {
        Script { cmds }
    }

    pub fn cmds(&self) -> &[Cmd] {
        &self.cmds
    }

    /// The standard pay-to-pubkey-hash locking script:
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn p2pkh(h160: &[u8; 20]) -> Script {
        Script {
            cmds: vec![
                Cmd::Op(OP_DUP),
                Cmd::Op(OP_HASH160),
                Cmd::Push(h160.to_vec()),
                Cmd::Op(OP_EQUALVERIFY),
                Cmd::Op(OP_CHECKSIG),
            ],
        }
    }

    /// Parses a varint-length-prefixed script body.
    pub fn parse(reader: &mut impl Read) -> Result<Script> {
        let len = read_varint(reader)?;
        let len = usize::try_from(len)
            .map_err(|_| Error::Parse(format!("script length {len} out of range")))?;
        let body = read_bytes(reader, len)?;
        Script::parse_body(&body)
    }

    /// Decodes a raw script body: single-byte opcodes, lengths 0x01-0x4b as
    /// immediate pushes, and the three OP_PUSHDATA widths.
    pub fn parse_body(body: &[u8]) -> Result<Script> {
        let mut reader = body;
        let mut cmds = Vec::new();
        while !reader.is_empty() {
            let byte = read_array::<1>(&mut reader)?[0];
            let push_len = match byte {
                1..=0x4b => Some(usize::from(byte)),
                OP_PUSHDATA1 => Some(usize::from(read_array::<1>(&mut reader)?[0])),
                OP_PUSHDATA2 => Some(usize::from(read_u16_le(&mut reader)?)),
                OP_PUSHDATA4 => {
                    let len = read_u32_le(&mut reader)?;
                    Some(usize::try_from(len).map_err(|_| {
                        Error::Parse(format!("push length {len} out of range"))
                    })?)
                }
                _ => None,
            };
            match push_len {
                Some(len) => cmds.push(Cmd::Push(read_bytes(&mut reader, len)?)),
                None => cmds.push(Cmd::Op(byte)),
            }
        }
        Ok(Script { cmds })
    }

    /// The script body without its length prefix.
    pub fn raw_serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for cmd in &self.cmds {
            match cmd {
                Cmd::Op(op) => out.push(*op),
                Cmd::Push(data) => {
                    match data.len() {
                        0 => out.push(OP_0),
                        1..=0x4b => out.push(data.len() as u8),
                        0x4c..=0xff => {
                            out.push(OP_PUSHDATA1);
                            out.push(data.len() as u8);
                        }
                        0x100..=0xffff => {
                            out.push(OP_PUSHDATA2);
                            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
                        }
                        _ => {
                            out.push(OP_PUSHDATA4);
                            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
                        }
                    }
                    out.extend_from_slice(data);
                }
            }
        }
        out
    }

    /// The wire form: varint length, then the body.
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.raw_serialize();
        let mut out = Vec::with_capacity(body.len() + 3);
        write_varint(&mut out, body.len() as u64);
        out.extend_from_slice(&body);
        out
    }

    /// Runs the script against digest z. True iff every command executes
    /// and the stack ends non-empty with a truthy top.
    pub fn evaluate(&self, z: U256) -> bool {
        let mut stack: Vec<Vec<u8>> = Vec::new();
        for cmd in &self.cmds {
            let ok = match cmd {
                Cmd::Push(data) => {
                    stack.push(data.clone());
                    true
                }
                Cmd::Op(op) => execute_op(*op, &mut stack, z),
            };
            if !ok {
                debug!(target: "script", "evaluation failed at {cmd:?}");
                return false;
            }
        }
        match stack.last() {
            Some(top) => is_truthy(top),
            None => false,
        }
    }
}

/// Concatenation: unlocking script first, locking script second.
impl Add for Script {
    type Output = Script;

    fn add(mut self, rhs: Script) -> Script {
        self.cmds.extend(rhs.cmds);
        self
    }
}

fn is_truthy(element: &[u8]) -> bool {
    element.iter().any(|&b| b != 0)
}

fn execute_op(op: u8, stack: &mut Vec<Vec<u8>>, z: U256) -> bool {
    match op {
        OP_0 => {
            stack.push(Vec::new());
            true
        }
        OP_1..=OP_16 => {
            stack.push(vec![op - OP_1 + 1]);
            true
        }
        OP_DUP => match stack.last() {
            Some(top) => {
                stack.push(top.clone());
                true
            }
            None => false,
        },
        OP_HASH160 => match stack.pop() {
            Some(top) => {
                stack.push(hash160(&top).to_vec());
                true
            }
            None => false,
        },
        OP_EQUALVERIFY => match (stack.pop(), stack.pop()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        OP_CHECKSIG => {
            let (Some(sec), Some(sig)) = (stack.pop(), stack.pop()) else {
                return false;
            };
            let checked = check_sig(&sec, &sig, z);
            stack.push(if checked { vec![1] } else { Vec::new() });
            true
        }
        other => {
            debug!(target: "script", "unsupported opcode 0x{other:02x}");
            false
        }
    }
}

/// OP_CHECKSIG's core: strip and check the trailing sighash byte, decode
/// DER and SEC, verify. Any malformed piece simply fails the check.
fn check_sig(sec: &[u8], sig_with_type: &[u8], z: U256) -> bool {
    let Some((&sighash_type, der)) = sig_with_type.split_last() else {
        return false;
    };
    if sighash_type != SIGHASH_ALL {
        debug!(target: "script", "unsupported sighash type 0x{sighash_type:02x}");
        return false;
    }
    let Ok(signature) = Signature::parse_der(der) else {
        return false;
    };
    let Ok(pubkey) = PublicKey::parse_sec(sec) else {
        return false;
    };
    pubkey.verify(z, &signature)
}
