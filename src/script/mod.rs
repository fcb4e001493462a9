//! The transaction script interpreter
//!
//! A script is parsed into push and opcode chunks, then executed on a stack
//! machine. Execution distinguishes two failure classes: a
//! [`ScriptException`] means the script itself is malformed or illegal
//! (oversized pushes, unbalanced conditionals, stack underflow), while a
//! [`ScriptFailure`] is the language's normal "locked" outcome (`OP_VERIFY`
//! on false, `OP_RETURN`, a failed `OP_EQUALVERIFY`).
//!
//! Signature checking is delegated through [`SignatureVerifier`]; the
//! interpreter hands it the subscript starting at the byte after the most
//! recent `OP_CODESEPARATOR`.

pub mod opcodes;

use sha1::Sha1;
use sha2::Digest;

use crate::codec::hashing::{double_sha256, hash160, ripemd160, sha256};
use opcodes::*;

/// Largest data push the language allows
pub const MAX_SCRIPT_DATA_SIZE: usize = 520;

/// Budget of counted (non-push) opcodes per script
pub const MAX_OPCODE_COUNT: usize = 201;

/// Largest byte length accepted when decoding a script number
pub const MAX_SCRIPTNUM_SIZE: usize = 4;

/// One parsed element of a script, with its byte offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptChunk {
    Data { bytes: Vec<u8>, offset: usize },
    Op { opcode: u8, offset: usize },
}

/// Structural script violations; the script is invalid, not merely locked
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptException {
    #[error("script pushed {0} bytes of data, max is {MAX_SCRIPT_DATA_SIZE}")]
    OversizedData(usize),

    #[error("script contains more than the allowed {MAX_OPCODE_COUNT} opcodes")]
    TooManyOpcodes,

    #[error("push extends past the end of the script")]
    TruncatedPush,

    #[error("script contains disabled operation {0:#04x}")]
    DisabledOpcode(u8),

    #[error("script contains reserved operation {0:#04x}")]
    ReservedOpcode(u8),

    #[error("script attempted {0} on too small stack")]
    StackUnderflow(&'static str),

    #[error("script attempted {0} on empty if-stack")]
    UnbalancedConditional(&'static str),

    #[error("{op} at index {index} on too small stack")]
    IndexOutOfRange { op: &'static str, index: i64 },

    #[error("script tried to use an integer larger than {MAX_SCRIPTNUM_SIZE} bytes")]
    OversizedNumber,

    #[error("{op} count {count} out of range")]
    BadMultiSigCount { op: &'static str, count: i64 },
}

/// A valid operation caused the script to fail verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScriptFailure {
    #[error("OP_VERIFY failed")]
    Verify,

    #[error("script used OP_RETURN")]
    Return,

    #[error("OP_EQUALVERIFY failed")]
    EqualVerify,

    #[error("OP_NUMEQUALVERIFY failed")]
    NumEqualVerify,

    #[error("OP_CHECKSIGVERIFY failed")]
    CheckSigVerify,

    #[error("OP_CHECKMULTISIGVERIFY failed")]
    CheckMultiSigVerify,
}

/// Either failure class, as surfaced to callers of [`Script::execute`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("invalid script: {0}")]
    Exception(#[from] ScriptException),

    #[error("script rejected: {0}")]
    Failure(#[from] ScriptFailure),
}

/// External signature check invoked by `OP_CHECKSIG*` and
/// `OP_CHECKMULTISIG*`
///
/// `subscript` is the raw script from the byte after the last
/// `OP_CODESEPARATOR` (or the whole script when none was seen). A
/// production implementation hashes it per the SIGHASH rules; tests inject
/// fakes.
pub trait SignatureVerifier {
    fn verify(&self, signature: &[u8], pubkey: &[u8], subscript: &[u8]) -> bool;
}

/// Evaluate a byte string as a boolean. The last byte may be 0x80 alone
/// ("negative zero"), which still counts as false.
pub fn cast_to_bool(data: &[u8]) -> bool {
    match data.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|&b| b != 0) || (last != 0 && last != 0x80),
    }
}

/// Encode an integer in the script number format: little-endian magnitude
/// with the sign carried in the high bit of the final byte; zero is empty.
pub fn int_to_scriptnum(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut magnitude = n.unsigned_abs();
    let mut bytes = Vec::new();
    while magnitude > 0 {
        bytes.push((magnitude & 0xFF) as u8);
        magnitude >>= 8;
    }
    if bytes.last().copied().unwrap_or(0) & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = bytes.last_mut().unwrap();
        *last |= 0x80;
    }
    bytes
}

/// Decode a script number; inputs longer than 4 bytes are rejected
pub fn scriptnum_to_int(bytes: &[u8]) -> Result<i64, ScriptException> {
    if bytes.len() > MAX_SCRIPTNUM_SIZE {
        return Err(ScriptException::OversizedNumber);
    }
    let Some((&last, _)) = bytes.split_last() else {
        return Ok(0);
    };
    let mut value: i64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        let byte = if i == bytes.len() - 1 { byte & 0x7F } else { byte };
        value |= i64::from(byte) << (8 * i);
    }
    if last & 0x80 != 0 {
        value = -value;
    }
    Ok(value)
}

fn bool_bytes(value: bool) -> Vec<u8> {
    vec![value as u8]
}

/// Interpreter state for one execution
struct Vm {
    data_stack: Vec<Vec<u8>>,
    alt_stack: Vec<Vec<u8>>,
    if_stack: Vec<bool>,
    last_code_separator: usize,
}

impl Vm {
    fn pop(&mut self, op: &'static str) -> Result<Vec<u8>, ScriptException> {
        self.data_stack
            .pop()
            .ok_or(ScriptException::StackUnderflow(op))
    }

    fn require(&self, op: &'static str, depth: usize) -> Result<(), ScriptException> {
        if self.data_stack.len() < depth {
            return Err(ScriptException::StackUnderflow(op));
        }
        Ok(())
    }

    fn pop_int(&mut self, op: &'static str) -> Result<i64, ScriptException> {
        let bytes = self.pop(op)?;
        scriptnum_to_int(&bytes)
    }

    fn push(&mut self, bytes: Vec<u8>) {
        self.data_stack.push(bytes);
    }

    fn push_int(&mut self, value: i64) {
        self.push(int_to_scriptnum(value));
    }

    /// Clone the entry `depth` positions below the top
    fn peek(&self, depth: usize) -> Vec<u8> {
        self.data_stack[self.data_stack.len() - depth].clone()
    }
}

/// A parsed script ready for execution
#[derive(Debug)]
pub struct Script {
    bytes: Vec<u8>,
    chunks: Vec<ScriptChunk>,
}

impl Script {
    /// Parse raw script bytes into chunks
    ///
    /// Push encodings are resolved here; opcodes at or above `OP_NOP` count
    /// against the 201-opcode budget.
    pub fn parse(script: &[u8]) -> Result<Self, ScriptException> {
        let mut chunks = Vec::new();
        let mut opcode_count = 0usize;
        let mut i = 0usize;

        while i < script.len() {
            let opcode = script[i];
            let offset = i;
            i += 1;

            let push_len = match opcode {
                len @ 0..=0x4B => Some(len as usize),
                OP_PUSHDATA1 => {
                    let len = *script.get(i).ok_or(ScriptException::TruncatedPush)?;
                    i += 1;
                    Some(len as usize)
                }
                OP_PUSHDATA2 => {
                    let raw = script
                        .get(i..i + 2)
                        .ok_or(ScriptException::TruncatedPush)?;
                    i += 2;
                    Some(u16::from_le_bytes(raw.try_into().unwrap()) as usize)
                }
                OP_PUSHDATA4 => {
                    let raw = script
                        .get(i..i + 4)
                        .ok_or(ScriptException::TruncatedPush)?;
                    i += 4;
                    Some(u32::from_le_bytes(raw.try_into().unwrap()) as usize)
                }
                _ => None,
            };

            match push_len {
                Some(len) => {
                    let bytes = script
                        .get(i..i + len)
                        .ok_or(ScriptException::TruncatedPush)?
                        .to_vec();
                    i += len;
                    chunks.push(ScriptChunk::Data { bytes, offset });
                }
                None => {
                    // OP_RESERVED and the constants below OP_NOP are free
                    if opcode >= OP_NOP {
                        opcode_count += 1;
                        if opcode_count > MAX_OPCODE_COUNT {
                            return Err(ScriptException::TooManyOpcodes);
                        }
                    }
                    chunks.push(ScriptChunk::Op { opcode, offset });
                }
            }
        }

        Ok(Self {
            bytes: script.to_vec(),
            chunks,
        })
    }

    /// The parsed chunk sequence
    pub fn chunks(&self) -> &[ScriptChunk] {
        &self.chunks
    }

    /// Execute over an empty stack
    pub fn execute(&self, verifier: &dyn SignatureVerifier) -> Result<bool, ScriptError> {
        self.execute_with_stack(Vec::new(), verifier)
    }

    /// Execute over a pre-populated stack (the unlocking data), returning
    /// whether the final stack top casts to true
    pub fn execute_with_stack(
        &self,
        initial_stack: Vec<Vec<u8>>,
        verifier: &dyn SignatureVerifier,
    ) -> Result<bool, ScriptError> {
        let mut vm = Vm {
            data_stack: initial_stack,
            alt_stack: Vec::new(),
            if_stack: Vec::new(),
            last_code_separator: 0,
        };

        for chunk in &self.chunks {
            let execute = !vm.if_stack.contains(&false);
            match chunk {
                ScriptChunk::Data { bytes, .. } => {
                    if bytes.len() > MAX_SCRIPT_DATA_SIZE {
                        return Err(ScriptException::OversizedData(bytes.len()).into());
                    }
                    if execute {
                        vm.push(bytes.clone());
                    }
                }
                ScriptChunk::Op { opcode, offset } => {
                    self.step(&mut vm, *opcode, *offset, execute, verifier)?;
                }
            }
        }

        Ok(vm.data_stack.last().map(|top| cast_to_bool(top)).unwrap_or(false))
    }

    fn step(
        &self,
        vm: &mut Vm,
        opcode: u8,
        offset: usize,
        execute: bool,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), ScriptError> {
        if DISABLED_OPCODES.contains(&opcode) {
            return Err(ScriptException::DisabledOpcode(opcode).into());
        }

        // Flow control runs even in non-executing branches so nesting stays
        // balanced
        match opcode {
            OP_IF | OP_NOTIF => {
                if !execute {
                    vm.if_stack.push(false);
                    return Ok(());
                }
                let op = if opcode == OP_IF { "OP_IF" } else { "OP_NOTIF" };
                let top = vm.pop(op)?;
                let value = cast_to_bool(&top);
                vm.if_stack.push(if opcode == OP_IF { value } else { !value });
                return Ok(());
            }
            OP_ELSE => {
                let top = vm
                    .if_stack
                    .last_mut()
                    .ok_or(ScriptException::UnbalancedConditional("OP_ELSE"))?;
                *top = !*top;
                return Ok(());
            }
            OP_ENDIF => {
                vm.if_stack
                    .pop()
                    .ok_or(ScriptException::UnbalancedConditional("OP_ENDIF"))?;
                return Ok(());
            }
            _ => {}
        }

        if !execute {
            return Ok(());
        }

        match opcode {
            //
            // PUSH VALUE
            //
            OP_1NEGATE => vm.push_int(-1),
            OP_1..=OP_16 => vm.push_int(i64::from(opcode - OP_1 + 1)),

            //
            // NOPS
            //
            OP_NOP | OP_NOP1..=OP_NOP10 => {}

            //
            // VERIFICATION
            //
            OP_VERIFY => {
                let top = vm.pop("OP_VERIFY")?;
                if !cast_to_bool(&top) {
                    return Err(ScriptFailure::Verify.into());
                }
            }
            OP_RETURN => return Err(ScriptFailure::Return.into()),

            //
            // STACK OPERATIONS
            //
            OP_TOALTSTACK => {
                let top = vm.pop("OP_TOALTSTACK")?;
                vm.alt_stack.push(top);
            }
            OP_FROMALTSTACK => {
                let top = vm
                    .alt_stack
                    .pop()
                    .ok_or(ScriptException::StackUnderflow("OP_FROMALTSTACK"))?;
                vm.push(top);
            }
            OP_2DROP => {
                vm.require("OP_2DROP", 2)?;
                vm.data_stack.pop();
                vm.data_stack.pop();
            }
            OP_2DUP => {
                vm.require("OP_2DUP", 2)?;
                vm.push(vm.peek(2));
                vm.push(vm.peek(2));
            }
            OP_3DUP => {
                vm.require("OP_3DUP", 3)?;
                vm.push(vm.peek(3));
                vm.push(vm.peek(3));
                vm.push(vm.peek(3));
            }
            OP_2OVER => {
                vm.require("OP_2OVER", 4)?;
                vm.push(vm.peek(4));
                vm.push(vm.peek(4));
            }
            OP_2ROT => {
                vm.require("OP_2ROT", 6)?;
                let len = vm.data_stack.len();
                vm.data_stack[len - 6..].rotate_left(2);
            }
            OP_2SWAP => {
                vm.require("OP_2SWAP", 4)?;
                let len = vm.data_stack.len();
                vm.data_stack[len - 4..].rotate_left(2);
            }
            OP_IFDUP => {
                vm.require("OP_IFDUP", 1)?;
                if cast_to_bool(&vm.peek(1)) {
                    vm.push(vm.peek(1));
                }
            }
            OP_DEPTH => vm.push_int(vm.data_stack.len() as i64),
            OP_DROP => {
                vm.pop("OP_DROP")?;
            }
            OP_DUP => {
                vm.require("OP_DUP", 1)?;
                vm.push(vm.peek(1));
            }
            OP_NIP => {
                vm.require("OP_NIP", 2)?;
                let len = vm.data_stack.len();
                vm.data_stack.remove(len - 2);
            }
            OP_OVER => {
                vm.require("OP_OVER", 2)?;
                vm.push(vm.peek(2));
            }
            OP_PICK | OP_ROLL => {
                let op = if opcode == OP_PICK { "OP_PICK" } else { "OP_ROLL" };
                vm.require(op, 2)?;
                let n = vm.pop_int(op)?;
                let depth = vm.data_stack.len();
                if n < 0 || n as usize >= depth {
                    return Err(ScriptException::IndexOutOfRange { op, index: n }.into());
                }
                let index = depth - 1 - n as usize;
                if opcode == OP_PICK {
                    let entry = vm.data_stack[index].clone();
                    vm.push(entry);
                } else {
                    let entry = vm.data_stack.remove(index);
                    vm.push(entry);
                }
            }
            OP_ROT => {
                vm.require("OP_ROT", 3)?;
                let len = vm.data_stack.len();
                vm.data_stack[len - 3..].rotate_left(1);
            }
            OP_SWAP => {
                vm.require("OP_SWAP", 2)?;
                let len = vm.data_stack.len();
                vm.data_stack.swap(len - 1, len - 2);
            }
            OP_TUCK => {
                vm.require("OP_TUCK", 2)?;
                let len = vm.data_stack.len();
                let top = vm.peek(1);
                vm.data_stack.insert(len - 2, top);
            }
            OP_SIZE => {
                vm.require("OP_SIZE", 1)?;
                vm.push_int(vm.peek(1).len() as i64);
            }

            //
            // BITWISE LOGIC
            //
            OP_EQUAL => {
                vm.require("OP_EQUAL", 2)?;
                let b = vm.pop("OP_EQUAL")?;
                let a = vm.pop("OP_EQUAL")?;
                vm.push(bool_bytes(a == b));
            }
            OP_EQUALVERIFY => {
                vm.require("OP_EQUALVERIFY", 2)?;
                let b = vm.pop("OP_EQUALVERIFY")?;
                let a = vm.pop("OP_EQUALVERIFY")?;
                if a != b {
                    return Err(ScriptFailure::EqualVerify.into());
                }
            }

            //
            // NUMERIC
            //
            OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                let value = vm.pop_int("single-numeric opcode")?;
                let result = match opcode {
                    OP_1ADD => value + 1,
                    OP_1SUB => value - 1,
                    OP_NEGATE => -value,
                    OP_ABS => value.abs(),
                    OP_NOT => i64::from(value == 0),
                    _ => i64::from(value != 0),
                };
                vm.push_int(result);
            }
            OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMEQUALVERIFY
            | OP_NUMNOTEQUAL | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL
            | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
                vm.require("double-numeric opcode", 2)?;
                let b = vm.pop_int("double-numeric opcode")?;
                let a = vm.pop_int("double-numeric opcode")?;
                let result = match opcode {
                    OP_ADD => a + b,
                    OP_SUB => a - b,
                    OP_BOOLAND => i64::from(a != 0 && b != 0),
                    OP_BOOLOR => i64::from(a != 0 || b != 0),
                    OP_NUMEQUAL | OP_NUMEQUALVERIFY => i64::from(a == b),
                    OP_NUMNOTEQUAL => i64::from(a != b),
                    OP_LESSTHAN => i64::from(a < b),
                    OP_GREATERTHAN => i64::from(a > b),
                    OP_LESSTHANOREQUAL => i64::from(a <= b),
                    OP_GREATERTHANOREQUAL => i64::from(a >= b),
                    OP_MIN => a.min(b),
                    _ => a.max(b),
                };
                if opcode == OP_NUMEQUALVERIFY {
                    if result == 0 {
                        return Err(ScriptFailure::NumEqualVerify.into());
                    }
                } else {
                    vm.push_int(result);
                }
            }
            OP_WITHIN => {
                vm.require("OP_WITHIN", 3)?;
                let max = vm.pop_int("OP_WITHIN")?;
                let min = vm.pop_int("OP_WITHIN")?;
                let value = vm.pop_int("OP_WITHIN")?;
                vm.push(bool_bytes(value >= min && value < max));
            }

            //
            // CRYPTO
            //
            OP_RIPEMD160 => {
                let top = vm.pop("OP_RIPEMD160")?;
                vm.push(ripemd160(&top).to_vec());
            }
            OP_SHA1 => {
                let top = vm.pop("OP_SHA1")?;
                vm.push(Sha1::digest(&top).to_vec());
            }
            OP_SHA256 => {
                let top = vm.pop("OP_SHA256")?;
                vm.push(sha256(&top).to_vec());
            }
            OP_HASH160 => {
                let top = vm.pop("OP_HASH160")?;
                vm.push(hash160(&top).to_vec());
            }
            OP_HASH256 => {
                let top = vm.pop("OP_HASH256")?;
                vm.push(double_sha256(&top).to_vec());
            }
            OP_CODESEPARATOR => vm.last_code_separator = offset + 1,
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                let op = if opcode == OP_CHECKSIG {
                    "OP_CHECKSIG"
                } else {
                    "OP_CHECKSIGVERIFY"
                };
                vm.require(op, 2)?;
                let pubkey = vm.pop(op)?;
                let signature = vm.pop(op)?;
                let valid = verifier.verify(&signature, &pubkey, self.subscript(vm));
                if opcode == OP_CHECKSIG {
                    vm.push(bool_bytes(valid));
                } else if !valid {
                    return Err(ScriptFailure::CheckSigVerify.into());
                }
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                let op = if opcode == OP_CHECKMULTISIG {
                    "OP_CHECKMULTISIG"
                } else {
                    "OP_CHECKMULTISIGVERIFY"
                };
                let valid = self.check_multisig(vm, op, verifier)?;
                if opcode == OP_CHECKMULTISIG {
                    vm.push(bool_bytes(valid));
                } else if !valid {
                    return Err(ScriptFailure::CheckMultiSigVerify.into());
                }
            }

            _ => return Err(ScriptException::ReservedOpcode(opcode).into()),
        }

        Ok(())
    }

    /// The script slice signatures commit to
    fn subscript<'a>(&'a self, vm: &Vm) -> &'a [u8] {
        &self.bytes[vm.last_code_separator..]
    }

    /// Pop n pubkeys, m signatures and the historical extra element, then
    /// match signatures against pubkeys in stack order
    fn check_multisig(
        &self,
        vm: &mut Vm,
        op: &'static str,
        verifier: &dyn SignatureVerifier,
    ) -> Result<bool, ScriptException> {
        let key_count = vm.pop_int(op)?;
        if !(0..=20).contains(&key_count) {
            return Err(ScriptException::BadMultiSigCount {
                op,
                count: key_count,
            });
        }
        let mut pubkeys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            pubkeys.push(vm.pop(op)?);
        }

        let sig_count = vm.pop_int(op)?;
        if sig_count < 0 || sig_count > key_count {
            return Err(ScriptException::BadMultiSigCount {
                op,
                count: sig_count,
            });
        }
        let mut signatures = Vec::with_capacity(sig_count as usize);
        for _ in 0..sig_count {
            signatures.push(vm.pop(op)?);
        }

        // The protocol pops one element more than it uses
        vm.pop(op)?;

        let subscript = &self.bytes[vm.last_code_separator..];
        let mut key_index = 0;
        for signature in &signatures {
            let mut matched = false;
            while key_index < pubkeys.len() {
                let pubkey = &pubkeys[key_index];
                key_index += 1;
                if verifier.verify(signature, pubkey, subscript) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptAll;
    impl SignatureVerifier for AcceptAll {
        fn verify(&self, _signature: &[u8], _pubkey: &[u8], _subscript: &[u8]) -> bool {
            true
        }
    }

    #[test]
    fn test_cast_to_bool_edge_cases() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x80]));
        assert!(!cast_to_bool(&[0x00, 0x80]));
        assert!(!cast_to_bool(&[0x00]));
        assert!(cast_to_bool(&[0x01]));
        assert!(cast_to_bool(&[0x80, 0x00]));
        assert!(cast_to_bool(&[0x00, 0x01]));
    }

    #[test]
    fn test_scriptnum_round_trip() {
        for n in [
            0i64,
            1,
            -1,
            127,
            -127,
            128,
            -128,
            255,
            256,
            -255,
            0x7FFF,
            -0x7FFF,
            0x7FFF_FFFF,
            -0x7FFF_FFFF,
        ] {
            let encoded = int_to_scriptnum(n);
            assert!(encoded.len() <= MAX_SCRIPTNUM_SIZE, "n = {n}");
            assert_eq!(scriptnum_to_int(&encoded).unwrap(), n, "n = {n}");
        }
    }

    #[test]
    fn test_scriptnum_encoding_shape() {
        assert!(int_to_scriptnum(0).is_empty());
        assert_eq!(int_to_scriptnum(1), vec![0x01]);
        assert_eq!(int_to_scriptnum(-1), vec![0x81]);
        // 128 needs a padding byte to keep the sign bit clear
        assert_eq!(int_to_scriptnum(128), vec![0x80, 0x00]);
        assert_eq!(int_to_scriptnum(-128), vec![0x80, 0x80]);
    }

    #[test]
    fn test_scriptnum_rejects_five_bytes() {
        assert_eq!(
            scriptnum_to_int(&[1, 2, 3, 4, 5]),
            Err(ScriptException::OversizedNumber)
        );
    }

    #[test]
    fn test_parse_counts_only_real_opcodes() {
        // 201 NOPs parse; one more trips the budget
        let ok = vec![OP_NOP; MAX_OPCODE_COUNT];
        assert!(Script::parse(&ok).is_ok());
        let too_many = vec![OP_NOP; MAX_OPCODE_COUNT + 1];
        assert_eq!(
            Script::parse(&too_many).unwrap_err(),
            ScriptException::TooManyOpcodes
        );
        // Pushes are free: the same count of data pushes is fine
        let pushes = vec![0x01, 0xAA].repeat(MAX_OPCODE_COUNT + 1);
        assert!(Script::parse(&pushes).is_ok());
    }

    #[test]
    fn test_parse_truncated_pushdata() {
        assert_eq!(
            Script::parse(&[0x05, 0x01]).unwrap_err(),
            ScriptException::TruncatedPush
        );
        assert_eq!(
            Script::parse(&[OP_PUSHDATA1]).unwrap_err(),
            ScriptException::TruncatedPush
        );
        assert_eq!(
            Script::parse(&[OP_PUSHDATA2, 0x10, 0x00, 0xAA]).unwrap_err(),
            ScriptException::TruncatedPush
        );
    }

    #[test]
    fn test_pushdata_offsets() {
        let script = Script::parse(&[0x02, 0xAA, 0xBB, OP_DUP, OP_PUSHDATA1, 0x01, 0xCC]).unwrap();
        assert_eq!(
            script.chunks(),
            &[
                ScriptChunk::Data {
                    bytes: vec![0xAA, 0xBB],
                    offset: 0
                },
                ScriptChunk::Op {
                    opcode: OP_DUP,
                    offset: 3
                },
                ScriptChunk::Data {
                    bytes: vec![0xCC],
                    offset: 4
                },
            ]
        );
    }
}
