//! Script opcode constants
//!
//! Byte values for the transaction script language. Push opcodes below
//! `OP_PUSHDATA1` carry their own length and have no named constant.

/// Push an empty byte string
pub const OP_0: u8 = 0x00;

/// The next byte is the push length
pub const OP_PUSHDATA1: u8 = 0x4C;
/// The next two bytes (little-endian) are the push length
pub const OP_PUSHDATA2: u8 = 0x4D;
/// The next four bytes (little-endian) are the push length
pub const OP_PUSHDATA4: u8 = 0x4E;

pub const OP_1NEGATE: u8 = 0x4F;
pub const OP_RESERVED: u8 = 0x50;
pub const OP_1: u8 = 0x51;
pub const OP_2: u8 = 0x52;
pub const OP_3: u8 = 0x53;
pub const OP_4: u8 = 0x54;
pub const OP_5: u8 = 0x55;
pub const OP_6: u8 = 0x56;
pub const OP_7: u8 = 0x57;
pub const OP_8: u8 = 0x58;
pub const OP_9: u8 = 0x59;
pub const OP_10: u8 = 0x5A;
pub const OP_11: u8 = 0x5B;
pub const OP_12: u8 = 0x5C;
pub const OP_13: u8 = 0x5D;
pub const OP_14: u8 = 0x5E;
pub const OP_15: u8 = 0x5F;
pub const OP_16: u8 = 0x60;

// Flow control
pub const OP_NOP: u8 = 0x61;
pub const OP_VER: u8 = 0x62;
pub const OP_IF: u8 = 0x63;
pub const OP_NOTIF: u8 = 0x64;
pub const OP_VERIF: u8 = 0x65;
pub const OP_VERNOTIF: u8 = 0x66;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_RETURN: u8 = 0x6A;

// Stack
pub const OP_TOALTSTACK: u8 = 0x6B;
pub const OP_FROMALTSTACK: u8 = 0x6C;
pub const OP_2DROP: u8 = 0x6D;
pub const OP_2DUP: u8 = 0x6E;
pub const OP_3DUP: u8 = 0x6F;
pub const OP_2OVER: u8 = 0x70;
pub const OP_2ROT: u8 = 0x71;
pub const OP_2SWAP: u8 = 0x72;
pub const OP_IFDUP: u8 = 0x73;
pub const OP_DEPTH: u8 = 0x74;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_NIP: u8 = 0x77;
pub const OP_OVER: u8 = 0x78;
pub const OP_PICK: u8 = 0x79;
pub const OP_ROLL: u8 = 0x7A;
pub const OP_ROT: u8 = 0x7B;
pub const OP_SWAP: u8 = 0x7C;
pub const OP_TUCK: u8 = 0x7D;

// Splice (disabled except OP_SIZE)
pub const OP_CAT: u8 = 0x7E;
pub const OP_SUBSTR: u8 = 0x7F;
pub const OP_LEFT: u8 = 0x80;
pub const OP_RIGHT: u8 = 0x81;
pub const OP_SIZE: u8 = 0x82;

// Bitwise logic (disabled except the equality pair)
pub const OP_INVERT: u8 = 0x83;
pub const OP_AND: u8 = 0x84;
pub const OP_OR: u8 = 0x85;
pub const OP_XOR: u8 = 0x86;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_RESERVED1: u8 = 0x89;
pub const OP_RESERVED2: u8 = 0x8A;

// Arithmetic
pub const OP_1ADD: u8 = 0x8B;
pub const OP_1SUB: u8 = 0x8C;
pub const OP_2MUL: u8 = 0x8D;
pub const OP_2DIV: u8 = 0x8E;
pub const OP_NEGATE: u8 = 0x8F;
pub const OP_ABS: u8 = 0x90;
pub const OP_NOT: u8 = 0x91;
pub const OP_0NOTEQUAL: u8 = 0x92;
pub const OP_ADD: u8 = 0x93;
pub const OP_SUB: u8 = 0x94;
pub const OP_MUL: u8 = 0x95;
pub const OP_DIV: u8 = 0x96;
pub const OP_MOD: u8 = 0x97;
pub const OP_LSHIFT: u8 = 0x98;
pub const OP_RSHIFT: u8 = 0x99;
pub const OP_BOOLAND: u8 = 0x9A;
pub const OP_BOOLOR: u8 = 0x9B;
pub const OP_NUMEQUAL: u8 = 0x9C;
pub const OP_NUMEQUALVERIFY: u8 = 0x9D;
pub const OP_NUMNOTEQUAL: u8 = 0x9E;
pub const OP_LESSTHAN: u8 = 0x9F;
pub const OP_GREATERTHAN: u8 = 0xA0;
pub const OP_LESSTHANOREQUAL: u8 = 0xA1;
pub const OP_GREATERTHANOREQUAL: u8 = 0xA2;
pub const OP_MIN: u8 = 0xA3;
pub const OP_MAX: u8 = 0xA4;
pub const OP_WITHIN: u8 = 0xA5;

// Crypto
pub const OP_RIPEMD160: u8 = 0xA6;
pub const OP_SHA1: u8 = 0xA7;
pub const OP_SHA256: u8 = 0xA8;
pub const OP_HASH160: u8 = 0xA9;
pub const OP_HASH256: u8 = 0xAA;
pub const OP_CODESEPARATOR: u8 = 0xAB;
pub const OP_CHECKSIG: u8 = 0xAC;
pub const OP_CHECKSIGVERIFY: u8 = 0xAD;
pub const OP_CHECKMULTISIG: u8 = 0xAE;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xAF;

// Expansion
pub const OP_NOP1: u8 = 0xB0;
pub const OP_NOP10: u8 = 0xB9;

/// Opcodes whose presence is fatal regardless of the execution branch
pub const DISABLED_OPCODES: &[u8] = &[
    OP_CAT, OP_SUBSTR, OP_LEFT, OP_RIGHT, OP_INVERT, OP_AND, OP_OR, OP_XOR, OP_2MUL, OP_2DIV,
    OP_MUL, OP_DIV, OP_MOD, OP_LSHIFT, OP_RSHIFT,
];
