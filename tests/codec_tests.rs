//! Codec round-trip and framing tests

mod common;

use std::net::Ipv4Addr;

use common::*;
use proptest::prelude::*;

use bllvm_peer::codec::envelope::{encode_message, payload_checksum, HEADER_LEN};
use bllvm_peer::codec::fields::{
    NetworkAddress, PayloadReader, PayloadWriter, TimestampedAddress,
};
use bllvm_peer::codec::hashing::{double_sha256, hash_to_hex};
use bllvm_peer::codec::messages::{
    AddrMessage, BlockMessage, GetBlocksMessage, HeadersMessage, InvMessage, InventoryItem,
    OutPoint, PingMessage, ProtocolMessage, Transaction, TxIn, TxOut, VersionMessage, MSG_BLOCK,
    MSG_TX, NODE_NETWORK, PROTOCOL_VERSION,
};
use bllvm_peer::codec::{FrameBuffer, ZERO_HASH};
use bllvm_peer::config::Network;
use bllvm_peer::storage::genesis_block;

fn round_trip(message: ProtocolMessage) -> ProtocolMessage {
    let payload = message.encode_payload();
    let decoded = ProtocolMessage::decode_payload(message.command(), &payload).unwrap();
    assert_eq!(decoded, message);
    decoded
}

fn sample_transaction() -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxIn {
            previous_output: OutPoint {
                hash: [0xAB; 32],
                index: 0,
            },
            signature_script: vec![0x48, 0x30, 0x45],
            sequence: 0xFFFF_FFFF,
        }],
        outputs: vec![
            TxOut {
                value: 50_0000_0000,
                pk_script: vec![0x76, 0xA9, 0x14],
            },
            TxOut {
                value: 1,
                pk_script: vec![],
            },
        ],
        lock_time: 0,
    }
}

#[test]
fn test_version_round_trip_with_addresses() {
    round_trip(ProtocolMessage::Version(VersionMessage {
        version: PROTOCOL_VERSION,
        services: NODE_NETWORK,
        timestamp: 1_296_688_602,
        addr_recv: NetworkAddress::new(Ipv4Addr::new(203, 0, 113, 7), 18333, NODE_NETWORK),
        addr_from: NetworkAddress::unspecified(),
        nonce: u64::MAX,
        user_agent: "/Satoshi:0.7.2/".to_string(),
    }));

    // Empty user agent stays empty
    round_trip(ProtocolMessage::Version(VersionMessage {
        version: PROTOCOL_VERSION,
        services: 0,
        timestamp: 0,
        addr_recv: NetworkAddress::unspecified(),
        addr_from: NetworkAddress::unspecified(),
        nonce: 0,
        user_agent: String::new(),
    }));
}

#[test]
fn test_addr_round_trip() {
    round_trip(ProtocolMessage::Addr(AddrMessage {
        addresses: vec![
            TimestampedAddress {
                timestamp: 1_296_688_602,
                address: NetworkAddress::new(Ipv4Addr::new(10, 1, 2, 3), 8333, NODE_NETWORK),
            },
            TimestampedAddress {
                timestamp: 0,
                address: NetworkAddress::unspecified(),
            },
        ],
    }));
    round_trip(ProtocolMessage::Addr(AddrMessage { addresses: vec![] }));
}

#[test]
fn test_inventory_messages_round_trip() {
    let inventory = vec![
        InventoryItem {
            inv_type: MSG_TX,
            hash: [0x01; 32],
        },
        InventoryItem {
            inv_type: MSG_BLOCK,
            hash: [0x02; 32],
        },
        InventoryItem {
            inv_type: 0,
            hash: ZERO_HASH,
        },
    ];
    round_trip(ProtocolMessage::Inv(InvMessage { inventory }));
    round_trip(ProtocolMessage::Inv(InvMessage { inventory: vec![] }));

    // 36 bytes per entry plus the count prefix
    let one = ProtocolMessage::Inv(InvMessage {
        inventory: vec![InventoryItem::block([0xCD; 32])],
    });
    assert_eq!(one.encode_payload().len(), 1 + 36);
}

#[test]
fn test_transaction_round_trip() {
    round_trip(ProtocolMessage::Tx(sample_transaction()));

    // Degenerate empty transaction
    round_trip(ProtocolMessage::Tx(Transaction {
        version: 0,
        inputs: vec![],
        outputs: vec![],
        lock_time: u32::MAX,
    }));
}

#[test]
fn test_block_round_trip_and_header_size() {
    let block = BlockMessage {
        version: 2,
        prev_block_hash: [0x11; 32],
        merkle_root: [0x22; 32],
        timestamp: 1_355_555_555,
        bits: 0x1B0404CB,
        nonce: 0xDEAD_BEEF,
        transactions: vec![sample_transaction()],
    };
    round_trip(ProtocolMessage::Block(block.clone()));

    // Header-only form: 80 header bytes plus the zero txn count
    let header_only = BlockMessage {
        transactions: vec![],
        ..block
    };
    assert_eq!(
        ProtocolMessage::Block(header_only).encode_payload().len(),
        81
    );
}

#[test]
fn test_headers_round_trip() {
    let header = BlockMessage {
        version: 1,
        prev_block_hash: [0x33; 32],
        merkle_root: [0x44; 32],
        timestamp: 1_300_000_000,
        bits: 0x1D00FFFF,
        nonce: 7,
        transactions: vec![],
    };
    round_trip(ProtocolMessage::Headers(HeadersMessage {
        headers: vec![header.clone(), header],
    }));
}

#[test]
fn test_getblocks_locator_order_preserved() {
    let message = ProtocolMessage::GetBlocks(GetBlocksMessage {
        version: PROTOCOL_VERSION as u32,
        block_locator_hashes: (0u8..12).map(|i| [i; 32]).collect(),
        hash_stop: ZERO_HASH,
    });
    let ProtocolMessage::GetBlocks(decoded) = round_trip(message) else {
        unreachable!()
    };
    assert_eq!(decoded.block_locator_hashes[3], [3u8; 32]);
}

#[test]
fn test_genesis_block_hash_literal() {
    let genesis = genesis_block(Network::BitcoinTestnet3).unwrap();
    let message = BlockMessage {
        version: genesis.version,
        prev_block_hash: genesis.prev_block_hash,
        merkle_root: genesis.merkle_root,
        timestamp: genesis.timestamp,
        bits: genesis.bits,
        nonce: genesis.nonce,
        transactions: vec![],
    };
    assert_eq!(
        message.block_hash_hex(),
        "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943"
    );
    // The protocol block hash and the stored-form hash agree
    assert_eq!(message.block_hash(), genesis.hash());
}

#[test]
fn test_checksum_definition() {
    let payload = b"checksum me";
    let digest = double_sha256(payload);
    let expected = u32::from_le_bytes(digest[0..4].try_into().unwrap());
    assert_eq!(payload_checksum(payload), expected);
}

#[test]
fn test_envelope_through_frame_buffer() {
    let network = Network::Litecoin;
    let message = ProtocolMessage::Ping(PingMessage { nonce: 424242 });
    let bytes = encode_message(network.magic(), &message);
    assert_eq!(bytes.len(), HEADER_LEN + 8);
    assert_eq!(&bytes[0..4], &network.magic().to_le_bytes());

    let mut frames = FrameBuffer::new();
    frames.extend(&bytes);
    assert_eq!(frames.next_frame().unwrap(), Some(message));
}

#[test]
fn test_hash_hex_is_byte_reversed() {
    let mut hash = ZERO_HASH;
    hash[31] = 0xAB;
    assert!(hash_to_hex(&hash).starts_with("ab"));
}

proptest! {
    #[test]
    fn prop_var_int_round_trip(value: u64) {
        let mut w = PayloadWriter::new();
        w.put_var_int(value);
        let bytes = w.into_bytes();
        let mut r = PayloadReader::new(&bytes);
        prop_assert_eq!(r.read_var_int().unwrap(), value);
        prop_assert!(r.is_empty());
    }

    #[test]
    fn prop_var_int_smallest_form(value: u64) {
        let mut w = PayloadWriter::new();
        w.put_var_int(value);
        let len = w.into_bytes().len();
        let expected = match value {
            0..=0xFC => 1,
            0xFD..=0xFFFF => 3,
            0x1_0000..=0xFFFF_FFFF => 5,
            _ => 9,
        };
        prop_assert_eq!(len, expected);
    }

    #[test]
    fn prop_var_bytes_round_trip(data: Vec<u8>) {
        let mut w = PayloadWriter::new();
        w.put_var_bytes(&data);
        let bytes = w.into_bytes();
        let mut r = PayloadReader::new(&bytes);
        prop_assert_eq!(r.read_var_bytes().unwrap(), data);
    }

    #[test]
    fn prop_scriptnum_round_trip(value in -0x7FFF_FFFFi64..=0x7FFF_FFFF) {
        use bllvm_peer::script::{int_to_scriptnum, scriptnum_to_int};
        let encoded = int_to_scriptnum(value);
        prop_assert!(encoded.len() <= 4);
        prop_assert_eq!(scriptnum_to_int(&encoded).unwrap(), value);
    }

    #[test]
    fn prop_ping_round_trip(nonce: u64) {
        let message = ProtocolMessage::Ping(PingMessage { nonce });
        let payload = message.encode_payload();
        prop_assert_eq!(
            ProtocolMessage::decode_payload("ping", &payload).unwrap(),
            message
        );
    }
}

#[test]
fn test_easy_fixture_chain_is_consistent() {
    // The shared fixtures the other suites rely on keep their linkage
    let genesis = easy_genesis();
    let block = child_block(&genesis, 1);
    assert_eq!(block.prev_block_hash, genesis.hash());
    assert_eq!(block.bits, EASY_BITS);
}
