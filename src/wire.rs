//! # Wire codec (C11)
//!
//! The two on-the-wire frame types: Data (fountain-coded payload) and
//! Block ACK. Grounded in idiom on the teacher's `wire.rs` fixed-width
//! header encode/decode functions and `Malformed`-on-short-input checks,
//! but the frame layout itself is this crate's own (the teacher's VarInt
//! `PacketHeader` has no counterpart here — see DESIGN.md).

use crate::block::FountainPacket;
use crate::error::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};

const DATA_TYPE: u8 = 0x00;
const BLOCK_ACK_TYPE: u8 = 0x01;
const DATA_HEADER_LEN: usize = 11;
const BLOCK_ACK_HEADER_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAck {
    pub next_wanted_block: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(FountainPacket),
    BlockAck(BlockAck),
}

/// Encode a fountain packet as a Data frame.
pub fn encode_data(packet: &FountainPacket) -> Bytes {
    let mut buf = BytesMut::with_capacity(DATA_HEADER_LEN + packet.payload.len());
    buf.extend_from_slice(&[DATA_TYPE]);
    buf.extend_from_slice(&packet.block_number.to_be_bytes());
    buf.extend_from_slice(&packet.sequence_number.to_be_bytes());
    buf.extend_from_slice(&(packet.block_seed as u32).to_be_bytes());
    buf.extend_from_slice(&(packet.payload.len() as u16).to_be_bytes());
    buf.extend_from_slice(&packet.payload);
    buf.freeze()
}

/// Encode a Block ACK frame.
pub fn encode_block_ack(ack: &BlockAck) -> Bytes {
    let mut buf = BytesMut::with_capacity(BLOCK_ACK_HEADER_LEN);
    buf.extend_from_slice(&[BLOCK_ACK_TYPE]);
    buf.extend_from_slice(&ack.next_wanted_block.to_be_bytes());
    buf.freeze()
}

/// Parse a frame of either type. Fails with `Malformed` on unknown type,
/// short input, or a declared payload length exceeding the buffer.
pub fn decode(bytes: &Bytes) -> Result<Frame> {
    if bytes.is_empty() {
        return Err(Error::Malformed("empty frame"));
    }
    match bytes[0] {
        DATA_TYPE => decode_data(bytes).map(Frame::Data),
        BLOCK_ACK_TYPE => decode_block_ack(bytes).map(Frame::BlockAck),
        _ => Err(Error::Malformed("unknown frame type")),
    }
}

fn decode_data(bytes: &Bytes) -> Result<FountainPacket> {
    if bytes.len() < DATA_HEADER_LEN {
        return Err(Error::Malformed("data frame shorter than header"));
    }
    let mut cursor = &bytes[1..];
    let block_number = cursor.get_u16();
    let sequence_number = cursor.get_u16();
    let block_seed = cursor.get_u32() as i32;
    let payload_length = cursor.get_u16() as usize;

    if bytes.len() != DATA_HEADER_LEN + payload_length {
        return Err(Error::Malformed("declared payload length mismatch"));
    }

    Ok(FountainPacket {
        block_number,
        sequence_number,
        block_seed,
        payload: bytes.slice(DATA_HEADER_LEN..),
    })
}

fn decode_block_ack(bytes: &Bytes) -> Result<BlockAck> {
    if bytes.len() != BLOCK_ACK_HEADER_LEN {
        return Err(Error::Malformed("block ack frame wrong length"));
    }
    let next_wanted_block = u16::from_be_bytes([bytes[1], bytes[2]]);
    Ok(BlockAck { next_wanted_block })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_matches_spec_scenario_5() {
        let packet = FountainPacket {
            block_number: 4,
            sequence_number: 0xedde,
            block_seed: 0xffee00bbu32 as i32,
            payload: Bytes::from_static(&[0x11, 0x22, 0x33]),
        };
        let encoded = encode_data(&packet);
        assert_eq!(
            encoded.as_ref(),
            &[
                0x00, 0x00, 0x04, 0xED, 0xDE, 0xFF, 0xEE, 0x00, 0xBB, 0x00, 0x03, 0x11, 0x22, 0x33
            ]
        );

        match decode(&encoded).unwrap() {
            Frame::Data(p) => {
                assert_eq!(p.block_number, 4);
                assert_eq!(p.sequence_number, 0xedde);
                assert_eq!(p.block_seed, 0xffee00bbu32 as i32);
                assert_eq!(p.payload.as_ref(), &[0x11, 0x22, 0x33]);
            }
            other => panic!("expected Data frame, got {other:?}"),
        }
    }

    #[test]
    fn block_ack_matches_spec_scenario_6() {
        let ack = BlockAck {
            next_wanted_block: 0x00FF,
        };
        assert_eq!(encode_block_ack(&ack).as_ref(), &[0x01, 0x00, 0xFF]);

        let ack2 = BlockAck {
            next_wanted_block: 0xFF00,
        };
        assert_eq!(encode_block_ack(&ack2).as_ref(), &[0x01, 0xFF, 0x00]);
    }

    #[test]
    fn block_ack_next_wanted_overflow_is_a_type_error() {
        // 0x10000 does not fit in u16 at all; this is a compile-time
        // property of the type, exercised here via the widest valid value.
        let ack = BlockAck {
            next_wanted_block: u16::MAX,
        };
        let encoded = encode_block_ack(&ack);
        assert_eq!(encoded.len(), BLOCK_ACK_HEADER_LEN);
    }

    #[test]
    fn decode_rejects_short_data_frame() {
        let short = Bytes::from_static(&[0x00, 0x00, 0x01]);
        assert!(matches!(decode(&short), Err(Error::Malformed(_))));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x00]);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&5u16.to_be_bytes()); // claims 5 bytes of payload
        buf.extend_from_slice(&[0x11]); // but only 1 is present
        assert!(matches!(decode(&buf.freeze()), Err(Error::Malformed(_))));
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let bad = Bytes::from_static(&[0x02, 0, 0]);
        assert!(matches!(decode(&bad), Err(Error::Malformed(_))));
    }
}
