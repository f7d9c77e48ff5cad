//! # UEP packet framing (C10)
//!
//! The payload format carried inside one LT input packet, once the LT/wire
//! framing has been stripped: a 4-byte big-endian sequence number (high bit
//! reserved as a padding flag) followed by the payload bytes. Grounded in
//! idiom on the teacher's `wire.rs` fixed-width header encode/decode
//! functions, generalized to this crate's one-field header.

use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};

pub const MAX_SEQNO: u32 = 0x7FFF_FFFF;
const PADDING_BIT: u32 = 0x8000_0000;
/// Size in bytes of the sequence-number/padding-flag header prepended to
/// every UEP packet's payload.
pub const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UepPacket {
    pub seqno: u32,
    pub padding: bool,
    pub payload: Bytes,
}

impl UepPacket {
    pub fn new(seqno: u32, padding: bool, payload: Bytes) -> Result<Self> {
        if seqno > MAX_SEQNO {
            return Err(Error::InvalidArgument(format!(
                "seqno {seqno} exceeds MAX_SEQNO"
            )));
        }
        Ok(UepPacket {
            seqno,
            padding,
            payload,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        let mut header = self.seqno;
        if self.padding {
            header |= PADDING_BIT;
        }
        buf.extend_from_slice(&header.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(bytes: &Bytes) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Malformed("uep packet shorter than header"));
        }
        let header = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let padding = header & PADDING_BIT != 0;
        let seqno = header & MAX_SEQNO;
        Ok(UepPacket {
            seqno,
            padding,
            payload: bytes.slice(HEADER_LEN..),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields() {
        let p = UepPacket::new(12345, false, Bytes::from_static(b"hello")).unwrap();
        let encoded = p.encode();
        let decoded = UepPacket::decode(&encoded).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn padding_flag_round_trips() {
        let p = UepPacket::new(0, true, Bytes::from_static(b"pad")).unwrap();
        let encoded = p.encode();
        let decoded = UepPacket::decode(&encoded).unwrap();
        assert!(decoded.padding);
        assert_eq!(decoded.seqno, 0);
    }

    #[test]
    fn rejects_seqno_overflow() {
        assert!(UepPacket::new(MAX_SEQNO + 1, false, Bytes::new()).is_err());
    }

    #[test]
    fn decode_rejects_short_input() {
        let short = Bytes::from_static(&[0u8, 1, 2]);
        assert!(matches!(UepPacket::decode(&short), Err(Error::Malformed(_))));
    }
}
