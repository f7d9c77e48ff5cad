//! # Block encoder / decoder (C6, C7)
//!
//! `BlockEncoder` holds one full input block and a [`RowGenerator`];
//! `BlockDecoder` accepts coded symbols for one `(block_number,
//! block_seed)` pair, replays the same row generator to learn the
//! encoder's graph, and drives a [`BipartiteGraph`] to decode. Grounded in
//! idiom on the teacher's `codec.rs::FecEncoder`/`FecDecoder` (per-block
//! accumulation, "push until complete" shape) but the decode strategy
//! itself — caching rows and rerunning MP on every push for partial
//! decoding across retransmissions — has no equivalent there; it follows
//! `original_source/src/block_decoder.cpp` instead.

use crate::counter::Counter;
use crate::error::{Error, Result};
use crate::graph::{BipartiteGraph, ByteSymbol};
use crate::row::RowGenerator;
use bytes::Bytes;

/// Sequence numbers within a block saturate at this value, matching the
/// 16-bit wire field (§4.11).
pub const MAX_SEQUENCE: u64 = 0xFFFF;

/// A coded (fountain) packet: a payload plus the block metadata the wire
/// codec will frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FountainPacket {
    pub block_number: u16,
    pub sequence_number: u16,
    pub block_seed: i32,
    pub payload: Bytes,
}

/// Holds one full block of `K` input packets and XORs rows into coded
/// symbols on demand.
pub struct BlockEncoder {
    k: usize,
    payload_size: usize,
    inputs: Option<Vec<Bytes>>,
    row_gen: RowGenerator,
    block_number: u16,
    block_seed: i32,
    sequence: Counter,
}

impl BlockEncoder {
    pub fn new(k: usize, payload_size: usize, row_gen: RowGenerator) -> Self {
        BlockEncoder {
            k,
            payload_size,
            inputs: None,
            row_gen,
            block_number: 0,
            block_seed: 0,
            sequence: Counter::new(MAX_SEQUENCE),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Install a full block of `K` packets, tagged with `(block_number, seed)`.
    /// Resets the sequence counter and reseeds the row generator.
    pub fn set_block(&mut self, inputs: Vec<Bytes>, block_number: u16, seed: i32) {
        debug_assert_eq!(inputs.len(), self.k);
        self.inputs = Some(inputs);
        self.block_number = block_number;
        self.block_seed = seed;
        self.sequence = Counter::new(MAX_SEQUENCE);
        self.row_gen.reset(seed as u32);
    }

    pub fn has_block(&self) -> bool {
        self.inputs.is_some()
    }

    /// Draw the next row, XOR the referenced inputs together (starting
    /// from a deep copy of the first), and return the coded packet.
    pub fn next_coded(&mut self) -> Result<FountainPacket> {
        let inputs = self.inputs.as_ref().ok_or(Error::NoBlock)?;
        let row = self.row_gen.next_row();
        debug_assert!(!row.is_empty());

        let mut acc = inputs[row[0] as usize].to_vec();
        for &idx in &row[1..] {
            crate::buffer::xor_inplace(&mut acc, &inputs[idx as usize])?;
        }

        let seq = self.sequence.next()? as u16;

        Ok(FountainPacket {
            block_number: self.block_number,
            sequence_number: seq,
            block_seed: self.block_seed,
            payload: Bytes::from(acc),
        })
    }
}

/// Accepts coded symbols for exactly one `(block_number, block_seed)`
/// pair, replays the row generator to cache rows, and drives MP decoding.
pub struct BlockDecoder {
    k: usize,
    payload_size: usize,
    row_gen: RowGenerator,
    block_number: Option<u16>,
    block_seed: Option<i32>,
    rows: Vec<Vec<u32>>,
    seen_sequences: Vec<bool>,
    graph: BipartiteGraph<ByteSymbol>,
}

impl BlockDecoder {
    pub fn new(k: usize, payload_size: usize, row_gen: RowGenerator) -> Self {
        BlockDecoder {
            k,
            payload_size,
            row_gen,
            block_number: None,
            block_seed: None,
            rows: Vec::new(),
            seen_sequences: Vec::new(),
            graph: BipartiteGraph::new_context(k),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// (Re)start decoding a fresh block for `(block_number, seed)`.
    pub fn start_block(&mut self, block_number: u16, seed: i32) {
        self.block_number = Some(block_number);
        self.block_seed = Some(seed);
        self.rows.clear();
        self.seen_sequences.clear();
        self.row_gen.reset(seed as u32);
        self.graph.reset();
    }

    pub fn decoded_count(&self) -> usize {
        self.graph.decoded_count()
    }

    pub fn is_complete(&self) -> bool {
        self.graph.decoded_count() == self.k
    }

    pub fn decoded_input(&self, index: usize) -> Option<&[u8]> {
        self.graph.input(index).bytes()
    }

    /// Ensure the row cache holds rows `0..=seq`, replaying the row
    /// generator as needed.
    fn ensure_rows_through(&mut self, seq: u16) {
        while self.rows.len() <= seq as usize {
            self.rows.push(self.row_gen.next_row());
        }
    }

    /// Push a coded packet. Returns `Ok(true)` if it was newly applied,
    /// `Ok(false)` if it was a silently-discarded duplicate.
    pub fn push(&mut self, packet: &FountainPacket) -> Result<bool> {
        if self.block_number.is_none() {
            self.start_block(packet.block_number, packet.block_seed);
        }

        if self.block_number != Some(packet.block_number)
            || self.block_seed != Some(packet.block_seed)
            || packet.payload.len() != self.payload_size
        {
            return Err(Error::BlockMismatch {
                expected_block: self.block_number.unwrap_or(packet.block_number),
                expected_seed: self.block_seed.unwrap_or(packet.block_seed),
                got_block: packet.block_number,
                got_seed: packet.block_seed,
            });
        }

        let seq = packet.sequence_number as usize;
        if self.seen_sequences.len() <= seq {
            self.seen_sequences.resize(seq + 1, false);
        }
        if self.seen_sequences[seq] {
            return Ok(false);
        }
        self.seen_sequences[seq] = true;

        self.ensure_rows_through(packet.sequence_number);
        let row = self.rows[seq].clone();
        self.graph
            .add_output(ByteSymbol::new(packet.payload.to_vec()), &row)?;
        self.graph.run();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{DegreeDistribution, Soliton};

    fn row_gen(k: u32, seed: u32) -> RowGenerator {
        RowGenerator::new(seed, k, DegreeDistribution::Soliton(Soliton::new(k)))
    }

    #[test]
    fn encoder_fails_without_block() {
        let mut enc = BlockEncoder::new(4, 8, row_gen(4, 1));
        assert_eq!(enc.next_coded().unwrap_err(), Error::NoBlock);
    }

    #[test]
    fn encode_decode_round_trip_no_loss() {
        let k = 8usize;
        let payload_size = 4;
        let inputs: Vec<Bytes> = (0..k as u8)
            .map(|i| Bytes::from(vec![i, i, i, i]))
            .collect();

        let mut enc = BlockEncoder::new(k, payload_size, row_gen(k as u32, 777));
        enc.set_block(inputs.clone(), 1, 777);

        let mut dec = BlockDecoder::new(k, payload_size, row_gen(k as u32, 777));
        dec.start_block(1, 777);

        // Plenty of redundancy to decode with high probability.
        for _ in 0..(k * 6) {
            let coded = enc.next_coded().unwrap();
            dec.push(&coded).unwrap();
            if dec.is_complete() {
                break;
            }
        }

        assert!(dec.is_complete(), "decoder should fully recover the block");
        for i in 0..k {
            assert_eq!(dec.decoded_input(i).unwrap(), inputs[i].as_ref());
        }
    }

    #[test]
    fn decoder_rejects_block_mismatch() {
        let mut dec = BlockDecoder::new(2, 4, row_gen(2, 1));
        dec.start_block(5, 100);
        let bad = FountainPacket {
            block_number: 6,
            sequence_number: 0,
            block_seed: 100,
            payload: Bytes::from(vec![0u8; 4]),
        };
        assert!(matches!(dec.push(&bad), Err(Error::BlockMismatch { .. })));
    }

    #[test]
    fn decoder_discards_duplicate_sequence() {
        let mut dec = BlockDecoder::new(2, 4, row_gen(2, 42));
        dec.start_block(0, 42);
        let mut enc = BlockEncoder::new(2, 4, row_gen(2, 42));
        enc.set_block(vec![Bytes::from(vec![1, 1, 1, 1]), Bytes::from(vec![2, 2, 2, 2])], 0, 42);

        let p0 = enc.next_coded().unwrap();
        assert!(dec.push(&p0).unwrap());
        assert!(!dec.push(&p0.clone()).unwrap());
    }
}
