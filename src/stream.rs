//! # LT encoder/decoder stream layer (C8)
//!
//! Groups a FIFO of input packets into fixed-size blocks and drives a
//! [`BlockEncoder`]/[`BlockDecoder`] pair per block, advancing the block
//! number as blocks complete or get skipped. Grounded in idiom on the
//! teacher's `codec.rs` generation-window bookkeeping (current generation +
//! lookahead, stale/forward/current classification) but the skip-ahead and
//! padding behavior follows `original_source/src/encoder.cpp` /
//! `decoder.cpp`, which this module has no single direct teacher
//! counterpart for.

use crate::block::{BlockDecoder, BlockEncoder, FountainPacket};
use crate::counter::{is_after, CircularCounter};
use crate::distribution::DegreeDistribution;
use crate::error::{Error, Result};
use crate::packet::{UepPacket, HEADER_LEN};
use crate::row::RowGenerator;
use bytes::Bytes;
use rand::Rng;
use tracing::debug;

/// Build one manufactured padding packet, UEP-framed with the padding flag
/// set, sized to fit exactly in `payload_size` bytes once framed.
fn padding_packet(payload_size: usize) -> Bytes {
    let raw = Bytes::from(vec![0u8; payload_size.saturating_sub(HEADER_LEN)]);
    UepPacket::new(0, true, raw)
        .expect("seqno 0 never exceeds MAX_SEQNO")
        .encode()
}

/// `(max + 1)` block numbers wrap modulo this; forward switches beyond this
/// distance are treated as stale rather than "the future".
pub const BLOCK_WINDOW: u64 = 1 << 15;
const BLOCK_NUMBER_MAX: u64 = 0xFFFF;

/// Current lifecycle state of the decoder, mirrored for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Receiving,
    BlockEnqueued,
}

/// Source of per-block seeds, reseeded once per `next_block()` call.
pub struct SeedSource {
    rng: rand::rngs::StdRng,
}

impl SeedSource {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        SeedSource {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    fn next_seed(&mut self) -> i32 {
        self.rng.random::<i32>()
    }
}

/// FIFO-fed LT encoder: groups source packets into blocks of `k` and emits
/// coded packets tagged with a circular block number.
pub struct LtEncoder {
    k: usize,
    payload_size: usize,
    degree_distribution: DegreeDistribution,
    block_number: CircularCounter,
    seeds: SeedSource,
    current_seed: i32,
    block: BlockEncoder,
    pending: Vec<Bytes>,
}

impl LtEncoder {
    pub fn new(
        k: usize,
        payload_size: usize,
        degree_distribution: DegreeDistribution,
        seed_source_seed: u64,
    ) -> Self {
        let block_number = CircularCounter::new(BLOCK_NUMBER_MAX);
        let mut seeds = SeedSource::new(seed_source_seed);
        let current_seed = seeds.next_seed();
        let block = BlockEncoder::new(
            k,
            payload_size,
            RowGenerator::new(current_seed as u32, k as u32, degree_distribution),
        );
        LtEncoder {
            k,
            payload_size,
            degree_distribution,
            block_number,
            seeds,
            current_seed,
            block,
            pending: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn current_block_number(&self) -> u16 {
        self.block_number.current() as u16
    }

    /// Queue one source packet. Callers pad with `pad_partial_block` before
    /// draining if the source runs dry mid-block.
    pub fn enqueue(&mut self, payload: Bytes) {
        self.pending.push(payload);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Complete the current partial block with manufactured padding
    /// packets, UEP-framed with the padding flag set so the receiver can
    /// tell them apart from real payloads.
    pub fn pad_partial_block(&mut self) {
        while self.pending.len() % self.k != 0 {
            self.pending.push(padding_packet(self.payload_size));
        }
    }

    /// True once a full `k`-packet block is ready to install.
    pub fn has_full_block(&self) -> bool {
        self.pending.len() >= self.k
    }

    /// Install the next full block (draining `k` packets from the FIFO),
    /// advancing the block number by one and reseeding.
    pub fn next_block(&mut self) -> Result<()> {
        if self.pending.len() < self.k {
            return Err(Error::NoBlock);
        }
        let drained: Vec<Bytes> = self.pending.drain(0..self.k).collect();
        self.block_number.next();
        self.current_seed = self.seeds.next_seed();
        self.block = BlockEncoder::new(
            self.k,
            self.payload_size,
            RowGenerator::new(self.current_seed as u32, self.k as u32, self.degree_distribution),
        );
        self.block
            .set_block(drained, self.current_block_number(), self.current_seed);
        debug!(block_number = self.current_block_number(), "lt encoder: next_block");
        Ok(())
    }

    /// Skip forward to block `bn`, up to `BLOCK_WINDOW` blocks ahead,
    /// dropping the skipped input blocks and re-padding with empty packets.
    pub fn skip_to_block(&mut self, bn: u16) -> Result<()> {
        let delta = crate::counter::forward_distance(
            self.block_number.current(),
            bn as u64,
            BLOCK_NUMBER_MAX,
        );
        if delta == 0 || delta > BLOCK_WINDOW {
            return Err(Error::Stale {
                block: bn,
                current: self.current_block_number(),
            });
        }
        let needed_packets = delta as usize * self.k;
        while self.pending.len() < needed_packets {
            self.pending.push(padding_packet(self.payload_size));
        }
        self.pending.drain(0..(needed_packets - self.k));
        self.block_number.set(bn as u64);
        self.current_seed = self.seeds.next_seed();
        let drained: Vec<Bytes> = self.pending.drain(0..self.k).collect();
        self.block = BlockEncoder::new(
            self.k,
            self.payload_size,
            RowGenerator::new(self.current_seed as u32, self.k as u32, self.degree_distribution),
        );
        self.block.set_block(drained, bn, self.current_seed);
        Ok(())
    }

    pub fn has_block(&self) -> bool {
        self.block.has_block()
    }

    pub fn next_coded(&mut self) -> Result<FountainPacket> {
        self.block.next_coded()
    }
}

/// LT decoder: accepts coded packets, classifies them against the current
/// block window, and yields completed blocks as `Vec<Option<Bytes>>` (one
/// slot per input index, `None` where undecoded).
pub struct LtDecoder {
    k: usize,
    payload_size: usize,
    degree_distribution: DegreeDistribution,
    current_block: u16,
    decoder: BlockDecoder,
    started: bool,
    state: DecoderState,
    total_received: u64,
    total_decoded: u64,
    total_failed: u64,
}

impl LtDecoder {
    pub fn new(k: usize, payload_size: usize, degree_distribution: DegreeDistribution) -> Self {
        LtDecoder {
            k,
            payload_size,
            degree_distribution,
            current_block: 0,
            decoder: BlockDecoder::new(k, payload_size, RowGenerator::new(0, k as u32, degree_distribution)),
            started: false,
            state: DecoderState::Receiving,
            total_received: 0,
            total_decoded: 0,
            total_failed: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn current_block_number(&self) -> u16 {
        self.current_block
    }

    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    pub fn total_decoded(&self) -> u64 {
        self.total_decoded
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed
    }

    fn snapshot_block(&self) -> Vec<Option<Bytes>> {
        (0..self.k)
            .map(|i| self.decoder.decoded_input(i).map(|b| Bytes::copy_from_slice(b)))
            .collect()
    }

    fn start_new_block(&mut self, bn: u16, seed: i32) {
        self.current_block = bn;
        self.decoder = BlockDecoder::new(
            self.k,
            self.payload_size,
            RowGenerator::new(seed as u32, self.k as u32, self.degree_distribution),
        );
        self.decoder.start_block(bn, seed);
        self.started = true;
        self.state = DecoderState::Receiving;
    }

    /// Feed one coded packet. Returns `Some(block)` if this push completed
    /// a block (the just-finished block's snapshot, full or partial on a
    /// forward switch), else `None`.
    pub fn push(&mut self, packet: &FountainPacket) -> Result<Option<Vec<Option<Bytes>>>> {
        self.total_received += 1;

        if !self.started {
            self.start_new_block(packet.block_number, packet.block_seed);
        }

        if packet.block_number == self.current_block {
            match self.decoder.push(packet) {
                Ok(true) => {
                    if self.decoder.is_complete() {
                        self.total_decoded += 1;
                        self.state = DecoderState::BlockEnqueued;
                        return Ok(Some(self.snapshot_block()));
                    }
                    Ok(None)
                }
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            }
        } else {
            if !is_after(self.current_block as u64, packet.block_number as u64, BLOCK_NUMBER_MAX) {
                return Err(Error::Stale {
                    block: packet.block_number,
                    current: self.current_block,
                });
            }

            // Forward switch: the old (possibly partial) block is flushed
            // as-is, then the new packet starts a fresh block.
            let old_complete = self.decoder.is_complete();
            let old_snapshot = self.snapshot_block();
            if old_complete {
                self.total_decoded += 1;
            } else if self.started {
                self.total_failed += 1;
            }

            self.start_new_block(packet.block_number, packet.block_seed);
            self.decoder.push(packet)?;
            self.state = DecoderState::Receiving;
            Ok(Some(old_snapshot))
        }
    }

    /// Advance to block `bn`, declaring all skipped blocks (and the current
    /// one, if incomplete) failed.
    pub fn flush(&mut self, bn: u16) {
        if self.started && !self.decoder.is_complete() {
            self.total_failed += 1;
        }
        let delta = crate::counter::forward_distance(self.current_block as u64, bn as u64, BLOCK_NUMBER_MAX);
        if delta > 1 {
            self.total_failed += delta - 1;
        }
        self.current_block = bn;
        self.started = false;
        self.state = DecoderState::Receiving;
    }

    pub fn flush_n_blocks(&mut self, n: u16) {
        let target = ((self.current_block as u64 + n as u64) % (BLOCK_NUMBER_MAX + 1)) as u16;
        self.flush(target);
    }
}
