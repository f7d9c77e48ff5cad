//! # UEP expander / deduplicator (C9)
//!
//! Unequal error protection on top of the LT stream layer: priority
//! sub-blocks get repeated a per-class number of times and the whole
//! pattern is duplicated `EF` times before handing packets to the LT
//! encoder; the receiver collapses the expanded block back down via a
//! fixed prefix-sum index mapping. Grounded in idiom on the teacher's
//! `pool.rs` multi-queue buffering (one FIFO per class, drain-when-full)
//! but the repetition/expansion scheme itself follows
//! `original_source/uep_encoder.hpp` / `uep_decoder.cpp`, which have no
//! teacher counterpart.

use crate::error::{Error, Result};
use crate::packet::UepPacket;
use bytes::Bytes;
use std::collections::VecDeque;
use tracing::debug;

/// Static configuration shared by expander and deduplicator: sub-block
/// sizes, repetition factors, and the global expansion factor.
#[derive(Debug, Clone)]
pub struct UepLayout {
    ks: Vec<usize>,
    rfs: Vec<usize>,
    ef: usize,
    /// Prefix sums of `ks`, so `base[i]` is the first global input index of
    /// priority class `i`.
    base: Vec<usize>,
    kin: usize,
    rep_len: usize,
    kout: usize,
}

impl UepLayout {
    pub fn new(ks: Vec<usize>, rfs: Vec<usize>, ef: usize) -> Result<Self> {
        if ks.is_empty() || ks.len() != rfs.len() {
            return Err(Error::InvalidArgument(
                "Ks and RFs must be non-empty and equal length".into(),
            ));
        }
        if ks.iter().any(|&k| k == 0) || rfs.iter().any(|&r| r == 0) || ef == 0 {
            return Err(Error::InvalidArgument(
                "Ks, RFs, and EF entries must all be positive".into(),
            ));
        }
        let mut base = Vec::with_capacity(ks.len());
        let mut acc = 0;
        for &k in &ks {
            base.push(acc);
            acc += k;
        }
        let kin = acc;
        let rep_len: usize = ks.iter().zip(&rfs).map(|(&k, &r)| k * r).sum();
        let kout = rep_len * ef;
        Ok(UepLayout {
            ks,
            rfs,
            ef,
            base,
            kin,
            rep_len,
            kout,
        })
    }

    pub fn priorities(&self) -> usize {
        self.ks.len()
    }

    pub fn ks(&self, i: usize) -> usize {
        self.ks[i]
    }

    pub fn kin(&self) -> usize {
        self.kin
    }

    pub fn kout(&self) -> usize {
        self.kout
    }

    pub fn ef(&self) -> usize {
        self.ef
    }

    /// Map an expanded-block index in `[0, Kout)` to its original global
    /// input index in `[0, Kin)`, via prefix sums over the per-priority
    /// repeated runs.
    pub fn map_in2out(&self, expanded_index: usize) -> usize {
        debug_assert!(expanded_index < self.kout);
        let pos = expanded_index % self.rep_len;
        let mut offset = 0;
        for i in 0..self.ks.len() {
            let run = self.ks[i] * self.rfs[i];
            if pos < offset + run {
                let local = (pos - offset) % self.ks[i];
                return self.base[i] + local;
            }
            offset += run;
        }
        unreachable!("pos must fall within one priority run")
    }

    /// Which priority class owns original input index `global_index`.
    pub fn priority_of(&self, global_index: usize) -> usize {
        self.base
            .iter()
            .rposition(|&b| b <= global_index)
            .expect("global_index within Kin")
    }
}

/// Builds expanded LT input blocks from per-priority source queues.
pub struct UepExpander {
    layout: UepLayout,
    queues: Vec<VecDeque<Bytes>>,
    seqno_ctr: u32,
    payload_size: usize,
}

impl UepExpander {
    pub fn new(layout: UepLayout, payload_size: usize) -> Self {
        let n = layout.priorities();
        UepExpander {
            layout,
            queues: (0..n).map(|_| VecDeque::new()).collect(),
            seqno_ctr: 0,
            payload_size,
        }
    }

    fn next_seqno(&mut self) -> u32 {
        let s = self.seqno_ctr;
        self.seqno_ctr = (self.seqno_ctr + 1) % (crate::packet::MAX_SEQNO + 1);
        s
    }

    /// Wrap `payload` as a UEP packet and enqueue it under `priority`.
    pub fn enqueue(&mut self, priority: usize, payload: Bytes, padding: bool) -> Result<()> {
        let seqno = self.next_seqno();
        let framed = UepPacket::new(seqno, padding, payload)?.encode();
        self.queues[priority].push_back(framed);
        Ok(())
    }

    pub fn has_full_set(&self) -> bool {
        (0..self.layout.priorities()).all(|i| self.queues[i].len() >= self.layout.ks(i))
    }

    /// True if every priority queue is empty — nothing left to pad or
    /// expand.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    /// Pad every priority queue short of a full sub-block with manufactured
    /// padding packets, so a source that runs dry mid-sub-block can still be
    /// drained (§4.8/§4.9). Returns the number of padding packets pushed.
    pub fn pad_partial_set(&mut self) -> Result<usize> {
        let mut padded = 0;
        for i in 0..self.layout.priorities() {
            while self.queues[i].len() < self.layout.ks(i) {
                let seqno = self.next_seqno();
                let raw = Bytes::from(vec![0u8; self.payload_size.saturating_sub(crate::packet::HEADER_LEN)]);
                let framed = UepPacket::new(seqno, true, raw)?.encode();
                self.queues[i].push_back(framed);
                padded += 1;
            }
        }
        Ok(padded)
    }

    /// Drain one sub-block from each priority queue and build the expanded
    /// block: per-priority repetition, then `EF` global repetitions.
    pub fn expand(&mut self) -> Result<Vec<Bytes>> {
        if !self.has_full_set() {
            return Err(Error::InvalidArgument(
                "not every priority queue holds a full sub-block".into(),
            ));
        }

        let mut sub_blocks = Vec::with_capacity(self.layout.priorities());
        for i in 0..self.layout.priorities() {
            let drained: Vec<Bytes> = self.queues[i].drain(0..self.layout.ks(i)).collect();
            sub_blocks.push(drained);
        }

        let mut rep = Vec::with_capacity(self.layout.rep_len);
        for (i, sub) in sub_blocks.iter().enumerate() {
            for _ in 0..self.layout.rfs[i] {
                rep.extend(sub.iter().cloned());
            }
        }
        debug_assert_eq!(rep.len(), self.layout.rep_len);

        let mut expanded = Vec::with_capacity(self.layout.kout());
        for _ in 0..self.layout.ef() {
            expanded.extend(rep.iter().cloned());
        }
        debug!(len = expanded.len(), "uep expander: expanded block");
        Ok(expanded)
    }
}

/// Collapses a decoded expanded block back to per-priority packet streams,
/// draining them in strict sequence-number order.
pub struct UepDeduplicator {
    layout: UepLayout,
    priority_queues: Vec<VecDeque<UepPacket>>,
    decoded_count: Vec<u64>,
    failed_count: Vec<u64>,
    empty_queued_count: u64,
    next_expected_seqno: u32,
    /// Priority class of each slot `on_block` found missing, in the order
    /// discovered, so a later empty `next_decoded` can still attribute the
    /// loss to the right class even though the lost packet never carried a
    /// recoverable sequence number.
    pending_miss_priorities: VecDeque<usize>,
}

impl UepDeduplicator {
    pub fn new(layout: UepLayout) -> Self {
        let n = layout.priorities();
        UepDeduplicator {
            layout,
            priority_queues: (0..n).map(|_| VecDeque::new()).collect(),
            decoded_count: vec![0; n],
            failed_count: vec![0; n],
            empty_queued_count: 0,
            next_expected_seqno: 0,
            pending_miss_priorities: VecDeque::new(),
        }
    }

    pub fn decoded_count(&self, priority: usize) -> u64 {
        self.decoded_count[priority]
    }

    pub fn failed_count(&self, priority: usize) -> u64 {
        self.failed_count[priority]
    }

    pub fn empty_queued_count(&self) -> u64 {
        self.empty_queued_count
    }

    /// Feed one LT-decoded expanded block: `Kout` optional slots, `None`
    /// where the LT layer could not recover that symbol. Keeps the first
    /// non-empty payload per original sub-block slot and enqueues it by
    /// priority.
    pub fn on_block(&mut self, slots: Vec<Option<Bytes>>) {
        debug_assert_eq!(slots.len(), self.layout.kout());
        let mut collapsed: Vec<Option<Bytes>> = vec![None; self.layout.kin()];

        for (expanded_idx, slot) in slots.into_iter().enumerate() {
            if let Some(payload) = slot {
                let global = self.layout.map_in2out(expanded_idx);
                if collapsed[global].is_none() {
                    collapsed[global] = Some(payload);
                }
            }
        }

        for (global, slot) in collapsed.into_iter().enumerate() {
            let priority = self.layout.priority_of(global);
            match slot {
                Some(bytes) => {
                    if let Ok(packet) = UepPacket::decode(&bytes) {
                        self.priority_queues[priority].push_back(packet);
                        self.decoded_count[priority] += 1;
                    } else {
                        self.failed_count[priority] += 1;
                        self.pending_miss_priorities.push_back(priority);
                    }
                }
                None => {
                    self.failed_count[priority] += 1;
                    self.pending_miss_priorities.push_back(priority);
                }
            }
        }
        debug!(
            decoded = ?self.decoded_count,
            failed = ?self.failed_count,
            "uep deduplicator: block collapsed"
        );
    }

    /// Pop the packet with the next expected sequence number across all
    /// priority queues, or `None` (counted as an empty slot) if it hasn't
    /// arrived in any queue yet. The returned priority is always the right
    /// class: for a hit it comes off the matched packet's queue; for a miss
    /// it comes off `pending_miss_priorities`, which `on_block` filled in
    /// the same order the losses were discovered (a lost packet carries no
    /// recoverable sequence number of its own).
    pub fn next_decoded(&mut self) -> (usize, Option<UepPacket>) {
        for (priority, queue) in self.priority_queues.iter_mut().enumerate() {
            if let Some(front) = queue.front() {
                if front.seqno == self.next_expected_seqno {
                    self.next_expected_seqno =
                        (self.next_expected_seqno + 1) % (crate::packet::MAX_SEQNO + 1);
                    let packet = queue.pop_front().expect("front just matched above");
                    return (priority, Some(packet));
                }
            }
        }
        self.empty_queued_count += 1;
        self.next_expected_seqno = (self.next_expected_seqno + 1) % (crate::packet::MAX_SEQNO + 1);
        let priority = self.pending_miss_priorities.pop_front().unwrap_or(0);
        (priority, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> UepLayout {
        UepLayout::new(vec![25, 75], vec![2, 1], 2).unwrap()
    }

    #[test]
    fn layout_matches_spec_sizes() {
        let l = layout();
        assert_eq!(l.kin(), 100);
        assert_eq!(l.rep_len, 25 * 2 + 75 * 1);
        assert_eq!(l.kout(), l.rep_len * 2);
    }

    #[test]
    fn map_in2out_is_surjective_with_expected_preimage_sizes() {
        let l = layout();
        let mut hits = vec![0usize; l.kin()];
        for idx in 0..l.kout() {
            hits[l.map_in2out(idx)] += 1;
        }
        for i in 0..25 {
            assert_eq!(hits[i], 2 * 2); // RFs[0] * EF
        }
        for i in 25..100 {
            assert_eq!(hits[i], 1 * 2); // RFs[1] * EF
        }
    }

    #[test]
    fn expander_requires_full_set_before_expand() {
        let l = UepLayout::new(vec![2, 2], vec![1, 1], 1).unwrap();
        let mut exp = UepExpander::new(l, 16);
        exp.enqueue(0, Bytes::from_static(b"aa"), false).unwrap();
        assert!(!exp.has_full_set());
        assert!(exp.expand().is_err());
    }

    #[test]
    fn pad_partial_set_completes_every_priority_queue() {
        let l = UepLayout::new(vec![2, 2], vec![1, 1], 1).unwrap();
        let mut exp = UepExpander::new(l, 16);
        exp.enqueue(0, Bytes::from_static(b"aa"), false).unwrap();
        let padded = exp.pad_partial_set().unwrap();
        assert_eq!(padded, 3);
        assert!(exp.has_full_set());
        let expanded = exp.expand().unwrap();
        assert_eq!(expanded.len(), 4);
    }

    #[test]
    fn expand_then_dedup_round_trips_with_no_loss() {
        let l = UepLayout::new(vec![2, 2], vec![2, 1], 1).unwrap();
        let mut exp = UepExpander::new(l.clone(), 16);
        for i in 0..2u8 {
            exp.enqueue(0, Bytes::from(vec![i]), false).unwrap();
        }
        for i in 2..4u8 {
            exp.enqueue(1, Bytes::from(vec![i]), false).unwrap();
        }
        let expanded = exp.expand().unwrap();
        assert_eq!(expanded.len(), l.kout());

        let mut dedup = UepDeduplicator::new(l);
        let slots: Vec<Option<Bytes>> = expanded.into_iter().map(Some).collect();
        dedup.on_block(slots);

        for expect in 0..4u8 {
            let (_, slot) = dedup.next_decoded();
            assert_eq!(slot.unwrap().payload.as_ref(), &[expect]);
        }
    }

    #[test]
    fn missing_slots_report_the_owning_priority() {
        let l = UepLayout::new(vec![2, 2], vec![1, 1], 1).unwrap();
        let mut dedup = UepDeduplicator::new(l);
        // Kout == Kin == 4 here; drop the two priority-1 slots (global 2, 3).
        let slots: Vec<Option<Bytes>> = vec![
            Some(Bytes::from(UepPacket::new(0, false, Bytes::from_static(b"a")).unwrap().encode())),
            Some(Bytes::from(UepPacket::new(1, false, Bytes::from_static(b"b")).unwrap().encode())),
            None,
            None,
        ];
        dedup.on_block(slots);

        let (p0, s0) = dedup.next_decoded();
        assert_eq!(p0, 0);
        assert!(s0.is_some());
        let (p1, s1) = dedup.next_decoded();
        assert_eq!(p1, 0);
        assert!(s1.is_some());
        let (p2, s2) = dedup.next_decoded();
        assert_eq!(p2, 1);
        assert!(s2.is_none());
        let (p3, s3) = dedup.next_decoded();
        assert_eq!(p3, 1);
        assert!(s3.is_none());
    }
}
