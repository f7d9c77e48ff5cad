//! # Observability: stats snapshots (C15)
//!
//! Aggregate sender/receiver counters, serde-serializable for JSON export.
//! Grounded in idiom on the teacher's `stats.rs` (plain `Default`-able
//! structs with `new()`, ratio helper methods, `Serialize` derive) trimmed
//! to the counters this crate actually produces — RTT/link/congestion
//! fields have no counterpart here since there is no bonded multi-link
//! scheduler (see DESIGN.md for the full list of dropped teacher fields).

use serde::Serialize;

/// Aggregate sender-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SenderStats {
    /// Total coded packets sent.
    pub packets_sent: u64,
    /// Total coded payload bytes sent.
    pub bytes_sent: u64,
    /// Block-ACK frames received.
    pub acks_received: u64,
    /// Block advances triggered by an ACK-driven skip.
    pub ack_skips: u64,
    /// Source packets consumed from the collaborator.
    pub source_packets_consumed: u64,
    /// Manufactured padding packets emitted to complete a partial block.
    pub padding_packets_sent: u64,
}

impl SenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ack_skip_ratio(&self) -> f64 {
        if self.acks_received == 0 {
            0.0
        } else {
            self.ack_skips as f64 / self.acks_received as f64
        }
    }
}

/// Aggregate receiver-side statistics, including the C8 LT-layer totals and
/// C9 per-priority UEP outcome counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReceiverStats {
    /// Total coded packets received off the wire.
    pub packets_received: u64,
    /// Total coded payload bytes received.
    pub bytes_received: u64,
    /// Block-ACK frames sent.
    pub acks_sent: u64,
    /// LT blocks fully decoded (C8 `total_decoded`).
    pub total_decoded: u64,
    /// LT blocks that failed to fully decode before being flushed (C8
    /// `total_failed`).
    pub total_failed: u64,
    /// LT coded packets received (C8 `total_received`).
    pub total_lt_received: u64,
    /// Per-priority decoded sub-block slot counts (C9), indexed by
    /// priority class.
    pub priority_decoded: Vec<u64>,
    /// Per-priority failed sub-block slot counts (C9).
    pub priority_failed: Vec<u64>,
    /// Output slots yielded empty because the expected sequence number
    /// had not arrived in any priority queue (C9).
    pub empty_queued_count: u64,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_success_ratio(&self) -> f64 {
        let total = self.total_decoded + self.total_failed;
        if total == 0 {
            0.0
        } else {
            self.total_decoded as f64 / total as f64
        }
    }

    pub fn priority_success_ratio(&self, priority: usize) -> f64 {
        let decoded = self.priority_decoded.get(priority).copied().unwrap_or(0);
        let failed = self.priority_failed.get(priority).copied().unwrap_or(0);
        let total = decoded + failed;
        if total == 0 {
            0.0
        } else {
            decoded as f64 / total as f64
        }
    }
}
