//! # Configuration surface (C14)
//!
//! Every tunable knob in one validated struct. Grounded in idiom on the
//! teacher's `SenderConfig`/`BondingConfig` (plain serde structs, a
//! `validate`-on-construct step) but the fields themselves are this
//! crate's own (§6).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sub-block sizes per priority class, ordered high to low priority.
    pub ks: Vec<usize>,
    /// Repetition factor per priority class.
    pub rfs: Vec<usize>,
    /// Global expansion factor applied after sub-block repetition.
    pub ef: usize,
    /// Robust Soliton `c` parameter.
    pub c: f64,
    /// Robust Soliton `delta` parameter.
    pub delta: f64,
    /// Fixed payload size after framing, in bytes.
    pub packet_size: usize,
    /// Sender pacing target in bits per second. `None` disables pacing.
    pub target_bitrate: Option<u64>,
    /// Max coded packets per block before a forced block advance.
    pub max_sequence_number: u16,
    /// Enable the block-ack feedback loop.
    pub ack_enabled: bool,
    /// Receiver inactivity timeout in seconds. `0` disables it.
    pub timeout_secs: u64,
    /// Receiver stops after this many packets decoded+failed. `0` disables it.
    pub expected_count: u64,
}

impl Config {
    /// Validate the scalar domains listed in §6/§4.14. Returns
    /// `InvalidArgument` (never panics) on the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.ks.is_empty() || self.ks.len() != self.rfs.len() {
            return Err(Error::InvalidArgument(
                "ks and rfs must be non-empty and equal length".into(),
            ));
        }
        if self.ks.iter().any(|&k| k == 0) {
            return Err(Error::InvalidArgument("every ks[i] must be > 0".into()));
        }
        if self.rfs.iter().any(|&r| r == 0) {
            return Err(Error::InvalidArgument("every rfs[i] must be > 0".into()));
        }
        if self.ef < 1 {
            return Err(Error::InvalidArgument("ef must be >= 1".into()));
        }
        if !(self.c > 0.0) {
            return Err(Error::InvalidArgument("c must be > 0.0".into()));
        }
        if !(self.delta > 0.0 && self.delta < 1.0) {
            return Err(Error::InvalidArgument("delta must be in (0.0, 1.0)".into()));
        }
        if self.packet_size <= 11 {
            return Err(Error::InvalidArgument(
                "packet_size must exceed the 11-byte data frame header".into(),
            ));
        }
        if self.max_sequence_number == 0 {
            return Err(Error::InvalidArgument(
                "max_sequence_number must be in [1, u16::MAX]".into(),
            ));
        }
        Ok(())
    }

    /// Construct and validate in one step.
    pub fn new(
        ks: Vec<usize>,
        rfs: Vec<usize>,
        ef: usize,
        c: f64,
        delta: f64,
        packet_size: usize,
        target_bitrate: Option<u64>,
        max_sequence_number: u16,
        ack_enabled: bool,
        timeout_secs: u64,
        expected_count: u64,
    ) -> Result<Self> {
        let config = Config {
            ks,
            rfs,
            ef,
            c,
            delta,
            packet_size,
            target_bitrate,
            max_sequence_number,
            ack_enabled,
            timeout_secs,
            expected_count,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn kin(&self) -> usize {
        self.ks.iter().sum()
    }
}
