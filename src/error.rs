//! # Error taxonomy
//!
//! One enum for every failure kind the crate can produce. Variants carry
//! just enough context to log usefully; `Stale`, `Duplicate`, and
//! `Cancelled` are real variants so tests can assert on them, but no
//! public transport API returns them to a caller as a transport failure —
//! they are matched and discarded at the point of detection.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("xor over unequal-length or empty buffers (lhs={lhs}, rhs={rhs})")]
    SizeMismatch { lhs: usize, rhs: usize },

    #[error("buffer trim/extend beyond allocation")]
    RangeError,

    #[error("counter overflowed past max {max}")]
    Overflow { max: u64 },

    #[error("counters belong to different domains (max={a_max} vs {b_max})")]
    DomainMismatch { a_max: u64, b_max: u64 },

    #[error("packet block/seed/size mismatch (expected block={expected_block} seed={expected_seed}, got block={got_block} seed={got_seed})")]
    BlockMismatch {
        expected_block: u16,
        expected_seed: i32,
        got_block: u16,
        got_seed: i32,
    },

    #[error("duplicate edge index {index} on MP output")]
    ParallelEdge { index: u32 },

    #[error("encoding invoked before a full input block was set")]
    NoBlock,

    #[error("malformed wire frame: {0}")]
    Malformed(&'static str),

    #[error("block {block} is outside the active window of {current}")]
    Stale { block: u16, current: u16 },

    #[error("sequence number {seqno} already seen in this block")]
    Duplicate { seqno: u16 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("inactivity timeout")]
    Timeout,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
