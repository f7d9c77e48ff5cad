//! # uep-fountain
//!
//! A rateless LT (Luby Transform) fountain code engine with Unequal Error
//! Protection (UEP) and a paced UDP transport.
//!
//! Input packets are grouped into blocks, XOR-coded against sparse rows
//! drawn from a Robust Soliton degree distribution, decoded via two-pass
//! belief propagation, and carried over UDP with optional block-level
//! acknowledgement-driven pacing. Higher-priority data gets more
//! redundancy than lower-priority data via per-class repetition before a
//! global expansion factor.
//!
//! ## Crate structure
//!
//! - [`buffer`] — Byte buffer with allocated/logical ranges, XOR kernel
//! - [`counter`] — Saturating and circular sequence counters
//! - [`distribution`] — Ideal/Robust Soliton degree distributions
//! - [`row`] — Deterministic, seedable sparse row generator
//! - [`graph`] — Bipartite graph and two-pass belief-propagation decoder
//! - [`block`] — Per-block LT encoder/decoder
//! - [`stream`] — LT encoder/decoder stream layer (block-window bookkeeping)
//! - [`uep`] — UEP expander/deduplicator (sub-block repetition + EF)
//! - [`packet`] — UEP packet framing (sequence number + padding flag)
//! - [`wire`] — Data/Block-ACK wire codec
//! - [`transport`] — Paced UDP sender/receiver, each its own worker thread
//! - [`config`] — Validated configuration surface
//! - [`stats`] — Sender/receiver observability snapshots
//! - [`error`] — Crate-wide error taxonomy

pub mod block;
pub mod buffer;
pub mod config;
pub mod counter;
pub mod distribution;
pub mod error;
pub mod graph;
pub mod packet;
pub mod row;
pub mod stats;
pub mod stream;
pub mod transport;
pub mod uep;
pub mod wire;

pub use error::{Error, Result};
