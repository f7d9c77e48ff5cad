//! # UDP transport (C12)
//!
//! `Sender`/`Receiver` each own a dedicated worker thread that holds the
//! encoder/decoder/socket exclusively; a `crossbeam_channel::Sender` is the
//! only way in from other threads. This mirrors `strata-bonding`'s
//! `BondingRuntime`/`runtime_worker` — a bounded channel of command enums
//! drained by `recv_timeout` inside a dedicated named thread, with
//! `Drop` sending a stop command and joining the handle — generalized from
//! one worker loop shape to two (pacing-paced send loop, batch-read receive
//! loop). See §4.12's "Rust realization of the strand" note.

use crate::config::Config;
use crate::distribution::{DegreeDistribution, RobustSoliton};
use crate::error::Result;
use crate::packet::UepPacket;
use crate::stats::{ReceiverStats, SenderStats};
use crate::stream::{DecoderState, LtDecoder, LtEncoder};
use crate::uep::{UepDeduplicator, UepExpander, UepLayout};
use crate::wire::{self, BlockAck, Frame};
use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver as ChanReceiver, Sender as ChanSender, TryRecvError};
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, warn};

/// A source of outbound payloads, tagged by priority class. The core never
/// interprets payload bytes (§6).
pub trait PacketSource: Send {
    /// Pull the next payload and its priority class, or `None` if
    /// (currently) exhausted.
    fn next_packet(&mut self) -> Option<(Bytes, usize)>;
    fn has_more(&self) -> bool;
}

/// A sink for inbound, already-deduplicated UEP packets. `was_lost` marks
/// slots the decoder could not recover (§6).
pub trait PacketSink: Send {
    fn push(&mut self, payload: Option<Bytes>, priority: usize, was_lost: bool);
}

fn build_layout(config: &Config) -> Result<UepLayout> {
    UepLayout::new(config.ks.clone(), config.rfs.clone(), config.ef)
}

fn build_distribution(config: &Config, k: u32) -> DegreeDistribution {
    DegreeDistribution::Robust(RobustSoliton::new(k, config.c, config.delta))
}

enum SenderCommand {
    SetTargetBitrate(Option<u64>),
    Stop,
}

/// Handle to a paced UDP fountain-coded sender running on its own thread.
pub struct Sender {
    cmd_tx: ChanSender<SenderCommand>,
    handle: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SenderStats>>,
}

impl Sender {
    pub fn new(
        socket: UdpSocket,
        dest: SocketAddr,
        config: Config,
        source: Box<dyn PacketSource>,
    ) -> Result<Self> {
        config.validate()?;
        let (cmd_tx, cmd_rx) = bounded(256);
        let stats = Arc::new(Mutex::new(SenderStats::new()));
        let stats_clone = stats.clone();

        let span = info_span!("sender", role = "sender", target_bitrate = ?config.target_bitrate);
        let handle = thread::Builder::new()
            .name("uep-fountain-sender".into())
            .spawn(move || {
                let _enter = span.enter();
                sender_worker(socket, dest, config, source, cmd_rx, stats_clone);
            })
            .expect("failed to spawn sender worker thread");

        Ok(Sender {
            cmd_tx,
            handle: Some(handle),
            stats,
        })
    }

    pub fn set_target_bitrate(&self, bitrate: Option<u64>) {
        let _ = self.cmd_tx.send(SenderCommand::SetTargetBitrate(bitrate));
    }

    pub fn stats(&self) -> SenderStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stop(&mut self) {
        let _ = self.cmd_tx.send(SenderCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sender_worker(
    socket: UdpSocket,
    dest: SocketAddr,
    config: Config,
    mut source: Box<dyn PacketSource>,
    cmd_rx: ChanReceiver<SenderCommand>,
    stats: Arc<Mutex<SenderStats>>,
) {
    let layout = match build_layout(&config) {
        Ok(l) => l,
        Err(e) => {
            warn!(error = %e, "sender: invalid uep layout, aborting");
            return;
        }
    };
    // The LT block size is Kout, the expanded block the UEP expander
    // produces, not Kin — the encoder/decoder/distribution only ever see
    // expanded blocks (original_source/uep_encoder.hpp builds its LT
    // encoder off `block_size_out()` for the same reason).
    let kout = layout.kout();
    let distribution = build_distribution(&config, kout as u32);
    let mut expander = UepExpander::new(layout, config.packet_size);
    let mut encoder = LtEncoder::new(kout, config.packet_size, distribution, 0x5EED);
    let mut target_bitrate = config.target_bitrate;
    let mut last_sent_time: Option<Instant> = None;

    // The pacing timer and the ACK listener are both realized as the same
    // bounded `recv_timeout`-style wait: the socket's read timeout doubles
    // as the sleep increment, so a blocking `recv_from` that times out
    // *is* "waiting for the next tick" while still giving incoming ACKs a
    // chance to interrupt it (§4.12's "in parallel" read-one-ACK step).
    const POLL_QUANTUM: Duration = Duration::from_millis(5);
    let _ = socket.set_read_timeout(Some(POLL_QUANTUM));
    let mut ack_buf = [0u8; 64];

    let mut fill_and_maybe_advance = |expander: &mut UepExpander, encoder: &mut LtEncoder| {
        while !expander.has_full_set() {
            match source.next_packet() {
                Some((payload, priority)) => {
                    let _ = expander.enqueue(priority, payload, false);
                    if let Ok(mut s) = stats.lock() {
                        s.source_packets_consumed += 1;
                    }
                }
                None => {
                    if source.has_more() || expander.is_empty() {
                        return false;
                    }
                    // Source exhausted mid-sub-block: manufacture padding
                    // so whatever is already queued can still be expanded
                    // and drained, instead of stranding it forever.
                    match expander.pad_partial_set() {
                        Ok(padded) if padded > 0 => {
                            if let Ok(mut s) = stats.lock() {
                                s.padding_packets_sent += padded as u64;
                            }
                        }
                        _ => {}
                    }
                    break;
                }
            }
        }
        if let Ok(block) = expander.expand() {
            for payload in block {
                encoder.enqueue(payload);
            }
            true
        } else {
            false
        }
    };

    // Step 2: top up to at least 2*Kout packets worth of blocks.
    while encoder.pending_len() < 2 * kout {
        if !fill_and_maybe_advance(&mut expander, &mut encoder) {
            break;
        }
    }
    if !encoder.has_full_block() && encoder.pending_len() == 0 {
        return;
    }
    if encoder.has_full_block() {
        let _ = encoder.next_block();
    }

    let mut stopped = false;
    let mut seq_in_block: u64 = 0;

    'outer: while !stopped {
        loop {
            match cmd_rx.try_recv() {
                Ok(SenderCommand::Stop) => {
                    stopped = true;
                    break 'outer;
                }
                Ok(SenderCommand::SetTargetBitrate(b)) => target_bitrate = b,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    stopped = true;
                    break 'outer;
                }
            }
        }

        // Read at most one ACK per iteration off the socket. A blocking
        // recv with the short read timeout above also serves as this
        // iteration's pacing sleep increment when nothing arrives.
        if config.ack_enabled {
            if let Ok((n, from)) = socket.recv_from(&mut ack_buf) {
                if from == dest {
                    if let Ok(Frame::BlockAck(ack)) =
                        wire::decode(&Bytes::copy_from_slice(&ack_buf[..n]))
                    {
                        if let Ok(mut s) = stats.lock() {
                            s.acks_received += 1;
                        }
                        let delta = crate::counter::forward_distance(
                            encoder.current_block_number() as u64,
                            ack.next_wanted_block as u64,
                            0xFFFF,
                        );
                        if delta != 0 && delta <= crate::stream::BLOCK_WINDOW {
                            while encoder.pending_len() < delta as usize * kout {
                                if !fill_and_maybe_advance(&mut expander, &mut encoder) {
                                    break;
                                }
                            }
                            if encoder.skip_to_block(ack.next_wanted_block).is_ok() {
                                if let Ok(mut s) = stats.lock() {
                                    s.ack_skips += 1;
                                }
                                seq_in_block = 0;
                                last_sent_time = None;
                            }
                        }
                    }
                }
            }
        }

        if !encoder.has_block() {
            if !fill_and_maybe_advance(&mut expander, &mut encoder) {
                break;
            }
            if !encoder.has_block() {
                let _ = encoder.next_block();
            }
            seq_in_block = 0;
            continue;
        }

        if let Some(bitrate) = target_bitrate {
            if let Some(last) = last_sent_time {
                let size_bits = (config.packet_size as u64) * 8;
                let wait = Duration::from_micros(size_bits * 1_000_000 / bitrate.max(1));
                let elapsed = last.elapsed();
                if elapsed < wait {
                    // When ACKs are enabled the socket read above already
                    // spent up to one poll quantum; this sleep only covers
                    // whatever's left (zero when an ACK arrived early) so
                    // the pacing deadline is never overshot by more than
                    // one quantum.
                    thread::sleep((wait - elapsed).min(POLL_QUANTUM));
                    continue;
                }
            }
        }

        let coded = match encoder.next_coded() {
            Ok(p) => p,
            Err(_) => {
                continue;
            }
        };
        let frame = wire::encode_data(&coded);
        if socket.send_to(&frame, dest).is_ok() {
            last_sent_time = Some(Instant::now());
            if let Ok(mut s) = stats.lock() {
                s.packets_sent += 1;
                s.bytes_sent += coded.payload.len() as u64;
            }
        }

        seq_in_block += 1;
        if seq_in_block >= config.max_sequence_number as u64 {
            if !fill_and_maybe_advance(&mut expander, &mut encoder) {
                // Reuse whatever is queued; a genuinely exhausted source
                // just stalls here until the caller stops the sender.
            }
            let _ = encoder.next_block();
            seq_in_block = 0;
        }
    }
}

enum ReceiverCommand {
    Stop,
}

/// Handle to a receiver running its own batch-read/decode loop thread.
pub struct Receiver {
    cmd_tx: ChanSender<ReceiverCommand>,
    handle: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ReceiverStats>>,
}

impl Receiver {
    pub fn new(
        socket: UdpSocket,
        source_addr: SocketAddr,
        config: Config,
        sink: Box<dyn PacketSink>,
    ) -> Result<Self> {
        config.validate()?;
        let (cmd_tx, cmd_rx) = bounded(16);
        let stats = Arc::new(Mutex::new(ReceiverStats::new()));
        let stats_clone = stats.clone();

        let span = info_span!("receiver", role = "receiver");
        let handle = thread::Builder::new()
            .name("uep-fountain-receiver".into())
            .spawn(move || {
                let _enter = span.enter();
                receiver_worker(socket, source_addr, config, sink, cmd_rx, stats_clone);
            })
            .expect("failed to spawn receiver worker thread");

        Ok(Receiver {
            cmd_tx,
            handle: Some(handle),
            stats,
        })
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stop(&mut self) {
        let _ = self.cmd_tx.send(ReceiverCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receiver_worker(
    socket: UdpSocket,
    source_addr: SocketAddr,
    config: Config,
    mut sink: Box<dyn PacketSink>,
    cmd_rx: ChanReceiver<ReceiverCommand>,
    stats: Arc<Mutex<ReceiverStats>>,
) {
    let layout = match build_layout(&config) {
        Ok(l) => l,
        Err(e) => {
            warn!(error = %e, "receiver: invalid uep layout, aborting");
            return;
        }
    };
    let kin = layout.kin();
    let kout = layout.kout();
    let priorities = layout.priorities();
    let distribution = build_distribution(&config, kout as u32);
    let mut decoder = LtDecoder::new(kout, config.packet_size, distribution);
    let mut dedup = UepDeduplicator::new(layout);

    let poll_quantum = Duration::from_millis(200);
    let _ = socket.set_read_timeout(Some(poll_quantum));
    let mut buf = vec![0u8; 65535 + 16];
    let mut last_activity = Instant::now();
    let inactivity_timeout = if config.timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.timeout_secs))
    };

    loop {
        match cmd_rx.try_recv() {
            Ok(ReceiverCommand::Stop) => break,
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        if let Some(timeout) = inactivity_timeout {
            if last_activity.elapsed() > timeout {
                debug!("receiver: inactivity timeout, flushing and stopping");
                decoder.flush(decoder.current_block_number().wrapping_add(1));
                break;
            }
        }

        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                if from.ip() != source_addr.ip() {
                    continue;
                }
                last_activity = Instant::now();
                process_datagram(
                    &buf[..n],
                    &mut decoder,
                    &mut dedup,
                    &mut sink,
                    &stats,
                    &socket,
                    source_addr,
                    &config,
                    kin,
                    priorities,
                );

                // Batch-drain any further datagrams already queued.
                loop {
                    match socket.recv_from(&mut buf) {
                        Ok((n, from2)) if from2.ip() == source_addr.ip() => {
                            last_activity = Instant::now();
                            process_datagram(
                                &buf[..n],
                                &mut decoder,
                                &mut dedup,
                                &mut sink,
                                &stats,
                                &socket,
                                source_addr,
                                &config,
                                kin,
                                priorities,
                            );
                        }
                        Ok(_) => continue,
                        Err(ref e)
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            break
                        }
                        Err(_) => break,
                    }
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue
            }
            Err(_) => continue,
        }

        if config.expected_count > 0 {
            let total = {
                let s = stats.lock().unwrap_or_else(|e| e.into_inner());
                s.total_decoded + s.total_failed
            };
            if total >= config.expected_count {
                break;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_datagram(
    data: &[u8],
    decoder: &mut LtDecoder,
    dedup: &mut UepDeduplicator,
    sink: &mut Box<dyn PacketSink>,
    stats: &Arc<Mutex<ReceiverStats>>,
    socket: &UdpSocket,
    source_addr: SocketAddr,
    config: &Config,
    kin: usize,
    priorities: usize,
) {
    let frame = match wire::decode(&Bytes::copy_from_slice(data)) {
        Ok(f) => f,
        Err(_) => return,
    };

    let Frame::Data(coded) = frame else {
        return;
    };

    if let Ok(mut s) = stats.lock() {
        s.packets_received += 1;
        s.bytes_received += coded.payload.len() as u64;
    }

    let prior_state = decoder.state();
    let completed = match decoder.push(&coded) {
        Ok(c) => c,
        Err(_) => return,
    };

    if let Some(block) = completed {
        dedup.on_block(block);
        for _ in 0..kin {
            match dedup.next_decoded() {
                (priority, Some(UepPacket { payload, padding, .. })) => {
                    if !padding {
                        sink.push(Some(payload), priority, false);
                    }
                }
                (priority, None) => sink.push(None, priority, true),
            }
        }
        if let Ok(mut s) = stats.lock() {
            s.total_decoded = decoder.total_decoded();
            s.total_failed = decoder.total_failed();
            s.total_lt_received = decoder.total_received();
            s.empty_queued_count = dedup.empty_queued_count();
            s.priority_decoded = (0..priorities).map(|i| dedup.decoded_count(i)).collect();
            s.priority_failed = (0..priorities).map(|i| dedup.failed_count(i)).collect();
        }

        if prior_state == DecoderState::Receiving && config.ack_enabled {
            let ack = BlockAck {
                next_wanted_block: decoder.current_block_number().wrapping_add(1),
            };
            let _ = socket.send_to(&wire::encode_block_ack(&ack), source_addr);
            if let Ok(mut s) = stats.lock() {
                s.acks_sent += 1;
            }
        }
    }
}
