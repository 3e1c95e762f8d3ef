use crate::buffer::ReassemblyBuffer;
use crate::channel::DatagramChannel;
use crate::configuration::RdtpConfiguration;
use crate::endpoint::{Endpoint, Reception};
use crate::fault::FaultInjector;
use crate::packet::{PacketKind, RdtpPacket, MAX_PAYLOAD_SIZE};
use crate::retry::RetryBudget;
use crate::seq_number::SeqSpace;
use crate::window::Window;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::RngCore;
use std::net::SocketAddr;
use tokio::io::Result;
use tracing::{debug, trace, warn};

/// Rebuilds the byte stream from DATA packets delivered in any order.
///
/// Offsets are reconstructed as `seq + rollovers * seq_space.size()`. A packet
/// landing far below the window means the sequence space wrapped; one landing
/// far above it was sent before the wrap the counter already accounts for.
#[derive(Debug)]
pub struct Reassembly {
    buffer: ReassemblyBuffer,
    window: Window,
    rollovers: u64,
    window_size: u32,
    seq_space: SeqSpace,
}

impl Reassembly {
    pub fn new(window_size: u32, seq_space: SeqSpace) -> Self {
        Self {
            buffer: ReassemblyBuffer::new(),
            window: Window::starting_at(0, window_size),
            rollovers: 0,
            window_size,
            seq_space,
        }
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn rollovers(&self) -> u64 {
        self.rollovers
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Absolute stream offset of a DATA packet, updating the rollover counter
    /// and sliding the window.
    ///
    /// Nothing bounds how far ahead of the window a packet may land while no
    /// rollover has happened yet: a stray DATA packet with a large sequence
    /// number grows the buffer up to the size of the sequence space.
    pub fn absolute_offset(&mut self, seq: u32) -> u64 {
        let window_size = self.window_size as u64;
        let mut offset = self.seq_space.offset_for(seq, self.rollovers);

        let rollover_threshold = self.window.min.checked_sub(window_size);
        if matches!(rollover_threshold, Some(threshold) if offset <= threshold) {
            self.rollovers += 1;
            debug!(rollovers = self.rollovers, seq, "sequence number rolled over");
            offset = self.seq_space.offset_for(seq, self.rollovers);
        }

        // A segment may start up to one payload past the sender's window.
        let straddle_threshold = self.window.max + window_size + MAX_PAYLOAD_SIZE as u64;
        if self.rollovers > 0 && offset >= straddle_threshold {
            offset = self.seq_space.offset_for(seq, self.rollovers - 1);
        }

        if self.window.slide_to(offset, self.window_size) {
            trace!(window = ?self.window, "receive window moved");
        }
        offset
    }

    /// Stores the payload at its offset and returns that offset.
    pub fn accept(&mut self, seq: u32, payload: &[u8]) -> Result<u64> {
        let offset = self.absolute_offset(seq);
        self.buffer.write_at(offset, payload)?;
        Ok(offset)
    }

    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}

/// What a receive engine produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Reassembled stream. Empty when nothing arrived before the connection
    /// was lost, which callers must treat as a failed transfer.
    pub data: Bytes,
    /// Address of the last peer heard from.
    pub peer: Option<SocketAddr>,
    /// Whether the transfer ended with a FIN rather than a lost connection.
    pub completed: bool,
}

impl Received {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Receives one byte stream, acknowledging every DATA packet.
pub struct ReceiveEngine<'c, C: ?Sized, R = StdRng> {
    endpoint: Endpoint<'c, C, R>,
    config: &'c RdtpConfiguration,
}

impl<'c, C> ReceiveEngine<'c, C, StdRng>
where
    C: DatagramChannel + ?Sized,
{
    pub fn new(channel: &'c C, config: &'c RdtpConfiguration) -> Self {
        let faults = FaultInjector::from_config(config);
        Self {
            endpoint: Endpoint::new(channel, config.timeout, faults),
            config,
        }
    }
}

impl<'c, C, R> ReceiveEngine<'c, C, R>
where
    C: DatagramChannel + ?Sized,
    R: RngCore,
{
    pub fn with_fault_injector<R2: RngCore>(
        self,
        faults: FaultInjector<R2>,
    ) -> ReceiveEngine<'c, C, R2> {
        ReceiveEngine {
            endpoint: self.endpoint.with_faults(faults),
            config: self.config,
        }
    }

    /// Runs until a FIN arrives or the peer goes silent for `max_wait_attempts`
    /// timeouts. Before the first packet the engine waits indefinitely.
    pub async fn receive(mut self) -> Result<Received> {
        self.config.validate()?;

        let mut reassembly = Reassembly::new(self.config.window_size, self.config.seq_space());
        let mut budget = RetryBudget::new(self.config.max_wait_attempts);
        let mut awaiting_first_packet = true;
        let mut peer = None;
        let mut completed = false;

        loop {
            let (packet, addr) = match self.endpoint.recv_packet().await? {
                Reception::TimedOut => {
                    if !awaiting_first_packet && budget.record_failure() {
                        if reassembly.is_empty() {
                            warn!(?peer, "connection lost before any data arrived");
                        } else {
                            warn!(
                                ?peer,
                                timeouts = budget.failures(),
                                bytes = reassembly.len(),
                                "connection lost"
                            );
                        }
                        break;
                    }
                    continue;
                }
                Reception::Lost => continue,
                // FIN-ACKs never count as contact, damaged or not.
                Reception::Corrupted {
                    kind: Some(PacketKind::FinAck),
                    ..
                } => continue,
                Reception::Corrupted { from, .. } => {
                    awaiting_first_packet = false;
                    budget.record_progress();
                    peer = Some(from);
                    continue;
                }
                Reception::Packet(packet, addr) => (packet, addr),
            };

            if packet.kind == PacketKind::FinAck {
                trace!(%addr, "discarding FIN-ACK of a previous transfer");
                continue;
            }
            awaiting_first_packet = false;
            budget.record_progress();
            peer = Some(addr);

            match packet.kind {
                PacketKind::Data => match reassembly.accept(packet.seq, packet.payload.as_ref()) {
                    Ok(offset) => {
                        trace!(offset, len = packet.payload.as_ref().len(), "stored segment");
                        self.endpoint
                            .send_packet(&RdtpPacket::ack(packet.seq), addr)
                            .await;
                    }
                    Err(e) => warn!(%addr, seq = packet.seq, error = %e, "dropping segment"),
                },
                PacketKind::Fin => {
                    self.endpoint
                        .send_packet(&RdtpPacket::fin_ack(), addr)
                        .await;
                    completed = true;
                    break;
                }
                PacketKind::Ack | PacketKind::FinAck => {}
            }
        }

        debug!(?peer, bytes = reassembly.len(), completed, "receive finished");
        Ok(Received {
            data: reassembly.into_bytes(),
            peer,
            completed,
        })
    }
}

/// Receives one byte stream from whichever peer sends it.
pub async fn receive_bytes<C>(channel: &C, config: &RdtpConfiguration) -> Result<Received>
where
    C: DatagramChannel + ?Sized,
{
    ReceiveEngine::new(channel, config).receive().await
}
