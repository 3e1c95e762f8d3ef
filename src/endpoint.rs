use crate::channel::DatagramChannel;
use crate::fault::{FaultInjector, Verdict};
use crate::packet::{PacketKind, RdtpPacket, MAX_PACKET_SIZE};
use rand::RngCore;
use std::net::SocketAddr;
use tokio::io::Result;
use tokio::time::{sleep, Duration};
use tracing::{trace, warn};

/// Outcome of one receive attempt.
#[derive(Debug)]
pub(crate) enum Reception {
    Packet(RdtpPacket<'static>, SocketAddr),
    /// A datagram arrived but must be discarded: either the fault injector
    /// flagged it or it did not parse, in which case `kind` is `None`.
    Corrupted {
        from: SocketAddr,
        kind: Option<PacketKind>,
    },
    Lost,
    TimedOut,
}

/// One side of a transfer: a channel, a per-receive timeout and the fault model
/// applied on top of every receive.
pub(crate) struct Endpoint<'c, C: ?Sized, R> {
    channel: &'c C,
    timeout: Duration,
    faults: FaultInjector<R>,
    // One spare byte so that oversized datagrams are detected instead of truncated.
    buf: Box<[u8; MAX_PACKET_SIZE + 1]>,
}

impl<'c, C, R> Endpoint<'c, C, R>
where
    C: DatagramChannel + ?Sized,
    R: RngCore,
{
    pub fn new(channel: &'c C, timeout: Duration, faults: FaultInjector<R>) -> Self {
        Self {
            channel,
            timeout,
            faults,
            buf: Box::new([0; MAX_PACKET_SIZE + 1]),
        }
    }

    pub fn with_faults<R2: RngCore>(self, faults: FaultInjector<R2>) -> Endpoint<'c, C, R2> {
        Endpoint {
            channel: self.channel,
            timeout: self.timeout,
            faults,
            buf: self.buf,
        }
    }

    /// Send errors are logged and otherwise treated like a datagram lost on the
    /// network; the retransmission logic covers both.
    pub async fn send_packet(&self, packet: &RdtpPacket<'_>, addr: SocketAddr) -> bool {
        trace!(%addr, "send {}", packet);
        match self.channel.send_to(&packet.serialize(), addr).await {
            Ok(_) => true,
            Err(e) => {
                warn!(%addr, error = %e, "failed to send {}", packet);
                false
            }
        }
    }

    pub async fn recv_packet(&mut self) -> Result<Reception> {
        let received = tokio::select! {
            r = self.channel.recv_from(&mut self.buf[..]) => Some(r?),
            _ = sleep(self.timeout) => None,
        };
        let (size, addr) = match received {
            Some(r) => r,
            None => {
                trace!("receive timed out");
                return Ok(Reception::TimedOut);
            }
        };

        let packet = match RdtpPacket::deserialize(&self.buf[..size]) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(%addr, size, error = %e, "discarding malformed datagram");
                return Ok(Reception::Corrupted {
                    from: addr,
                    kind: None,
                });
            }
        };
        trace!(%addr, "recv {}", packet);

        Ok(match self.faults.inspect() {
            Verdict::Intact => Reception::Packet(packet, addr),
            Verdict::Corrupted => {
                trace!(%addr, "(corrupted) {}", packet);
                Reception::Corrupted {
                    from: addr,
                    kind: Some(packet.kind),
                }
            }
            Verdict::Lost => {
                trace!(%addr, "(lost) {}", packet);
                Reception::Lost
            }
        })
    }
}
