use crate::channel::DatagramChannel;
use crate::configuration::RdtpConfiguration;
use crate::endpoint::{Endpoint, Reception};
use crate::fault::FaultInjector;
use crate::packet::{PacketKind, RdtpPacket, MAX_PAYLOAD_SIZE};
use crate::retry::RetryBudget;
use crate::seq_number::SeqSpace;
use crate::window::Window;
use rand::rngs::StdRng;
use rand::RngCore;
use std::net::SocketAddr;
use tokio::io::Result;
use tracing::{debug, trace, warn};

/// A DATA packet borrowing its payload from the outbound buffer, with the
/// absolute stream offset its sequence number was derived from.
#[derive(Debug, Clone)]
pub struct Segment<'a> {
    pub offset: u64,
    pub packet: RdtpPacket<'a>,
    acked: bool,
}

impl Segment<'_> {
    pub fn is_acked(&self) -> bool {
        self.acked
    }
}

/// Splits `data` into DATA packets of at most [`MAX_PAYLOAD_SIZE`] bytes.
pub fn packetize(data: &[u8], seq_space: SeqSpace) -> Vec<Segment<'_>> {
    let mut offset = 0u64;
    data.chunks(MAX_PAYLOAD_SIZE)
        .map(|chunk| {
            let segment = Segment {
                offset,
                packet: RdtpPacket::data(seq_space.seq_for_offset(offset), chunk),
                acked: false,
            };
            offset += chunk.len() as u64;
            segment
        })
        .collect()
}

#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct SendReport {
    /// `false` when the destination never acknowledged within the attempt budget.
    pub delivered: bool,
    pub segments: usize,
    /// DATA packets put on the wire, retransmissions included.
    pub transmissions: usize,
    /// Windowed transmission rounds.
    pub rounds: u32,
    /// Whether the peer answered the FIN with a FIN-ACK (or started sending).
    pub teardown_confirmed: bool,
}

/// Sends one byte stream to a receive engine and tears the transfer down.
pub struct SendEngine<'c, C: ?Sized, R = StdRng> {
    endpoint: Endpoint<'c, C, R>,
    destination: SocketAddr,
    config: &'c RdtpConfiguration,
}

impl<'c, C> SendEngine<'c, C, StdRng>
where
    C: DatagramChannel + ?Sized,
{
    pub fn new(channel: &'c C, destination: SocketAddr, config: &'c RdtpConfiguration) -> Self {
        let faults = FaultInjector::from_config(config);
        Self {
            endpoint: Endpoint::new(channel, config.timeout, faults),
            destination,
            config,
        }
    }
}

impl<'c, C, R> SendEngine<'c, C, R>
where
    C: DatagramChannel + ?Sized,
    R: RngCore,
{
    pub fn with_fault_injector<R2: RngCore>(
        self,
        faults: FaultInjector<R2>,
    ) -> SendEngine<'c, C, R2> {
        let SendEngine {
            endpoint,
            destination,
            config,
        } = self;
        SendEngine {
            endpoint: endpoint.with_faults(faults),
            destination,
            config,
        }
    }

    pub async fn send(mut self, data: &[u8]) -> Result<SendReport> {
        self.config.validate()?;

        let mut segments = packetize(data, self.config.seq_space());
        let mut report = SendReport {
            segments: segments.len(),
            ..Default::default()
        };
        debug!(
            destination = %self.destination,
            bytes = data.len(),
            segments = segments.len(),
            "starting transfer"
        );

        self.drain_stale_packets().await?;

        let mut budget = RetryBudget::new(self.config.max_send_attempts);
        while let Some(first) = segments.iter().position(|s| !s.acked) {
            if budget.is_exhausted() {
                warn!(
                    destination = %self.destination,
                    rounds = report.rounds,
                    "destination unreachable"
                );
                return Ok(report);
            }
            report.rounds += 1;

            let window = Window::starting_at(segments[first].offset, self.config.window_size);
            let in_flight = &mut segments[first..];
            let in_window = in_flight
                .iter()
                .take_while(|s| window.contains(s.offset))
                .count();
            let in_flight = &mut in_flight[..in_window];
            trace!(?window, packets = in_flight.len(), "transmitting window");

            for segment in in_flight.iter().filter(|s| !s.acked) {
                self.endpoint
                    .send_packet(&segment.packet, self.destination)
                    .await;
                report.transmissions += 1;
            }

            if self.collect_acks(in_flight).await? {
                budget.record_progress();
            } else {
                let _ = budget.record_failure();
            }
        }

        report.delivered = true;
        report.teardown_confirmed = self.teardown().await?;
        debug!(
            destination = %self.destination,
            rounds = report.rounds,
            transmissions = report.transmissions,
            "transfer complete"
        );
        Ok(report)
    }

    /// The protocol has no connection identifiers: FINs retransmitted by the
    /// peer of a previous transfer on this socket are consumed here, until the
    /// channel stays quiet for one timeout.
    async fn drain_stale_packets(&mut self) -> Result<()> {
        loop {
            match self.endpoint.recv_packet().await? {
                Reception::TimedOut => return Ok(()),
                Reception::Packet(packet, addr) if packet.kind != PacketKind::Fin => {
                    debug!(%addr, "discarding unexpected {} before transfer", packet);
                }
                _ => {}
            }
        }
    }

    /// Receives until a timeout, marking acknowledged segments. ACKs are matched
    /// on the wire sequence number among the segments of the current window.
    async fn collect_acks(&mut self, in_flight: &mut [Segment<'_>]) -> Result<bool> {
        let mut progressed = false;
        loop {
            match self.endpoint.recv_packet().await? {
                Reception::TimedOut => return Ok(progressed),
                Reception::Packet(packet, _) if packet.kind == PacketKind::Ack => {
                    for segment in in_flight.iter_mut().filter(|s| s.packet.seq == packet.seq) {
                        segment.acked = true;
                        progressed = true;
                    }
                }
                _ => {}
            }
        }
    }

    /// Best-effort FIN / FIN-ACK exchange. Always succeeds from the caller's
    /// point of view; the return value tells whether the peer confirmed.
    async fn teardown(&mut self) -> Result<bool> {
        for attempt in 1..=self.config.max_fin_attempts {
            self.endpoint
                .send_packet(&RdtpPacket::fin(), self.destination)
                .await;
            match self.endpoint.recv_packet().await? {
                Reception::Packet(packet, _) if packet.kind == PacketKind::FinAck => {
                    debug!(attempt, "teardown confirmed");
                    return Ok(true);
                }
                Reception::Packet(packet, addr) if packet.kind == PacketKind::Data => {
                    debug!(%addr, attempt, "peer started transmitting, teardown done");
                    return Ok(true);
                }
                _ => {}
            }
        }
        debug!("no FIN-ACK received, giving up teardown");
        Ok(false)
    }
}

/// Sends `data` to `destination`.
///
/// Returns a report whose `delivered` flag is `false` when the destination
/// stayed silent for `max_send_attempts` rounds.
pub async fn send_bytes<C>(
    data: &[u8],
    channel: &C,
    destination: SocketAddr,
    config: &RdtpConfiguration,
) -> Result<SendReport>
where
    C: DatagramChannel + ?Sized,
{
    SendEngine::new(channel, destination, config).send(data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty(0, 0)]
    #[case::hello(12, 1)]
    #[case::exactly_one(MAX_PAYLOAD_SIZE, 1)]
    #[case::one_more(MAX_PAYLOAD_SIZE + 1, 2)]
    #[case::five_thousand(5000, 5)]
    fn test_packetize_count(#[case] len: usize, #[case] expected: usize) {
        let data = vec![1u8; len];
        let segments = packetize(&data, SeqSpace::default());
        assert_eq!(segments.len(), expected);
        assert_eq!(expected, (len + MAX_PAYLOAD_SIZE - 1) / MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn packetize_is_complete_and_borrows() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let segments = packetize(&data, SeqSpace::default());
        let joined: Vec<u8> = segments
            .iter()
            .flat_map(|s| s.packet.payload.as_ref().to_vec())
            .collect();
        assert_eq!(joined, data);
        assert!(segments
            .iter()
            .all(|s| matches!(s.packet.payload, crate::payload::Payload::Borrowed(_))));
        assert!(segments.iter().all(|s| s.packet.kind == PacketKind::Data && !s.is_acked()));
    }

    #[test]
    fn packetize_wraps_sequence_numbers() {
        let data = vec![0u8; 3 * MAX_PAYLOAD_SIZE];
        let space = SeqSpace::new(1999);
        let segments = packetize(&data, space);
        let offsets: Vec<_> = segments.iter().map(|s| s.offset).collect();
        let seqs: Vec<_> = segments.iter().map(|s| s.packet.seq).collect();
        assert_eq!(offsets, vec![0, 1019, 2038]);
        assert_eq!(seqs, vec![0, 1019, 38]);
    }
}
