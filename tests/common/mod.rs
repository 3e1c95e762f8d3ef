use async_trait::async_trait;
use rdtp::{
    bind_udp, DatagramChannel, PacketKind, RdtpConfiguration, RdtpPacket, MAX_PACKET_SIZE,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::Result;
use tokio::net::UdpSocket;

/// Loopback UDP socket that counts outgoing DATA packets and silently drops
/// every `drop_every`-th outgoing datagram.
pub struct FlakyChannel {
    socket: UdpSocket,
    drop_every: Option<usize>,
    sent: AtomicUsize,
    dropped: AtomicUsize,
    data_packets: AtomicUsize,
}

impl FlakyChannel {
    pub async fn bind(config: &RdtpConfiguration, drop_every: Option<usize>) -> Self {
        let socket = bind_udp("127.0.0.1:0".parse().unwrap(), config)
            .await
            .unwrap();
        Self {
            socket,
            drop_every,
            sent: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            data_packets: AtomicUsize::new(0),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    pub fn data_packets(&self) -> usize {
        self.data_packets.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatagramChannel for FlakyChannel {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        if matches!(RdtpPacket::deserialize(buf), Ok(p) if p.kind == PacketKind::Data) {
            self.data_packets.fetch_add(1, Ordering::SeqCst);
        }
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(self.drop_every, Some(k) if n % k == 0) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            return Ok(buf.len());
        }
        self.socket.send_to(buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

pub fn quick_config() -> RdtpConfiguration {
    RdtpConfiguration {
        timeout: Duration::from_millis(20),
        max_fin_attempts: 5,
        ..Default::default()
    }
}

pub fn stream(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Stands in for a receive engine: acknowledges every DATA packet and answers
/// each FIN with `fin_reply`, if any. Returns once `fins` FINs have arrived.
pub async fn ack_data_until_fins(
    socket: &UdpSocket,
    fins: usize,
    fin_reply: Option<RdtpPacket<'_>>,
) {
    let mut buf = [0; MAX_PACKET_SIZE];
    let mut seen = 0;
    while seen < fins {
        let (len, from) = socket.recv_from(&mut buf).await.unwrap();
        let packet = RdtpPacket::deserialize(&buf[..len]).unwrap();
        match packet.kind {
            PacketKind::Data => {
                let ack = RdtpPacket::ack(packet.seq).serialize();
                socket.send_to(&ack, from).await.unwrap();
            }
            PacketKind::Fin => {
                seen += 1;
                if let Some(reply) = &fin_reply {
                    socket.send_to(&reply.serialize(), from).await.unwrap();
                }
            }
            _ => {}
        }
    }
}
