use crate::configuration::RdtpConfiguration;
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::io::Result;
use tokio::net::UdpSocket;

/// An unreliable, unordered datagram channel.
#[async_trait]
pub trait DatagramChannel: Send + Sync {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;
}

#[async_trait]
impl DatagramChannel for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// Binds a UDP socket with the kernel buffer sizes from `config`.
pub async fn bind_udp(bind_addr: SocketAddr, config: &RdtpConfiguration) -> Result<UdpSocket> {
    let socket = Socket::new(
        Domain::for_address(bind_addr),
        Type::DGRAM,
        Some(Protocol::UDP),
    )?;
    socket.set_send_buffer_size(config.udp_snd_buf_size)?;
    socket.set_recv_buffer_size(config.udp_rcv_buf_size)?;
    socket.bind(&bind_addr.into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bound_socket_exchanges_datagrams() {
        let config = RdtpConfiguration::default();
        let a = bind_udp("127.0.0.1:0".parse().unwrap(), &config).await.unwrap();
        let b = bind_udp("127.0.0.1:0".parse().unwrap(), &config).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        DatagramChannel::send_to(&a, b"ping", b_addr).await.unwrap();
        let mut buf = [0; 16];
        let (len, from) = DatagramChannel::recv_from(&b, &mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, a.local_addr().unwrap());
    }
}
