use super::payload::Payload;
use bytes::Bytes;
use std::fmt;
use tokio::io::{Error, ErrorKind, Result};

/// Maximum size of a serialized packet, header included.
pub const MAX_PACKET_SIZE: usize = 1024;
pub const RDTP_HEADER_SIZE: usize = 5;
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - RDTP_HEADER_SIZE;

const FLAG_ACK: u8 = 1 << 7;
const FLAG_FIN: u8 = 1 << 6;
const RESERVED_FLAGS: u8 = !(FLAG_ACK | FLAG_FIN);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Data,
    Ack,
    Fin,
    FinAck,
}

impl PacketKind {
    pub fn flags(self) -> u8 {
        match self {
            Self::Data => 0,
            Self::Ack => FLAG_ACK,
            Self::Fin => FLAG_FIN,
            Self::FinAck => FLAG_ACK | FLAG_FIN,
        }
    }

    pub fn is_ack(self) -> bool {
        self.flags() & FLAG_ACK != 0
    }

    pub fn is_fin(self) -> bool {
        self.flags() & FLAG_FIN != 0
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = &'static str;

    fn try_from(flags: u8) -> std::result::Result<Self, Self::Error> {
        if flags & RESERVED_FLAGS != 0 {
            return Err("reserved flag bits are set");
        }
        Ok(match (flags & FLAG_ACK != 0, flags & FLAG_FIN != 0) {
            (false, false) => Self::Data,
            (true, false) => Self::Ack,
            (false, true) => Self::Fin,
            (true, true) => Self::FinAck,
        })
    }
}

/// A protocol message.
///
/// ```text
///  0        1                               5
/// +--------+--------+--------+--------+--------+------------------
/// |A|F|0..0|          sequence number (BE)     | payload (DATA only)
/// +--------+--------+--------+--------+--------+------------------
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdtpPacket<'a> {
    pub kind: PacketKind,
    /// Only meaningful for DATA and ACK packets.
    pub seq: u32,
    pub payload: Payload<'a>,
}

impl<'a> RdtpPacket<'a> {
    pub fn data(seq: u32, payload: &'a [u8]) -> Self {
        Self {
            kind: PacketKind::Data,
            seq,
            payload: Payload::Borrowed(payload),
        }
    }

    pub fn ack(seq: u32) -> Self {
        Self {
            kind: PacketKind::Ack,
            seq,
            payload: Payload::empty(),
        }
    }

    pub fn fin() -> Self {
        Self {
            kind: PacketKind::Fin,
            seq: 0,
            payload: Payload::empty(),
        }
    }

    pub fn fin_ack() -> Self {
        Self {
            kind: PacketKind::FinAck,
            seq: 0,
            payload: Payload::empty(),
        }
    }

    pub fn serialized_len(&self) -> usize {
        RDTP_HEADER_SIZE + self.payload.as_ref().len()
    }

    /// Panics if the packet does not fit in [`MAX_PACKET_SIZE`]: segmentation
    /// never produces such a packet.
    pub fn serialize(&self) -> Vec<u8> {
        let len = self.serialized_len();
        assert!(
            len <= MAX_PACKET_SIZE,
            "packet of {} bytes exceeds the maximum packet size",
            len
        );
        let mut buffer: Vec<u8> = Vec::with_capacity(len);
        buffer.push(self.kind.flags());
        buffer.extend_from_slice(&self.seq.to_be_bytes());
        buffer.extend_from_slice(self.payload.as_ref());
        buffer
    }

    pub fn deserialize(raw: &[u8]) -> Result<RdtpPacket<'static>> {
        if raw.len() < RDTP_HEADER_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "datagram too short for an RDTP header",
            ));
        }
        if raw.len() > MAX_PACKET_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "datagram exceeds the maximum packet size",
            ));
        }

        let kind =
            PacketKind::try_from(raw[0]).map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
        let seq = u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]);
        let data = &raw[RDTP_HEADER_SIZE..];
        if kind != PacketKind::Data && !data.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "control packet carries a payload",
            ));
        }

        Ok(RdtpPacket {
            kind,
            seq,
            payload: Payload::Owned(Bytes::copy_from_slice(data)),
        })
    }
}

impl fmt::Display for RdtpPacket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PacketKind::Data => {
                write!(f, "DATA seq={} len={}", self.seq, self.payload.as_ref().len())
            }
            PacketKind::Ack => write!(f, "ACK seq={}", self.seq),
            PacketKind::Fin => write!(f, "FIN"),
            PacketKind::FinAck => write!(f, "FIN-ACK"),
        }
    }
}
