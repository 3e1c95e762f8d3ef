mod buffer;
mod channel;
mod configuration;
mod endpoint;
mod fault;
mod packet;
mod payload;
mod receiver;
mod retry;
mod sender;
mod seq_number;
mod window;

pub use buffer::ReassemblyBuffer;
pub use channel::{bind_udp, DatagramChannel};
pub use configuration::{
    RdtpConfiguration, MAX_FIN_ATTEMPTS, MAX_SEND_ATTEMPTS, MAX_WAIT_ATTEMPTS,
};
pub use fault::{FaultInjector, Verdict};
pub use packet::{PacketKind, RdtpPacket, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, RDTP_HEADER_SIZE};
pub use payload::Payload;
pub use receiver::{receive_bytes, Reassembly, ReceiveEngine, Received};
pub use retry::RetryBudget;
pub use sender::{packetize, send_bytes, SendEngine, SendReport, Segment};
pub use seq_number::{SeqSpace, MAX_SEQ_NUM};
pub use window::Window;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
