use crate::packet::MAX_PAYLOAD_SIZE;
use crate::seq_number::{SeqSpace, MAX_SEQ_NUM};
use std::time::Duration;
use tokio::io::{Error, ErrorKind, Result};

const DEFAULT_WINDOW_SIZE: u32 = 8192;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(50);
const DEFAULT_UDP_BUF_SIZE: usize = 1_000_000;

pub const MAX_SEND_ATTEMPTS: u32 = 500;
pub const MAX_WAIT_ATTEMPTS: u32 = 500;
pub const MAX_FIN_ATTEMPTS: u32 = 50;

/// Options for one RDTP transfer.
///
/// Both peers should agree on `window_size` and `max_seq_num`; the rest is
/// local to each side.
#[derive(Debug, Clone)]
pub struct RdtpConfiguration {
    /// Probability in `[0, 1]` that a received datagram is classified as corrupted
    /// and discarded. Used to exercise the protocol on a clean network.
    /// Default: 0
    pub corruption_probability: f64,
    /// Probability in `[0, 1]` that a received datagram is classified as lost.
    /// Loss takes priority over corruption when both apply.
    /// Default: 0
    pub loss_probability: f64,
    /// Size of the sliding window in bytes, on both the sending and the receiving side.
    /// Default: 8192
    pub window_size: u32,
    /// How long a single receive waits for a datagram before timing out.
    /// Every retransmission round lasts at least this long, so keep it small.
    /// Default: 50ms
    pub timeout: Duration,
    /// Largest sequence number on the wire. Sequence numbers are stream offsets
    /// modulo `max_seq_num + 1`. Must be at least `3 * window_size + MAX_PAYLOAD_SIZE - 1`
    /// so that wrapped sequence numbers can be told apart.
    /// Default: `u32::MAX`
    pub max_seq_num: u32,
    /// Consecutive send rounds without any acknowledgment before the destination
    /// is declared unreachable. At least 1. Default: 500
    pub max_send_attempts: u32,
    /// Consecutive receive timeouts, after the first packet arrived, before the
    /// connection is declared lost. At least 1. Default: 500
    pub max_wait_attempts: u32,
    /// FIN transmissions before the sender gives up waiting for a FIN-ACK.
    /// At least 1. Default: 50
    pub max_fin_attempts: u32,
    /// Seed for the fault injector. `None` seeds it from OS entropy.
    pub fault_seed: Option<u64>,
    /// Sending buffer size applied on the UDP socket by [`crate::bind_udp`].
    /// The actual value used by the kernel is bounded by "net.core.wmem_max".
    pub udp_snd_buf_size: usize,
    /// Receiving buffer size applied on the UDP socket by [`crate::bind_udp`].
    /// The actual value used by the kernel is bounded by "net.core.rmem_max".
    pub udp_rcv_buf_size: usize,
}

impl RdtpConfiguration {
    pub fn seq_space(&self) -> SeqSpace {
        SeqSpace::new(self.max_seq_num)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("corruption probability", self.corruption_probability),
            ("loss probability", self.loss_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("{} must be within [0, 1], got {}", name, p),
                ));
            }
        }
        if self.window_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "window size must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(Error::new(ErrorKind::InvalidInput, "timeout must be positive"));
        }
        for (name, attempts) in [
            ("max_send_attempts", self.max_send_attempts),
            ("max_wait_attempts", self.max_wait_attempts),
            ("max_fin_attempts", self.max_fin_attempts),
        ] {
            if attempts == 0 {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("{} must be at least 1", name),
                ));
            }
        }
        let required = 3 * self.window_size as u64 + MAX_PAYLOAD_SIZE as u64;
        if self.seq_space().size() < required {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "sequence space of {} is too small for a window of {} bytes (needs {})",
                    self.seq_space().size(),
                    self.window_size,
                    required
                ),
            ));
        }
        Ok(())
    }
}

impl Default for RdtpConfiguration {
    fn default() -> Self {
        Self {
            corruption_probability: 0.0,
            loss_probability: 0.0,
            window_size: DEFAULT_WINDOW_SIZE,
            timeout: DEFAULT_TIMEOUT,
            max_seq_num: MAX_SEQ_NUM,
            max_send_attempts: MAX_SEND_ATTEMPTS,
            max_wait_attempts: MAX_WAIT_ATTEMPTS,
            max_fin_attempts: MAX_FIN_ATTEMPTS,
            fault_seed: None,
            udp_snd_buf_size: DEFAULT_UDP_BUF_SIZE,
            udp_rcv_buf_size: DEFAULT_UDP_BUF_SIZE,
        }
    }
}
