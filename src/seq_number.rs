/// Largest wire sequence number of the reference configuration.
pub const MAX_SEQ_NUM: u32 = u32::MAX;

/// The wire sequence space `[0, max_seq_num]`.
///
/// Stream offsets are unbounded; a DATA packet carries its offset modulo the
/// size of the space, and the receiver counts rollovers to recover it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SeqSpace {
    max_seq_num: u32,
}

impl SeqSpace {
    pub fn new(max_seq_num: u32) -> Self {
        Self { max_seq_num }
    }

    /// Number of distinct sequence numbers, `max_seq_num + 1`.
    pub fn size(self) -> u64 {
        self.max_seq_num as u64 + 1
    }

    pub fn seq_for_offset(self, offset: u64) -> u32 {
        (offset % self.size()) as u32
    }

    pub fn offset_for(self, seq: u32, rollovers: u64) -> u64 {
        seq as u64 + rollovers * self.size()
    }
}

impl Default for SeqSpace {
    fn default() -> Self {
        Self::new(MAX_SEQ_NUM)
    }
}
