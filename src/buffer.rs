use bytes::{Bytes, BytesMut};
use tokio::io::{Error, ErrorKind, Result};

/// Receive-side stream storage, addressed by absolute offset.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    data: BytesMut,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copies `payload` at `offset`, growing the buffer as needed. Bytes in a
    /// gap stay zero until their own segment arrives; writing the same segment
    /// twice leaves the buffer unchanged.
    ///
    /// Fails with `InvalidData` when the segment lies beyond what this
    /// platform can address.
    pub fn write_at(&mut self, offset: u64, payload: &[u8]) -> Result<()> {
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| start.checked_add(payload.len()).map(|end| (start, end)));
        let (start, end) = range.ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidData,
                format!("segment at offset {} is not addressable", offset),
            )
        })?;
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(payload);
        Ok(())
    }

    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}
