use bytes::Bytes;

/// Payload of a DATA packet.
///
/// Outbound segments borrow from the caller's buffer so a transfer never holds
/// a second copy of the whole stream. Parsed packets own a copy, since the
/// datagram buffer they come from is reused for the next receive.
#[derive(Debug, Clone)]
pub enum Payload<'a> {
    Borrowed(&'a [u8]),
    Owned(Bytes),
}

impl<'a> Payload<'a> {
    pub fn empty() -> Self {
        Self::Borrowed(&[])
    }
}

impl AsRef<[u8]> for Payload<'_> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Borrowed(data) => data,
            Self::Owned(data) => data,
        }
    }
}

impl PartialEq for Payload<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl Eq for Payload<'_> {}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::Borrowed(data)
    }
}

impl From<Bytes> for Payload<'static> {
    fn from(data: Bytes) -> Self {
        Self::Owned(data)
    }
}
