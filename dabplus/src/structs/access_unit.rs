use std::sync::Arc;

/// A single AAC access unit lifted out of a superframe.
///
/// Depending on the negotiated output mode the payload holds either the
/// bare AAC frame or the same frame with a 7 byte ADTS header prepended.
#[derive(Clone, Debug)]
pub struct AccessUnit {
    /// Byte offset of the frame within the superframe
    pub start: usize,

    /// Size of the bare frame in bytes, excluding any prepended header
    pub size: usize,

    /// Output payload
    pub data: Arc<[u8]>,
}

impl AsRef<[u8]> for AccessUnit {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
