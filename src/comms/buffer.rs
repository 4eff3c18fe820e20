//! Fixed-capacity, NUL-terminated receive buffer.
//!
//! Inbound payloads are copied here before parsing so an oversized message
//! can never grow the heap: anything past `N - 1` bytes is dropped and the
//! last byte is always a terminator.

/// Default capacity of a command receive buffer.
pub const RECEIVE_BUFFER_LEN: usize = 256;

pub struct TerminatedBuffer<const N: usize> {
    bytes: [u8; N],
    len: usize,
    truncated: bool,
}

impl<const N: usize> Default for TerminatedBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TerminatedBuffer<N> {
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
            truncated: false,
        }
    }

    /// Most payload bytes the buffer keeps.
    pub const fn capacity() -> usize {
        N.saturating_sub(1)
    }

    /// Replace the contents with `payload`, truncated to `N - 1` bytes.
    pub fn fill(&mut self, payload: &[u8]) -> &[u8] {
        let len = payload.len().min(Self::capacity());
        self.bytes[..len].copy_from_slice(&payload[..len]);
        if N > 0 {
            self.bytes[len] = 0;
        }
        self.len = len;
        self.truncated = payload.len() > len;
        self.as_bytes()
    }

    /// Payload bytes, without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Payload plus terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes[..(self.len + 1).min(N)]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the last `fill` dropped bytes.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}
