use bytes::{Bytes, BytesMut};

use crate::codec::FLAG_LAST;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Rebuilds messages from inbound frames.
///
/// Payloads accumulate until a terminal frame arrives; the whole message is
/// then returned and the buffer starts empty again. No size limit is applied.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: BytesMut,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Feed one inbound value.
    ///
    /// Returns `Ok(Some(message))` when `value` was the terminal frame.
    /// An empty value is rejected and leaves the buffer untouched.
    pub fn push(&mut self, value: &[u8]) -> Result<Option<Bytes>> {
        let (&flag, payload) = value.split_first().ok_or(FrameError::EmptyFrame)?;
        self.buf.extend_from_slice(payload);

        if flag != FLAG_LAST {
            return Ok(None);
        }
        Ok(Some(self.buf.split().freeze()))
    }

    /// Bytes of a partially received message.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partially received message.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}
