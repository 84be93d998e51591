use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Leading byte of a frame that has more frames after it.
pub const FLAG_MORE: u8 = 0x01;

/// Leading byte of the last frame of a message.
pub const FLAG_LAST: u8 = 0x00;

/// Minimum ATT MTU, assumed until negotiation says otherwise.
pub const DEFAULT_MTU: u16 = 23;

/// Largest ATT MTU allowed by Bluetooth LE.
pub const MAX_MTU: u16 = 517;

/// Per-write overhead: 3 bytes of ATT header plus the continuation flag.
pub const FRAME_OVERHEAD: usize = 4;

/// Smallest MTU that still carries one payload byte per frame.
pub const MIN_MTU: u16 = FRAME_OVERHEAD as u16 + 1;

/// One wire fragment of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// More frames of the same message follow.
    pub more: bool,
    /// The chunk payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(more: bool, payload: impl Into<Bytes>) -> Self {
        Self {
            more,
            payload: payload.into(),
        }
    }

    /// The size of this frame on the wire (flag + payload).
    pub fn wire_size(&self) -> usize {
        1 + self.payload.len()
    }
}

/// Payload bytes available per frame at `mtu`.
pub fn max_chunk_size(mtu: u16) -> Result<usize> {
    if mtu < MIN_MTU {
        return Err(FrameError::MtuTooSmall { mtu, min: MIN_MTU });
    }
    Ok(mtu as usize - FRAME_OVERHEAD)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────────────────────┐
/// │ Flag (1B)  │ Payload               │
/// │ 0x01 more  │ (0..=MTU-4 bytes)     │
/// │ 0x00 last  │                       │
/// └────────────┴───────────────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(frame.wire_size());
    dst.put_u8(if frame.more { FLAG_MORE } else { FLAG_LAST });
    dst.put_slice(&frame.payload);
}

/// Decode a single inbound value.
///
/// Any leading byte other than [`FLAG_LAST`] is treated as a continuation.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    let (&flag, payload) = src.split_first().ok_or(FrameError::EmptyFrame)?;
    Ok(Frame {
        more: flag != FLAG_LAST,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Split `data` into encoded frames for `mtu`.
///
/// Always yields at least one frame: an empty message becomes a single
/// terminal frame with no payload.
pub fn split_message(data: &[u8], mtu: u16) -> Result<Vec<Bytes>> {
    let max_chunk = max_chunk_size(mtu)?;

    if data.is_empty() {
        return Ok(vec![Bytes::from_static(&[FLAG_LAST])]);
    }

    let count = data.len().div_ceil(max_chunk);
    let mut frames = Vec::with_capacity(count);
    for (index, chunk) in data.chunks(max_chunk).enumerate() {
        let mut buf = BytesMut::with_capacity(chunk.len() + 1);
        encode_frame(
            &Frame::new(index + 1 < count, Bytes::copy_from_slice(chunk)),
            &mut buf,
        );
        frames.push(buf.freeze());
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_split_forty_bytes_at_default_mtu() {
        let data: Vec<u8> = (0u8..40).collect();
        let frames = split_message(&data, DEFAULT_MTU).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0][0], FLAG_MORE);
        assert_eq!(&frames[0][1..], &data[0..19]);
        assert_eq!(frames[1][0], FLAG_MORE);
        assert_eq!(&frames[1][1..], &data[19..38]);
        assert_eq!(frames[2][0], FLAG_LAST);
        assert_eq!(&frames[2][1..], &data[38..40]);
    }

    #[test]
    fn test_empty_message_is_single_terminal_frame() {
        let frames = split_message(&[], DEFAULT_MTU).unwrap();
        assert_eq!(frames, vec![Bytes::from_static(&[FLAG_LAST])]);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_frame() {
        let data = vec![0xAB; 38];
        let frames = split_message(&data, DEFAULT_MTU).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1][0], FLAG_LAST);
        assert_eq!(frames[1].len(), 20);
    }

    #[test]
    fn test_mtu_too_small() {
        let result = split_message(b"x", 4);
        assert!(matches!(
            result,
            Err(FrameError::MtuTooSmall { mtu: 4, min: 5 })
        ));
    }

    #[test]
    fn test_decode_empty_value_rejected() {
        assert_eq!(decode_frame(&[]), Err(FrameError::EmptyFrame));
    }

    #[test]
    fn test_decode_nonzero_flag_is_continuation() {
        let frame = decode_frame(&[0x7F, 1, 2]).unwrap();
        assert!(frame.more);
        assert_eq!(frame.payload.as_ref(), &[1, 2]);
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(false, Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), 5);
    }

    proptest! {
        #[test]
        fn frame_count_law(len in 0usize..2048, mtu in MIN_MTU..=MAX_MTU) {
            let data = vec![0x5Au8; len];
            let frames = split_message(&data, mtu).unwrap();
            let max_chunk = mtu as usize - FRAME_OVERHEAD;
            let expected = if len == 0 { 1 } else { len.div_ceil(max_chunk) };

            prop_assert_eq!(frames.len(), expected);
            prop_assert!(frames.iter().all(|f| f.len() <= max_chunk + 1));
            let terminal = frames.iter().filter(|f| f[0] == FLAG_LAST).count();
            prop_assert_eq!(terminal, 1);
            prop_assert_eq!(frames.last().map(|f| f[0]), Some(FLAG_LAST));
        }
    }
}
