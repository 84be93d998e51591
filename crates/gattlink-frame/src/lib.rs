//! MTU-bounded message chunking with single-outstanding-write flow control.
//!
//! Every message is split into frames of at most `MTU - 4` payload bytes,
//! each prefixed with one continuation byte:
//! - `0x01`: more frames follow
//! - `0x00`: last frame of the message
//!
//! An empty message is still one frame. Frames are written one at a time;
//! the next write is only issued from the previous write's completion.

pub mod chunked;
pub mod codec;
pub mod error;
pub mod queue;
pub mod reassembler;

pub use chunked::ChunkedTransport;
pub use codec::{
    decode_frame, encode_frame, max_chunk_size, split_message, Frame, DEFAULT_MTU, FLAG_LAST,
    FLAG_MORE, FRAME_OVERHEAD, MAX_MTU, MIN_MTU,
};
pub use error::{FrameError, Result};
pub use queue::WriteQueue;
pub use reassembler::Reassembler;
