use bytes::Bytes;

use crate::codec::{split_message, DEFAULT_MTU};
use crate::error::Result;
use crate::queue::WriteQueue;
use crate::reassembler::Reassembler;

/// Per-connection chunked message state: outgoing queue, inbound
/// reassembly buffer and negotiated MTU.
///
/// Both GATT roles own exactly one of these per connection. The role
/// supplies the actual write/notify call to [`ChunkedTransport::drain`].
#[derive(Debug, Default)]
pub struct ChunkedTransport {
    queue: WriteQueue,
    reassembler: Reassembler,
    negotiated_mtu: u16,
}

impl ChunkedTransport {
    pub fn new() -> Self {
        Self {
            queue: WriteQueue::new(),
            reassembler: Reassembler::new(),
            negotiated_mtu: 0,
        }
    }

    /// Record the negotiated MTU.
    pub fn set_mtu(&mut self, mtu: u16) {
        self.negotiated_mtu = mtu;
    }

    /// The negotiated MTU, if any.
    pub fn mtu(&self) -> Option<u16> {
        (self.negotiated_mtu != 0).then_some(self.negotiated_mtu)
    }

    /// Split `data` into frames and append them to the write queue.
    ///
    /// Returns the number of frames queued. Call [`ChunkedTransport::drain`]
    /// afterwards to start sending.
    pub fn enqueue_message(&mut self, data: &[u8]) -> Result<usize> {
        if self.negotiated_mtu == 0 {
            tracing::warn!(
                default_mtu = DEFAULT_MTU,
                "MTU not negotiated, defaulting to minimum; performance will suffer"
            );
            self.negotiated_mtu = DEFAULT_MTU;
        }

        let frames = split_message(data, self.negotiated_mtu)?;
        tracing::trace!(
            len = data.len(),
            frames = frames.len(),
            mtu = self.negotiated_mtu,
            data = %hex::encode(data),
            "queueing message"
        );

        let count = frames.len();
        for frame in frames {
            self.queue.push(frame);
        }
        Ok(count)
    }

    /// Issue the next queued frame through `issue`, unless a write is
    /// already outstanding or the queue is halted.
    ///
    /// Returns `Ok(true)` when a frame was issued. If `issue` fails the frame
    /// is dropped, the queue halts and the error is returned.
    pub fn drain<E, F>(&mut self, issue: F) -> std::result::Result<bool, E>
    where
        F: FnOnce(&[u8]) -> std::result::Result<(), E>,
    {
        tracing::trace!(
            outstanding = self.queue.is_outstanding(),
            queued = self.queue.len(),
            "drain"
        );
        let Some(frame) = self.queue.next_frame() else {
            return Ok(false);
        };

        tracing::trace!(chunk = %hex::encode(&frame), "writing chunk");
        match issue(&frame) {
            Ok(()) => {
                self.queue.mark_outstanding();
                Ok(true)
            }
            Err(err) => {
                self.queue.halt();
                Err(err)
            }
        }
    }

    /// Handle the completion of the in-flight write.
    ///
    /// On success the outstanding flag clears and the caller should drain
    /// again. On failure the queue halts and `false` is returned.
    pub fn complete_write(&mut self, success: bool) -> bool {
        if success {
            self.queue.complete();
        } else {
            self.queue.halt();
        }
        success
    }

    /// Feed one inbound value; returns a whole message on its terminal frame.
    pub fn receive(&mut self, value: &[u8]) -> Result<Option<Bytes>> {
        self.reassembler.push(value)
    }

    /// Forget all queued frames, partial input and the negotiated MTU.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.reassembler.reset();
        self.negotiated_mtu = 0;
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    pub fn is_write_outstanding(&self) -> bool {
        self.queue.is_outstanding()
    }

    pub fn is_halted(&self) -> bool {
        self.queue.is_halted()
    }

    pub fn pending_receive_len(&self) -> usize {
        self.reassembler.pending_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FLAG_LAST;

    #[test]
    fn unknown_mtu_falls_back_to_default() {
        let mut link = ChunkedTransport::new();
        assert_eq!(link.mtu(), None);

        let frames = link.enqueue_message(&[0u8; 40]).unwrap();
        assert_eq!(frames, 3);
        assert_eq!(link.mtu(), Some(DEFAULT_MTU));
    }

    #[test]
    fn only_one_write_in_flight() {
        let mut link = ChunkedTransport::new();
        link.set_mtu(23);
        link.enqueue_message(&[7u8; 40]).unwrap();

        let mut issued: Vec<Vec<u8>> = Vec::new();
        let sent = link
            .drain(|frame| {
                issued.push(frame.to_vec());
                Ok::<(), ()>(())
            })
            .unwrap();
        assert!(sent);

        // Redundant drains while the first write is outstanding are no-ops.
        for _ in 0..3 {
            let sent = link
                .drain(|frame| {
                    issued.push(frame.to_vec());
                    Ok::<(), ()>(())
                })
                .unwrap();
            assert!(!sent);
        }
        assert_eq!(issued.len(), 1);

        while link.complete_write(true) {
            let sent = link
                .drain(|frame| {
                    issued.push(frame.to_vec());
                    Ok::<(), ()>(())
                })
                .unwrap();
            if !sent {
                break;
            }
        }

        assert_eq!(issued.len(), 3);
        assert_eq!(issued[2][0], FLAG_LAST);
        assert!(!link.is_write_outstanding());
    }

    #[test]
    fn queued_messages_all_eventually_written() {
        let mut link = ChunkedTransport::new();
        link.set_mtu(23);

        let mut written = 0usize;
        let mut expected = 0usize;
        link.drain(|_| Ok::<(), ()>(())).unwrap();
        for size in [0usize, 5, 19, 20, 100] {
            expected += link.enqueue_message(&vec![1u8; size]).unwrap();
            if link.drain(|_| Ok::<(), ()>(())).unwrap() {
                written += 1;
            }
        }

        while link.is_write_outstanding() {
            link.complete_write(true);
            if link.drain(|_| Ok::<(), ()>(())).unwrap() {
                written += 1;
            }
        }

        assert_eq!(written, expected);
        assert_eq!(expected, 1 + 1 + 1 + 2 + 6);
    }

    #[test]
    fn failed_issue_halts_queue() {
        let mut link = ChunkedTransport::new();
        link.set_mtu(23);
        link.enqueue_message(&[1u8; 40]).unwrap();

        let result = link.drain(|_| Err("radio off"));
        assert_eq!(result, Err("radio off"));
        assert!(link.is_halted());
        assert!(!link.is_write_outstanding());
        assert!(!link.drain(|_| Ok::<(), &str>(())).unwrap());
    }

    #[test]
    fn failed_completion_halts_queue() {
        let mut link = ChunkedTransport::new();
        link.set_mtu(23);
        link.enqueue_message(&[1u8; 40]).unwrap();
        link.drain(|_| Ok::<(), ()>(())).unwrap();

        assert!(!link.complete_write(false));
        assert!(link.is_halted());
        assert!(!link.drain(|_| Ok::<(), ()>(())).unwrap());

        link.reset();
        assert!(!link.is_halted());
        assert_eq!(link.queued_frames(), 0);
    }

    #[test]
    fn receive_delivers_on_terminal_frame() {
        let mut link = ChunkedTransport::new();
        assert_eq!(link.receive(&[0x01, 1]).unwrap(), None);
        assert_eq!(link.pending_receive_len(), 1);
        assert_eq!(
            link.receive(&[0x00, 2]).unwrap(),
            Some(Bytes::from_static(&[1, 2]))
        );
        assert_eq!(link.pending_receive_len(), 0);
    }
}
