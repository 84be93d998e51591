use std::collections::VecDeque;

use bytes::Bytes;

/// Ordered outgoing frames with at most one write in flight.
///
/// The queue never issues writes itself. Callers take the next frame with
/// [`WriteQueue::next_frame`], issue it, then call
/// [`WriteQueue::mark_outstanding`]; the completion callback calls
/// [`WriteQueue::complete`] before asking for the next frame.
#[derive(Debug, Default)]
pub struct WriteQueue {
    frames: VecDeque<Bytes>,
    outstanding: bool,
    halted: bool,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame.
    pub fn push(&mut self, frame: Bytes) {
        self.frames.push_back(frame);
    }

    /// Pop the head frame if nothing is in flight and the queue is not halted.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.outstanding || self.halted {
            return None;
        }
        self.frames.pop_front()
    }

    /// Record that the frame returned by `next_frame` was issued.
    pub fn mark_outstanding(&mut self) {
        self.outstanding = true;
    }

    /// Record a successful completion of the in-flight write.
    pub fn complete(&mut self) {
        self.outstanding = false;
    }

    /// Stop handing out frames until [`WriteQueue::clear`].
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Drop all frames and clear the outstanding and halted flags.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.outstanding = false;
        self.halted = false;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut queue = WriteQueue::new();
        queue.push(Bytes::from_static(&[1]));
        queue.push(Bytes::from_static(&[2]));

        assert_eq!(queue.next_frame().unwrap().as_ref(), &[1]);
        assert_eq!(queue.next_frame().unwrap().as_ref(), &[2]);
        assert!(queue.next_frame().is_none());
    }

    #[test]
    fn outstanding_write_blocks_next_frame() {
        let mut queue = WriteQueue::new();
        queue.push(Bytes::from_static(&[1]));
        queue.push(Bytes::from_static(&[2]));

        let _first = queue.next_frame().unwrap();
        queue.mark_outstanding();
        assert!(queue.next_frame().is_none());
        assert!(queue.next_frame().is_none(), "repeated polls stay no-ops");
        assert_eq!(queue.len(), 1);

        queue.complete();
        assert_eq!(queue.next_frame().unwrap().as_ref(), &[2]);
    }

    #[test]
    fn halt_stops_draining_until_clear() {
        let mut queue = WriteQueue::new();
        queue.push(Bytes::from_static(&[1]));
        queue.halt();
        assert!(queue.next_frame().is_none());
        assert!(queue.is_halted());

        queue.clear();
        assert!(!queue.is_halted());
        assert!(queue.is_empty());
        assert!(!queue.is_outstanding());
    }
}
