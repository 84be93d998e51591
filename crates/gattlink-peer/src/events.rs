//! Listener surface shared by both roles, and the teardown gate in front of it.

use bytes::Bytes;

use crate::error::PeerError;

/// Receives peer lifecycle and data events from a role.
///
/// Called synchronously from inside transport callbacks; implementations
/// must not block.
pub trait Listener {
    fn on_peer_connected(&mut self);

    fn on_peer_disconnected(&mut self);

    fn on_message_received(&mut self, message: Bytes);

    fn on_transport_specific_session_termination(&mut self);

    fn on_error(&mut self, error: PeerError);
}

/// A listener notification as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    PeerConnected,
    PeerDisconnected,
    MessageReceived(Bytes),
    TransportSpecificSessionTermination,
    Error(PeerError),
}

impl PeerEvent {
    /// Replay this event onto a listener.
    pub fn dispatch<L: Listener + ?Sized>(self, listener: &mut L) {
        match self {
            Self::PeerConnected => listener.on_peer_connected(),
            Self::PeerDisconnected => listener.on_peer_disconnected(),
            Self::MessageReceived(message) => listener.on_message_received(message),
            Self::TransportSpecificSessionTermination => {
                listener.on_transport_specific_session_termination()
            }
            Self::Error(error) => listener.on_error(error),
        }
    }
}

// Listener impls for channel-like sinks of `PeerEvent` values.
macro_rules! sink_listener {
    ($ty:ty, |$sink:ident, $event:ident| $push:expr) => {
        impl Listener for $ty {
            fn on_peer_connected(&mut self) {
                self.push_event(PeerEvent::PeerConnected);
            }

            fn on_peer_disconnected(&mut self) {
                self.push_event(PeerEvent::PeerDisconnected);
            }

            fn on_message_received(&mut self, message: Bytes) {
                self.push_event(PeerEvent::MessageReceived(message));
            }

            fn on_transport_specific_session_termination(&mut self) {
                self.push_event(PeerEvent::TransportSpecificSessionTermination);
            }

            fn on_error(&mut self, error: PeerError) {
                self.push_event(PeerEvent::Error(error));
            }
        }

        impl PushEvent for $ty {
            fn push_event(&mut self, $event: PeerEvent) {
                let $sink = self;
                $push
            }
        }
    };
}

trait PushEvent {
    fn push_event(&mut self, event: PeerEvent);
}

sink_listener!(Vec<PeerEvent>, |sink, event| sink.push(event));

sink_listener!(std::sync::mpsc::Sender<PeerEvent>, |sink, event| {
    // A dropped receiver means nobody is listening any more.
    if sink.send(event).is_err() {
        tracing::trace!("listener channel closed, event dropped");
    }
});

#[cfg(feature = "async")]
sink_listener!(tokio::sync::mpsc::UnboundedSender<PeerEvent>, |sink, event| {
    if sink.send(event).is_err() {
        tracing::trace!("listener channel closed, event dropped");
    }
});

/// Suppresses listener notifications once a connection has been torn down.
///
/// Each connection attempt opens a new epoch. Closing the gate discards every
/// later notification, including those caused by completions that were
/// already in flight when the connection was dropped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventGate {
    epoch: u64,
    open: bool,
}

impl EventGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch and let notifications through. Returns the epoch.
    pub fn open(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.open = true;
        self.epoch
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// A listener behind an [`EventGate`].
#[derive(Debug)]
pub(crate) struct GatedListener<L> {
    gate: EventGate,
    listener: L,
}

impl<L: Listener> GatedListener<L> {
    pub(crate) fn new(listener: L) -> Self {
        Self {
            gate: EventGate::new(),
            listener,
        }
    }

    pub(crate) fn gate(&self) -> &EventGate {
        &self.gate
    }

    pub(crate) fn open(&mut self) -> u64 {
        self.gate.open()
    }

    pub(crate) fn close(&mut self) {
        self.gate.close();
    }

    pub(crate) fn listener(&self) -> &L {
        &self.listener
    }

    pub(crate) fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    fn deliver(&mut self, event: PeerEvent) {
        if !self.gate.is_open() {
            tracing::debug!(epoch = self.gate.epoch(), ?event, "suppressed after teardown");
            return;
        }
        event.dispatch(&mut self.listener);
    }

    pub(crate) fn peer_connected(&mut self) {
        self.deliver(PeerEvent::PeerConnected);
    }

    pub(crate) fn peer_disconnected(&mut self) {
        self.deliver(PeerEvent::PeerDisconnected);
    }

    pub(crate) fn message_received(&mut self, message: Bytes) {
        self.deliver(PeerEvent::MessageReceived(message));
    }

    pub(crate) fn session_termination(&mut self) {
        self.deliver(PeerEvent::TransportSpecificSessionTermination);
    }

    pub(crate) fn error(&mut self, error: PeerError) {
        tracing::debug!(%error, "reporting error");
        self.deliver(PeerEvent::Error(error));
    }
}

#[cfg(feature = "async")]
pub mod stream {
    //! Async adapters for consuming [`PeerEvent`]s from a tokio runtime.

    use std::pin::Pin;
    use std::task::{Context, Poll};

    use futures_core::Stream;
    use tokio::sync::mpsc;

    use super::PeerEvent;

    /// Receiving half of an [`event_channel`], usable as a [`Stream`].
    #[derive(Debug)]
    pub struct EventStream {
        rx: mpsc::UnboundedReceiver<PeerEvent>,
    }

    impl EventStream {
        pub fn new(rx: mpsc::UnboundedReceiver<PeerEvent>) -> Self {
            Self { rx }
        }

        /// Wait for the next event; `None` once every sender is gone.
        pub async fn recv(&mut self) -> Option<PeerEvent> {
            self.rx.recv().await
        }
    }

    impl Stream for EventStream {
        type Item = PeerEvent;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<PeerEvent>> {
            self.rx.poll_recv(cx)
        }
    }

    /// A listener sender paired with its event stream.
    pub fn event_channel() -> (mpsc::UnboundedSender<PeerEvent>, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, EventStream::new(rx))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::events::Listener;

        #[tokio::test]
        async fn sender_feeds_stream_in_order() {
            let (mut tx, mut stream) = event_channel();
            tx.on_peer_connected();
            tx.on_message_received(bytes::Bytes::from_static(b"hi"));
            drop(tx);

            let first = std::future::poll_fn(|cx| Pin::new(&mut stream).poll_next(cx)).await;
            assert_eq!(first, Some(PeerEvent::PeerConnected));
            assert_eq!(
                stream.recv().await,
                Some(PeerEvent::MessageReceived(bytes::Bytes::from_static(b"hi")))
            );
            assert_eq!(stream.recv().await, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_epochs_increase() {
        let mut gate = EventGate::new();
        assert!(!gate.is_open());
        assert_eq!(gate.open(), 1);
        gate.close();
        assert!(!gate.is_open());
        assert_eq!(gate.open(), 2);
        assert!(gate.is_open());
    }

    #[test]
    fn closed_gate_suppresses_everything() {
        let mut events = GatedListener::new(Vec::<PeerEvent>::new());
        events.peer_connected();
        assert!(events.listener().is_empty());

        events.open();
        events.peer_connected();
        events.message_received(Bytes::from_static(b"abc"));
        events.close();
        events.peer_disconnected();
        events.error(PeerError::NoPeer);

        assert_eq!(
            events.listener(),
            &vec![
                PeerEvent::PeerConnected,
                PeerEvent::MessageReceived(Bytes::from_static(b"abc")),
            ]
        );
    }

    #[test]
    fn mpsc_sender_is_a_listener() {
        let (mut tx, rx) = std::sync::mpsc::channel::<PeerEvent>();
        tx.on_transport_specific_session_termination();
        tx.on_error(PeerError::IdentMismatch);
        drop(rx);
        // Sending into a closed channel is silently dropped.
        tx.on_peer_disconnected();
    }

    #[test]
    fn dispatch_replays_onto_listener() {
        let mut seen: Vec<PeerEvent> = Vec::new();
        PeerEvent::MessageReceived(Bytes::from_static(b"x")).dispatch(&mut seen);
        PeerEvent::PeerDisconnected.dispatch(&mut seen);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], PeerEvent::PeerDisconnected);
    }
}
