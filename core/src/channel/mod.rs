//! Push channel: signal registry, envelope decoding, wire framing, and the
//! WebSocket client.

pub mod envelope;
pub mod packet;
pub mod socket;

pub use envelope::{MessageKind, PushEnvelope, PushNotice};
pub use packet::{EnginePacket, Handshake, SocketPacket};
pub use socket::SocketChannel;

use std::collections::BTreeSet;
use std::future::Future;

/// Lifecycle and data signals a channel can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    Connect,
    Disconnect,
    Message,
    Pong,
}

impl Signal {
    pub const ALL: [Signal; 4] = [
        Signal::Connect,
        Signal::Disconnect,
        Signal::Message,
        Signal::Pong,
    ];

    pub fn event_name(self) -> &'static str {
        match self {
            Signal::Connect => "connect",
            Signal::Disconnect => "disconnect",
            Signal::Message => "message",
            Signal::Pong => "pong",
        }
    }
}

/// Event delivered to the consumer of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    /// Raw text payload of a `"message"` event.
    Message(String),
    Pong,
}

impl ChannelEvent {
    pub fn signal(&self) -> Signal {
        match self {
            ChannelEvent::Connected => Signal::Connect,
            ChannelEvent::Disconnected => Signal::Disconnect,
            ChannelEvent::Message(_) => Signal::Message,
            ChannelEvent::Pong => Signal::Pong,
        }
    }
}

/// Set of signals a consumer currently listens to.
#[derive(Debug, Clone, Default)]
pub struct SignalRegistry {
    active: BTreeSet<Signal>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the signal was already registered.
    pub fn subscribe(&mut self, signal: Signal) -> bool {
        self.active.insert(signal)
    }

    /// Returns `false` when the signal was not registered.
    pub fn unsubscribe(&mut self, signal: Signal) -> bool {
        self.active.remove(&signal)
    }

    pub fn allows(&self, signal: Signal) -> bool {
        self.active.contains(&signal)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Source of push events owned by its consumer.
///
/// `next_event` yields only events whose signal is subscribed and returns
/// `None` once the channel is closed for good.
pub trait PushChannel {
    fn subscribe(&mut self, signal: Signal);
    fn unsubscribe(&mut self, signal: Signal);
    fn next_event(&mut self) -> impl Future<Output = Option<ChannelEvent>> + Send;
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_subscribe_and_unsubscribe_are_symmetric() {
        let mut registry = SignalRegistry::new();
        for signal in Signal::ALL {
            assert!(registry.subscribe(signal));
        }
        assert!(!registry.subscribe(Signal::Message));
        for signal in Signal::ALL {
            assert!(registry.unsubscribe(signal));
        }
        assert!(registry.is_empty());
        assert!(!registry.allows(Signal::Pong));
    }

    #[test]
    fn events_map_to_their_signal() {
        assert_eq!(ChannelEvent::Message("x".into()).signal(), Signal::Message);
        assert_eq!(ChannelEvent::Disconnected.signal(), Signal::Disconnect);
        assert_eq!(Signal::Pong.event_name(), "pong");
    }
}
