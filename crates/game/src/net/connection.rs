use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use super::protocol::{Message, MessageKind, SendPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Identity of a remote peer. Two devices are equal when they share an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameDevice(SocketAddr);

impl GameDevice {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    pub fn addr(self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for GameDevice {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for GameDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message plus the device it is addressed to (outbound) or came from (inbound).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub device: GameDevice,
    pub message: Message,
}

impl Envelope {
    pub fn new(device: GameDevice, message: Message) -> Self {
        Self { device, message }
    }

    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    #[inline]
    pub fn policy(&self) -> SendPolicy {
        self.message.policy()
    }
}

pub trait MessageListener: Send + Sync {
    fn on_message(&self, envelope: &Envelope);
}

impl<F> MessageListener for F
where
    F: Fn(&Envelope) + Send + Sync,
{
    fn on_message(&self, envelope: &Envelope) {
        self(envelope)
    }
}

pub trait ConnectionListener: Send + Sync {
    fn on_player_joined(&self, device: GameDevice);
    fn on_player_left(&self, device: GameDevice);
    fn on_connection_error(&self, message: &str);
}

/// The transport seam between the game core and whatever carries its frames.
///
/// Sends are fire-and-forget: failures are logged by the implementation and
/// never reported back. `disconnect` may be called any number of times.
pub trait GameConnection: Send + Sync {
    fn add_message_listener(&self, kind: MessageKind, listener: Arc<dyn MessageListener>);
    /// Drops every registration of this listener, whatever its kind.
    fn remove_message_listener(&self, listener: &Arc<dyn MessageListener>);
    fn remove_message_listeners(&self);
    fn send(&self, envelope: Envelope);
    fn register_connection_listener(&self, listener: Arc<dyn ConnectionListener>);
    fn unregister_connection_listener(&self);
    fn is_server(&self) -> bool;
    fn disconnect(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Joined(GameDevice),
    Left(GameDevice),
    Error(String),
}

/// Listener bookkeeping shared by every transport.
///
/// Dispatch works on a copy of the registrations so a listener can add or
/// remove listeners while being called.
#[derive(Default)]
pub struct ListenerTable {
    messages: Mutex<Vec<(MessageKind, Arc<dyn MessageListener>)>>,
    connection: Mutex<Option<Arc<dyn ConnectionListener>>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: MessageKind, listener: Arc<dyn MessageListener>) {
        self.messages.lock().push((kind, listener));
    }

    pub fn remove(&self, listener: &Arc<dyn MessageListener>) -> usize {
        let mut messages = self.messages.lock();
        let before = messages.len();
        messages.retain(|(_, registered)| {
            !std::ptr::addr_eq(Arc::as_ptr(registered), Arc::as_ptr(listener))
        });
        before - messages.len()
    }

    pub fn clear_messages(&self) {
        self.messages.lock().clear();
    }

    pub fn set_connection(&self, listener: Arc<dyn ConnectionListener>) {
        *self.connection.lock() = Some(listener);
    }

    pub fn clear_connection(&self) {
        *self.connection.lock() = None;
    }

    pub fn clear(&self) {
        self.clear_messages();
        self.clear_connection();
    }

    pub fn has_listeners_for(&self, kind: MessageKind) -> bool {
        self.messages.lock().iter().any(|(k, _)| *k == kind)
    }

    /// Delivers to every listener registered for the envelope's kind, in
    /// registration order. Returns how many listeners were called.
    pub fn dispatch(&self, envelope: &Envelope) -> usize {
        let kind = envelope.kind();
        let targets: Vec<Arc<dyn MessageListener>> = self
            .messages
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &targets {
            listener.on_message(envelope);
        }
        targets.len()
    }

    pub fn notify(&self, event: ConnectionEvent) {
        let Some(listener) = self.connection.lock().clone() else {
            log::trace!("no connection listener for {event:?}");
            return;
        };

        match event {
            ConnectionEvent::Joined(device) => listener.on_player_joined(device),
            ConnectionEvent::Left(device) => listener.on_player_left(device),
            ConnectionEvent::Error(message) => listener.on_connection_error(&message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn device(port: u16) -> GameDevice {
        GameDevice::new(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)))
    }

    #[test]
    fn devices_compare_by_address() {
        assert_eq!(device(5000), device(5000));
        assert_ne!(device(5000), device(5001));
    }

    #[test]
    fn dispatch_fans_out_by_kind_in_order() {
        let table = ListenerTable::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = Arc::clone(&order);
            table.add(
                MessageKind::Killed,
                Arc::new(move |_: &Envelope| order.lock().push(id)),
            );
        }
        let other = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&other);
        table.add(
            MessageKind::Quit,
            Arc::new(move |_: &Envelope| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let delivered = table.dispatch(&Envelope::new(device(1), Message::Killed));

        assert_eq!(delivered, 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_clear_table_during_dispatch() {
        let table = Arc::new(ListenerTable::new());
        let inner = Arc::clone(&table);
        table.add(
            MessageKind::Quit,
            Arc::new(move |_: &Envelope| inner.clear_messages()),
        );

        assert_eq!(table.dispatch(&Envelope::new(device(1), Message::Quit)), 1);
        assert!(!table.has_listeners_for(MessageKind::Quit));
        assert_eq!(table.dispatch(&Envelope::new(device(1), Message::Quit)), 0);
    }

    #[test]
    fn remove_only_drops_that_listener() {
        let table = ListenerTable::new();
        let kept = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&kept);
        table.add(
            MessageKind::Quit,
            Arc::new(move |_: &Envelope| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let removed: Arc<dyn MessageListener> = Arc::new(|_: &Envelope| {});
        table.add(MessageKind::Quit, Arc::clone(&removed));
        table.add(MessageKind::Killed, Arc::clone(&removed));

        assert_eq!(table.remove(&removed), 2);
        assert!(!table.has_listeners_for(MessageKind::Killed));
        assert_eq!(table.dispatch(&Envelope::new(device(1), Message::Quit)), 1);
        assert_eq!(kept.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_without_listener_is_harmless() {
        let table = ListenerTable::new();
        table.notify(ConnectionEvent::Left(device(9)));
    }
}
