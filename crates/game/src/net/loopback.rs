use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::connection::{
    ConnectionEvent, ConnectionListener, Envelope, GameConnection, GameDevice, ListenerTable,
    MessageListener,
};
use super::protocol::{Message, MessageKind};
use super::stats::NetworkStats;

const HOST_PORT: u16 = 1;
const GUEST_PORT: u16 = 2;

/// In-process transport. Frames still go through the wire codec but are
/// delivered synchronously on the sender's thread.
pub struct LoopbackConnection {
    local: Arc<LoopbackEndpoint>,
    peer: Weak<LoopbackEndpoint>,
}

struct LoopbackEndpoint {
    device: GameDevice,
    is_server: bool,
    listeners: ListenerTable,
    open: AtomicBool,
    announced: AtomicBool,
    stats: Mutex<NetworkStats>,
}

impl LoopbackEndpoint {
    fn new(port: u16, is_server: bool) -> Arc<Self> {
        Arc::new(Self {
            device: GameDevice::new(SocketAddr::from(([127, 0, 0, 1], port))),
            is_server,
            listeners: ListenerTable::new(),
            open: AtomicBool::new(true),
            announced: AtomicBool::new(false),
            stats: Mutex::new(NetworkStats::default()),
        })
    }

    fn deliver(&self, frame: &[u8], from: GameDevice) {
        if !self.open.load(Ordering::SeqCst) {
            return;
        }

        let message = match Message::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                self.stats.lock().record_malformed();
                log::debug!("dropped frame from {from}: {e}");
                return;
            }
        };
        self.stats.lock().record_received(frame.len());

        if self.is_server && !self.announced.swap(true, Ordering::SeqCst) {
            log::info!("player joined from {from}");
            self.listeners.notify(ConnectionEvent::Joined(from));
        }

        self.listeners.dispatch(&Envelope::new(from, message));
    }
}

impl LoopbackConnection {
    /// Returns the hosting end and the joining end of one link.
    pub fn pair() -> (LoopbackConnection, LoopbackConnection) {
        let host = LoopbackEndpoint::new(HOST_PORT, true);
        let guest = LoopbackEndpoint::new(GUEST_PORT, false);
        (
            LoopbackConnection {
                local: Arc::clone(&host),
                peer: Arc::downgrade(&guest),
            },
            LoopbackConnection {
                local: guest,
                peer: Arc::downgrade(&host),
            },
        )
    }

    pub fn device(&self) -> GameDevice {
        self.local.device
    }

    pub fn is_open(&self) -> bool {
        self.local.open.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> NetworkStats {
        self.local.stats.lock().clone()
    }
}

impl GameConnection for LoopbackConnection {
    fn add_message_listener(&self, kind: MessageKind, listener: Arc<dyn MessageListener>) {
        self.local.listeners.add(kind, listener);
    }

    fn remove_message_listener(&self, listener: &Arc<dyn MessageListener>) {
        self.local.listeners.remove(listener);
    }

    fn remove_message_listeners(&self) {
        self.local.listeners.clear_messages();
    }

    fn send(&self, envelope: Envelope) {
        if !self.is_open() {
            log::debug!("dropped {:?}: connection closed", envelope.kind());
            return;
        }
        let Some(peer) = self.peer.upgrade() else {
            log::debug!("dropped {:?}: peer gone", envelope.kind());
            return;
        };
        if envelope.device != peer.device {
            log::debug!("dropped {:?}: no device at {}", envelope.kind(), envelope.device);
            return;
        }

        let frame = envelope.message.encode();
        self.local.stats.lock().record_sent(frame.len());
        peer.deliver(&frame, self.local.device);
    }

    fn register_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.local.listeners.set_connection(Arc::clone(&listener));

        if !self.local.is_server && !self.local.announced.swap(true, Ordering::SeqCst) {
            if let Some(peer) = self.peer.upgrade() {
                listener.on_player_joined(peer.device);
            }
        }
    }

    fn unregister_connection_listener(&self) {
        self.local.listeners.clear_connection();
    }

    fn is_server(&self) -> bool {
        self.local.is_server
    }

    fn disconnect(&self) {
        if !self.local.open.swap(false, Ordering::SeqCst) {
            return;
        }

        self.local.listeners.clear();
        if let Some(peer) = self.peer.upgrade() {
            if peer.open.load(Ordering::SeqCst) {
                peer.listeners
                    .notify(ConnectionEvent::Left(self.local.device));
            }
        }
    }
}

impl Drop for LoopbackConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Recorder {
        joined: Mutex<Vec<GameDevice>>,
        left: Mutex<Vec<GameDevice>>,
    }

    impl ConnectionListener for Recorder {
        fn on_player_joined(&self, device: GameDevice) {
            self.joined.lock().push(device);
        }

        fn on_player_left(&self, device: GameDevice) {
            self.left.lock().push(device);
        }

        fn on_connection_error(&self, _message: &str) {}
    }

    #[test]
    fn delivers_through_codec() {
        let (host, guest) = LoopbackConnection::pair();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        host.add_message_listener(
            MessageKind::Chrono,
            Arc::new(move |e: &Envelope| sink.lock().push(*e)),
        );

        guest.send(Envelope::new(host.device(), Message::Chrono { seconds: 12 }));

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].device, guest.device());
        assert_eq!(received[0].message, Message::Chrono { seconds: 12 });
        assert_eq!(guest.stats().bytes_sent, 5);
    }

    #[test]
    fn join_and_leave_are_reported() {
        let (host, guest) = LoopbackConnection::pair();
        let host_events = Arc::new(Recorder::default());
        let guest_events = Arc::new(Recorder::default());
        host.register_connection_listener(host_events.clone());
        guest.register_connection_listener(guest_events.clone());

        assert_eq!(*guest_events.joined.lock(), vec![host.device()]);
        assert!(host_events.joined.lock().is_empty());

        guest.send(Envelope::new(host.device(), Message::Quit));
        guest.send(Envelope::new(host.device(), Message::Quit));
        assert_eq!(*host_events.joined.lock(), vec![guest.device()]);

        guest.disconnect();
        guest.disconnect();
        assert_eq!(*host_events.left.lock(), vec![guest.device()]);
    }

    #[test]
    fn sends_after_disconnect_are_swallowed() {
        let (host, guest) = LoopbackConnection::pair();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        host.add_message_listener(
            MessageKind::Killed,
            Arc::new(move |_: &Envelope| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        host.disconnect();
        guest.send(Envelope::new(host.device(), Message::Killed));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
