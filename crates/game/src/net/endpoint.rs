use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use super::connection::{
    ConnectionEvent, ConnectionListener, ConnectionState, Envelope, GameConnection, GameDevice,
    ListenerTable, MessageListener,
};
use super::outbox::Outbox;
use super::protocol::{MAX_FRAME_SIZE, MessageKind, SendPolicy};
use super::stats::NetworkStats;
use super::tracking::{Datagram, ReceiveChannel, SendChannel};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_MS: u64 = 1;
const DEFAULT_LINGER_MS: u64 = 250;
const SEND_IDLE_WAIT: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("not connected")]
    NotConnected,
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    /// A peer that stays silent this long is reported as having left.
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
    /// How long `disconnect` keeps resending unacknowledged frames.
    pub linger: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            linger: Duration::from_millis(DEFAULT_LINGER_MS),
        }
    }
}

/// UDP transport: one socket, a receive thread and a send thread.
///
/// A hosting connection accepts frames from any address and reports each new
/// address as a joined player. A joining connection only talks to its server.
///
/// Queue-all messages travel as sequenced frames that are acknowledged,
/// resent until acknowledged and released to listeners in order. A peer that
/// only ever sends bare frames is answered with bare frames.
pub struct UdpConnection {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    socket: UdpSocket,
    local_addr: SocketAddr,
    server_addr: Option<SocketAddr>,
    listeners: ListenerTable,
    outbox: Mutex<Outbox>,
    wake: Sender<()>,
    running: AtomicBool,
    announced: AtomicBool,
    peers: Mutex<HashMap<SocketAddr, PeerLink>>,
    state: Mutex<ConnectionState>,
    stats: Mutex<NetworkStats>,
    options: TransportOptions,
}

impl UdpConnection {
    pub fn host<A: ToSocketAddrs>(addr: A, options: TransportOptions) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)?;
        Self::start(socket, None, options)
    }

    pub fn join<A: ToSocketAddrs>(
        bind: A,
        server: SocketAddr,
        options: TransportOptions,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(bind)?;
        Self::start(socket, Some(server), options)
    }

    fn start(
        socket: UdpSocket,
        server_addr: Option<SocketAddr>,
        options: TransportOptions,
    ) -> Result<Self, TransportError> {
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);

        let mut peers = HashMap::new();
        let state = match server_addr {
            Some(server) => {
                peers.insert(server, PeerLink::new(true));
                ConnectionState::Connected
            }
            None => ConnectionState::Connecting,
        };

        let shared = Arc::new(Shared {
            socket,
            local_addr,
            server_addr,
            listeners: ListenerTable::new(),
            outbox: Mutex::new(Outbox::new()),
            wake: wake_tx,
            running: AtomicBool::new(true),
            announced: AtomicBool::new(false),
            peers: Mutex::new(peers),
            state: Mutex::new(state),
            stats: Mutex::new(NetworkStats::default()),
            options,
        });

        let receiver = Arc::clone(&shared);
        let recv_thread = thread::Builder::new()
            .name("chase-net-recv".into())
            .spawn(move || receiver.receive_loop())?;

        let sender = Arc::clone(&shared);
        let send_thread = thread::Builder::new()
            .name("chase-net-send".into())
            .spawn(move || sender.send_loop(wake_rx))?;

        match server_addr {
            Some(server) => log::info!("UDP connection on {local_addr} joining {server}"),
            None => log::info!("UDP connection hosting on {local_addr}"),
        }

        Ok(Self {
            shared,
            workers: Mutex::new(vec![recv_thread, send_thread]),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    pub fn stats(&self) -> NetworkStats {
        self.shared.stats.lock().clone()
    }

    pub fn peer_count(&self) -> usize {
        self.shared.peers.lock().len()
    }
}

impl GameConnection for UdpConnection {
    fn add_message_listener(&self, kind: MessageKind, listener: Arc<dyn MessageListener>) {
        self.shared.listeners.add(kind, listener);
    }

    fn remove_message_listener(&self, listener: &Arc<dyn MessageListener>) {
        self.shared.listeners.remove(listener);
    }

    fn remove_message_listeners(&self) {
        self.shared.listeners.clear_messages();
    }

    fn send(&self, envelope: Envelope) {
        if !self.shared.running.load(Ordering::SeqCst) {
            log::debug!(
                "dropped {:?}: {}",
                envelope.kind(),
                TransportError::NotConnected
            );
            return;
        }

        if !envelope.kind().is_high_frequency() {
            log::debug!("sending {:?} to {}", envelope.kind(), envelope.device);
        }

        if self.shared.outbox.lock().push(envelope) {
            self.shared.stats.lock().snapshots_coalesced += 1;
        }

        match self.shared.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => log::debug!("send thread gone"),
        }
    }

    fn register_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.shared.listeners.set_connection(Arc::clone(&listener));

        if let Some(server) = self.shared.server_addr {
            if !self.shared.announced.swap(true, Ordering::SeqCst) {
                listener.on_player_joined(GameDevice::new(server));
            }
        }
    }

    fn unregister_connection_listener(&self) {
        self.shared.listeners.clear_connection();
    }

    fn is_server(&self) -> bool {
        self.shared.server_addr.is_none()
    }

    fn disconnect(&self) {
        if !self.shared.running.load(Ordering::SeqCst) {
            return;
        }

        self.shared.flush();
        self.shared.linger();
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        log::info!("UDP connection on {} closed", self.shared.local_addr);
        self.shared.listeners.clear();
        self.shared.outbox.lock().clear();
        *self.shared.state.lock() = ConnectionState::Disconnected;
        let _ = self.shared.wake.try_send(());

        let current = thread::current().id();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                log::warn!("network thread panicked");
            }
        }
    }
}

impl Drop for UdpConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl Shared {
    fn receive_loop(&self) {
        let mut buf = [0u8; MAX_FRAME_SIZE];

        while self.running.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((size, addr)) => self.handle_frame(&buf[..size], addr),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.expire_idle_peers();
                    thread::sleep(self.options.poll_interval);
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    log::debug!("peer unreachable: {e}");
                }
                Err(e) => {
                    log::warn!("receive failed: {e}");
                    self.listeners.notify(ConnectionEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }

    fn handle_frame(&self, data: &[u8], addr: SocketAddr) {
        if let Some(server) = self.server_addr {
            if addr != server {
                log::debug!("ignored frame from unknown address {addr}");
                return;
            }
        }

        let datagram = match Datagram::decode(data) {
            Ok(datagram) => datagram,
            Err(e) => {
                self.stats.lock().record_malformed();
                log::debug!("dropped frame from {addr}: {e}");
                return;
            }
        };
        self.stats.lock().record_received(data.len());

        let now = Instant::now();
        let mut reply = None;
        let (is_new, ready) = {
            let mut peers = self.peers.lock();
            let is_new = !peers.contains_key(&addr);
            let link = peers
                .entry(addr)
                .or_insert_with(|| PeerLink::new(datagram.is_sequenced()));
            link.last_seen = now;
            link.sequenced |= datagram.is_sequenced();

            let ready = match datagram {
                Datagram::Plain(message) => vec![message],
                Datagram::Reliable { sequence, message } => {
                    let ready = link.incoming.accept(sequence, message);
                    let (last, bitfield) = link.incoming.ack_data();
                    reply = Some(Datagram::Ack {
                        ack: last,
                        bitfield,
                    });
                    ready
                }
                Datagram::Ack { ack, bitfield } => {
                    link.outgoing.process_ack(ack, bitfield, now);
                    Vec::new()
                }
            };
            (is_new, ready)
        };

        if let Some(ack) = reply {
            if let Err(e) = self.send_datagram(&ack, addr) {
                log::debug!("ack to {addr} failed: {e}");
            }
        }

        if is_new {
            log::info!("player joined from {addr}");
            *self.state.lock() = ConnectionState::Connected;
            self.listeners
                .notify(ConnectionEvent::Joined(GameDevice::new(addr)));
        }

        for message in ready {
            let envelope = Envelope::new(GameDevice::new(addr), message);
            if !envelope.kind().is_high_frequency() {
                log::debug!("received {:?} from {addr}", envelope.kind());
            }
            self.listeners.dispatch(&envelope);
        }
    }

    fn expire_idle_peers(&self) {
        let timeout = self.options.idle_timeout;
        let expired: Vec<SocketAddr> = {
            let mut peers = self.peers.lock();
            let expired: Vec<SocketAddr> = peers
                .iter()
                .filter(|(_, link)| link.last_seen.elapsed() > timeout)
                .map(|(addr, _)| *addr)
                .collect();
            for addr in &expired {
                peers.remove(addr);
            }
            expired
        };

        for addr in expired {
            log::info!("player at {addr} timed out");
            if self.server_addr.is_none() && self.peers.lock().is_empty() {
                *self.state.lock() = ConnectionState::Connecting;
            }
            self.listeners
                .notify(ConnectionEvent::Left(GameDevice::new(addr)));
        }
    }

    fn send_loop(&self, wake: Receiver<()>) {
        while self.running.load(Ordering::SeqCst) {
            match wake.recv_timeout(SEND_IDLE_WAIT) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {
                    self.flush();
                    self.resend_due();
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn flush(&self) {
        let pending = self.outbox.lock().drain();
        for envelope in pending {
            let addr = envelope.device.addr();
            let datagram = self.frame_for(&envelope);
            if let Err(e) = self.send_datagram(&datagram, addr) {
                self.stats.lock().record_send_error();
                log::debug!("send of {:?} to {addr} failed: {e}", envelope.kind());
            }
        }
    }

    /// Queue-all messages to a sequenced peer get a sequence number and are
    /// tracked until acknowledged.
    fn frame_for(&self, envelope: &Envelope) -> Datagram {
        if envelope.policy() == SendPolicy::QueueAll {
            if let Some(link) = self.peers.lock().get_mut(&envelope.device.addr()) {
                if link.sequenced {
                    let sequence = link.outgoing.track(envelope.message, Instant::now());
                    return Datagram::Reliable {
                        sequence,
                        message: envelope.message,
                    };
                }
            }
        }
        Datagram::Plain(envelope.message)
    }

    fn resend_due(&self) -> usize {
        let now = Instant::now();
        let due: Vec<(SocketAddr, Datagram)> = {
            let mut peers = self.peers.lock();
            peers
                .iter_mut()
                .flat_map(|(addr, link)| {
                    link.outgoing
                        .due_for_resend(now)
                        .into_iter()
                        .map(move |(sequence, message)| {
                            (*addr, Datagram::Reliable { sequence, message })
                        })
                })
                .collect()
        };

        for (addr, datagram) in &due {
            log::trace!("resending {:?} to {addr}", datagram);
            match self.send_datagram(datagram, *addr) {
                Ok(_) => self.stats.lock().frames_resent += 1,
                Err(e) => {
                    self.stats.lock().record_send_error();
                    log::debug!("resend to {addr} failed: {e}");
                }
            }
        }
        due.len()
    }

    fn unacked_count(&self) -> usize {
        self.peers
            .lock()
            .values()
            .map(|link| link.outgoing.unacked_count())
            .sum()
    }

    /// Keeps resending until every peer acknowledged what it was sent or the
    /// linger time is up.
    fn linger(&self) {
        let deadline = Instant::now() + self.options.linger;
        while self.unacked_count() > 0 {
            if Instant::now() >= deadline {
                log::debug!("closing with {} unacknowledged frames", self.unacked_count());
                return;
            }
            self.resend_due();
            thread::sleep(self.options.poll_interval);
        }
    }

    fn send_datagram(&self, datagram: &Datagram, addr: SocketAddr) -> Result<usize, TransportError> {
        let data = datagram.encode();
        if data.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(data.len()));
        }

        let bytes = self.socket.send_to(&data, addr)?;
        self.stats.lock().record_sent(bytes);
        Ok(bytes)
    }
}

/// Per-address bookkeeping on a UDP connection.
struct PeerLink {
    last_seen: Instant,
    /// Whether this peer speaks the sequenced framing.
    sequenced: bool,
    outgoing: SendChannel,
    incoming: ReceiveChannel,
}

impl PeerLink {
    fn new(sequenced: bool) -> Self {
        Self {
            last_seen: Instant::now(),
            sequenced,
            outgoing: SendChannel::new(),
            incoming: ReceiveChannel::new(),
        }
    }
}
