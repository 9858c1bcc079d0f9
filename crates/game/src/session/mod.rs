use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::net::{
    ConnectionListener, Envelope, GameConnection, GameDevice, Message, MessageKind,
    MessageListener,
};

const SESSION_KINDS: [MessageKind; 5] = [
    MessageKind::VersionCheck,
    MessageKind::VersionMismatch,
    MessageKind::SessionFull,
    MessageKind::Quit,
    MessageKind::StartGame,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    VersionMismatch,
    SessionFull,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::VersionMismatch => "protocol version mismatch",
            RejectReason::SessionFull => "session full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    LocalQuit,
    PeerQuit,
    PeerLeft,
    ConnectionError(String),
}

impl CloseReason {
    pub fn as_str(&self) -> &str {
        match self {
            CloseReason::LocalQuit => "quit",
            CloseReason::PeerQuit => "other player quit",
            CloseReason::PeerLeft => "other player left",
            CloseReason::ConnectionError(message) => message,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingStart,
    Playing,
    Rejected(RejectReason),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The match can begin against this device.
    Started(GameDevice),
    /// The hosting peer turned this peer away.
    Rejected(RejectReason),
    /// This hosting peer turned a device away.
    Refused {
        device: GameDevice,
        reason: RejectReason,
    },
    Closed(CloseReason),
}

/// Who this peer plays against, once negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    is_server: bool,
    other_player: Option<GameDevice>,
    state: SessionState,
}

impl GameSession {
    pub fn new(is_server: bool) -> Self {
        Self {
            is_server,
            other_player: None,
            state: SessionState::Idle,
        }
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn other_player(&self) -> Option<GameDevice> {
        self.other_player
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }
}

/// Runs the join handshake on top of a connection.
///
/// The joining peer sends `VersionCheck` as soon as the host is reachable;
/// the host answers `StartGame`, `VersionMismatch` or `SessionFull`. Only one
/// other player is accepted at a time. Outcomes are reported on the event
/// channel returned by [`SessionNegotiator::attach`].
pub struct SessionNegotiator {
    connection: Weak<dyn GameConnection>,
    protocol_version: i32,
    session: Mutex<GameSession>,
    events: Sender<SessionEvent>,
}

impl SessionNegotiator {
    pub fn attach(
        connection: &Arc<dyn GameConnection>,
        protocol_version: i32,
    ) -> (Arc<Self>, Receiver<SessionEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        let negotiator = Arc::new(Self {
            connection: Arc::downgrade(connection),
            protocol_version,
            session: Mutex::new(GameSession::new(connection.is_server())),
            events,
        });

        // message listeners first: a loopback peer may answer synchronously
        // from inside the join notification
        for kind in SESSION_KINDS {
            connection.add_message_listener(kind, negotiator.clone());
        }
        connection.register_connection_listener(negotiator.clone());

        (negotiator, receiver)
    }

    pub fn session(&self) -> GameSession {
        self.session.lock().clone()
    }

    pub fn other_player(&self) -> Option<GameDevice> {
        self.session.lock().other_player
    }

    /// Tells the other player this peer is leaving and closes the session.
    pub fn quit(&self) {
        if let Some(other) = self.other_player() {
            self.send(other, Message::Quit);
        }
        self.close(CloseReason::LocalQuit);
    }

    fn on_version_check(&self, device: GameDevice, version: i32) {
        if !self.session.lock().is_server {
            log::debug!("ignored version check from {device}, not hosting");
            return;
        }

        let reply = if version != self.protocol_version {
            log::warn!(
                "{device} speaks protocol {version}, expected {}",
                self.protocol_version
            );
            self.emit(SessionEvent::Refused {
                device,
                reason: RejectReason::VersionMismatch,
            });
            Message::VersionMismatch
        } else {
            let mut session = self.session.lock();
            let busy_with = session
                .other_player
                .filter(|other| *other != device && session.state != SessionState::Closed);
            match busy_with {
                Some(other) => {
                    drop(session);
                    log::info!("refused {device}, already playing against {other}");
                    self.emit(SessionEvent::Refused {
                        device,
                        reason: RejectReason::SessionFull,
                    });
                    Message::SessionFull
                }
                None => {
                    session.other_player = Some(device);
                    session.state = SessionState::Playing;
                    drop(session);
                    log::info!("{device} joined, starting game");
                    self.emit(SessionEvent::Started(device));
                    Message::StartGame
                }
            }
        };

        self.send(device, reply);
    }

    fn on_start_game(&self, device: GameDevice) {
        {
            let mut session = self.session.lock();
            if session.is_server {
                log::debug!("ignored start from {device} while hosting");
                return;
            }
            if session.is_playing() && session.other_player == Some(device) {
                return;
            }
            session.other_player = Some(device);
            session.state = SessionState::Playing;
        }

        log::info!("game started by {device}");
        self.emit(SessionEvent::Started(device));
    }

    fn on_rejected(&self, device: GameDevice, reason: RejectReason) {
        {
            let mut session = self.session.lock();
            if session.is_server {
                return;
            }
            session.state = SessionState::Rejected(reason);
        }

        log::warn!("{device} rejected this peer: {}", reason.as_str());
        self.emit(SessionEvent::Rejected(reason));
    }

    fn on_quit(&self, device: GameDevice) {
        if self.other_player() == Some(device) {
            self.close(CloseReason::PeerQuit);
        }
    }

    fn close(&self, reason: CloseReason) {
        {
            let mut session = self.session.lock();
            if session.state == SessionState::Closed {
                return;
            }
            session.state = SessionState::Closed;
            session.other_player = None;
        }

        log::info!("session closed: {}", reason.as_str());
        self.emit(SessionEvent::Closed(reason));
    }

    fn send(&self, device: GameDevice, message: Message) {
        match self.connection.upgrade() {
            Some(connection) => connection.send(Envelope::new(device, message)),
            None => log::debug!("connection gone, {:?} not sent", message.kind()),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            log::trace!("session events no longer observed");
        }
    }
}

impl MessageListener for SessionNegotiator {
    fn on_message(&self, envelope: &Envelope) {
        let device = envelope.device;
        match envelope.message {
            Message::VersionCheck { version } => self.on_version_check(device, version),
            Message::StartGame => self.on_start_game(device),
            Message::VersionMismatch => self.on_rejected(device, RejectReason::VersionMismatch),
            Message::SessionFull => self.on_rejected(device, RejectReason::SessionFull),
            Message::Quit => self.on_quit(device),
            _ => {}
        }
    }
}

impl ConnectionListener for SessionNegotiator {
    fn on_player_joined(&self, device: GameDevice) {
        let is_server = {
            let mut session = self.session.lock();
            if !session.is_server {
                session.state = SessionState::AwaitingStart;
            }
            session.is_server
        };

        if is_server {
            log::debug!("{device} reachable, waiting for its version check");
        } else {
            log::info!("connected to {device}, checking protocol version");
            self.send(
                device,
                Message::VersionCheck {
                    version: self.protocol_version,
                },
            );
        }
    }

    fn on_player_left(&self, device: GameDevice) {
        if self.other_player() == Some(device) {
            self.close(CloseReason::PeerLeft);
        } else {
            log::debug!("{device} left");
        }
    }

    fn on_connection_error(&self, message: &str) {
        self.close(CloseReason::ConnectionError(message.to_string()));
    }
}
