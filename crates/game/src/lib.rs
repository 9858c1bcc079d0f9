pub mod config;
pub mod net;
pub mod rules;
pub mod scene;
pub mod session;
pub mod simulation;

pub use config::GameConfig;
pub use net::{
    CodecError, ConnectionState, DEFAULT_PORT, Envelope, GameConnection, GameDevice,
    LoopbackConnection, Message, MessageKind, NetworkStats, PROTOCOL_VERSION, TransportError,
    TransportOptions, UdpConnection,
};
pub use rules::{Arbiter, Outcome, ScoreBoard};
pub use scene::{Entity, EntityHandle, EntityRegistry, ReactorPower, ShipRole};
pub use session::{
    CloseReason, GameSession, RejectReason, SessionEvent, SessionNegotiator, SessionState,
};
pub use simulation::{DrawHook, FrameClock, FrameTimer, GameEvent, Simulation, TickReport};
