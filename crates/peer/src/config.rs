use std::net::SocketAddr;

use chase::{DEFAULT_PORT, GameConfig, TransportOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerMode {
    Host { bind: SocketAddr },
    Join { bind: SocketAddr, server: SocketAddr },
    /// Both sides in one process over a loopback link.
    Local,
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub mode: PeerMode,
    pub game: GameConfig,
    /// 0 keeps running until the session ends.
    pub max_frames: u64,
    pub autopilot: bool,
    pub transport: TransportOptions,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            mode: PeerMode::Host {
                bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            },
            game: GameConfig::default(),
            max_frames: 0,
            autopilot: true,
            transport: TransportOptions::default(),
        }
    }
}
