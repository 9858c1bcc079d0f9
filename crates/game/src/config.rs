use serde::{Deserialize, Serialize};

use crate::net::PROTOCOL_VERSION;
use crate::scene::DEFAULT_SNAPSHOT_BLEND;

pub const MATCH_DURATION_SECS: i32 = 60;
pub const DEBUG_MATCH_DURATION_SECS: i32 = 20;
pub const NOTICE_TICKS: u32 = 3;
pub const FRAME_PERIOD_MS: u64 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub match_duration_secs: i32,
    /// Chrono ticks the role notice stays up after roles change.
    pub notice_ticks: u32,
    pub frame_period_ms: u64,
    pub protocol_version: i32,
    /// Weight of each remote snapshot when correcting the remote ship.
    pub snapshot_blend: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            match_duration_secs: if cfg!(debug_assertions) {
                DEBUG_MATCH_DURATION_SECS
            } else {
                MATCH_DURATION_SECS
            },
            notice_ticks: NOTICE_TICKS,
            frame_period_ms: FRAME_PERIOD_MS,
            protocol_version: PROTOCOL_VERSION,
            snapshot_blend: DEFAULT_SNAPSHOT_BLEND,
        }
    }
}
