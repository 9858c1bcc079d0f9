use crate::rules::Outcome;
use crate::scene::{Entity, EntityHandle, ShipRole};

/// Something a frame changed that a front end may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ChronoChanged(i32),
    ScoreChanged { local: i32, remote: i32 },
    ShipDestroyed { local: bool },
    RolesInverted { local: ShipRole, remote: ShipRole },
    MatchOver { outcome: Outcome, restart_allowed: bool },
    Restarted,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub frame: u64,
    pub dt_ms: u64,
    pub inbound: usize,
    pub events: Vec<GameEvent>,
}

/// Rendering seam, called once per live entity at the end of every frame.
pub trait DrawHook: Send {
    fn draw(&mut self, handle: EntityHandle, entity: &Entity, now_ms: u64);
}

impl<F> DrawHook for F
where
    F: FnMut(EntityHandle, &Entity, u64) + Send,
{
    fn draw(&mut self, handle: EntityHandle, entity: &Entity, now_ms: u64) {
        self(handle, entity, now_ms)
    }
}
