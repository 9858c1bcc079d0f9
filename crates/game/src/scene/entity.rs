use std::f32::consts::TAU;

use glam::Vec2;

use crate::net::Message;

use super::explosion::Explosion;
use super::projectile::Projectile;
use super::ship::{LocalShip, RemoteShip, Ship};

const BRAKE_FACTOR: f32 = 0.0004;

/// Kinematic state every entity carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    rotation: f32,
    pub visible: bool,
    pub finished: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self::at(Vec2::ZERO)
    }
}

impl Body {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            visible: true,
            finished: false,
        }
    }

    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Stored in [0, 2π).
    pub fn set_rotation(&mut self, radians: f32) {
        let wrapped = radians.rem_euclid(TAU);
        // rem_euclid rounds tiny negative angles up to exactly TAU
        self.rotation = if wrapped >= TAU { 0.0 } else { wrapped };
    }

    pub fn integrate(&mut self, dt_ms: f32) {
        if self.velocity != Vec2::ZERO {
            self.position += self.velocity * dt_ms;
        }
    }

    /// Slows the body along its heading; stops it outright instead of
    /// reversing it.
    pub fn brake(&mut self, dt_ms: f32) {
        let speed = self.velocity.length();
        if speed <= 0.0 {
            return;
        }

        let braked = self.velocity - self.velocity / speed * dt_ms * BRAKE_FACTOR;
        let flipped = braked.x * self.velocity.x < 0.0 || braked.y * self.velocity.y < 0.0;
        self.velocity = if flipped { Vec2::ZERO } else { braked };
    }
}

/// Deferred side effects of one entity update, applied by the frame loop
/// once every entity has been updated.
#[derive(Debug)]
pub enum Effect {
    Spawn(Entity),
    NeutralizeRoles,
    InvertRoles,
    Send(Message),
}

pub struct FrameContext<'a> {
    pub now_ms: u64,
    pub dt_ms: f32,
    pub match_over: bool,
    pub killers: &'a [Vec2],
    pub effects: &'a mut Vec<Effect>,
}

impl FrameContext<'_> {
    #[inline]
    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }
}

#[derive(Debug)]
pub enum SimulationStrategy {
    LocalPredicted(LocalShip),
    RemoteInterpolated(RemoteShip),
    Projectile(Projectile),
    Effect(Explosion),
}

#[derive(Debug)]
pub struct Entity {
    pub body: Body,
    pub strategy: SimulationStrategy,
}

impl Entity {
    pub fn new(body: Body, strategy: SimulationStrategy) -> Self {
        Self { body, strategy }
    }

    pub fn update(&mut self, ctx: &mut FrameContext<'_>) {
        match &mut self.strategy {
            SimulationStrategy::LocalPredicted(ship) => ship.update(&mut self.body, ctx),
            SimulationStrategy::RemoteInterpolated(ship) => ship.update(&mut self.body, ctx),
            SimulationStrategy::Projectile(projectile) => projectile.update(&mut self.body, ctx),
            SimulationStrategy::Effect(explosion) => explosion.update(&mut self.body, ctx),
        }
    }

    /// Offers an inbound message to this entity; entities ignore what is not
    /// meant for them.
    pub fn on_message(&mut self, message: &Message, ctx: &mut FrameContext<'_>) {
        if let SimulationStrategy::RemoteInterpolated(ship) = &mut self.strategy {
            ship.on_message(&mut self.body, message, ctx);
        }
    }

    pub fn ship(&self) -> Option<&Ship> {
        match &self.strategy {
            SimulationStrategy::LocalPredicted(local) => Some(&local.ship),
            SimulationStrategy::RemoteInterpolated(remote) => Some(&remote.ship),
            _ => None,
        }
    }

    pub fn ship_mut(&mut self) -> Option<&mut Ship> {
        match &mut self.strategy {
            SimulationStrategy::LocalPredicted(local) => Some(&mut local.ship),
            SimulationStrategy::RemoteInterpolated(remote) => Some(&mut remote.ship),
            _ => None,
        }
    }

    pub fn can_kill(&self) -> bool {
        matches!(&self.strategy, SimulationStrategy::Projectile(p) if p.can_kill())
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.body.finished
    }
}
