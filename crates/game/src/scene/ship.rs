use std::f32::consts::{PI, TAU};

use glam::Vec2;

use crate::net::{FireOrder, Message, ShipSnapshot};

use super::entity::{Body, Effect, Entity, FrameContext, SimulationStrategy};
use super::explosion::{EXPLOSION_DURATION_MS, Explosion};
use super::projectile::{PROJECTILE_RADIUS, Projectile, fire_velocity};
use super::role::{BOOST_MAX_SPEED, ShipRole};

pub const SHIP_RADIUS: f32 = 15.0;
pub const FIRE_COOLDOWN_MS: u64 = 350;
pub const BOOST_DURATION_MS: u64 = 1250;
pub const DEFAULT_SNAPSHOT_BLEND: f32 = 0.05;

/// Cannon muzzles in ship units, scaled by the ship radius.
const CANNONS: [Vec2; 2] = [Vec2::new(1.0, 1.25), Vec2::new(1.0, -1.25)];
const FLAME_ON: f32 = -3.0;
const FLAME_BOOST: f32 = -6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ReactorPower {
    #[default]
    Off = 0,
    On = 1,
    Boost = 2,
}

impl From<u8> for ReactorPower {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::On,
            2 => Self::Boost,
            _ => Self::Off,
        }
    }
}

/// World positions of both cannon muzzles for a ship at `origin` facing
/// `rotation`.
pub fn cannon_positions(origin: Vec2, rotation: f32) -> [Vec2; 2] {
    let (sin, cos) = rotation.sin_cos();
    CANNONS.map(|cannon| {
        let p = cannon * SHIP_RADIUS;
        origin + Vec2::new(p.x * cos + p.y * sin, p.y * cos - p.x * sin)
    })
}

fn volley(origin: Vec2, rotation: f32, can_kill: bool, ctx: &mut FrameContext<'_>) {
    let velocity = fire_velocity(rotation);
    for muzzle in cannon_positions(origin, rotation) {
        ctx.push(Effect::Spawn(Projectile::spawn(
            muzzle,
            velocity,
            can_kill,
            ctx.now_ms,
        )));
    }
}

/// Shortest signed angle from `from` to `to`, in [-π, π].
pub fn wrapped_angle_diff(from: f32, to: f32) -> f32 {
    let mut diff = (to - from) % TAU;
    if diff > PI {
        diff -= TAU;
    } else if diff < -PI {
        diff += TAU;
    }
    diff
}

/// State both ship flavors share.
#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    role: ShipRole,
    reactor: ReactorPower,
    flame_length: f32,
    exploding_since: Option<u64>,
}

impl Ship {
    pub fn new(role: ShipRole) -> Self {
        Self {
            role,
            reactor: ReactorPower::Off,
            flame_length: FLAME_ON,
            exploding_since: None,
        }
    }

    #[inline]
    pub fn role(&self) -> ShipRole {
        self.role
    }

    pub fn set_role(&mut self, role: ShipRole) {
        self.role = role;
    }

    pub fn neutralize(&mut self) {
        self.role = self.role.neutralized();
    }

    #[inline]
    pub fn reactor(&self) -> ReactorPower {
        self.reactor
    }

    pub fn set_reactor(&mut self, reactor: ReactorPower) {
        self.reactor = reactor;
    }

    /// Flame tip offset in ship units, negative toward the rear. `None` while
    /// the reactor is off.
    pub fn flame_length(&self) -> Option<f32> {
        (self.reactor != ReactorPower::Off).then_some(self.flame_length)
    }

    pub fn is_exploding(&self) -> bool {
        self.exploding_since.is_some()
    }

    fn animate_flame(&mut self) {
        if self.reactor == ReactorPower::Off {
            return;
        }
        let base = if self.reactor == ReactorPower::Boost {
            FLAME_BOOST
        } else {
            FLAME_ON
        };
        self.flame_length = base - rand::random::<f32>();
    }

    fn destroy(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        self.exploding_since = Some(ctx.now_ms);
        body.visible = false;
        ctx.push(Effect::NeutralizeRoles);
        ctx.push(Effect::Spawn(Explosion::spawn(body.position, ctx.now_ms)));
    }

    /// Re-shows the ship once its explosion has run its course.
    fn finish_explosion(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) -> bool {
        let Some(started) = self.exploding_since else {
            return false;
        };
        if ctx.now_ms.saturating_sub(started) <= EXPLOSION_DURATION_MS {
            return false;
        }
        self.exploding_since = None;
        body.visible = true;
        ctx.push(Effect::InvertRoles);
        true
    }
}

/// The ship this peer steers, simulated ahead of the network.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalShip {
    pub ship: Ship,
    wanted_rotation: f32,
    thrust_at: Option<u64>,
    boost_until: u64,
    last_shot: Option<u64>,
    shot_pending: bool,
}

impl LocalShip {
    pub fn new(role: ShipRole) -> Self {
        Self {
            ship: Ship::new(role),
            wanted_rotation: 0.0,
            thrust_at: None,
            boost_until: 0,
            last_shot: None,
            shot_pending: false,
        }
    }

    pub fn spawn(role: ShipRole, position: Vec2, rotation: f32) -> Entity {
        let mut body = Body::at(position);
        body.set_rotation(rotation);
        let mut local = Self::new(role);
        local.wanted_rotation = rotation;
        Entity::new(body, SimulationStrategy::LocalPredicted(local))
    }

    pub fn wanted_rotation(&self) -> f32 {
        self.wanted_rotation
    }

    pub fn set_wanted_direction(&mut self, radians: f32) {
        self.wanted_rotation = radians;
    }

    pub fn is_thrust_scheduled(&self) -> bool {
        self.thrust_at.is_some()
    }

    pub fn boost_in_progress(&self, now_ms: u64) -> bool {
        self.boost_until > now_ms
    }

    /// Turning on thrust waits in proportion to how far the ship still has
    /// to turn toward the wanted direction.
    pub fn set_thrust(&mut self, body: &Body, on: bool, now_ms: u64) {
        let boosting = self.boost_in_progress(now_ms);
        if on {
            if self.thrust_at.is_none() {
                let diff = wrapped_angle_diff(body.rotation(), self.wanted_rotation);
                let delay = (diff * self.ship.role.tuning().thrust_delay).abs() as u64;
                self.thrust_at = Some(now_ms + delay);
                self.ship.set_reactor(if boosting {
                    ReactorPower::Boost
                } else {
                    ReactorPower::On
                });
            }
        } else {
            self.thrust_at = None;
            self.ship.set_reactor(if boosting {
                ReactorPower::Boost
            } else {
                ReactorPower::Off
            });
        }
    }

    pub fn boost(&mut self, now_ms: u64) {
        if self.boost_in_progress(now_ms) {
            self.boost_until += BOOST_DURATION_MS;
        } else {
            self.boost_until = now_ms + BOOST_DURATION_MS;
        }
    }

    /// Arms a volley for the next update and returns the order to send to
    /// the other peer, or `None` when the ship may not fire yet.
    pub fn shoot(&mut self, body: &Body, now_ms: u64, has_other_player: bool) -> Option<FireOrder> {
        if !self.ship.role.can_fire() || !has_other_player {
            return None;
        }
        if let Some(last) = self.last_shot {
            if now_ms.saturating_sub(last) < FIRE_COOLDOWN_MS {
                return None;
            }
        }

        self.shot_pending = true;
        self.last_shot = Some(now_ms);
        Some(FireOrder {
            position: body.position,
            rotation: body.rotation(),
        })
    }

    pub fn network_reactor(&self, now_ms: u64, match_over: bool) -> ReactorPower {
        if match_over {
            ReactorPower::On
        } else if self.boost_in_progress(now_ms) {
            ReactorPower::Boost
        } else if self.thrust_at.is_some() {
            ReactorPower::On
        } else {
            ReactorPower::Off
        }
    }

    /// Builds the outbound snapshot; the ship adopts the reactor value it
    /// advertises.
    pub fn snapshot(&mut self, body: &Body, now_ms: u64, match_over: bool) -> ShipSnapshot {
        let reactor = self.network_reactor(now_ms, match_over);
        self.ship.set_reactor(reactor);
        ShipSnapshot {
            position: body.position,
            rotation: body.rotation(),
            velocity: body.velocity,
            reactor,
        }
    }

    /// Faces rotation zero with the engine cut, as shown on the final score.
    pub fn settle_for_match_end(&mut self, body: &mut Body) {
        body.set_rotation(0.0);
        self.wanted_rotation = 0.0;
        self.thrust_at = None;
        self.ship.set_reactor(ReactorPower::Off);
    }

    pub(crate) fn update(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        self.apply_thrust(body, ctx);
        if ctx.match_over {
            self.ship.set_reactor(ReactorPower::On);
        }
        self.ship.animate_flame();
        self.ease_rotation(body, ctx.dt_ms);
        body.integrate(ctx.dt_ms);

        if std::mem::take(&mut self.shot_pending) {
            volley(body.position, body.rotation(), false, ctx);
        }

        self.check_destroyed(body, ctx);
    }

    fn apply_thrust(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        let thrusting = self.thrust_at.is_some_and(|at| ctx.now_ms > at);
        let boosting = self.boost_in_progress(ctx.now_ms);

        if !(thrusting || boosting) {
            body.brake(ctx.dt_ms);
            return;
        }

        let tuning = self.ship.role.tuning();
        let max_speed = if ctx.match_over {
            ShipRole::Cat.max_speed() / 4.0
        } else if boosting {
            BOOST_MAX_SPEED
        } else {
            tuning.max_speed
        };
        let (sin, cos) = body.rotation().sin_cos();
        let target = Vec2::new(cos, -sin) * max_speed;
        let s = tuning.smoothing;
        body.velocity = body.velocity * s + target * (1.0 - s);
    }

    fn ease_rotation(&mut self, body: &mut Body, dt_ms: f32) {
        let limit = PI * dt_ms * self.ship.role.tuning().max_rotation;
        let diff = wrapped_angle_diff(body.rotation(), self.wanted_rotation).clamp(-limit, limit);
        body.set_rotation(body.rotation() + diff);
    }

    fn check_destroyed(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        if self.ship.is_exploding() {
            if self.ship.finish_explosion(body, ctx) {
                log::info!("local ship back in play");
            }
            return;
        }
        if ctx.match_over {
            return;
        }

        let reach = SHIP_RADIUS + PROJECTILE_RADIUS;
        let hit = ctx
            .killers
            .iter()
            .any(|killer| killer.distance_squared(body.position) < reach * reach);
        if hit {
            log::info!("local ship destroyed at {}", body.position);
            self.thrust_at = None;
            self.ship.destroy(body, ctx);
            ctx.push(Effect::Send(Message::Killed));
        }
    }
}

/// The other peer's ship, driven by its snapshots and extrapolated between
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteShip {
    pub ship: Ship,
    blend: f32,
}

impl RemoteShip {
    pub fn new(role: ShipRole, blend: f32) -> Self {
        Self {
            ship: Ship::new(role),
            blend,
        }
    }

    pub fn spawn(role: ShipRole, position: Vec2, rotation: f32, blend: f32) -> Entity {
        let mut body = Body::at(position);
        body.set_rotation(rotation);
        Entity::new(
            body,
            SimulationStrategy::RemoteInterpolated(Self::new(role, blend)),
        )
    }

    pub(crate) fn update(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        body.integrate(ctx.dt_ms);
        if self.ship.reactor() == ReactorPower::Off {
            body.brake(ctx.dt_ms);
        }
        if ctx.match_over {
            self.ship.set_reactor(ReactorPower::On);
        }
        self.ship.animate_flame();

        if self.ship.finish_explosion(body, ctx) {
            log::info!("remote ship back in play");
        }
    }

    pub(crate) fn on_message(&mut self, body: &mut Body, message: &Message, ctx: &mut FrameContext<'_>) {
        match message {
            Message::ShipSnapshot(snapshot) => self.apply_snapshot(body, snapshot, ctx.match_over),
            Message::Fire(order) => {
                volley(order.position, order.rotation, self.ship.role.can_fire(), ctx);
            }
            Message::Killed => {
                if !self.ship.is_exploding() {
                    log::info!("remote ship destroyed at {}", body.position);
                    self.ship.destroy(body, ctx);
                }
            }
            _ => {}
        }
    }

    fn apply_snapshot(&mut self, body: &mut Body, snapshot: &ShipSnapshot, match_over: bool) {
        body.position = if match_over {
            snapshot.position
        } else {
            body.position * (1.0 - self.blend) + snapshot.position * self.blend
        };
        body.velocity = snapshot.velocity;
        body.set_rotation(snapshot.rotation);
        self.ship.set_reactor(snapshot.reactor);
    }
}
