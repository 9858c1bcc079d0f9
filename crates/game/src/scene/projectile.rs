use glam::Vec2;

use super::entity::{Body, Entity, FrameContext, SimulationStrategy};

pub const PROJECTILE_RADIUS: f32 = 15.0;
pub const PROJECTILE_TTL_MS: u64 = 3000;
pub const FIRE_SPEED: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    spawned_at: u64,
    can_kill: bool,
}

impl Projectile {
    pub fn spawn(position: Vec2, velocity: Vec2, can_kill: bool, now_ms: u64) -> Entity {
        let mut body = Body::at(position);
        body.velocity = velocity;
        Entity::new(
            body,
            SimulationStrategy::Projectile(Projectile {
                spawned_at: now_ms,
                can_kill,
            }),
        )
    }

    #[inline]
    pub fn can_kill(&self) -> bool {
        self.can_kill
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.spawned_at)
    }

    pub(crate) fn update(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        if self.age_ms(ctx.now_ms) > PROJECTILE_TTL_MS {
            body.finished = true;
        }
        body.integrate(ctx.dt_ms);
    }
}

/// Heading vector for shots fired at `rotation`, screen y pointing down.
pub fn fire_velocity(rotation: f32) -> Vec2 {
    Vec2::new((-rotation).cos(), (-rotation).sin()) * FIRE_SPEED
}
