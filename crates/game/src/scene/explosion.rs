use std::f32::consts::TAU;

use glam::Vec2;

use super::entity::{Body, Entity, FrameContext, SimulationStrategy};
use super::ship::SHIP_RADIUS;

pub const EXPLOSION_DURATION_MS: u64 = 2000;
pub const EXPLOSION_ACTIVE_MS: u64 = 700;
pub const SPARK_COUNT: usize = 9;
const SPARK_GROWTH_MS: f32 = 50.0;

/// Spark burst left where a ship was destroyed.
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    started_at: u64,
    sparks: [Vec2; SPARK_COUNT],
}

impl Explosion {
    pub fn spawn(position: Vec2, now_ms: u64) -> Entity {
        let mut angle = rand::random::<f32>() * TAU;
        let mut sparks = [Vec2::ZERO; SPARK_COUNT];
        for spark in &mut sparks {
            let length = SHIP_RADIUS / 4.0 + rand::random::<f32>() * SHIP_RADIUS;
            *spark = Vec2::from_angle(angle) * length;
            angle = (angle + TAU / SPARK_COUNT as f32) % TAU;
        }

        Entity::new(
            Body::at(position),
            SimulationStrategy::Effect(Explosion {
                started_at: now_ms,
                sparks,
            }),
        )
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at)
    }

    /// Sparks are only drawn during the first part of the explosion.
    pub fn is_active(&self, now_ms: u64) -> bool {
        self.elapsed_ms(now_ms) <= EXPLOSION_ACTIVE_MS
    }

    /// Spark end points relative to the explosion center at `now_ms`.
    pub fn spark_tips(&self, now_ms: u64) -> [Vec2; SPARK_COUNT] {
        let scale = self.elapsed_ms(now_ms) as f32 / SPARK_GROWTH_MS;
        self.sparks.map(|spark| spark * scale)
    }

    pub(crate) fn update(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        let elapsed = self.elapsed_ms(ctx.now_ms);
        body.visible = elapsed <= EXPLOSION_ACTIVE_MS;
        if elapsed > EXPLOSION_DURATION_MS {
            body.finished = true;
        }
    }
}
