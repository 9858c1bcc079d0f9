use std::f32::consts::PI;

use bitflags::bitflags;
use glam::Vec2;
use rand::Rng;

use chase::rules::NEAR_DISTANCE;
use chase::scene::wrapped_angle_diff;
use chase::{GameEvent, Simulation};

const AIM_TOLERANCE: f32 = 0.2;
const WANDER: f32 = 0.6;
const RESTART_DELAY_MS: u64 = 3000;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Controls: u8 {
        const THRUST = 1 << 0;
        const FIRE = 1 << 1;
        const BOOST = 1 << 2;
    }
}

/// Rotation at which a thrusting ship moves along `delta`.
fn heading_toward(delta: Vec2) -> f32 {
    (-delta.y).atan2(delta.x)
}

/// Steers the local ship: the cat chases and shoots, the mouse runs and
/// boosts when the cat gets close.
pub struct Autopilot {
    held: Controls,
    restart_at: Option<u64>,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::new()
    }
}

impl Autopilot {
    pub fn new() -> Self {
        Self {
            held: Controls::empty(),
            restart_at: None,
        }
    }

    pub fn decide(&self, simulation: &Simulation) -> (Option<f32>, Controls) {
        let (Some(me), Some(them)) = (simulation.local_body(), simulation.remote_body()) else {
            return (None, Controls::empty());
        };

        let role = simulation.local_role();
        let delta = them.position - me.position;
        let toward = heading_toward(delta);
        let mut controls = Controls::THRUST;

        let heading = if role.is_cat_side() {
            toward
        } else {
            toward + PI + rand::thread_rng().gen_range(-WANDER..WANDER)
        };

        if role.can_fire() && wrapped_angle_diff(me.rotation(), toward).abs() < AIM_TOLERANCE {
            controls |= Controls::FIRE;
        }
        if role.has_boost() && delta.length_squared() < NEAR_DISTANCE * NEAR_DISTANCE {
            controls |= Controls::BOOST;
        }

        (Some(heading), controls)
    }

    pub fn apply(&mut self, simulation: &mut Simulation) {
        if let Some(at) = self.restart_at {
            if simulation.now_ms() >= at {
                self.restart_at = None;
                simulation.request_restart();
            }
            return;
        }
        if simulation.arbiter().is_match_over() {
            return;
        }

        let (heading, controls) = self.decide(simulation);
        if let Some(heading) = heading {
            simulation.set_wanted_direction(heading);
        }
        let thrust = controls.contains(Controls::THRUST);
        if thrust != self.held.contains(Controls::THRUST) {
            simulation.set_thrust(thrust);
        }
        if controls.contains(Controls::FIRE) {
            simulation.fire();
        }
        if controls.contains(Controls::BOOST) {
            simulation.boost();
        }
        self.held = controls;
    }

    pub fn observe(&mut self, event: &GameEvent, now_ms: u64) {
        match event {
            GameEvent::MatchOver {
                restart_allowed: true,
                ..
            } => self.restart_at = Some(now_ms + RESTART_DELAY_MS),
            GameEvent::ShipDestroyed { local: true } | GameEvent::Restarted => {
                self.held = Controls::empty();
            }
            GameEvent::MatchOver { .. } => self.held = Controls::empty(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_matches_ship_motion() {
        // a ship at rotation r moves along (cos r, -sin r)
        for delta in [Vec2::X, Vec2::NEG_Y, Vec2::new(-3.0, 4.0)] {
            let r = heading_toward(delta);
            let motion = Vec2::new(r.cos(), -r.sin());
            assert!((motion - delta.normalize()).length() < 1e-5);
        }
    }

    #[test]
    fn controls_combine() {
        let controls = Controls::THRUST | Controls::FIRE;
        assert!(controls.contains(Controls::THRUST));
        assert!(!controls.contains(Controls::BOOST));
    }
}
