use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use glam::Vec2;

use crate::config::GameConfig;
use crate::net::{
    Envelope, GameConnection, GameDevice, Inbox, Message, MessageKind, MessageListener, inbox,
};
use crate::rules::{Arbiter, Outcome};
use crate::scene::{
    Body, Effect, Entity, EntityHandle, EntityRegistry, FrameContext, LocalShip, RemoteShip, Ship,
    ShipRole, SimulationStrategy, inverted_roles,
};

use super::report::{DrawHook, GameEvent, TickReport};
use super::tick::FrameTimer;

const SIMULATION_KINDS: [MessageKind; 6] = [
    MessageKind::ShipSnapshot,
    MessageKind::Fire,
    MessageKind::Killed,
    MessageKind::Chrono,
    MessageKind::Score,
    MessageKind::RoleRestart,
];
const HOST_SPAWN: Vec2 = Vec2::new(-400.0, 0.0);

/// One peer's view of a match: both ships, their projectiles and effects,
/// and the arbiter, advanced one frame per `tick`.
pub struct Simulation {
    config: GameConfig,
    is_server: bool,
    connection: Arc<dyn GameConnection>,
    other_player: Option<GameDevice>,
    listener: Arc<dyn MessageListener>,
    inbox: Inbox,
    registry: EntityRegistry,
    local: EntityHandle,
    remote: EntityHandle,
    arbiter: Arbiter,
    timer: FrameTimer,
    started_at: Option<u64>,
    elapsed_secs: u64,
    now_ms: u64,
    draw: Option<Box<dyn DrawHook>>,
    events: Vec<GameEvent>,
}

impl Simulation {
    pub fn new(
        connection: Arc<dyn GameConnection>,
        other_player: Option<GameDevice>,
        config: GameConfig,
    ) -> Self {
        let (sender, inbox) = inbox();
        let listener: Arc<dyn MessageListener> = Arc::new(sender);
        for kind in SIMULATION_KINDS {
            connection.add_message_listener(kind, Arc::clone(&listener));
        }

        let is_server = connection.is_server();
        let blend = config.snapshot_blend;
        let (local_ship, remote_ship) = if is_server {
            (
                LocalShip::spawn(ShipRole::Mouse, HOST_SPAWN, PI),
                RemoteShip::spawn(ShipRole::Cat, Vec2::ZERO, 0.0, blend),
            )
        } else {
            (
                LocalShip::spawn(ShipRole::Cat, Vec2::ZERO, 0.0),
                RemoteShip::spawn(ShipRole::Mouse, HOST_SPAWN, FRAC_PI_2, blend),
            )
        };

        let mut registry = EntityRegistry::new();
        let local = registry.spawn(local_ship);
        let remote = registry.spawn(remote_ship);

        log::info!(
            "simulation ready as {} ({} vs {})",
            if is_server { "host" } else { "guest" },
            if is_server { "mouse" } else { "cat" },
            if is_server { "cat" } else { "mouse" }
        );

        Self {
            arbiter: Arbiter::new(&config),
            timer: FrameTimer::new(config.frame_period_ms),
            config,
            is_server,
            connection,
            other_player,
            listener,
            inbox,
            registry,
            local,
            remote,
            started_at: None,
            elapsed_secs: 0,
            now_ms: 0,
            draw: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn other_player(&self) -> Option<GameDevice> {
        self.other_player
    }

    pub fn set_other_player(&mut self, device: GameDevice) {
        self.other_player = Some(device);
    }

    pub fn set_draw_hook(&mut self, hook: Box<dyn DrawHook>) {
        self.draw = Some(hook);
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn local_handle(&self) -> EntityHandle {
        self.local
    }

    pub fn remote_handle(&self) -> EntityHandle {
        self.remote
    }

    pub fn local_body(&self) -> Option<&Body> {
        self.registry.get(self.local).map(|e| &e.body)
    }

    pub fn remote_body(&self) -> Option<&Body> {
        self.registry.get(self.remote).map(|e| &e.body)
    }

    pub fn local_ship(&self) -> Option<&Ship> {
        self.registry.get(self.local).and_then(Entity::ship)
    }

    pub fn remote_ship(&self) -> Option<&Ship> {
        self.registry.get(self.remote).and_then(Entity::ship)
    }

    pub fn local_role(&self) -> ShipRole {
        self.local_ship().map(Ship::role).unwrap_or_default()
    }

    pub fn remote_role(&self) -> ShipRole {
        self.remote_ship().map(Ship::role).unwrap_or_default()
    }

    pub fn explosion_in_progress(&self) -> bool {
        self.local_ship().is_some_and(Ship::is_exploding)
            || self.remote_ship().is_some_and(Ship::is_exploding)
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Advances the scene by one frame ending at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        let dt_ms = self.timer.frame_duration(now_ms);
        self.now_ms = now_ms;
        let started = *self.started_at.get_or_insert(now_ms);

        if self.is_server {
            self.score_cadence(now_ms);
        }

        let elapsed_secs = now_ms.saturating_sub(started) / 1000;
        if elapsed_secs != self.elapsed_secs {
            self.elapsed_secs = elapsed_secs;
            if self.is_server {
                self.chrono_step();
            }
        }

        self.update_entities(now_ms, dt_ms as f32);
        self.send_local_snapshot(now_ms);
        let inbound = self.route_inbound(now_ms, dt_ms as f32);
        self.draw(now_ms);

        TickReport {
            frame: self.timer.frames(),
            dt_ms,
            inbound,
            events: std::mem::take(&mut self.events),
        }
    }

    pub fn set_wanted_direction(&mut self, radians: f32) {
        if self.arbiter.is_match_over() {
            return;
        }
        if let Some((body, ship)) = self.local_parts() {
            if body.visible {
                ship.set_wanted_direction(radians);
            }
        }
    }

    pub fn set_thrust(&mut self, on: bool) {
        let match_over = self.arbiter.is_match_over();
        let now = self.now_ms;
        if let Some((body, ship)) = self.local_parts() {
            if !body.visible {
                ship.set_thrust(body, false, now);
            } else if !match_over {
                ship.set_thrust(body, on, now);
            }
        }
    }

    /// Returns whether a volley went out.
    pub fn fire(&mut self) -> bool {
        if self.arbiter.is_match_over() || self.explosion_in_progress() {
            return false;
        }

        let now = self.now_ms;
        let has_other_player = self.other_player.is_some();
        let order = self
            .local_parts()
            .and_then(|(body, ship)| ship.shoot(body, now, has_other_player));

        match order {
            Some(order) => {
                self.send(Message::Fire(order));
                true
            }
            None => false,
        }
    }

    pub fn boost(&mut self) -> bool {
        if self.arbiter.is_match_over()
            || self.explosion_in_progress()
            || !self.local_role().has_boost()
        {
            return false;
        }

        let now = self.now_ms;
        match self.local_parts() {
            Some((_, ship)) => {
                ship.boost(now);
                true
            }
            None => false,
        }
    }

    pub fn request_restart(&mut self) {
        self.send(Message::RoleRestart);
        self.restart();
    }

    /// Stops listening and drops every entity. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        self.connection.remove_message_listener(&self.listener);
        self.registry.clear();
        self.other_player = None;
        log::info!("simulation stopped");
    }

    fn restart(&mut self) {
        log::info!("match restarted");
        self.arbiter.restart();
        self.invert_roles();
        self.events.push(GameEvent::Restarted);
        self.push_scores();
    }

    fn local_parts(&mut self) -> Option<(&mut Body, &mut LocalShip)> {
        let entity = self.registry.get_mut(self.local)?;
        match &mut entity.strategy {
            SimulationStrategy::LocalPredicted(ship) => Some((&mut entity.body, ship)),
            _ => None,
        }
    }

    fn ship_distance_squared(&self) -> Option<f32> {
        let local = self.local_body()?;
        let remote = self.remote_body()?;
        Some(local.position.distance_squared(remote.position))
    }

    fn score_cadence(&mut self, now_ms: u64) {
        let Some(distance_squared) = self.ship_distance_squared() else {
            return;
        };
        let explosion = self.explosion_in_progress();
        let role = self.local_role();

        if let Some(message) = self
            .arbiter
            .score_tick(now_ms, distance_squared, explosion, role)
        {
            self.send(message);
            self.push_scores();
        }
    }

    fn chrono_step(&mut self) {
        let explosion = self.explosion_in_progress();
        let Some(update) = self.arbiter.server_chrono_step(explosion) else {
            return;
        };

        self.send(Message::Chrono {
            seconds: update.seconds,
        });
        self.events.push(GameEvent::ChronoChanged(update.seconds));
        if let Some(outcome) = update.outcome {
            self.on_match_over(outcome);
        }
    }

    fn update_entities(&mut self, now_ms: u64, dt_ms: f32) {
        let killers = self.registry.killer_positions();
        let mut effects = Vec::new();
        let mut ctx = FrameContext {
            now_ms,
            dt_ms,
            match_over: self.arbiter.is_match_over(),
            killers: &killers,
            effects: &mut effects,
        };

        for handle in self.registry.handles() {
            if let Some(entity) = self.registry.get_mut(handle) {
                entity.update(&mut ctx);
            }
        }

        self.apply_effects(effects);
        self.registry.remove_finished();
    }

    fn send_local_snapshot(&mut self, now_ms: u64) {
        if self.other_player.is_none() {
            return;
        }
        let match_over = self.arbiter.is_match_over();
        let snapshot = match self.local_parts() {
            Some((body, ship)) => ship.snapshot(body, now_ms, match_over),
            None => return,
        };
        self.send(Message::ShipSnapshot(snapshot));
    }

    fn route_inbound(&mut self, now_ms: u64, dt_ms: f32) -> usize {
        let inbound = self.inbox.drain();
        let count = inbound.len();

        for envelope in inbound {
            if let Some(other) = self.other_player {
                if envelope.device != other {
                    log::debug!("ignored {:?} from {}", envelope.kind(), envelope.device);
                    continue;
                }
            }

            match envelope.message {
                Message::ShipSnapshot(_) | Message::Fire(_) | Message::Killed => {
                    self.offer_to_entities(&envelope.message, now_ms, dt_ms);
                }
                Message::Chrono { seconds } => self.on_chrono(seconds),
                Message::Score { value, .. } => {
                    let role = self.local_role();
                    self.arbiter.apply_score(value, role);
                    self.push_scores();
                }
                Message::RoleRestart => self.restart(),
                other => log::trace!("simulation ignores {:?}", other.kind()),
            }
        }

        count
    }

    fn offer_to_entities(&mut self, message: &Message, now_ms: u64, dt_ms: f32) {
        let remote_was_exploding = self.remote_ship().is_some_and(Ship::is_exploding);
        let mut effects = Vec::new();
        let mut ctx = FrameContext {
            now_ms,
            dt_ms,
            match_over: self.arbiter.is_match_over(),
            killers: &[],
            effects: &mut effects,
        };

        for handle in self.registry.handles() {
            if let Some(entity) = self.registry.get_mut(handle) {
                entity.on_message(message, &mut ctx);
            }
        }

        if matches!(message, Message::Killed)
            && !remote_was_exploding
            && self.remote_ship().is_some_and(Ship::is_exploding)
        {
            self.events.push(GameEvent::ShipDestroyed { local: false });
        }
        self.apply_effects(effects);
    }

    fn on_chrono(&mut self, seconds: i32) {
        if self.is_server {
            log::debug!("ignored chrono from the joining peer");
            return;
        }
        let outcome = self.arbiter.apply_chrono(seconds);
        let chrono = self.arbiter.chrono();
        self.events.push(GameEvent::ChronoChanged(chrono));
        if let Some(outcome) = outcome {
            self.on_match_over(outcome);
        }
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Spawn(entity) => {
                    self.registry.spawn(entity);
                }
                Effect::NeutralizeRoles => {
                    for handle in [self.local, self.remote] {
                        if let Some(ship) = self.registry.get_mut(handle).and_then(Entity::ship_mut) {
                            ship.neutralize();
                        }
                    }
                }
                Effect::InvertRoles => self.invert_roles(),
                Effect::Send(message) => {
                    if matches!(message, Message::Killed) {
                        self.events.push(GameEvent::ShipDestroyed { local: true });
                    }
                    self.send(message);
                }
            }
        }
    }

    fn invert_roles(&mut self) {
        self.registry.clear_killers();

        let (local, remote) = inverted_roles(self.local_role());
        for (handle, role) in [(self.local, local), (self.remote, remote)] {
            if let Some(ship) = self.registry.get_mut(handle).and_then(Entity::ship_mut) {
                ship.set_role(role);
            }
        }
        self.arbiter.on_roles_inverted();

        log::info!(
            "roles inverted: local {}, remote {}",
            local.as_str(),
            remote.as_str()
        );
        self.events.push(GameEvent::RolesInverted { local, remote });
    }

    fn on_match_over(&mut self, outcome: Outcome) {
        if let Some((body, ship)) = self.local_parts() {
            ship.settle_for_match_end(body);
        }
        if let Some(remote) = self.registry.get_mut(self.remote) {
            remote.body.set_rotation(0.0);
        }

        let restart_allowed = Arbiter::restart_allowed(outcome, self.local_role().has_boost());
        self.events.push(GameEvent::MatchOver {
            outcome,
            restart_allowed,
        });
    }

    fn push_scores(&mut self) {
        let scores = self.arbiter.scores();
        self.events.push(GameEvent::ScoreChanged {
            local: scores.local_score,
            remote: scores.remote_score,
        });
    }

    fn send(&self, message: Message) {
        match self.other_player {
            Some(device) => self.connection.send(Envelope::new(device, message)),
            None => log::trace!("no other player, {:?} not sent", message.kind()),
        }
    }

    fn draw(&mut self, now_ms: u64) {
        if let Some(hook) = self.draw.as_mut() {
            for (handle, entity) in self.registry.iter() {
                hook.draw(handle, entity, now_ms);
            }
        }
    }
}
