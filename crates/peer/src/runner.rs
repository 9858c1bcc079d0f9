use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;

use chase::{
    FrameClock, GameConnection, GameEvent, SessionEvent, SessionNegotiator, Simulation,
};

use crate::autopilot::Autopilot;
use crate::config::PeerConfig;
use crate::events::{RunSummary, log_game_event, log_session_event};

/// One peer: negotiates a session, then drives the frame loop until the
/// session ends or the frame limit is reached.
pub struct PeerRunner {
    label: String,
    connection: Arc<dyn GameConnection>,
    negotiator: Arc<SessionNegotiator>,
    session_events: Receiver<SessionEvent>,
    config: PeerConfig,
}

impl PeerRunner {
    pub fn new(label: &str, connection: Arc<dyn GameConnection>, config: PeerConfig) -> Self {
        let (negotiator, session_events) =
            SessionNegotiator::attach(&connection, config.game.protocol_version);
        Self {
            label: label.to_string(),
            connection,
            negotiator,
            session_events,
            config,
        }
    }

    pub fn spawn(self) -> io::Result<JoinHandle<RunSummary>> {
        thread::Builder::new()
            .name(format!("chase-sim-{}", self.label))
            .spawn(move || self.run())
    }

    pub fn run(self) -> RunSummary {
        let clock = FrameClock::new();
        let period = Duration::from_millis(self.config.game.frame_period_ms);
        let mut simulation: Option<Simulation> = None;
        let mut autopilot = Autopilot::new();
        let mut summary = RunSummary::default();
        let mut running = true;

        log::info!("[{}] waiting for the other player", self.label);

        while running {
            let frame_start = clock.now_ms();

            for event in self.session_events.try_iter() {
                log_session_event(&self.label, &event);
                match event {
                    SessionEvent::Started(device) => match simulation.as_mut() {
                        Some(simulation) => simulation.set_other_player(device),
                        None => {
                            simulation = Some(Simulation::new(
                                Arc::clone(&self.connection),
                                Some(device),
                                self.config.game.clone(),
                            ));
                        }
                    },
                    SessionEvent::Rejected(_) | SessionEvent::Closed(_) => running = false,
                    SessionEvent::Refused { .. } => {}
                }
            }

            if let Some(simulation) = simulation.as_mut() {
                if self.config.autopilot {
                    autopilot.apply(simulation);
                }

                let report = simulation.tick(frame_start);
                for event in &report.events {
                    log_game_event(&self.label, event);
                    autopilot.observe(event, frame_start);
                    if matches!(event, GameEvent::MatchOver { .. }) {
                        summary.matches += 1;
                    }
                }

                summary.frames = report.frame;
                if self.config.max_frames > 0 && summary.frames >= self.config.max_frames {
                    log::info!("[{}] frame limit reached", self.label);
                    running = false;
                }
            }

            thread::sleep(clock.remaining(frame_start, period));
        }

        if self.negotiator.session().is_playing() {
            self.negotiator.quit();
        }
        if let Some(simulation) = simulation.as_mut() {
            let scores = simulation.arbiter().scores();
            summary.local_wins = scores.local_wins;
            summary.remote_wins = scores.remote_wins;
            simulation.shutdown();
        }
        summary
    }
}
