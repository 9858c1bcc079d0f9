use chase::{GameEvent, Outcome, SessionEvent};

/// What a peer run amounted to, reported when the run ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub matches: u32,
    pub local_wins: u32,
    pub remote_wins: u32,
}

pub fn log_session_event(label: &str, event: &SessionEvent) {
    match event {
        SessionEvent::Started(device) => {
            log::info!("[{label}] playing against {device}");
        }
        SessionEvent::Rejected(reason) => {
            log::warn!("[{label}] rejected by host: {}", reason.as_str());
        }
        SessionEvent::Refused { device, reason } => {
            log::warn!("[{label}] refused {device}: {}", reason.as_str());
        }
        SessionEvent::Closed(reason) => {
            log::info!("[{label}] session closed: {}", reason.as_str());
        }
    }
}

pub fn log_game_event(label: &str, event: &GameEvent) {
    match event {
        GameEvent::ChronoChanged(seconds) => {
            log::debug!("[{label}] {seconds}s left");
        }
        GameEvent::ScoreChanged { local, remote } => {
            log::debug!("[{label}] score {local} - {remote}");
        }
        GameEvent::ShipDestroyed { local } => {
            let whose = if *local { "own" } else { "other" };
            log::info!("[{label}] {whose} ship destroyed");
        }
        GameEvent::RolesInverted { local, remote } => {
            log::info!(
                "[{label}] now playing {} against {}",
                local.as_str(),
                remote.as_str()
            );
        }
        GameEvent::MatchOver {
            outcome,
            restart_allowed,
        } => {
            let verdict = match outcome {
                Outcome::Win => "won",
                Outcome::Lose => "lost",
                Outcome::Draw => "drew",
            };
            if *restart_allowed {
                log::info!("[{label}] {verdict} the match, may restart");
            } else {
                log::info!("[{label}] {verdict} the match");
            }
        }
        GameEvent::Restarted => {
            log::info!("[{label}] new match");
        }
    }
}
