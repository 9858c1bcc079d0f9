use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::net::{Message, Scorer};
use crate::scene::ShipRole;

use super::score::{ScoreBoard, ScoreCadence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Lose,
    Draw,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Lose => "lose",
            Self::Draw => "draw",
        }
    }
}

/// Result of one server chrono step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChronoUpdate {
    pub seconds: i32,
    pub outcome: Option<Outcome>,
}

/// Match clock, scores and the win decision.
///
/// Only the hosting peer advances the clock and awards mouse points; the
/// joining peer mirrors what it receives and reaches the same decision from
/// the same chrono and scores.
#[derive(Debug, Clone)]
pub struct Arbiter {
    duration_secs: i32,
    notice_ticks: u32,
    chrono: i32,
    notice: u32,
    match_over: bool,
    scores: ScoreBoard,
    cadence: ScoreCadence,
}

impl Arbiter {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            duration_secs: config.match_duration_secs,
            notice_ticks: config.notice_ticks,
            chrono: config.match_duration_secs,
            notice: config.notice_ticks,
            match_over: false,
            scores: ScoreBoard::default(),
            cadence: ScoreCadence::default(),
        }
    }

    pub fn chrono(&self) -> i32 {
        self.chrono
    }

    pub fn notice(&self) -> u32 {
        self.notice
    }

    pub fn is_match_over(&self) -> bool {
        self.match_over
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    /// One whole second elapsed on the hosting peer. Nothing happens while a
    /// ship is exploding; the clock only runs once the notice is gone.
    pub fn server_chrono_step(&mut self, explosion_in_progress: bool) -> Option<ChronoUpdate> {
        if explosion_in_progress {
            return None;
        }
        if !self.match_over && self.notice == 0 {
            self.chrono -= 1;
        }
        let seconds = self.chrono;
        let outcome = self.evaluate();
        Some(ChronoUpdate { seconds, outcome })
    }

    /// Chrono value received from the hosting peer.
    pub fn apply_chrono(&mut self, seconds: i32) -> Option<Outcome> {
        if !self.match_over {
            self.chrono = seconds;
        }
        self.evaluate()
    }

    /// Ends the match when the chrono has run out, else counts the notice
    /// down. Returns the outcome exactly once per match.
    pub fn evaluate(&mut self) -> Option<Outcome> {
        if self.match_over {
            return None;
        }

        if self.chrono <= 0 {
            self.chrono = 0;
            self.match_over = true;
            let outcome = match self.scores.local_score.cmp(&self.scores.remote_score) {
                std::cmp::Ordering::Greater => {
                    self.scores.local_wins += 1;
                    Outcome::Win
                }
                std::cmp::Ordering::Less => {
                    self.scores.remote_wins += 1;
                    Outcome::Lose
                }
                std::cmp::Ordering::Equal => Outcome::Draw,
            };
            log::info!(
                "match over: {} ({} - {}), wins {} - {}",
                outcome.as_str(),
                self.scores.local_score,
                self.scores.remote_score,
                self.scores.local_wins,
                self.scores.remote_wins
            );
            return Some(outcome);
        }

        if self.notice > 0 {
            self.notice -= 1;
        }
        None
    }

    /// Polled every frame on the hosting peer. Returns the score message to
    /// send when the mouse earned a point.
    pub fn score_tick(
        &mut self,
        now_ms: u64,
        distance_squared: f32,
        explosion_in_progress: bool,
        local_role: ShipRole,
    ) -> Option<Message> {
        if !self.cadence.poll(now_ms, distance_squared) {
            return None;
        }
        if explosion_in_progress || self.notice != 0 || self.match_over {
            return None;
        }

        let value = if local_role.is_cat_side() {
            self.scores.remote_score += 1;
            self.scores.remote_score
        } else {
            self.scores.local_score += 1;
            self.scores.local_score
        };
        Some(Message::Score {
            scorer: Scorer::Mouse,
            value,
        })
    }

    /// Score received from the hosting peer: the value belongs to whichever
    /// side currently plays the mouse.
    pub fn apply_score(&mut self, value: i32, local_role: ShipRole) {
        if local_role.base() == ShipRole::Mouse {
            self.scores.local_score = value;
        } else {
            self.scores.remote_score = value;
        }
    }

    pub fn on_roles_inverted(&mut self) {
        self.notice = self.notice_ticks;
    }

    /// Fresh match with the same wins. Roles are inverted by the caller.
    pub fn restart(&mut self) {
        self.chrono = self.duration_secs;
        self.scores.reset_scores();
        self.match_over = false;
        self.cadence.reset();
    }

    /// Whether this peer is offered a restart after `outcome`.
    pub fn restart_allowed(outcome: Outcome, local_has_boost: bool) -> bool {
        match outcome {
            Outcome::Lose => true,
            Outcome::Draw => local_has_boost,
            Outcome::Win => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter(duration: i32) -> Arbiter {
        Arbiter::new(&GameConfig {
            match_duration_secs: duration,
            ..GameConfig::default()
        })
    }

    #[test]
    fn notice_delays_the_clock() {
        let mut arbiter = arbiter(10);
        for expected_notice in [2, 1, 0] {
            let update = arbiter.server_chrono_step(false).unwrap();
            assert_eq!(update.seconds, 10);
            assert_eq!(arbiter.notice(), expected_notice);
        }
        assert_eq!(arbiter.server_chrono_step(false).unwrap().seconds, 9);
    }

    #[test]
    fn explosion_freezes_the_clock() {
        let mut arbiter = arbiter(10);
        assert!(arbiter.server_chrono_step(true).is_none());
        assert_eq!(arbiter.notice(), 3);
        assert_eq!(arbiter.chrono(), 10);
    }

    #[test]
    fn chrono_never_increases_and_decides_once() {
        let mut arbiter = arbiter(5);
        let mut previous = arbiter.chrono();
        let mut decisions = 0;
        for _ in 0..20 {
            let update = arbiter.server_chrono_step(false).unwrap();
            assert!(update.seconds <= previous);
            previous = update.seconds;
            decisions += usize::from(update.outcome.is_some());
        }
        assert_eq!(decisions, 1);
        assert_eq!(arbiter.chrono(), 0);
        assert!(arbiter.is_match_over());
    }

    #[test]
    fn wins_change_only_at_zero() {
        let mut arbiter = arbiter(2);
        arbiter.notice = 0;
        arbiter.scores.local_score = 3;
        arbiter.scores.remote_score = 1;

        let first = arbiter.server_chrono_step(false).unwrap();
        assert_eq!(first, ChronoUpdate { seconds: 1, outcome: None });
        assert_eq!(arbiter.scores().local_wins, 0);

        let last = arbiter.server_chrono_step(false).unwrap();
        assert_eq!(last.outcome, Some(Outcome::Win));
        assert_eq!(arbiter.scores().local_wins, 1);
        assert_eq!(arbiter.scores().remote_wins, 0);
    }

    #[test]
    fn client_reaches_same_decision_from_chrono() {
        let mut client = arbiter(60);
        client.apply_score(4, ShipRole::Cat);
        assert_eq!(client.scores().remote_score, 4);

        assert_eq!(client.apply_chrono(1), None);
        assert_eq!(client.apply_chrono(0), Some(Outcome::Lose));
        assert_eq!(client.apply_chrono(0), None);
        assert_eq!(client.scores().remote_wins, 1);
    }

    #[test]
    fn draw_awards_no_win() {
        let mut arbiter = arbiter(60);
        assert_eq!(arbiter.apply_chrono(0), Some(Outcome::Draw));
        assert_eq!(arbiter.scores().local_wins, 0);
        assert_eq!(arbiter.scores().remote_wins, 0);
    }

    #[test]
    fn mouse_scores_on_cadence() {
        let mut arbiter = arbiter(60);
        arbiter.notice = 0;
        assert!(arbiter.score_tick(0, 0.0, false, ShipRole::Mouse).is_none());
        assert_eq!(
            arbiter.score_tick(501, 0.0, false, ShipRole::Mouse),
            Some(Message::Score {
                scorer: Scorer::Mouse,
                value: 1
            })
        );

        arbiter.score_tick(600, 0.0, false, ShipRole::Cat);
        let message = arbiter.score_tick(1101, 0.0, false, ShipRole::Cat);
        assert!(matches!(message, Some(Message::Score { value: 1, .. })));
        assert_eq!(arbiter.scores().remote_score, 1);
        assert_eq!(arbiter.scores().local_score, 1);
    }

    #[test]
    fn scoring_suppressed_during_notice_and_explosion() {
        let mut arbiter = arbiter(60);
        arbiter.score_tick(0, 0.0, false, ShipRole::Mouse);
        assert!(arbiter.score_tick(501, 0.0, false, ShipRole::Mouse).is_none());

        arbiter.notice = 0;
        arbiter.score_tick(600, 0.0, true, ShipRole::Mouse);
        assert!(arbiter.score_tick(1101, 0.0, true, ShipRole::Mouse).is_none());
        assert_eq!(arbiter.scores().local_score, 0);
    }

    #[test]
    fn restart_keeps_wins() {
        let mut arbiter = arbiter(30);
        arbiter.scores.local_score = 2;
        arbiter.apply_chrono(0);
        assert!(arbiter.is_match_over());

        arbiter.restart();
        arbiter.on_roles_inverted();
        assert_eq!(arbiter.chrono(), 30);
        assert_eq!(arbiter.notice(), 3);
        assert!(!arbiter.is_match_over());
        assert_eq!(arbiter.scores().local_score, 0);
        assert_eq!(arbiter.scores().local_wins, 1);
    }

    #[test]
    fn restart_hint() {
        assert!(Arbiter::restart_allowed(Outcome::Lose, false));
        assert!(Arbiter::restart_allowed(Outcome::Draw, true));
        assert!(!Arbiter::restart_allowed(Outcome::Draw, false));
        assert!(!Arbiter::restart_allowed(Outcome::Win, true));
    }
}
