use serde::{Deserialize, Serialize};

pub const NEAR_DISTANCE: f32 = 400.0;
pub const FAR_DISTANCE: f32 = 1000.0;
pub const NEAR_INTERVAL_MS: u64 = 500;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const FAR_INTERVAL_MS: u64 = 2000;

/// Scores last for one match, wins for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBoard {
    pub local_score: i32,
    pub remote_score: i32,
    pub local_wins: u32,
    pub remote_wins: u32,
}

impl ScoreBoard {
    pub fn reset_scores(&mut self) {
        self.local_score = 0;
        self.remote_score = 0;
    }
}

/// Mouse scoring timer: the closer the cat, the faster the mouse scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreCadence {
    armed_at: Option<u64>,
}

impl ScoreCadence {
    pub fn interval_ms(distance_squared: f32) -> u64 {
        if distance_squared < NEAR_DISTANCE * NEAR_DISTANCE {
            NEAR_INTERVAL_MS
        } else if distance_squared > FAR_DISTANCE * FAR_DISTANCE {
            FAR_INTERVAL_MS
        } else {
            DEFAULT_INTERVAL_MS
        }
    }

    /// Arms on the first call; afterwards returns true once the interval for
    /// the current distance has elapsed and re-arms at that same instant.
    pub fn poll(&mut self, now_ms: u64, distance_squared: f32) -> bool {
        match self.armed_at {
            None => {
                self.armed_at = Some(now_ms);
                false
            }
            Some(armed) => {
                if now_ms.saturating_sub(armed) > Self::interval_ms(distance_squared) {
                    self.armed_at = Some(now_ms);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.armed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs 16 ms frames from an armed timer and reports when it first fires.
    fn first_fire(distance: f32) -> u64 {
        let mut cadence = ScoreCadence::default();
        let mut now = 0;
        assert!(!cadence.poll(now, distance * distance));
        loop {
            now += 16;
            if cadence.poll(now, distance * distance) {
                return now;
            }
            assert!(now < 10_000);
        }
    }

    #[test]
    fn interval_depends_on_distance() {
        assert_eq!(ScoreCadence::interval_ms(399.0 * 399.0), NEAR_INTERVAL_MS);
        assert_eq!(ScoreCadence::interval_ms(400.0 * 400.0), DEFAULT_INTERVAL_MS);
        assert_eq!(ScoreCadence::interval_ms(1000.0 * 1000.0), DEFAULT_INTERVAL_MS);
        assert_eq!(ScoreCadence::interval_ms(1001.0 * 1001.0), FAR_INTERVAL_MS);
    }

    #[test]
    fn fires_within_one_frame_of_interval() {
        for (distance, interval) in [(100.0, 500), (700.0, 1000), (1500.0, 2000)] {
            let fired = first_fire(distance);
            assert!(fired > interval && fired <= interval + 16, "{distance}: {fired}");
        }
    }

    #[test]
    fn rearms_at_the_firing_frame() {
        let mut cadence = ScoreCadence::default();
        cadence.poll(0, 0.0);
        assert!(cadence.poll(501, 0.0));
        assert!(!cadence.poll(1000, 0.0));
        assert!(cadence.poll(1002, 0.0));
    }

    #[test]
    fn consecutive_points_keep_the_interval() {
        for (distance, interval) in [(100.0f32, 500), (700.0, 1000), (1500.0, 2000)] {
            let mut cadence = ScoreCadence::default();
            let mut fires = Vec::new();
            let mut now = 0;
            while now <= 12_000 {
                if cadence.poll(now, distance * distance) {
                    fires.push(now);
                }
                now += 16;
            }
            assert!(fires.len() >= 5, "{distance}: {fires:?}");
            for gap in fires.windows(2).map(|w| w[1] - w[0]) {
                assert!(gap > interval && gap <= interval + 16, "{distance}: {fires:?}");
            }
        }
    }
}
