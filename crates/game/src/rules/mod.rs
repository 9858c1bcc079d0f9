mod arbiter;
mod score;

pub use arbiter::{Arbiter, ChronoUpdate, Outcome};
pub use score::{
    DEFAULT_INTERVAL_MS, FAR_DISTANCE, FAR_INTERVAL_MS, NEAR_DISTANCE, NEAR_INTERVAL_MS,
    ScoreBoard, ScoreCadence,
};
