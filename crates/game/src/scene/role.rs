use serde::{Deserialize, Serialize};

pub const BOOST_MAX_SPEED: f32 = 1.5;

const MAX_SPEED_FAST: f32 = 0.65;
const MAX_SPEED_SLOW: f32 = 0.4;
const ROTATION_SLOW: f32 = 1.0 / 1000.0;
const ROTATION_FAST: f32 = 1.0 / 100.0;
const THRUST_DELAY_LONG: f32 = 250.0;
const THRUST_DELAY_SHORT: f32 = 80.0;
const SMOOTHING_HEAVY: f32 = 0.97;
const SMOOTHING_LIGHT: f32 = 0.5;

pub const COLOR_CAT: u32 = 0xFF7A_DFF1;
pub const COLOR_MOUSE: u32 = 0xFFFF_FF91;
pub const COLOR_NEUTRAL: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleTuning {
    pub can_fire: bool,
    pub has_boost: bool,
    pub max_speed: f32,
    /// Fraction of π the ship may turn per millisecond.
    pub max_rotation: f32,
    /// Milliseconds of thrust delay per radian still to turn.
    pub thrust_delay: f32,
    pub smoothing: f32,
    pub color: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShipRole {
    #[default]
    Solo,
    Cat,
    Mouse,
    CatNeutral,
    MouseNeutral,
}

impl ShipRole {
    pub const fn tuning(self) -> RoleTuning {
        match self {
            Self::Solo => RoleTuning {
                can_fire: true,
                has_boost: true,
                max_speed: MAX_SPEED_FAST,
                max_rotation: ROTATION_FAST,
                thrust_delay: THRUST_DELAY_SHORT,
                smoothing: SMOOTHING_LIGHT,
                color: COLOR_CAT,
            },
            Self::Cat => RoleTuning {
                can_fire: true,
                has_boost: false,
                max_speed: MAX_SPEED_FAST,
                max_rotation: ROTATION_SLOW,
                thrust_delay: THRUST_DELAY_LONG,
                smoothing: SMOOTHING_HEAVY,
                color: COLOR_CAT,
            },
            Self::Mouse => RoleTuning {
                can_fire: false,
                has_boost: true,
                max_speed: MAX_SPEED_SLOW,
                max_rotation: ROTATION_FAST,
                thrust_delay: THRUST_DELAY_SHORT,
                smoothing: SMOOTHING_LIGHT,
                color: COLOR_MOUSE,
            },
            Self::CatNeutral => RoleTuning {
                can_fire: false,
                has_boost: false,
                max_speed: MAX_SPEED_FAST,
                max_rotation: ROTATION_SLOW,
                thrust_delay: THRUST_DELAY_LONG,
                smoothing: SMOOTHING_HEAVY,
                color: COLOR_NEUTRAL,
            },
            Self::MouseNeutral => RoleTuning {
                can_fire: false,
                has_boost: false,
                max_speed: MAX_SPEED_SLOW,
                max_rotation: ROTATION_FAST,
                thrust_delay: THRUST_DELAY_SHORT,
                smoothing: SMOOTHING_LIGHT,
                color: COLOR_NEUTRAL,
            },
        }
    }

    #[inline]
    pub fn can_fire(self) -> bool {
        self.tuning().can_fire
    }

    #[inline]
    pub fn has_boost(self) -> bool {
        self.tuning().has_boost
    }

    #[inline]
    pub fn max_speed(self) -> f32 {
        self.tuning().max_speed
    }

    #[inline]
    pub fn color(self) -> u32 {
        self.tuning().color
    }

    pub fn is_cat_side(self) -> bool {
        matches!(self, Self::Cat | Self::CatNeutral)
    }

    pub fn is_mouse_side(self) -> bool {
        matches!(self, Self::Mouse | Self::MouseNeutral)
    }

    /// Same side, weapons and boost removed.
    pub fn neutralized(self) -> Self {
        match self {
            Self::Cat => Self::CatNeutral,
            Self::Mouse => Self::MouseNeutral,
            other => other,
        }
    }

    pub fn base(self) -> Self {
        match self {
            Self::CatNeutral => Self::Cat,
            Self::MouseNeutral => Self::Mouse,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Cat => "cat",
            Self::Mouse => "mouse",
            Self::CatNeutral => "cat (neutral)",
            Self::MouseNeutral => "mouse (neutral)",
        }
    }
}

/// Roles both ships take after a kill or a restart, given the local ship's
/// current role. Returns (local, remote).
pub fn inverted_roles(local: ShipRole) -> (ShipRole, ShipRole) {
    if local.is_cat_side() {
        (ShipRole::Mouse, ShipRole::Cat)
    } else {
        (ShipRole::Cat, ShipRole::Mouse)
    }
}
