mod entity;
mod explosion;
mod projectile;
mod registry;
mod role;
mod ship;

pub use entity::{Body, Effect, Entity, FrameContext, SimulationStrategy};
pub use explosion::{EXPLOSION_ACTIVE_MS, EXPLOSION_DURATION_MS, Explosion, SPARK_COUNT};
pub use projectile::{FIRE_SPEED, PROJECTILE_RADIUS, PROJECTILE_TTL_MS, Projectile, fire_velocity};
pub use registry::{EntityHandle, EntityRegistry, KillerSet};
pub use role::{
    BOOST_MAX_SPEED, COLOR_CAT, COLOR_MOUSE, COLOR_NEUTRAL, RoleTuning, ShipRole, inverted_roles,
};
pub use ship::{
    BOOST_DURATION_MS, DEFAULT_SNAPSHOT_BLEND, FIRE_COOLDOWN_MS, LocalShip, ReactorPower,
    RemoteShip, SHIP_RADIUS, Ship, cannon_positions, wrapped_angle_diff,
};
