mod frame;
mod report;
mod tick;

pub use frame::Simulation;
pub use report::{DrawHook, GameEvent, TickReport};
pub use tick::{FrameClock, FrameTimer};
