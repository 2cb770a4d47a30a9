//! # Light Bar Module
//!
//! LED and rumble output for a single controller.
//!
//! This module handles:
//! - Serialising every output report through one per-controller lock
//! - The low-intensity heartbeat rumble loop
//! - Continuous visual effects (rainbow, breathing, pulse, strobe, health bar)
//! - Cancellable background loops with a bounded stop wait

pub mod task;
pub mod driver;
pub mod effects;

pub use driver::LedDriver;
pub use effects::{EffectScheduler, LedEffectType};
