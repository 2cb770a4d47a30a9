//! # Controller Module
//!
//! Controller discovery and lifecycle tracking.
//!
//! This module handles:
//! - Enumerating DualShock 4 devices and opening their transports
//! - Per-controller records and the events published about them
//! - Retiring controllers whose transports are all gone

pub mod events;
pub mod record;
pub mod registry;

pub use events::ControllerEvent;
pub use record::{ControllerRecord, SharedRecord};
pub use registry::{ControllerEntry, ControllerRegistry, RegistrySettings};
