//! Battery telemetry and low-battery alerts

pub mod reader;
pub mod warning;

pub use reader::BatteryReader;
pub use warning::{BatteryWarningMonitor, WarningPhase, WarningSettings};
