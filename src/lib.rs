//! # DS4 Lightbar Library
//!
//! Drive the light bar and rumble of DualShock 4 controllers over USB and Bluetooth.
//!
//! This library discovers controllers through `hidapi`, encodes LED/rumble
//! output reports for both transports, decodes the battery level from input
//! reports, and runs per-controller light effects and low-battery alerts.

pub mod battery;
pub mod color;
pub mod config;
pub mod controller;
pub mod error;
pub mod hid;
pub mod led;
pub mod report;
