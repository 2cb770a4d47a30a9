//! # HID Communication Module
//!
//! Handles raw HID access to DualShock 4 controllers.
//!
//! This module handles:
//! - Enumerating Sony devices by vendor/product ID
//! - Opening device handles through `hidapi`
//! - Owning the USB and/or Bluetooth handle of one controller
//! - Bounded, non-blocking input report reads
//! - Liveness tracking and disconnect detection

pub mod port;
pub mod hidapi_backend;
pub mod connection;

pub use connection::ConnectionHandle;
pub use hidapi_backend::HidApiBackend;
pub use port::{DeviceDescriptor, HidBackend, HidPort};
