//! # DS4 Report Codec
//!
//! Binary HID report handling for DualShock 4 controllers.
//!
//! This module handles:
//! - Output report encoding for the USB (32-byte) and Bluetooth (78-byte) transports
//! - CRC32 checksum for the Bluetooth output frame
//! - Battery level / charging decoding from input reports
//!
//! Nothing in here performs I/O.

pub mod protocol;
pub mod encoder;
pub mod battery;
pub mod crc;
