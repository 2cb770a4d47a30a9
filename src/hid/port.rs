//! Trait abstraction for HID device operations to enable testing

use crate::error::Result;

/// A discovered, not yet opened, HID device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Platform device path, unique per device node
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Serial number (MAC address on Bluetooth), if the device reports one
    pub serial_number: Option<String>,
    /// Input report byte length, used to classify the transport
    pub input_report_len: usize,
}

/// Trait for an opened HID device handle
pub trait HidPort: Send {
    /// Write an output report; a failure does not by itself mean the device is gone
    fn write(&self, data: &[u8]) -> Result<usize>;

    /// Write the same bytes as a feature report
    fn send_feature_report(&self, data: &[u8]) -> Result<()>;

    /// Read one input report, waiting at most `timeout_ms` (0 = non-blocking)
    ///
    /// Returns the number of bytes read, 0 when nothing was pending.
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    /// Whether the handle still refers to a live device
    fn is_connected(&self) -> bool;
}

/// Trait for enumerating and opening HID devices
#[cfg_attr(test, mockall::automock)]
pub trait HidBackend: Send {
    /// List devices matching the vendor ID and any of the product IDs
    fn enumerate(&mut self, vendor_id: u16, product_ids: &[u16]) -> Result<Vec<DeviceDescriptor>>;

    /// Open a previously enumerated device
    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn HidPort>>;
}
