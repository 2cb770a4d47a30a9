//! `hidapi`-backed implementation of the HID traits

use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};

use hidapi::{BusType, HidApi, HidDevice};
use tracing::debug;

use super::port::{DeviceDescriptor, HidBackend, HidPort};
use crate::error::{Ds4Error, Result};
use crate::report::protocol::{BLUETOOTH_INPUT_REPORT_LEN, USB_INPUT_REPORT_LEN};

/// HID backend over the system `hidapi` library
pub struct HidApiBackend {
    api: HidApi,
}

impl std::fmt::Debug for HidApiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidApiBackend").finish_non_exhaustive()
    }
}

impl HidApiBackend {
    /// Initialise `hidapi`
    ///
    /// # Errors
    ///
    /// Returns `Hid` if the platform HID library cannot be initialised.
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(|e| Ds4Error::Hid(format!("Failed to initialise hidapi: {}", e)))?;
        Ok(Self { api })
    }
}

/// `hidapi` does not expose report lengths, derive them from the bus type
fn input_report_len(bus_type: BusType) -> usize {
    match bus_type {
        BusType::Bluetooth => BLUETOOTH_INPUT_REPORT_LEN,
        _ => USB_INPUT_REPORT_LEN,
    }
}

impl HidBackend for HidApiBackend {
    fn enumerate(&mut self, vendor_id: u16, product_ids: &[u16]) -> Result<Vec<DeviceDescriptor>> {
        self.api
            .refresh_devices()
            .map_err(|e| Ds4Error::Hid(format!("Failed to enumerate HID devices: {}", e)))?;

        let devices = self
            .api
            .device_list()
            .filter(|info| info.vendor_id() == vendor_id && product_ids.contains(&info.product_id()))
            .map(|info| {
                debug!(
                    "Found HID device: {} (vendor: 0x{:04x}, product: 0x{:04x}, bus: {:?})",
                    info.path().to_string_lossy(),
                    info.vendor_id(),
                    info.product_id(),
                    info.bus_type()
                );

                DeviceDescriptor {
                    path: info.path().to_string_lossy().into_owned(),
                    vendor_id: info.vendor_id(),
                    product_id: info.product_id(),
                    serial_number: info
                        .serial_number()
                        .filter(|serial| !serial.is_empty())
                        .map(str::to_owned),
                    input_report_len: input_report_len(info.bus_type()),
                }
            })
            .collect();

        Ok(devices)
    }

    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn HidPort>> {
        let path = CString::new(device.path.as_str())
            .map_err(|e| Ds4Error::Hid(format!("Invalid device path {}: {}", device.path, e)))?;

        let handle = self
            .api
            .open_path(&path)
            .map_err(|e| Ds4Error::Hid(format!("Failed to open {}: {}", device.path, e)))?;

        Ok(Box::new(HidApiPort {
            device: handle,
            alive: AtomicBool::new(true),
        }))
    }
}

/// Opened `hidapi` device
///
/// `hidapi` has no liveness query; the handle is considered gone after a
/// failed read or feature report (the OS reports a removed node on the next
/// access). A failed output write alone leaves it live, since callers retry
/// it as a feature report.
struct HidApiPort {
    device: HidDevice,
    alive: AtomicBool,
}

impl HidApiPort {
    fn mark_dead<T>(&self, err: hidapi::HidError, what: &str) -> Result<T> {
        self.alive.store(false, Ordering::SeqCst);
        Err(Ds4Error::Hid(format!("{} failed: {}", what, err)))
    }
}

impl HidPort for HidApiPort {
    fn write(&self, data: &[u8]) -> Result<usize> {
        self.device
            .write(data)
            .map_err(|e| Ds4Error::Hid(format!("Write failed: {}", e)))
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<()> {
        match self.device.send_feature_report(data) {
            Ok(()) => Ok(()),
            Err(e) => self.mark_dead(e, "Feature report"),
        }
    }

    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        match self.device.read_timeout(buf, timeout_ms) {
            Ok(read) => Ok(read),
            Err(e) => self.mark_dead(e, "Read"),
        }
    }

    fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}
