//! # DS4 Protocol Constants and Types
//!
//! Device identifiers and report layouts for the DualShock 4.

use crate::color::Rgb;

/// Sony vendor ID
pub const DS4_VENDOR_ID: u16 = 0x054C;

/// DualShock 4 product ID (USB)
pub const DS4_PRODUCT_ID_USB: u16 = 0x05C4;

/// DualShock 4 product ID (Bluetooth)
pub const DS4_PRODUCT_ID_BLUETOOTH: u16 = 0x09CC;

/// Product IDs matched during discovery
pub const DS4_PRODUCT_IDS: [u16; 2] = [DS4_PRODUCT_ID_USB, DS4_PRODUCT_ID_BLUETOOTH];

/// Input report length that identifies a Bluetooth connection
pub const BLUETOOTH_INPUT_REPORT_LEN: usize = 547;

/// Input report length reported for wired connections
pub const USB_INPUT_REPORT_LEN: usize = 64;

/// Minimum input report length carrying battery telemetry
pub const MIN_INPUT_REPORT_LEN: usize = 32;

// USB output report layout (32 bytes)
pub const USB_REPORT_LEN: usize = 32;
pub const USB_REPORT_ID: u8 = 0x05;
pub const USB_FLAGS: u8 = 0xFF;
pub const USB_RUMBLE_OFFSET: usize = 4;
pub const USB_COLOR_OFFSET: usize = 6;
pub const USB_FLASH_OFFSET: usize = 9;

// Bluetooth output report layout (78 bytes, CRC-terminated)
pub const BT_REPORT_LEN: usize = 78;
pub const BT_HEADER: [u8; 5] = [0x11, 0xC0, 0x20, 0xF3, 0x04];
pub const BT_RUMBLE_OFFSET: usize = 6;
pub const BT_COLOR_OFFSET: usize = 8;
pub const BT_FLASH_OFFSET: usize = 11;
pub const BT_CRC_OFFSET: usize = 74;

/// Light bar flash on/off durations when flashing is enabled
pub const FLASH_DURATIONS: [u8; 2] = [0xFF, 0xFF];

/// Byte offsets that may carry battery level, tried in this order
pub const BATTERY_CANDIDATE_OFFSETS: [usize; 7] = [30, 31, 32, 12, 13, 11, 29];

/// Low nibble of the battery byte holds the level (0-10+)
pub const BATTERY_LEVEL_MASK: u8 = 0x0F;

/// Cable/charging flag in the battery byte
pub const BATTERY_CHARGING_BIT: u8 = 0x10;

/// Physical link a controller handle is attached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Usb,
    Bluetooth,
}

impl Transport {
    /// Classify a device by its input report byte length.
    ///
    /// # Examples
    ///
    /// ```
    /// use ds4_lightbar::report::protocol::Transport;
    ///
    /// assert_eq!(Transport::from_input_report_len(547), Transport::Bluetooth);
    /// assert_eq!(Transport::from_input_report_len(64), Transport::Usb);
    /// ```
    pub fn from_input_report_len(len: usize) -> Self {
        if len == BLUETOOTH_INPUT_REPORT_LEN {
            Transport::Bluetooth
        } else {
            Transport::Usb
        }
    }

    /// Short label used in display names
    pub fn label(&self) -> &'static str {
        match self {
            Transport::Usb => "USB",
            Transport::Bluetooth => "BT",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Light bar and rumble state carried by one output report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputState {
    pub color: Rgb,
    /// Large motor intensity
    pub rumble: u8,
    pub flash: bool,
}

impl OutputState {
    pub fn new(color: Rgb, rumble: u8, flash: bool) -> Self {
        Self { color, rumble, flash }
    }

    /// All-zero state: light bar off, no rumble, no flash
    pub fn off() -> Self {
        Self::default()
    }
}

/// Battery reading decoded from an input report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    /// Charge level, 0-100 in steps of 10
    pub percent: u8,
    pub charging: bool,
}

impl BatteryStatus {
    /// Human-readable charge description
    pub fn status_text(&self) -> &'static str {
        if self.charging {
            return if self.percent >= 95 { "Charged" } else { "Charging" };
        }

        match self.percent {
            80.. => "High",
            50..=79 => "Medium",
            20..=49 => "Low",
            10..=19 => "Very low",
            _ => "Critical",
        }
    }

    /// Ten-segment text gauge, e.g. `[######----]`
    pub fn battery_bar(&self) -> String {
        let bars = (self.percent / 10).min(10) as usize;
        format!("[{}{}]", "#".repeat(bars), "-".repeat(10 - bars))
    }
}
