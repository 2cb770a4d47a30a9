//! # Controller Record
//!
//! Identity and last-known state of one connected controller. Setters report
//! whether the stored value actually changed so callers can decide whether to
//! publish anything.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::color::Rgb;
use crate::led::effects::LedEffectType;
use crate::report::protocol::Transport;

/// Record shared between the registry and the controller's services
pub type SharedRecord = Arc<Mutex<ControllerRecord>>;

/// Battery percent assumed until the first successful read
pub const INITIAL_BATTERY_PERCENT: u8 = 100;

/// Last-known state of a controller
///
/// # Examples
///
/// ```
/// use ds4_lightbar::controller::record::ControllerRecord;
/// use ds4_lightbar::report::protocol::Transport;
///
/// let mut record = ControllerRecord::new("/dev/hidraw0", "DS4 #1 (USB)", Transport::Usb);
/// assert!(record.set_battery(40, false));
/// assert!(!record.set_battery(40, false)); // unchanged
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRecord {
    id: String,
    display_name: String,
    usb: bool,
    bluetooth: bool,
    battery_percent: u8,
    charging: bool,
    led_color: Rgb,
    active_profile: String,
    active_effect: LedEffectType,
}

impl ControllerRecord {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, transport: Transport) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            usb: transport == Transport::Usb,
            bluetooth: transport == Transport::Bluetooth,
            battery_percent: INITIAL_BATTERY_PERCENT,
            charging: false,
            led_color: Rgb::BLUE,
            active_profile: String::new(),
            active_effect: LedEffectType::None,
        }
    }

    pub fn shared(self) -> SharedRecord {
        Arc::new(Mutex::new(self))
    }

    /// Stable identity: the device path of the first transport seen
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn has_usb(&self) -> bool {
        self.usb
    }

    pub fn has_bluetooth(&self) -> bool {
        self.bluetooth
    }

    pub fn has_transport(&self, transport: Transport) -> bool {
        match transport {
            Transport::Usb => self.usb,
            Transport::Bluetooth => self.bluetooth,
        }
    }

    pub fn battery_percent(&self) -> u8 {
        self.battery_percent
    }

    pub fn is_charging(&self) -> bool {
        self.charging
    }

    pub fn led_color(&self) -> Rgb {
        self.led_color
    }

    pub fn active_profile(&self) -> &str {
        &self.active_profile
    }

    pub fn active_effect(&self) -> LedEffectType {
        self.active_effect
    }

    pub fn set_transport(&mut self, transport: Transport, present: bool) -> bool {
        let flag = match transport {
            Transport::Usb => &mut self.usb,
            Transport::Bluetooth => &mut self.bluetooth,
        };
        replace_if_changed(flag, present)
    }

    pub fn set_battery(&mut self, percent: u8, charging: bool) -> bool {
        let percent_changed = replace_if_changed(&mut self.battery_percent, percent.min(100));
        let charging_changed = replace_if_changed(&mut self.charging, charging);
        percent_changed || charging_changed
    }

    pub fn set_led_color(&mut self, color: Rgb) -> bool {
        replace_if_changed(&mut self.led_color, color)
    }

    pub fn set_active_profile(&mut self, name: impl Into<String>) -> bool {
        replace_if_changed(&mut self.active_profile, name.into())
    }

    pub fn set_active_effect(&mut self, effect: LedEffectType) -> bool {
        replace_if_changed(&mut self.active_effect, effect)
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
