//! Events published by the controller registry and its per-controller services

use super::record::ControllerRecord;

/// Something observable happened to a controller
///
/// Delivered on the registry's broadcast channel, see
/// [`ControllerRegistry::subscribe`](super::registry::ControllerRegistry::subscribe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A new controller was discovered and opened
    Connected(ControllerRecord),

    /// A controller lost all transports and was removed
    Disconnected(ControllerRecord),

    /// A liveness check found no usable transport
    ConnectionLost { id: String },

    /// A battery read succeeded
    BatteryChanged { id: String, percent: u8, charging: bool },

    /// Battery dropped to or below the warning threshold while discharging
    LowBatteryTriggered { id: String, percent: u8 },

    /// Warning cleared (charging, recovered above threshold, or threshold changed)
    LowBatteryReset { id: String },

    /// User-facing low battery notice, at most once per warning episode
    LowBatteryNotification {
        id: String,
        display_name: String,
        percent: u8,
    },
}

impl ControllerEvent {
    /// ID of the controller the event refers to
    pub fn controller_id(&self) -> &str {
        match self {
            ControllerEvent::Connected(record) | ControllerEvent::Disconnected(record) => record.id(),
            ControllerEvent::ConnectionLost { id }
            | ControllerEvent::BatteryChanged { id, .. }
            | ControllerEvent::LowBatteryTriggered { id, .. }
            | ControllerEvent::LowBatteryReset { id }
            | ControllerEvent::LowBatteryNotification { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::protocol::Transport;

    #[test]
    fn test_controller_id() {
        let record = ControllerRecord::new("/dev/hidraw3", "DS4 #1 (USB)", Transport::Usb);
        assert_eq!(ControllerEvent::Connected(record).controller_id(), "/dev/hidraw3");

        let event = ControllerEvent::BatteryChanged {
            id: "bt-path".to_string(),
            percent: 40,
            charging: false,
        };
        assert_eq!(event.controller_id(), "bt-path");
    }
}
