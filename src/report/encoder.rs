//! # DS4 Output Report Encoder
//!
//! Encodes light bar color, rumble and flash into output reports.

use super::crc::crc32;
use super::protocol::*;

/// Encode a 32-byte USB output report
///
/// # Layout
///
/// ```text
/// [0]    0x05 report id
/// [1]    0xFF feature flags
/// [4]    large motor (rumble)
/// [5]    small motor (always 0)
/// [6..9] R, G, B
/// [9..11] flash on/off durations (0xFF, 0xFF when flashing)
/// ```
///
/// # Examples
///
/// ```
/// use ds4_lightbar::color::Rgb;
/// use ds4_lightbar::report::encoder::encode_usb_report;
/// use ds4_lightbar::report::protocol::OutputState;
///
/// let report = encode_usb_report(&OutputState::new(Rgb::new(1, 2, 3), 0, false));
/// assert_eq!(&report[6..9], &[1, 2, 3]);
/// ```
pub fn encode_usb_report(state: &OutputState) -> [u8; USB_REPORT_LEN] {
    let mut report = [0u8; USB_REPORT_LEN];
    report[0] = USB_REPORT_ID;
    report[1] = USB_FLAGS;

    report[USB_RUMBLE_OFFSET] = state.rumble;
    report[USB_RUMBLE_OFFSET + 1] = 0x00;

    report[USB_COLOR_OFFSET] = state.color.r;
    report[USB_COLOR_OFFSET + 1] = state.color.g;
    report[USB_COLOR_OFFSET + 2] = state.color.b;

    if state.flash {
        report[USB_FLASH_OFFSET..USB_FLASH_OFFSET + 2].copy_from_slice(&FLASH_DURATIONS);
    }

    report
}

/// Encode a 78-byte Bluetooth output report
///
/// Same fields as the USB report shifted by two bytes behind a five byte
/// header, terminated by a little-endian CRC32 over bytes 0-73.
pub fn encode_bluetooth_report(state: &OutputState) -> [u8; BT_REPORT_LEN] {
    let mut report = [0u8; BT_REPORT_LEN];
    report[..BT_HEADER.len()].copy_from_slice(&BT_HEADER);

    report[BT_RUMBLE_OFFSET] = state.rumble;
    report[BT_RUMBLE_OFFSET + 1] = 0x00;

    report[BT_COLOR_OFFSET] = state.color.r;
    report[BT_COLOR_OFFSET + 1] = state.color.g;
    report[BT_COLOR_OFFSET + 2] = state.color.b;

    if state.flash {
        report[BT_FLASH_OFFSET..BT_FLASH_OFFSET + 2].copy_from_slice(&FLASH_DURATIONS);
    }

    let crc = crc32(&report[..BT_CRC_OFFSET]);
    report[BT_CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());

    report
}

/// Encode the output report for the given transport
pub fn encode_output_report(transport: Transport, state: &OutputState) -> Vec<u8> {
    match transport {
        Transport::Usb => encode_usb_report(state).to_vec(),
        Transport::Bluetooth => encode_bluetooth_report(state).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    #[test]
    fn test_usb_report_layout() {
        let state = OutputState::new(Rgb::new(0x10, 0x20, 0x30), 0x80, false);
        let report = encode_usb_report(&state);

        assert_eq!(report.len(), 32);
        assert_eq!(report[0], 0x05);
        assert_eq!(report[1], 0xFF);
        assert_eq!(report[4], 0x80, "large motor carries rumble");
        assert_eq!(report[5], 0x00, "small motor stays off");
        assert_eq!(&report[6..9], &[0x10, 0x20, 0x30]);
        assert_eq!(&report[9..11], &[0x00, 0x00]);
        assert!(report[11..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_usb_report_flash() {
        let report = encode_usb_report(&OutputState::new(Rgb::RED, 0, true));
        assert_eq!(&report[9..11], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_bluetooth_report_layout() {
        let state = OutputState::new(Rgb::new(0xAA, 0xBB, 0xCC), 0x08, false);
        let report = encode_bluetooth_report(&state);

        assert_eq!(report.len(), 78);
        assert_eq!(&report[0..5], &[0x11, 0xC0, 0x20, 0xF3, 0x04]);
        assert_eq!(report[5], 0x00);
        assert_eq!(report[6], 0x08);
        assert_eq!(report[7], 0x00);
        assert_eq!(&report[8..11], &[0xAA, 0xBB, 0xCC]);
        assert_eq!(&report[11..13], &[0x00, 0x00]);
    }

    #[test]
    fn test_bluetooth_report_flash() {
        let report = encode_bluetooth_report(&OutputState::new(Rgb::RED, 0, true));
        assert_eq!(&report[11..13], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_bluetooth_report_crc_trailer() {
        let report = encode_bluetooth_report(&OutputState::new(Rgb::BLUE, 0, false));

        let expected = crc32(&report[..74]);
        let trailer = u32::from_le_bytes([report[74], report[75], report[76], report[77]]);
        assert_eq!(trailer, expected);
    }

    #[test]
    fn test_different_colors_different_crc() {
        let a = encode_bluetooth_report(&OutputState::new(Rgb::RED, 0, false));
        let b = encode_bluetooth_report(&OutputState::new(Rgb::GREEN, 0, false));
        assert_ne!(&a[74..], &b[74..]);
    }

    #[test]
    fn test_off_report_is_blank_apart_from_header() {
        let report = encode_usb_report(&OutputState::off());
        assert_eq!(&report[..2], &[0x05, 0xFF]);
        assert!(report[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_output_report_dispatches_on_transport() {
        let state = OutputState::new(Rgb::GREEN, 0, false);
        assert_eq!(encode_output_report(Transport::Usb, &state).len(), USB_REPORT_LEN);
        assert_eq!(encode_output_report(Transport::Bluetooth, &state).len(), BT_REPORT_LEN);
    }
}
