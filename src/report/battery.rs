//! # Battery Byte Decoder
//!
//! The battery level lives at an offset that differs between firmware
//! revisions and transports. The decoder scans a fixed list of candidate
//! offsets, accepts the first byte whose low nibble is a plausible level
//! (1-10) and then trusts that offset for the lifetime of the controller.

use super::protocol::*;
use crate::error::{Ds4Error, Result};

/// Per-controller decoder state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatteryDecodeCache {
    correct_byte_index: Option<usize>,
    last_valid_percent: Option<u8>,
}

impl BatteryDecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset accepted on an earlier read, if any
    pub fn correct_byte_index(&self) -> Option<usize> {
        self.correct_byte_index
    }

    /// Most recent non-zero reading, if any
    pub fn last_valid_percent(&self) -> Option<u8> {
        self.last_valid_percent
    }

    /// Decode battery level and charging flag from an input report
    ///
    /// # Errors
    ///
    /// Returns `InvalidReport` if the report is shorter than 32 bytes; the cache
    /// is left untouched in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use ds4_lightbar::report::battery::BatteryDecodeCache;
    ///
    /// let mut cache = BatteryDecodeCache::new();
    /// let mut report = [0u8; 64];
    /// report[30] = 0x15; // level 5, cable connected
    ///
    /// let status = cache.decode(&report)?;
    /// assert_eq!(status.percent, 50);
    /// assert!(status.charging);
    /// assert_eq!(cache.correct_byte_index(), Some(30));
    /// # Ok::<(), ds4_lightbar::error::Ds4Error>(())
    /// ```
    pub fn decode(&mut self, report: &[u8]) -> Result<BatteryStatus> {
        if report.len() < MIN_INPUT_REPORT_LEN {
            return Err(Ds4Error::InvalidReport(format!(
                "input report too short: {} bytes",
                report.len()
            )));
        }

        let status = match self.correct_byte_index {
            Some(index) => match report.get(index) {
                Some(&byte) => status_from_byte(byte),
                None => self.fallback_status(),
            },
            None => match find_plausible_byte(report) {
                Some((index, byte)) => {
                    self.correct_byte_index = Some(index);
                    status_from_byte(byte)
                }
                None => self.fallback_status(),
            },
        };

        if status.percent > 0 {
            self.last_valid_percent = Some(status.percent);
        }

        Ok(status)
    }

    fn fallback_status(&self) -> BatteryStatus {
        BatteryStatus {
            percent: self.last_valid_percent.unwrap_or(0),
            charging: false,
        }
    }
}

/// First candidate byte whose level nibble is within 1..=10
fn find_plausible_byte(report: &[u8]) -> Option<(usize, u8)> {
    BATTERY_CANDIDATE_OFFSETS.iter().find_map(|&index| {
        let byte = *report.get(index)?;
        let level = byte & BATTERY_LEVEL_MASK;
        (1..=10).contains(&level).then_some((index, byte))
    })
}

/// Map a battery byte to percent (level × 10, capped at 100) and charging flag
pub fn status_from_byte(byte: u8) -> BatteryStatus {
    let level = byte & BATTERY_LEVEL_MASK;
    BatteryStatus {
        percent: (level * 10).min(100),
        charging: byte & BATTERY_CHARGING_BIT != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(bytes: &[(usize, u8)]) -> Vec<u8> {
        let mut report = vec![0u8; 64];
        for &(index, value) in bytes {
            report[index] = value;
        }
        report
    }

    #[test]
    fn test_status_from_byte() {
        assert_eq!(status_from_byte(0x15), BatteryStatus { percent: 50, charging: true });
        assert_eq!(status_from_byte(0x0A), BatteryStatus { percent: 100, charging: false });
        assert_eq!(status_from_byte(0x0F), BatteryStatus { percent: 100, charging: false });
        assert_eq!(status_from_byte(0x10), BatteryStatus { percent: 0, charging: true });
    }

    #[test]
    fn test_decode_charging_level_five() {
        let mut cache = BatteryDecodeCache::new();
        let status = cache.decode(&report_with(&[(30, 0x15)])).unwrap();

        assert_eq!(status.percent, 50);
        assert!(status.charging);
    }

    #[test]
    fn test_decode_all_zero_without_cache_reports_zero() {
        let mut cache = BatteryDecodeCache::new();
        let status = cache.decode(&[0u8; 64]).unwrap();

        assert_eq!(status, BatteryStatus { percent: 0, charging: false });
        assert_eq!(cache.correct_byte_index(), None);
        assert_eq!(cache.last_valid_percent(), None);
    }

    #[test]
    fn test_decode_candidate_order() {
        // 12 and 31 are both plausible; 31 comes first in the candidate list
        let mut cache = BatteryDecodeCache::new();
        let status = cache.decode(&report_with(&[(12, 0x03), (31, 0x08)])).unwrap();

        assert_eq!(status.percent, 80);
        assert_eq!(cache.correct_byte_index(), Some(31));
    }

    #[test]
    fn test_decode_skips_implausible_levels() {
        // 0x0B at 30 is level 11, not plausible
        let mut cache = BatteryDecodeCache::new();
        let status = cache.decode(&report_with(&[(30, 0x0B), (13, 0x02)])).unwrap();

        assert_eq!(status.percent, 20);
        assert_eq!(cache.correct_byte_index(), Some(13));
    }

    #[test]
    fn test_accepted_index_is_never_rescanned() {
        let mut cache = BatteryDecodeCache::new();
        cache.decode(&report_with(&[(12, 0x07)])).unwrap();
        assert_eq!(cache.correct_byte_index(), Some(12));

        // 30 is now plausible and earlier in the candidate list, but 12 is trusted
        let status = cache.decode(&report_with(&[(30, 0x09), (12, 0x14)])).unwrap();
        assert_eq!(status, BatteryStatus { percent: 40, charging: true });
        assert_eq!(cache.correct_byte_index(), Some(12));
    }

    #[test]
    fn test_fallback_to_last_valid_percent() {
        let mut cache = BatteryDecodeCache::new();
        let mut report = vec![0u8; 32];
        report[29] = 0x06;
        cache.decode(&report).unwrap();
        assert_eq!(cache.last_valid_percent(), Some(60));

        // Trusted index 29 now reads zero, percent 0 does not overwrite the cache
        let status = cache.decode(&[0u8; 32]).unwrap();
        assert_eq!(status.percent, 0);
        assert_eq!(cache.last_valid_percent(), Some(60));
    }

    #[test]
    fn test_fallback_when_nothing_plausible_reuses_cache() {
        let mut cache = BatteryDecodeCache {
            correct_byte_index: None,
            last_valid_percent: Some(70),
        };

        let status = cache.decode(&[0u8; 64]).unwrap();
        assert_eq!(status, BatteryStatus { percent: 70, charging: false });
    }

    #[test]
    fn test_candidate_past_end_is_ignored() {
        // Exactly 32 bytes: offset 32 is out of range and must not panic
        let mut cache = BatteryDecodeCache::new();
        let status = cache.decode(&[0u8; 32]).unwrap();
        assert_eq!(status.percent, 0);
    }

    #[test]
    fn test_short_report_is_rejected() {
        let mut cache = BatteryDecodeCache::new();
        let result = cache.decode(&[0x15; 31]);

        match result {
            Err(Ds4Error::InvalidReport(msg)) => assert!(msg.contains("31")),
            other => panic!("Expected InvalidReport, got: {:?}", other),
        }
        assert_eq!(cache, BatteryDecodeCache::new());
    }
}
