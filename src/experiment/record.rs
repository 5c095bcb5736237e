// One row of the capture log: the setup knobs and timestamps a measurement
// needs to be reproducible. Derived quantities stay out of the stored row so
// a row can never disagree with itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inconsistencies a row can carry. These don't block logging (the row
/// records what actually happened) but they flag captures that won't show
/// the signal where analysis expects it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RowIssue {
    #[error("offset is zero; the tag was not switching")]
    ZeroOffset,
    #[error("offset of {0} MHz is odd; the firmware cannot produce it")]
    OddOffset(u32),
    #[error(
        "expected tx of {tx_mhz} MHz falls outside the captured {low_mhz:.3}..{high_mhz:.3} MHz span"
    )]
    TxOutsideCapture {
        tx_mhz: u32,
        low_mhz: f64,
        high_mhz: f64,
    },
    #[error("ambient capture at {ambient} started after the measurement at {measurement}")]
    AmbientAfterMeasurement {
        ambient: DateTime<Utc>,
        measurement: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub antenna: String,
    pub board: String,
    pub receiver: String,
    pub carrier_mhz: u32,
    pub offset_mhz: u32,
    pub sample_rate_hz: u64,
    pub sample_count: u64,
    pub center_mhz: u32,
    /// Start of the no-transmitter baseline capture
    pub ambient_started_at: DateTime<Utc>,
    /// Start of the capture with the tag transmitting
    pub measurement_started_at: DateTime<Utc>,
}

impl CaptureRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        antenna: impl Into<String>,
        board: impl Into<String>,
        receiver: impl Into<String>,
        carrier_mhz: u32,
        offset_mhz: u32,
        sample_rate_hz: u64,
        sample_count: u64,
        center_mhz: u32,
        ambient_started_at: DateTime<Utc>,
        measurement_started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            antenna: antenna.into(),
            board: board.into(),
            receiver: receiver.into(),
            carrier_mhz,
            offset_mhz,
            sample_rate_hz,
            sample_count,
            center_mhz,
            ambient_started_at,
            measurement_started_at,
        }
    }

    /// Where the receiver should see the backscattered signal
    pub fn expected_tx_mhz(&self) -> u32 {
        self.carrier_mhz + self.offset_mhz
    }

    pub fn capture_duration_secs(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate_hz as f64
    }

    pub fn check(&self) -> Vec<RowIssue> {
        let mut issues = Vec::new();

        if self.offset_mhz == 0 {
            issues.push(RowIssue::ZeroOffset);
        } else if self.offset_mhz % 2 != 0 {
            issues.push(RowIssue::OddOffset(self.offset_mhz));
        }

        // complex capture: the usable span is center +- rate/2
        let half_span_mhz = self.sample_rate_hz as f64 / 2.0 / 1e6;
        let low_mhz = f64::from(self.center_mhz) - half_span_mhz;
        let high_mhz = f64::from(self.center_mhz) + half_span_mhz;
        let tx_mhz = self.expected_tx_mhz();
        if f64::from(tx_mhz) < low_mhz || f64::from(tx_mhz) > high_mhz {
            issues.push(RowIssue::TxOutsideCapture {
                tx_mhz,
                low_mhz,
                high_mhz,
            });
        }

        if self.ambient_started_at > self.measurement_started_at {
            issues.push(RowIssue::AmbientAfterMeasurement {
                ambient: self.ambient_started_at,
                measurement: self.measurement_started_at,
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference_row() -> CaptureRecord {
        CaptureRecord::new(
            "dipole",
            "pico-1",
            "rtl-sdr",
            2452,
            8,
            4_000_000,
            20_000_000,
            2460,
            Utc.with_ymd_and_hms(2024, 5, 14, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 14, 10, 5, 0).unwrap(),
        )
    }

    #[test]
    fn test_derived_values() {
        let row = reference_row();
        assert_eq!(row.expected_tx_mhz(), 2460);
        assert_eq!(row.capture_duration_secs(), 5.0);
    }

    #[test]
    fn test_reference_row_is_clean() {
        assert!(reference_row().check().is_empty());
    }

    #[test]
    fn test_flags_odd_and_zero_offsets() {
        let mut row = reference_row();
        row.offset_mhz = 5;
        row.center_mhz = 2457;
        assert_eq!(row.check(), vec![RowIssue::OddOffset(5)]);

        row.offset_mhz = 0;
        row.center_mhz = 2452;
        assert_eq!(row.check(), vec![RowIssue::ZeroOffset]);
    }

    #[test]
    fn test_flags_tx_outside_span() {
        let mut row = reference_row();
        // 2 MHz of usable span around 2470 cannot contain 2460
        row.center_mhz = 2470;
        let issues = row.check();
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues[0],
            RowIssue::TxOutsideCapture { tx_mhz: 2460, .. }
        ));
    }

    #[test]
    fn test_tx_at_span_edge_is_accepted() {
        let mut row = reference_row();
        // 4 MHz rate covers 2460..2464; tx sits exactly on the edge
        row.center_mhz = 2462;
        assert!(row.check().is_empty());
    }

    #[test]
    fn test_flags_ambient_after_measurement() {
        let mut row = reference_row();
        std::mem::swap(&mut row.ambient_started_at, &mut row.measurement_started_at);
        let issues = row.check();
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], RowIssue::AmbientAfterMeasurement { .. }));
    }

    #[test]
    fn test_equal_timestamps_are_accepted() {
        let mut row = reference_row();
        row.ambient_started_at = row.measurement_started_at;
        assert!(row.check().is_empty());
    }
}
