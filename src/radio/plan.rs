// Transmit parameter derivation. The signal generator provides the carrier
// and the tag toggles its antenna switch at the offset frequency, so the
// receiver sees energy at carrier + offset. All frequencies are whole MHz.

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

use crate::phy::WaveEncoder;
use crate::phy::waveform::WaveError;
use crate::utils::consts::CHIP_PERIOD_US;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("carrier frequency must be nonzero")]
    ZeroCarrier,
    #[error("offset frequency must be nonzero")]
    ZeroOffset,
    #[error("offset of {0} MHz is odd; repetitions per chip would not be whole")]
    OddOffset(u32),
    #[error("chip length {0} is below the 8-cycle minimum")]
    ChipLenTooShort(u32),
    #[error("chip length {0} must be even")]
    OddChipLen(u32),
    #[error("PIO clock of {pio_mhz} MHz exceeds the {sys_clk_mhz} MHz system clock")]
    PioFasterThanSystem { pio_mhz: u32, sys_clk_mhz: u32 },
    #[error("clock divider integer part {0} overflows the 16-bit divider register")]
    DividerOverflow(u32),
    #[error("derived chip period {0} us misses the {CHIP_PERIOD_US} us target")]
    ChipPeriodMismatch(f64),
}

/// PIO clock divider in the state machine's 16.8 fixed-point register format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockDivider {
    pub integer: u16,
    /// Fractional part in 1/256ths
    pub fraction: u8,
}

impl ClockDivider {
    fn from_ratio(sys_clk_mhz: u32, pio_mhz: u32) -> Result<Self, PlanError> {
        if pio_mhz > sys_clk_mhz {
            return Err(PlanError::PioFasterThanSystem {
                pio_mhz,
                sys_clk_mhz,
            });
        }
        let whole = sys_clk_mhz / pio_mhz;
        let integer =
            u16::try_from(whole).map_err(|_| PlanError::DividerOverflow(whole))?;
        let fraction = ((sys_clk_mhz % pio_mhz) * 256 / pio_mhz) as u8;
        Ok(Self { integer, fraction })
    }

    /// True when the state machine runs at the full system clock
    pub fn is_unit(&self) -> bool {
        self.integer == 1 && self.fraction == 0
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.integer) + f64::from(self.fraction) / 256.0
    }
}

/// Everything that has to agree before a capture: generator carrier, firmware
/// clocking, and the receiver's expected transmit frequency.
///
/// Derivations, for offset f_o and chip length c:
/// tx = carrier + f_o, repetitions = f_o / 2, pio = f_o * c. The chip period
/// (repetitions * c) / pio then lands on 0.5 us, which is what makes the
/// spread signal a 2 Mchip/s 802.15.4 channel.
#[derive(Debug, Clone, Serialize)]
pub struct TransmitPlan {
    pub carrier_mhz: u32,
    pub offset_mhz: u32,
    pub chip_len: u32,
    pub sys_clk_mhz: u32,
    pub tx_mhz: u32,
    pub repetitions: u32,
    pub pio_mhz: u32,
    pub chip_period_us: f64,
    pub divider: ClockDivider,
}

impl TransmitPlan {
    pub fn new(
        carrier_mhz: u32,
        offset_mhz: u32,
        chip_len: u32,
        sys_clk_mhz: u32,
    ) -> Result<Self, PlanError> {
        if carrier_mhz == 0 {
            return Err(PlanError::ZeroCarrier);
        }
        if offset_mhz == 0 {
            return Err(PlanError::ZeroOffset);
        }
        if offset_mhz % 2 != 0 {
            return Err(PlanError::OddOffset(offset_mhz));
        }
        if chip_len < 8 {
            return Err(PlanError::ChipLenTooShort(chip_len));
        }
        if chip_len % 2 != 0 {
            return Err(PlanError::OddChipLen(chip_len));
        }

        let tx_mhz = carrier_mhz + offset_mhz;
        let repetitions = offset_mhz / 2;
        let pio_mhz = offset_mhz * chip_len;
        let chip_period_us = f64::from(repetitions * chip_len) / f64::from(pio_mhz);
        if chip_period_us != CHIP_PERIOD_US {
            return Err(PlanError::ChipPeriodMismatch(chip_period_us));
        }
        let divider = ClockDivider::from_ratio(sys_clk_mhz, pio_mhz)?;

        Ok(Self {
            carrier_mhz,
            offset_mhz,
            chip_len,
            sys_clk_mhz,
            tx_mhz,
            repetitions,
            pio_mhz,
            chip_period_us,
            divider,
        })
    }

    /// Waveform encoder for this plan. Synthesis is stricter than planning:
    /// quarter waves need whole, even cycle counts, so the chip length must
    /// also be a multiple of 8 and at least 16.
    pub fn wave_encoder(&self) -> Result<WaveEncoder, WaveError> {
        WaveEncoder::new(self.chip_len, self.repetitions)
    }
}

/// The firmware build matrix. Each profile is one `config.rs` the tag ships
/// with; the offset-only switches within a system clock are also reachable at
/// runtime through the console's `freq` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransmitProfile {
    /// 128 MHz system clock, 8 MHz offset, 16-cycle chips (firmware default)
    Sys128Offset8,
    /// 144 MHz system clock, 6 MHz offset, 24-cycle chips
    Sys144Offset6,
    /// 128 MHz system clock, 4 MHz offset, 16-cycle chips
    Sys128Offset4,
    /// 128 MHz system clock, 2 MHz offset, 16-cycle chips
    Sys128Offset2,
}

impl TransmitProfile {
    pub fn plan(self, carrier_mhz: u32) -> Result<TransmitPlan, PlanError> {
        match self {
            Self::Sys128Offset8 => TransmitPlan::new(carrier_mhz, 8, 16, 128),
            Self::Sys144Offset6 => TransmitPlan::new(carrier_mhz, 6, 24, 144),
            Self::Sys128Offset4 => TransmitPlan::new(carrier_mhz, 4, 16, 128),
            Self::Sys128Offset2 => TransmitPlan::new(carrier_mhz, 2, 16, 128),
        }
    }

    /// Whether the console can switch a default-clocked board here. The
    /// 6 MHz profile needs the 144 MHz system clock baked into the build.
    pub fn console_reachable(self) -> bool {
        !matches!(self, Self::Sys144Offset6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notebook_scenario() {
        // 2452 MHz carrier with a 10 MHz offset and 12-cycle chips
        let plan = TransmitPlan::new(2452, 10, 12, 128).unwrap();
        assert_eq!(plan.tx_mhz, 2462);
        assert_eq!(plan.repetitions, 5);
        assert_eq!(plan.pio_mhz, 120);
        assert_eq!(plan.chip_period_us, 0.5);
        // 128/120 in 16.8 fixed point
        assert_eq!(plan.divider.integer, 1);
        assert_eq!(plan.divider.fraction, 17);
    }

    #[test]
    fn test_firmware_profiles() {
        let cases = [
            (TransmitProfile::Sys128Offset8, 4, 128, 1, 0),
            (TransmitProfile::Sys144Offset6, 3, 144, 1, 0),
            (TransmitProfile::Sys128Offset4, 2, 64, 2, 0),
            (TransmitProfile::Sys128Offset2, 1, 32, 4, 0),
        ];
        for (profile, repetitions, pio_mhz, div_int, div_frac) in cases {
            let plan = profile.plan(2452).unwrap();
            assert_eq!(plan.repetitions, repetitions, "{profile:?}");
            assert_eq!(plan.pio_mhz, pio_mhz, "{profile:?}");
            assert_eq!(plan.divider.integer, div_int, "{profile:?}");
            assert_eq!(plan.divider.fraction, div_frac, "{profile:?}");
            assert_eq!(plan.chip_period_us, 0.5, "{profile:?}");
            plan.wave_encoder().unwrap();
        }
    }

    #[test]
    fn test_console_reachability() {
        assert!(TransmitProfile::Sys128Offset8.console_reachable());
        assert!(TransmitProfile::Sys128Offset4.console_reachable());
        assert!(TransmitProfile::Sys128Offset2.console_reachable());
        assert!(!TransmitProfile::Sys144Offset6.console_reachable());
    }

    #[test]
    fn test_input_validation() {
        assert_eq!(
            TransmitPlan::new(0, 8, 16, 128).unwrap_err(),
            PlanError::ZeroCarrier
        );
        assert_eq!(
            TransmitPlan::new(2452, 0, 16, 128).unwrap_err(),
            PlanError::ZeroOffset
        );
        assert_eq!(
            TransmitPlan::new(2452, 5, 16, 128).unwrap_err(),
            PlanError::OddOffset(5)
        );
        assert_eq!(
            TransmitPlan::new(2452, 8, 6, 128).unwrap_err(),
            PlanError::ChipLenTooShort(6)
        );
        assert_eq!(
            TransmitPlan::new(2452, 8, 15, 128).unwrap_err(),
            PlanError::OddChipLen(15)
        );
    }

    #[test]
    fn test_pio_cannot_outrun_system_clock() {
        assert_eq!(
            TransmitPlan::new(2452, 10, 16, 128).unwrap_err(),
            PlanError::PioFasterThanSystem {
                pio_mhz: 160,
                sys_clk_mhz: 128
            }
        );
    }

    #[test]
    fn test_divider_fixed_point() {
        let unit = ClockDivider::from_ratio(128, 128).unwrap();
        assert!(unit.is_unit());
        assert_eq!(unit.as_f64(), 1.0);

        let quarter = ClockDivider::from_ratio(128, 32).unwrap();
        assert_eq!(quarter.integer, 4);
        assert_eq!(quarter.fraction, 0);

        // 3/2 = 1 + 128/256
        let half = ClockDivider::from_ratio(96, 64).unwrap();
        assert_eq!(half.integer, 1);
        assert_eq!(half.fraction, 128);
    }
}
