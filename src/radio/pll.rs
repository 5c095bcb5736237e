// System PLL planning for the tag's RP2040. Mirrors the SDK's vcocalc: the
// crystal feeds the VCO through a feedback divider, two post dividers bring
// the VCO down to the system clock. Higher VCO means less jitter, so the
// search walks feedback dividers from the top and takes the first exact hit.

use serde::Serialize;
use thiserror::Error;

use crate::utils::consts::XOSC_MHZ;

pub const VCO_MIN_MHZ: u32 = 750;
pub const VCO_MAX_MHZ: u32 = 1600;
pub const FBDIV_MIN: u32 = 16;
pub const FBDIV_MAX: u32 = 320;
pub const POST_DIV_MAX: u32 = 7;

#[derive(Debug, Error, PartialEq)]
pub enum PllError {
    #[error("target clock must be nonzero")]
    ZeroTarget,
    #[error("no VCO and post-divider combination reaches {0} MHz from the {XOSC_MHZ} MHz crystal")]
    Unreachable(u32),
}

/// One exact system PLL configuration (reference divider fixed at 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PllSettings {
    pub vco_mhz: u32,
    pub fbdiv: u32,
    pub post_div1: u32,
    pub post_div2: u32,
}

impl PllSettings {
    pub fn sys_clk_mhz(&self) -> u32 {
        self.vco_mhz / (self.post_div1 * self.post_div2)
    }
}

/// Find PLL settings that hit the target system clock exactly.
///
/// Ties resolve toward the highest VCO, then the largest first post divider,
/// matching the values the firmware bakes into its clock setup.
pub fn plan_sys_pll(target_mhz: u32) -> Result<PllSettings, PllError> {
    if target_mhz == 0 {
        return Err(PllError::ZeroTarget);
    }

    for fbdiv in (FBDIV_MIN..=FBDIV_MAX).rev() {
        let vco_mhz = XOSC_MHZ * fbdiv;
        if vco_mhz > VCO_MAX_MHZ {
            continue;
        }
        if vco_mhz < VCO_MIN_MHZ {
            break;
        }
        for post_div1 in (1..=POST_DIV_MAX).rev() {
            for post_div2 in (1..=post_div1).rev() {
                let sys = u64::from(target_mhz) * u64::from(post_div1) * u64::from(post_div2);
                if sys == u64::from(vco_mhz) {
                    return Ok(PllSettings {
                        vco_mhz,
                        fbdiv,
                        post_div1,
                        post_div2,
                    });
                }
            }
        }
    }
    Err(PllError::Unreachable(target_mhz))
}
