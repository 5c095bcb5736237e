// Radio arithmetic: what to dial into the signal generator, the firmware
// build, and the capture receiver so the numbers line up.

pub mod plan;
pub mod pll;

pub use plan::{PlanError, TransmitPlan, TransmitProfile};
pub use pll::{PllError, PllSettings, plan_sys_pll};
