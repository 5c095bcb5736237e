// Host side of the physical hardware: serial discovery and the firmware
// console dialogue.

pub mod console;

pub use console::{Console, ConsoleCommand, ConsoleError, DeviceEvent, Interval, OffsetCommand};
