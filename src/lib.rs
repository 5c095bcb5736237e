// Host-side toolkit for the pico O-QPSK backscatter tag: transmit parameter
// planning, 802.15.4 frame compilation down to PIO FIFO words, the firmware
// serial console, and the measurement campaign log.

pub mod device;
pub mod experiment;
pub mod phy;
pub mod radio;
pub mod ui;
pub mod utils;
