// Everything between payload bytes and the tag's PIO FIFO: 802.15.4 framing
// with FCS, O-QPSK chip spreading, square-wave synthesis, word packing.

pub mod chips;
pub mod crc;
pub mod encoder;
pub mod frame;
pub mod payload;
pub mod waveform;

pub use encoder::{EncodedWaveform, WaveEncoder};
pub use frame::{FrameError, FrameType, MacFrame, PhyFrame};
pub use waveform::{Level, WaveError};
