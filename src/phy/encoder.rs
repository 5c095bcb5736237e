// Level runs to PIO FIFO words. The tag's PIO program alternates low/high
// holds, reading one stream bit per 2 clock cycles with 4 cycles of fixed
// overhead per hold: a hold of L cycles is (L - 4) / 2 one-bits and a
// terminating zero-bit.

use crate::phy::chips::{insert_transitions, spread};
use crate::phy::waveform::{Level, WaveError, WaveTable, render_levels};
use crate::utils::consts::MAX_PIO_WORDS;
use tracing::debug;

/// Minimum cycles the PIO holds one pin state
pub const MIN_HOLD_CYCLES: u32 = 4;

/// Clock cycles consumed per stream bit
pub const CYCLES_PER_BIT: u32 = 2;

/// A frame rendered down to what the firmware feeds its state machine
#[derive(Debug, Clone)]
pub struct EncodedWaveform {
    /// FIFO words in transmit order, MSB first within each word
    pub words: Vec<u32>,
    /// The holds as actually played (clamped to the minimum)
    pub levels: Vec<Level>,
    /// Pin-active cycles including the lead-in hold, excluding pad bits
    pub total_cycles: u64,
}

impl EncodedWaveform {
    pub fn run_count(&self) -> usize {
        self.levels.len()
    }

    pub fn air_time_us(&self, pio_mhz: u32) -> f64 {
        self.total_cycles as f64 / f64::from(pio_mhz)
    }

    /// True when the packet exceeds the firmware's word buffer and would be
    /// truncated on the device
    pub fn overflows_device_buffer(&self) -> bool {
        self.words.len() > MAX_PIO_WORDS
    }
}

/// Frame bytes to FIFO words for one transmit configuration
#[derive(Debug, Clone, Copy)]
pub struct WaveEncoder {
    table: WaveTable,
    repetitions: u32,
}

impl WaveEncoder {
    pub fn new(chip_len: u32, repetitions: u32) -> Result<Self, WaveError> {
        if repetitions == 0 {
            return Err(WaveError::ZeroRepetitions);
        }
        Ok(Self {
            table: WaveTable::new(chip_len)?,
            repetitions,
        })
    }

    pub fn chip_len(&self) -> u32 {
        self.table.chip_len()
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    /// Spread, interleave, render, and pack a complete over-the-air frame
    pub fn encode_frame(&self, frame_bytes: &[u8]) -> Result<EncodedWaveform, WaveError> {
        let pairs = insert_transitions(&spread(frame_bytes));
        let runs = render_levels(&pairs, &self.table, self.repetitions)?;
        let encoded = encode_levels(&runs);

        debug!(
            "Encoded {} frame bytes: {} pairs, {} runs, {} words, {} cycles",
            frame_bytes.len(),
            pairs.len(),
            encoded.run_count(),
            encoded.words.len(),
            encoded.total_cycles
        );
        Ok(encoded)
    }
}

/// Pack level runs into FIFO words.
///
/// A single zero-bit leads the stream; it times the PIO's first hold before
/// the run bits line up. Holds below the 4-cycle minimum are clamped up, odd
/// holds round down to the 2-cycle bit granularity.
pub fn encode_levels(runs: &[Level]) -> EncodedWaveform {
    if runs.is_empty() {
        return EncodedWaveform {
            words: Vec::new(),
            levels: Vec::new(),
            total_cycles: 0,
        };
    }

    let mut levels = Vec::with_capacity(runs.len());
    let mut bits: Vec<u8> = Vec::new();
    bits.push(0);
    let mut total_cycles = u64::from(MIN_HOLD_CYCLES);

    for run in runs {
        let held = run.cycles().max(MIN_HOLD_CYCLES) & !1;
        levels.push(match run {
            Level::High(_) => Level::High(held),
            Level::Low(_) => Level::Low(held),
        });
        total_cycles += u64::from(held);

        for _ in 0..(held - MIN_HOLD_CYCLES) / CYCLES_PER_BIT {
            bits.push(1);
        }
        bits.push(0);
    }

    EncodedWaveform {
        words: pack_words(&bits),
        levels,
        total_cycles,
    }
}

/// MSB-first packing; a trailing partial word pads with one-bits, which only
/// extends the final hold until the FIFO drains.
fn pack_words(bits: &[u8]) -> Vec<u32> {
    let mut words = Vec::with_capacity(bits.len().div_ceil(32));
    for chunk in bits.chunks(32) {
        let mut value = 0u32;
        for (bit_idx, &bit) in chunk.iter().enumerate() {
            value |= u32::from(bit) << (31 - bit_idx);
        }
        for bit_idx in chunk.len()..32 {
            value |= 1 << (31 - bit_idx);
        }
        words.push(value);
    }
    words
}
