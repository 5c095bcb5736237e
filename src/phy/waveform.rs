// Chip pairs to antenna-switch square waves. One pair maps to one wave
// period; the position of the high half inside the period carries the QPSK
// phase (0/90/180/270 degrees).

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WaveError {
    #[error("chip length {0} is below the 16-cycle minimum (quarter waves must hold 4+ cycles)")]
    ChipLenTooShort(u32),
    #[error("chip length {0} must be a multiple of 8 (quarter waves need even cycle counts)")]
    ChipLenGranularity(u32),
    #[error("repetition count must be nonzero")]
    ZeroRepetitions,
}

/// One constant hold of the antenna-switch pin, in PIO clock cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High(u32),
    Low(u32),
}

impl Level {
    pub fn cycles(&self) -> u32 {
        match self {
            Level::High(n) | Level::Low(n) => *n,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Level::High(_))
    }
}

/// Square-wave shapes for the four chip pairs at a given period length
#[derive(Debug, Clone, Copy)]
pub struct WaveTable {
    quarter: u32,
    half: u32,
}

impl WaveTable {
    pub fn new(chip_len: u32) -> Result<Self, WaveError> {
        if chip_len < 16 {
            return Err(WaveError::ChipLenTooShort(chip_len));
        }
        if chip_len % 8 != 0 {
            return Err(WaveError::ChipLenGranularity(chip_len));
        }
        Ok(Self {
            quarter: chip_len / 4,
            half: chip_len / 2,
        })
    }

    pub fn chip_len(&self) -> u32 {
        self.quarter * 4
    }

    /// Segment sequence for one wave period of the given pair
    pub fn segments(&self, pair: u8) -> Vec<Level> {
        match pair & 0b11 {
            0b00 => vec![
                Level::Low(self.quarter),
                Level::High(self.half),
                Level::Low(self.quarter),
            ],
            0b01 => vec![Level::Low(self.half), Level::High(self.half)],
            0b10 => vec![Level::High(self.half), Level::Low(self.half)],
            _ => vec![
                Level::High(self.quarter),
                Level::Low(self.half),
                Level::High(self.quarter),
            ],
        }
    }
}

/// Render a transition-interleaved pair stream into merged level runs.
///
/// Each pair's wave period repeats `repetitions` times and adjacent equal
/// levels merge into one run. The stream opens from a zero-length low run
/// because the PIO starts in its low phase; the word encoder clamps that to
/// the minimum hold.
pub fn render_levels(
    pairs: &[u8],
    table: &WaveTable,
    repetitions: u32,
) -> Result<Vec<Level>, WaveError> {
    if repetitions == 0 {
        return Err(WaveError::ZeroRepetitions);
    }
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    let mut current = Level::Low(0);
    for &pair in pairs {
        for _ in 0..repetitions {
            for segment in table.segments(pair) {
                current = match (current, segment) {
                    (Level::High(held), Level::High(next)) => Level::High(held + next),
                    (Level::Low(held), Level::Low(next)) => Level::Low(held + next),
                    (run, next) => {
                        runs.push(run);
                        next
                    }
                };
            }
        }
    }
    runs.push(current);
    Ok(runs)
}
