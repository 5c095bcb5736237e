use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::phy::Level;

/// Raw FIFO words, little-endian, in transmit order.
pub fn write_words(path: &Path, words: &[u32]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for &word in words {
        out.write_u32::<LittleEndian>(word)?;
    }
    out.flush()
}

/// One word per line, pasteable into a firmware test array.
pub fn write_hex(path: &Path, words: &[u32]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for &word in words {
        writeln!(out, "0x{word:08X},")?;
    }
    out.flush()
}

/// Render the antenna-switch levels as mono 16-bit WAV at the PIO clock rate.
pub fn write_wav(path: &Path, levels: &[Level], sample_rate_hz: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for level in levels {
        let sample: i16 = if level.is_high() { i16::MAX } else { i16::MIN + 1 };
        for _ in 0..level.cycles() {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()
}
