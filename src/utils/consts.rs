/// Log level (overridden by RUST_LOG)
pub const LOG_LEVEL: &str = "info";

// ============================================================================
// Radio timing
// ============================================================================

/// Target chip period in microseconds (2 Mchip/s)
pub const CHIP_PERIOD_US: f64 = 0.5;

/// Signal generator carrier used in the reference measurements (MHz)
pub const DEFAULT_CARRIER_MHZ: u32 = 2452;

/// Chip pairs per 4-bit symbol (32 chips, two per pair on the I/Q rails)
pub const PAIRS_PER_SYMBOL: usize = 16;

/// Crystal oscillator frequency on the tag board (MHz)
pub const XOSC_MHZ: u32 = 12;

// ============================================================================
// PHY framing
// ============================================================================

/// Preamble length in bytes (eight zero symbols)
pub const PREAMBLE_BYTES: usize = 4;

/// Start-of-frame delimiter
pub const SFD: u8 = 0xA7;

/// FCS length in bytes
pub const FCS_BYTES: usize = 2;

/// PHR length field is 7 bits wide
pub const MAX_PSDU_BYTES: usize = 127;

// Frame defaults used by the tag firmware's test packets
pub const DEFAULT_DEST_PAN: u16 = 0x4444;
pub const DEFAULT_DEST_ADDR: u16 = 0xABCD;
pub const DEFAULT_SRC_PAN: u16 = 0x2222;
pub const DEFAULT_SRC_ADDR: u16 = 0x1234;
pub const DEFAULT_SEQUENCE: u8 = 1;

/// Default `ssp` payload length
pub const DEFAULT_PAYLOAD_LEN: u32 = 4;

// ============================================================================
// Firmware console
// ============================================================================

/// USB CDC baud rate (nominal; the CDC link ignores it)
pub const CONSOLE_BAUD: u32 = 115_200;

/// End-of-text byte; aborts an in-progress send on the firmware side
pub const ETX: u8 = 0x03;

/// Firmware-side cap on `ssp` payload length
pub const MAX_CONSOLE_PAYLOAD: u32 = 1000;

/// Firmware word buffer; longer packets are truncated on the device
pub const MAX_PIO_WORDS: usize = 4000;

/// Console read timeout per poll (milliseconds)
pub const CONSOLE_POLL_MS: u64 = 200;

// ============================================================================
// Capture log
// ============================================================================

/// Default capture log path
pub const DEFAULT_LOG_PATH: &str = "capture_log.json";
