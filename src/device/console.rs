// Operator client for the tag's USB console. The firmware is line-oriented:
// commands in, colored status lines out, a `> ` prompt in between. This side
// only speaks the dialogue; all radio work happens on the device.

use std::io::{self, Read, Write};
use std::str::FromStr;
use std::time::Duration;

use crossbeam_channel::Receiver;
use serialport::{SerialPort, SerialPortInfo};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::utils::consts::{CONSOLE_BAUD, CONSOLE_POLL_MS, ETX, MAX_CONSOLE_PAYLOAD};

/// Quiet polls tolerated after an ETX before giving the device up
const ETX_GRACE_POLLS: u32 = 25;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("serial port: {0}")]
    Port(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("cannot parse interval {0:?} (try 1s, 1000ms, or bare milliseconds)")]
    BadInterval(String),
    #[error("payload of {got} bytes exceeds the firmware cap of {max}")]
    PayloadTooLong { got: u32, max: u32 },
    #[error("offset {0:?} has no console path (the firmware switches 2, 4, or 8 MHz)")]
    BadOffset(String),
}

/// Packet interval in the grammar the firmware parses: `1s`, `1000ms`, or
/// bare milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    millis: u32,
}

impl Interval {
    pub fn from_millis(millis: u32) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> u32 {
        self.millis
    }
}

impl FromStr for Interval {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = |digits: &str| {
            digits
                .parse::<u32>()
                .map_err(|_| ConsoleError::BadInterval(s.to_string()))
        };
        // "ms" first; "1000ms" also ends with "s"
        let millis = if let Some(digits) = s.strip_suffix("ms") {
            number(digits)?
        } else if let Some(digits) = s.strip_suffix('s') {
            number(digits)? * 1000
        } else {
            number(s)?
        };
        Ok(Self { millis })
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.millis)
    }
}

/// Offset profiles the firmware can switch to at runtime. The 6 MHz profile
/// is absent on purpose; it needs a 144 MHz build and has no console path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetCommand {
    F2MHz,
    F4MHz,
    F8MHz,
}

impl OffsetCommand {
    pub fn arg(&self) -> &'static str {
        match self {
            Self::F2MHz => "2",
            Self::F4MHz => "4",
            Self::F8MHz => "8",
        }
    }

    pub fn mhz(&self) -> u32 {
        match self {
            Self::F2MHz => 2,
            Self::F4MHz => 4,
            Self::F8MHz => 8,
        }
    }
}

impl FromStr for OffsetCommand {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2" | "2mhz" | "2MHz" => Ok(Self::F2MHz),
            "4" | "4mhz" | "4MHz" => Ok(Self::F4MHz),
            "8" | "8mhz" | "8MHz" => Ok(Self::F8MHz),
            _ => Err(ConsoleError::BadOffset(s.to_string())),
        }
    }
}

/// One line of the firmware's command grammar
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Restart,
    Help,
    SendSequential {
        interval: Interval,
        count: u32,
        /// `None` leaves the firmware at its 4-byte default
        payload_len: Option<u32>,
    },
    SetOffset(OffsetCommand),
    /// Passed through untouched, for grammar the client does not model
    Raw(String),
}

impl ConsoleCommand {
    /// Validate and render the line the firmware parses
    pub fn to_line(&self) -> Result<String, ConsoleError> {
        match self {
            Self::Restart => Ok("restart".to_string()),
            Self::Help => Ok("help".to_string()),
            Self::SendSequential {
                interval,
                count,
                payload_len,
            } => {
                if let Some(len) = payload_len {
                    if *len > MAX_CONSOLE_PAYLOAD {
                        return Err(ConsoleError::PayloadTooLong {
                            got: *len,
                            max: MAX_CONSOLE_PAYLOAD,
                        });
                    }
                    Ok(format!("ssp {interval} {count} {len}"))
                } else {
                    Ok(format!("ssp {interval} {count}"))
                }
            }
            Self::SetOffset(offset) => Ok(format!("freq {}", offset.arg())),
            Self::Raw(line) => Ok(line.clone()),
        }
    }
}

/// What the firmware said, classified for the operator loop
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// `sending packet... i/N`
    Progress { sent: u32, total: u32 },
    /// `Done!`
    Done,
    /// `Exited Early! i/N packets sent`
    ExitedEarly { sent: u32 },
    /// Anything else, ANSI and prompt noise removed
    Line(String),
}

/// Drop ANSI escape sequences; the firmware colors its status lines
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            // CSI parameters end at a byte in 0x40..=0x7E
            for terminator in chars.by_ref() {
                if ('\x40'..='\x7e').contains(&terminator) {
                    break;
                }
            }
        }
    }
    out
}

/// Classify one raw console line
pub fn classify_line(raw: &str) -> DeviceEvent {
    let line = strip_ansi(raw);
    let line = line.trim().trim_start_matches("> ").trim();

    if let Some(rest) = line.strip_prefix("sending packet...") {
        if let Some((sent, total)) = parse_fraction(rest) {
            return DeviceEvent::Progress { sent, total };
        }
    }
    if line.starts_with("Done!") {
        return DeviceEvent::Done;
    }
    if let Some(rest) = line.strip_prefix("Exited Early!") {
        let sent = parse_fraction(rest).map(|(sent, _)| sent).unwrap_or(0);
        return DeviceEvent::ExitedEarly { sent };
    }
    DeviceEvent::Line(line.to_string())
}

/// Pull `i/N` out of a status line fragment
fn parse_fraction(text: &str) -> Option<(u32, u32)> {
    let text = text.trim();
    let (sent, rest) = text.split_once('/')?;
    let sent = sent.trim().parse().ok()?;
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let total = rest[..digits].parse().ok()?;
    Some((sent, total))
}

/// Serial ports visible to the host
pub fn list_ports() -> Result<Vec<SerialPortInfo>, ConsoleError> {
    Ok(serialport::available_ports()?)
}

/// Line-buffered connection to the firmware console
pub struct Console {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl Console {
    /// Open at the CDC baud rate. The poll timeout doubles as the read
    /// timeout, so `read_line` returns `None` on a quiet interval instead
    /// of blocking forever.
    pub fn open(path: &str) -> Result<Self, ConsoleError> {
        let port = serialport::new(path, CONSOLE_BAUD)
            .timeout(Duration::from_millis(CONSOLE_POLL_MS))
            .open()?;
        info!("Opened {} at {} baud", path, CONSOLE_BAUD);
        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }

    /// Send one command line, CR-terminated the way a terminal would
    pub fn send(&mut self, command: &ConsoleCommand) -> Result<(), ConsoleError> {
        let line = command.to_line()?;
        debug!("console tx: {}", line);
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        Ok(())
    }

    /// Abort an in-progress send; the firmware treats ETX as Ctrl-C
    pub fn send_etx(&mut self) -> Result<(), ConsoleError> {
        debug!("console tx: ETX");
        self.port.write_all(&[ETX])?;
        self.port.flush()?;
        Ok(())
    }

    /// Next complete device line, or `None` after a quiet poll interval
    pub fn read_line(&mut self) -> Result<Option<String>, ConsoleError> {
        loop {
            if let Some(line) = self.take_line() {
                debug!("console rx: {}", line);
                return Ok(Some(line));
            }
            let mut chunk = [0u8; 256];
            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let newline = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=newline).collect();
        // the firmware terminates lines with both \n and \r, in either order
        let line = String::from_utf8_lossy(&raw)
            .trim_matches(['\r', '\n'])
            .to_string();
        Some(line)
    }
}

/// How a packet send session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The firmware reported `Done!`
    Completed,
    /// Aborted over ETX, with the firmware's last packet count
    Aborted { sent: u32 },
}

/// Issue an `ssp` and stream the firmware's replies until it reports the
/// session over. A message on `abort` maps to a single ETX; the loop then
/// waits for the early-exit acknowledgement, with a grace period in case the
/// device never answers.
pub fn drive_send(
    console: &mut Console,
    interval: Interval,
    count: u32,
    payload_len: Option<u32>,
    abort: &Receiver<()>,
    mut on_event: impl FnMut(&DeviceEvent),
) -> Result<SendOutcome, ConsoleError> {
    console.send(&ConsoleCommand::SendSequential {
        interval,
        count,
        payload_len,
    })?;

    let mut etx_sent = false;
    let mut quiet_polls = 0u32;
    let mut last_sent = 0u32;
    loop {
        if abort.try_recv().is_ok() {
            if etx_sent {
                warn!("Second abort, leaving the device to finish on its own");
                return Ok(SendOutcome::Aborted { sent: last_sent });
            }
            info!("Abort requested, sending ETX");
            console.send_etx()?;
            etx_sent = true;
            quiet_polls = 0;
        }

        let Some(raw) = console.read_line()? else {
            if etx_sent {
                quiet_polls += 1;
                if quiet_polls > ETX_GRACE_POLLS {
                    warn!("No early-exit acknowledgement from the device");
                    return Ok(SendOutcome::Aborted { sent: last_sent });
                }
            }
            continue;
        };
        quiet_polls = 0;

        let event = classify_line(&raw);
        on_event(&event);
        match event {
            DeviceEvent::Progress { sent, .. } => last_sent = sent,
            DeviceEvent::Done => return Ok(SendOutcome::Completed),
            DeviceEvent::ExitedEarly { sent } => return Ok(SendOutcome::Aborted { sent }),
            DeviceEvent::Line(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_grammar() {
        assert_eq!(Interval::from_str("1s").unwrap().as_millis(), 1000);
        assert_eq!(Interval::from_str("250ms").unwrap().as_millis(), 250);
        assert_eq!(Interval::from_str("1000").unwrap().as_millis(), 1000);
        assert_eq!(Interval::from_str("0").unwrap().as_millis(), 0);
        assert!(Interval::from_str("fast").is_err());
        assert!(Interval::from_str("1.5s").is_err());
        assert!(Interval::from_str("ms").is_err());
    }

    #[test]
    fn test_interval_renders_as_bare_millis() {
        assert_eq!(Interval::from_str("1s").unwrap().to_string(), "1000");
    }

    #[test]
    fn test_offset_spellings() {
        for s in ["2", "2mhz", "2MHz"] {
            assert_eq!(OffsetCommand::from_str(s).unwrap(), OffsetCommand::F2MHz);
        }
        assert_eq!(OffsetCommand::from_str("8").unwrap().mhz(), 8);
        assert!(OffsetCommand::from_str("6").is_err());
        assert!(OffsetCommand::from_str("2 MHz").is_err());
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(ConsoleCommand::Restart.to_line().unwrap(), "restart");
        assert_eq!(ConsoleCommand::Help.to_line().unwrap(), "help");
        assert_eq!(
            ConsoleCommand::SendSequential {
                interval: Interval::from_millis(1000),
                count: 10,
                payload_len: None,
            }
            .to_line()
            .unwrap(),
            "ssp 1000 10"
        );
        assert_eq!(
            ConsoleCommand::SendSequential {
                interval: Interval::from_millis(500),
                count: 3,
                payload_len: Some(16),
            }
            .to_line()
            .unwrap(),
            "ssp 500 3 16"
        );
        assert_eq!(
            ConsoleCommand::SetOffset(OffsetCommand::F2MHz).to_line().unwrap(),
            "freq 2"
        );
        assert_eq!(
            ConsoleCommand::Raw("help".to_string()).to_line().unwrap(),
            "help"
        );
    }

    #[test]
    fn test_payload_cap() {
        let over = ConsoleCommand::SendSequential {
            interval: Interval::from_millis(1000),
            count: 1,
            payload_len: Some(1001),
        };
        assert!(matches!(
            over.to_line(),
            Err(ConsoleError::PayloadTooLong { got: 1001, max: 1000 })
        ));

        let at_cap = ConsoleCommand::SendSequential {
            interval: Interval::from_millis(1000),
            count: 1,
            payload_len: Some(1000),
        };
        assert_eq!(at_cap.to_line().unwrap(), "ssp 1000 1 1000");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi("\x1b[33myellow\x1b[39m"), "yellow");
        assert_eq!(strip_ansi("\x1b[48;5;202mstyled\x1b[0m end"), "styled end");
    }

    #[test]
    fn test_classify_progress() {
        let raw = "\x1b[33msending packet... \x1b[39m3/10";
        assert_eq!(
            classify_line(raw),
            DeviceEvent::Progress { sent: 3, total: 10 }
        );
    }

    #[test]
    fn test_classify_done_and_early_exit() {
        assert_eq!(classify_line("\x1b[32mDone!\x1b[39m"), DeviceEvent::Done);
        assert_eq!(
            classify_line("\x1b[3mExited Early!\x1b[23m 4/10 packets sent"),
            DeviceEvent::ExitedEarly { sent: 4 }
        );
    }

    #[test]
    fn test_classify_passthrough_lines() {
        assert_eq!(
            classify_line("> Changed Frequency offset to 2MHz"),
            DeviceEvent::Line("Changed Frequency offset to 2MHz".to_string())
        );
        assert_eq!(classify_line(""), DeviceEvent::Line(String::new()));
    }
}
