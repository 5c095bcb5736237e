use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};

use picotag_rs::device::console::{
    self, Console, ConsoleCommand, DeviceEvent, Interval, OffsetCommand, SendOutcome,
};
use picotag_rs::experiment::{CaptureLog, CaptureRecord};
use picotag_rs::phy::{MacFrame, PhyFrame, payload};
use picotag_rs::radio::plan::{TransmitPlan, TransmitProfile};
use picotag_rs::radio::pll::plan_sys_pll;
use picotag_rs::ui::progress::{ProgressManager, templates};
use picotag_rs::ui::{print_banner, update_send_progress};
use picotag_rs::utils::consts::{
    DEFAULT_CARRIER_MHZ, DEFAULT_LOG_PATH, DEFAULT_PAYLOAD_LEN, DEFAULT_SEQUENCE, MAX_PIO_WORDS,
};
use picotag_rs::utils::{dump, logging::init_logging};

#[derive(Parser)]
#[command(author, version, about = "Host tools for the pico O-QPSK backscatter tag", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive transmit parameters for a carrier and offset
    Plan {
        /// Signal generator carrier (MHz)
        #[arg(long, default_value_t = DEFAULT_CARRIER_MHZ)]
        carrier: u32,
        /// Firmware build profile; overrides offset, chip-len, and sys-clk
        #[arg(long, value_enum)]
        profile: Option<TransmitProfile>,
        /// Antenna-switch offset (MHz)
        #[arg(long, default_value_t = 8)]
        offset: u32,
        /// PIO cycles per chip wave period
        #[arg(long, default_value_t = 16)]
        chip_len: u32,
        /// System clock the firmware boots with (MHz)
        #[arg(long, default_value_t = 128)]
        sys_clk: u32,
        /// Machine-readable output on stdout
        #[arg(long)]
        json: bool,
    },
    /// Compile a frame into the words the firmware feeds its PIO FIFO
    Encode {
        #[arg(long, default_value_t = DEFAULT_CARRIER_MHZ)]
        carrier: u32,
        #[arg(long, value_enum)]
        profile: Option<TransmitProfile>,
        #[arg(long, default_value_t = 8)]
        offset: u32,
        #[arg(long, default_value_t = 16)]
        chip_len: u32,
        #[arg(long, default_value_t = 128)]
        sys_clk: u32,
        /// Sequential payload of this many bytes
        #[arg(long, default_value_t = DEFAULT_PAYLOAD_LEN)]
        payload_len: u32,
        /// Seeded pseudo-random payload instead of the sequential one
        #[arg(long)]
        random_seed: Option<u64>,
        /// Payload bytes as hex, overriding the generators
        #[arg(long, conflicts_with_all = ["payload_len", "random_seed"])]
        payload_hex: Option<String>,
        /// Complete over-the-air frame as hex, bypassing frame building
        #[arg(long, conflicts_with_all = ["payload_len", "random_seed", "payload_hex"])]
        frame_hex: Option<String>,
        /// Write the artifact here; omit for a dry run
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ArtifactFormat::Words)]
        format: ArtifactFormat,
    },
    /// Drive the firmware console to send packets
    Send {
        /// Serial port; prompts with a picker when omitted
        #[arg(short, long)]
        port: Option<String>,
        /// Switch the firmware's offset first (2, 4, or 8 MHz)
        #[arg(long)]
        freq: Option<OffsetCommand>,
        /// Delay between packets (1s, 1000ms, or bare milliseconds)
        #[arg(long, default_value = "1s")]
        interval: Interval,
        /// Number of packets
        #[arg(long, default_value_t = 10)]
        count: u32,
        /// Payload length; the firmware defaults to 4 bytes
        #[arg(long)]
        payload_len: Option<u32>,
        /// Send this line verbatim instead of an ssp command
        #[arg(long, conflicts_with_all = ["interval", "count", "payload_len"])]
        raw: Option<String>,
    },
    /// List serial ports visible to the host
    Ports,
    /// Record and check measurement captures
    Log {
        #[command(subcommand)]
        action: LogAction,
    },
}

#[derive(Subcommand)]
enum LogAction {
    /// Append one capture row
    Add {
        #[arg(long, default_value = DEFAULT_LOG_PATH)]
        file: PathBuf,
        #[arg(long)]
        antenna: String,
        #[arg(long)]
        board: String,
        #[arg(long)]
        receiver: String,
        #[arg(long, default_value_t = DEFAULT_CARRIER_MHZ)]
        carrier: u32,
        #[arg(long, default_value_t = 8)]
        offset: u32,
        /// Receiver sample rate (Hz)
        #[arg(long, default_value_t = 4_000_000)]
        sample_rate: u64,
        #[arg(long, default_value_t = 20_000_000)]
        samples: u64,
        /// Receiver center frequency (MHz)
        #[arg(long, default_value_t = 2460)]
        center: u32,
        /// Ambient capture start, RFC 3339; defaults to now
        #[arg(long)]
        ambient: Option<DateTime<Utc>>,
        /// Measurement capture start, RFC 3339; defaults to now
        #[arg(long)]
        measured: Option<DateTime<Utc>>,
    },
    /// Print the log
    List {
        #[arg(long, default_value = DEFAULT_LOG_PATH)]
        file: PathBuf,
        /// Emit the notebook's markdown table
        #[arg(long)]
        markdown: bool,
    },
    /// Validate every row; nonzero exit when any row is inconsistent
    Check {
        #[arg(long, default_value = DEFAULT_LOG_PATH)]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ArtifactFormat {
    /// Little-endian u32 FIFO words
    Words,
    /// One 0x-prefixed word per line, for firmware source embedding
    Hex,
    /// The antenna-switch waveform as a WAV at the PIO clock rate
    Wav,
}

fn main() -> Result<()> {
    init_logging();
    print_banner();
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            carrier,
            profile,
            offset,
            chip_len,
            sys_clk,
            json,
        } => run_plan(carrier, profile, offset, chip_len, sys_clk, json),
        Commands::Encode {
            carrier,
            profile,
            offset,
            chip_len,
            sys_clk,
            payload_len,
            random_seed,
            payload_hex,
            frame_hex,
            output,
            format,
        } => run_encode(
            resolve_plan(carrier, profile, offset, chip_len, sys_clk)?,
            payload_len,
            random_seed,
            payload_hex,
            frame_hex,
            output,
            format,
        ),
        Commands::Send {
            port,
            freq,
            interval,
            count,
            payload_len,
            raw,
        } => run_send(port, freq, interval, count, payload_len, raw),
        Commands::Ports => run_ports(),
        Commands::Log { action } => match action {
            LogAction::Add {
                file,
                antenna,
                board,
                receiver,
                carrier,
                offset,
                sample_rate,
                samples,
                center,
                ambient,
                measured,
            } => {
                let now = Utc::now();
                let record = CaptureRecord::new(
                    antenna,
                    board,
                    receiver,
                    carrier,
                    offset,
                    sample_rate,
                    samples,
                    center,
                    ambient.unwrap_or(now),
                    measured.unwrap_or(now),
                );
                run_log_add(&file, record)
            }
            LogAction::List { file, markdown } => run_log_list(&file, markdown),
            LogAction::Check { file } => run_log_check(&file),
        },
    }
}

fn resolve_plan(
    carrier: u32,
    profile: Option<TransmitProfile>,
    offset: u32,
    chip_len: u32,
    sys_clk: u32,
) -> Result<TransmitPlan> {
    let plan = match profile {
        Some(profile) => profile.plan(carrier)?,
        None => TransmitPlan::new(carrier, offset, chip_len, sys_clk)?,
    };
    Ok(plan)
}

fn run_plan(
    carrier: u32,
    profile: Option<TransmitProfile>,
    offset: u32,
    chip_len: u32,
    sys_clk: u32,
    json: bool,
) -> Result<()> {
    let plan = resolve_plan(carrier, profile, offset, chip_len, sys_clk)?;
    let pll = plan_sys_pll(plan.sys_clk_mhz)
        .with_context(|| format!("no PLL settings for a {} MHz system clock", plan.sys_clk_mhz))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "plan": plan, "pll": pll }))?
        );
        return Ok(());
    }

    println!(
        "tx frequency:  {} MHz (carrier {} + offset {})",
        plan.tx_mhz, plan.carrier_mhz, plan.offset_mhz
    );
    println!(
        "repetitions:   {} wave periods per chip pair",
        plan.repetitions
    );
    println!(
        "pio clock:     {} MHz (divider {} from {} MHz sys)",
        plan.pio_mhz,
        plan.divider.as_f64(),
        plan.sys_clk_mhz
    );
    println!("chip period:   {} us", plan.chip_period_us);
    println!(
        "pll:           vco {} MHz (fbdiv {}), post dividers {} x {}",
        pll.vco_mhz, pll.fbdiv, pll.post_div1, pll.post_div2
    );
    if let Some(profile) = profile {
        if !profile.console_reachable() {
            info!("This profile needs a 144 MHz firmware build; the console cannot switch to it");
        }
    }
    Ok(())
}

fn run_encode(
    plan: TransmitPlan,
    payload_len: u32,
    random_seed: Option<u64>,
    payload_hex: Option<String>,
    frame_hex: Option<String>,
    output: Option<PathBuf>,
    format: ArtifactFormat,
) -> Result<()> {
    let frame_bytes = match frame_hex {
        Some(hex) => parse_hex(&hex).context("bad --frame-hex")?,
        None => {
            let payload = match (payload_hex, random_seed) {
                (Some(hex), _) => parse_hex(&hex).context("bad --payload-hex")?,
                (None, Some(seed)) => payload::random_payload(payload_len as usize, seed),
                (None, None) => payload::sequential_payload(payload_len as usize),
            };
            let mac = MacFrame::new_data(DEFAULT_SEQUENCE, payload);
            PhyFrame::new(&mac)?.to_bytes()
        }
    };

    let encoder = plan.wave_encoder()?;
    let encoded = encoder.encode_frame(&frame_bytes)?;

    info!(
        "{} frame bytes -> {} level runs, {} words, {} cycles, {:.1} us on air at {} MHz",
        frame_bytes.len(),
        encoded.run_count(),
        encoded.words.len(),
        encoded.total_cycles,
        encoded.air_time_us(plan.pio_mhz),
        plan.pio_mhz
    );
    if encoded.overflows_device_buffer() {
        warn!(
            "{} words exceed the firmware's {}-word buffer; the device would truncate this packet",
            encoded.words.len(),
            MAX_PIO_WORDS
        );
    }

    let Some(path) = output else {
        info!("No --output given, dry run only");
        return Ok(());
    };
    match format {
        ArtifactFormat::Words => dump::write_words(&path, &encoded.words)?,
        ArtifactFormat::Hex => dump::write_hex(&path, &encoded.words)?,
        ArtifactFormat::Wav => {
            let sample_rate = plan.pio_mhz * 1_000_000;
            dump::write_wav(&path, &encoded.levels, sample_rate)?;
        }
    }
    info!("Wrote {}", path.display());
    Ok(())
}

fn run_send(
    port: Option<String>,
    freq: Option<OffsetCommand>,
    interval: Interval,
    count: u32,
    payload_len: Option<u32>,
    raw: Option<String>,
) -> Result<()> {
    let path = match port {
        Some(path) => path,
        None => pick_port()?,
    };
    let mut console = Console::open(&path)?;

    if let Some(offset) = freq {
        console.send(&ConsoleCommand::SetOffset(offset))?;
        drain_console(&mut console)?;
    }

    if let Some(line) = raw {
        console.send(&ConsoleCommand::Raw(line))?;
        drain_console(&mut console)?;
        return Ok(());
    }

    let (abort_tx, abort_rx) = crossbeam_channel::bounded(2);
    ctrlc::set_handler(move || {
        let _ = abort_tx.try_send(());
    })
    .context("failed to install the Ctrl-C handler")?;

    let progress_manager = ProgressManager::new();
    progress_manager
        .create_bar(
            "send",
            u64::from(count),
            templates::SEND,
            "waiting for device",
        )
        .map_err(|e| anyhow::anyhow!(e))?;

    let outcome = console::drive_send(
        &mut console,
        interval,
        count,
        payload_len,
        &abort_rx,
        |event| update_send_progress(&progress_manager, event),
    )?;

    match outcome {
        SendOutcome::Completed => {
            let _ = progress_manager.finish("send", "done");
            info!("All {} packets sent", count);
        }
        SendOutcome::Aborted { sent } => {
            let _ = progress_manager.finish("send", "aborted");
            warn!("Exited early after {} of {} packets", sent, count);
        }
    }
    progress_manager.finish_all();
    Ok(())
}

fn run_ports() -> Result<()> {
    let ports = console::list_ports()?;
    if ports.is_empty() {
        info!("No serial ports found");
        return Ok(());
    }
    for port in &ports {
        println!("{}", describe_port(port));
    }
    Ok(())
}

fn run_log_add(file: &Path, record: CaptureRecord) -> Result<()> {
    for issue in record.check() {
        warn!("New row: {}", issue);
    }
    let mut log = CaptureLog::load(file)?;
    log.append(record);
    log.save(file)?;
    info!("{} now holds {} records", file.display(), log.len());
    Ok(())
}

fn run_log_list(file: &Path, markdown: bool) -> Result<()> {
    let log = CaptureLog::load(file)?;
    if markdown {
        print!("{}", log.to_markdown());
        return Ok(());
    }
    if log.is_empty() {
        info!("{} is empty", file.display());
        return Ok(());
    }
    for (index, record) in log.records().iter().enumerate() {
        println!(
            "[{}] {} / {} / {}: tx {} MHz, {:.1} s at {} MHz center, measured {}",
            index,
            record.antenna,
            record.board,
            record.receiver,
            record.expected_tx_mhz(),
            record.capture_duration_secs(),
            record.center_mhz,
            record.measurement_started_at.to_rfc3339(),
        );
    }
    Ok(())
}

fn run_log_check(file: &Path) -> Result<()> {
    let log = CaptureLog::load(file)?;
    let dirty = log.check();
    if dirty.is_empty() {
        info!("All {} rows are consistent", log.len());
        return Ok(());
    }
    for (index, issues) in &dirty {
        for issue in issues {
            warn!("Row {}: {}", index, issue);
        }
    }
    bail!("{} of {} rows have issues", dirty.len(), log.len());
}

fn pick_port() -> Result<String> {
    let ports = console::list_ports()?;
    if ports.is_empty() {
        bail!("no serial ports found; is the tag plugged in?");
    }
    if ports.len() == 1 {
        info!("Using the only serial port, {}", ports[0].port_name);
        return Ok(ports[0].port_name.clone());
    }
    let items: Vec<String> = ports.iter().map(describe_port).collect();
    let choice = dialoguer::Select::new()
        .with_prompt("Select the tag's serial port")
        .items(&items)
        .default(0)
        .interact()
        .context("port selection cancelled")?;
    Ok(ports[choice].port_name.clone())
}

fn describe_port(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            format!(
                "{} ({:04x}:{:04x} {})",
                port.port_name, usb.vid, usb.pid, product
            )
        }
        _ => port.port_name.clone(),
    }
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    if cleaned.len() % 2 != 0 {
        bail!("hex string has an odd number of digits");
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .with_context(|| format!("bad hex byte at offset {}", i))
        })
        .collect()
}

/// Print device lines until a quiet poll interval
fn drain_console(console: &mut Console) -> Result<()> {
    while let Some(raw) = console.read_line()? {
        if let DeviceEvent::Line(text) = console::classify_line(&raw) {
            if !text.is_empty() {
                info!("device: {}", text);
            }
        }
    }
    Ok(())
}
