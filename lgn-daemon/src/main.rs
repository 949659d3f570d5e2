//! Legion control daemon (legiond)
//!
//! Privileged service exposing Legion laptop hardware control. Attaches the
//! device once, runs the background thermal monitor, and offers one-shot
//! attribute access for scripting:
//!
//!   legiond                      run the monitor service
//!   legiond status               print a JSON status snapshot
//!   legiond get ATTR             read one attribute
//!   legiond set ATTR VALUE       write one attribute
//!
//! # Privilege model
//! - Runs as root for /dev/port and /proc/acpi/call access only
//! - --simulate runs against the in-memory EC, no privileges needed
//! - Graceful shutdown joins the monitor thread before the device is dropped

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use lgn_core::{attrs, config, DaemonConfig, Generation, LegionDevice, MonitorHandle};
use lgn_error::LegionError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes for one-shot commands, so scripts can tell a bad request
/// apart from a hardware failure.
const EXIT_INVALID_INPUT: i32 = 2;
const EXIT_UNSUPPORTED: i32 = 3;

/// Global shutdown flag, set from the signal handler.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

// ============================================================================
// CLI
// ============================================================================

#[derive(Debug, Default)]
struct Options {
    config_path: Option<String>,
    interval_secs: Option<u64>,
    simulate: bool,
    command: Vec<String>,
}

fn print_help() {
    eprintln!("legiond {} - Lenovo Legion EC control daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    legiond [OPTIONS] [COMMAND]");
    eprintln!();
    eprintln!("COMMANDS:");
    eprintln!("    (none)              Run the monitor service");
    eprintln!("    status              Print a JSON status snapshot and exit");
    eprintln!("    get ATTR            Read one attribute and exit");
    eprintln!("    set ATTR VALUE      Write one attribute and exit");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Configuration file (default /etc/legiond/config.json)");
    eprintln!("    -i, --interval SECS Monitor poll interval override");
    eprintln!("        --simulate      Drive the in-memory EC instead of hardware");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    LEGIOND_LOG         Log level (trace, debug, info, warn, error)");
}

fn parse_args() -> Result<Options> {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                println!("legiond {}", VERSION);
                std::process::exit(0);
            }
            "--simulate" => opts.simulate = true,
            "-c" | "--config" => {
                i += 1;
                let path = args.get(i).context("--config requires a path argument")?;
                opts.config_path = Some(path.clone());
            }
            "-i" | "--interval" => {
                i += 1;
                let secs = args.get(i).context("--interval requires a value")?;
                opts.interval_secs = Some(
                    secs.parse::<u64>()
                        .with_context(|| format!("bad interval {:?}", secs))?,
                );
            }
            arg if arg.starts_with('-') => bail!("unknown argument: {}", arg),
            _ => {
                opts.command = args[i..].to_vec();
                break;
            }
        }
        i += 1;
    }
    Ok(opts)
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging() {
    let log_level = std::env::var("LEGIOND_LOG").unwrap_or_else(|_| "info".to_string());

    // Prefer the systemd journal when it is there, fall back to stdout.
    if Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("failed to create journald layer: {}, using stdout", e);
            }
        }
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&log_level)
        .init();
}

// ============================================================================
// Device setup
// ============================================================================

fn verify_privileges() -> Result<()> {
    // SAFETY: geteuid is always safe - it just returns the effective user ID.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        bail!("legiond requires root for /dev/port and /proc/acpi/call access");
    }
    Ok(())
}

/// Wire up an in-memory Gen 9 board for development without hardware.
fn attach_simulated() -> LegionDevice {
    let sim = lgn_core::SimulatedPort::new();
    sim.preload(0xE0, 55); // cpu temp
    sim.preload(0xE2, 48); // gpu temp
    sim.preload(0xB0, 18); // fan1 1800 rpm
    sim.preload(0xB1, 17); // fan2 1700 rpm
    sim.preload(0xC0, 45);
    sim.preload(0xC1, 115);
    sim.preload(0xC4, 115);

    let fw = lgn_core::SimulatedFirmware::new();
    for method in ["SBCM", "QCHO", "SFLM", "OCGS"] {
        fw.provide(method, 0);
    }

    LegionDevice::attach(Box::new(sim), Box::new(fw), Generation::Gen9)
}

fn attach_device(opts: &Options) -> Result<LegionDevice> {
    if opts.simulate {
        warn!("running against the simulated EC, no hardware will be touched");
        return Ok(attach_simulated());
    }
    verify_privileges()?;
    LegionDevice::attach_host().context("failed to attach Legion device")
}

// ============================================================================
// One-shot commands
// ============================================================================

fn run_command(device: &LegionDevice, command: &[String]) -> Result<()> {
    let outcome = match command {
        [cmd] if cmd == "status" => {
            let status = device.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        [cmd, attr] if cmd == "get" => attrs::read(device, attr).map(|value| println!("{}", value)),
        [cmd, attr, value] if cmd == "set" => attrs::write(device, attr, value),
        other => bail!("unrecognized command: {:?} (see --help)", other.join(" ")),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(e @ (LegionError::InvalidInput { .. } | LegionError::UnsupportedValue { .. })) => {
            eprintln!("error: {}", e);
            std::process::exit(EXIT_INVALID_INPUT);
        }
        Err(e @ LegionError::CapabilityUnavailable(_)) => {
            eprintln!("error: {}", e);
            std::process::exit(EXIT_UNSUPPORTED);
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Service mode
// ============================================================================

fn run_service(device: LegionDevice, cfg: &DaemonConfig) -> Result<()> {
    let device = Arc::new(device);

    let monitor = if cfg.monitor_enabled {
        Some(MonitorHandle::spawn(
            Arc::clone(&device),
            cfg.monitor_config(),
        ))
    } else {
        info!("monitor disabled by configuration");
        None
    };

    ctrlc::set_handler(|| {
        info!("received SIGINT/SIGTERM, shutting down");
        SHUTDOWN.store(true, Ordering::SeqCst);
    })
    .context("failed to install signal handler")?;

    info!("legiond {} running (pid {})", VERSION, std::process::id());
    while !SHUTDOWN.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    // Teardown order matters: the monitor must be fully stopped (joined)
    // before the device handle goes away.
    if let Some(mut monitor) = monitor {
        monitor.stop();
    }
    info!("shutdown complete");
    Ok(())
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() -> Result<()> {
    init_logging();
    let opts = parse_args()?;

    let mut cfg = match &opts.config_path {
        Some(path) => config::load_from(Path::new(path))
            .with_context(|| format!("loading config from {}", path))?,
        None => config::load().unwrap_or_else(|e| {
            error!("ignoring bad config file: {}", e);
            DaemonConfig::default()
        }),
    };
    if let Some(secs) = opts.interval_secs {
        cfg.poll_interval_ms = secs.saturating_mul(1000).max(250);
    }

    let device = attach_device(&opts)?;

    if !opts.command.is_empty() {
        return run_command(&device, &opts.command);
    }
    run_service(device, &cfg)
}
