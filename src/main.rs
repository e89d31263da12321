//! Application entry point: a one-line live spectrum of the THR5's input.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from `--config PATH` or the platform settings file
//!    (defaults on first run).
//!    `--write-config` saves the effective settings and exits.
//! 3. Log every input device; `--list-devices` prints them and exits.
//! 4. Spawn the capture thread.  Resolution or negotiation failure prints a
//!    diagnostic and exits with status 1.
//! 5. Redraw the spectrum line every `refresh_ms` until `run_secs` elapses,
//!    then raise the stop flag and wait for teardown.  A stream that dies
//!    mid-run ends the loop early and exits with status 1.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use thr_spectrum::{
    audio::{AudioHost, InputDeviceInfo, SystemHost},
    capture::{CaptureConfig, CaptureHandle, CaptureStats, SpectrumFrame, SpectrumHandoff},
    config::AppConfig,
    device::ProcAsoundRegistry,
    dsp::{display, spectrum, DisplayColumns},
};

/// Characters reserved after the glyphs for the level and peak readout.
const READOUT_WIDTH: usize = 44;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

const USAGE: &str = "usage: thr-spectrum [--config PATH] [--list-devices] [--write-config]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    list_devices: bool,
    write_config: bool,
    help: bool,
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut iter = argv.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list-devices" => args.list_devices = true,
            "--write-config" => args.write_config = true,
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => args.help = true,
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn format_device(device: &InputDeviceInfo) -> String {
    let latency = device
        .low_latency
        .map(|l| format!("{:.1} ms", l.as_secs_f64() * 1_000.0))
        .unwrap_or_else(|| "-".into());
    format!(
        "{:>3}  {:<40}  in {:>2}  out {:>2}  {:>6} Hz  latency {}",
        device.index,
        device.name,
        device.max_input_channels,
        device.max_output_channels,
        device.default_sample_rate,
        latency
    )
}

/// Text after the glyphs: RMS level, then the peak bin with its nearest
/// high-E note.
fn readout(frame: &SpectrumFrame) -> String {
    let level = spectrum::rms_dbfs(&frame.time_domain);
    let magnitudes = spectrum::bin_magnitudes(&frame.spectrum);
    let Some((bin, magnitude)) = spectrum::peak_bin(&magnitudes) else {
        return format!(" {level:6.1} dBFS");
    };
    let n = frame.spectrum.len();
    let freq = spectrum::bin_frequency(bin, n, frame.sample_rate);
    let peak_db = spectrum::magnitude_db(magnitude, n);
    match spectrum::nearest_fret(freq) {
        Some((fret, name, _)) => format!(
            " {level:6.1} dBFS {freq:6.0} Hz {peak_db:5.0} dB ~{name:<3} fret {fret:>2}"
        ),
        None => format!(" {level:6.1} dBFS {freq:6.0} Hz {peak_db:5.0} dB"),
    }
}

fn display_columns(config: &AppConfig) -> usize {
    match config.display.columns {
        Some(columns) => columns.max(display::MIN_COLUMNS),
        None => display::columns_for_width(display::terminal_width())
            .saturating_sub(READOUT_WIDTH)
            .max(display::MIN_COLUMNS),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn run() -> Result<ExitCode> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    if args.write_config {
        match &args.config {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        log::info!("settings written");
        return Ok(ExitCode::SUCCESS);
    }

    let retries = config.capture.busy_retries;
    let devices = SystemHost::new(retries).input_devices().unwrap_or_else(|e| {
        log::warn!("{e}");
        Vec::new()
    });
    if args.list_devices {
        for device in &devices {
            println!("{}", format_device(device));
        }
        return Ok(ExitCode::SUCCESS);
    }
    for device in &devices {
        log::info!("input device {}", format_device(device));
    }

    let capture = CaptureConfig::from_app(&config, display_columns(&config))?;
    let handoff = Arc::new(SpectrumHandoff::new(capture.frame_size, capture.columns)?);
    let stats = Arc::new(CaptureStats::new());

    let handle = match CaptureHandle::spawn(
        capture,
        move || SystemHost::new(retries),
        Box::new(ProcAsoundRegistry::default()),
        Arc::clone(&handoff),
        Arc::clone(&stats),
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", e.diagnostic());
            return Ok(ExitCode::FAILURE);
        }
    };
    log::info!(
        "capture running on {} ({} ch)",
        handle.info().target,
        handle.info().channels
    );

    let refresh = Duration::from_millis(config.display.refresh_ms.max(1));
    let deadline = (config.capture.run_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(config.capture.run_secs));

    let mut frame = SpectrumFrame::default();
    let mut stdout = io::stdout().lock();
    while handle.is_running() && deadline.map_or(true, |d| Instant::now() < d) {
        if handoff.read_into(&mut frame) {
            write!(
                stdout,
                "\r\x1b[2K{}{}",
                DisplayColumns::render(&frame.tiers),
                readout(&frame)
            )?;
            stdout.flush()?;
        }
        thread::sleep(refresh);
    }
    writeln!(stdout)?;

    let outcome = handle.join();
    let totals = stats.snapshot();
    log::info!(
        "captured {} frames ({} overruns, {} skipped publishes, {} stream failures)",
        totals.frames,
        totals.overruns,
        totals.skipped_publishes,
        totals.stream_failures
    );
    if let Err(e) = outcome {
        eprintln!("{}", e.diagnostic());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("thr-spectrum starting up");

    run().unwrap_or_else(|e| {
        log::error!("{e:#}");
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readout_names_the_nearest_fret() {
        let n = 512;
        let rate = 44_100;
        // energy in bin 5 (~430.7 Hz)
        let mut spectrum = vec![0.0; n];
        spectrum[5] = 100.0;
        let frame = SpectrumFrame {
            time_domain: vec![0.5; n],
            spectrum,
            tiers: Vec::new(),
            sample_rate: rate,
        };
        let text = readout(&frame);
        assert!(text.contains("A4"), "{text}");
        assert!(text.contains("dBFS"), "{text}");
        // 100 / (512 / 2) is about -8 dB below a full-scale sine
        assert!(text.contains("   -8 dB"), "{text}");
    }

    #[test]
    fn silent_frame_reads_level_only() {
        let frame = SpectrumFrame {
            time_domain: vec![0.0; 8],
            spectrum: vec![0.0; 8],
            tiers: Vec::new(),
            sample_rate: 44_100,
        };
        assert_eq!(readout(&frame), " -120.0 dBFS");
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn help_is_a_flag_not_an_exit() {
        let args = parse_args(argv(&["--list-devices", "-h"])).unwrap();
        assert!(args.help);
        assert!(args.list_devices);
    }

    #[test]
    fn config_path_and_write_flag() {
        let args = parse_args(argv(&["--config", "/tmp/thr.toml", "--write-config"])).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/thr.toml")));
        assert!(args.write_config);

        assert!(parse_args(argv(&["--config"])).is_err());
        assert!(parse_args(argv(&["--loud"])).is_err());
    }

    #[test]
    fn configured_columns_are_respected() {
        let mut config = AppConfig::default();
        config.display.columns = Some(64);
        assert_eq!(display_columns(&config), 64);
        config.display.columns = Some(2);
        assert_eq!(display_columns(&config), display::MIN_COLUMNS);
    }
}
