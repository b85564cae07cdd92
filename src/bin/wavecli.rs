//! Interactive pass-through monitor
//!
//! Opens the duplex stream, then drives [`AudioMonitor`] from a line-based
//! command loop. While a recording is active the loop switches to a live
//! peak-meter display until Ctrl+C or a capture fault stops it.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wavecli::constants::{DEFAULT_CHANNELS, DEFAULT_GAIN};
use wavecli::AudioMonitor;

const METER_WIDTH: usize = 30;
const METER_POLL: Duration = Duration::from_millis(50);

struct CliArgs {
    gain: f32,
    channels: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args();

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })?;
    }

    let mut monitor = AudioMonitor::new();
    monitor.set_gain(args.gain)?;

    println!("\n=== Available Audio Devices ===");
    match monitor.list_devices() {
        Ok(devices) => {
            for device in &devices {
                let kind = match (device.is_input, device.is_output) {
                    (true, true) => "Input/Output",
                    (true, false) => "Input",
                    (false, true) => "Output",
                    _ => "Unknown",
                };
                let mut markers = String::new();
                if device.is_default_input {
                    markers.push_str(" [DEFAULT IN]");
                }
                if device.is_default_output {
                    markers.push_str(" [DEFAULT OUT]");
                }
                println!("  {}: {} ({}){}", device.index, device.name, kind, markers);
            }
        }
        Err(e) => tracing::warn!("device enumeration failed: {}", e),
    }
    println!();

    print!("select input device index (enter for default): ");
    io::stdout().flush()?;
    let mut selection = String::new();
    io::stdin().read_line(&mut selection)?;

    monitor.open(args.channels)?;
    if let Ok(index) = selection.trim().parse::<usize>() {
        if let Err(e) = monitor.set_input_device(index, args.channels) {
            tracing::warn!("input device selection failed, using default: {}", e);
        }
    }
    tracing::info!(
        channels = args.channels,
        gain = args.gain,
        "pass-through monitor running"
    );

    print_help();
    command_loop(&mut monitor, &interrupted)?;

    monitor.shutdown();
    Ok(())
}

fn command_loop(monitor: &mut AudioMonitor, interrupted: &AtomicBool) -> Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        if interrupted.swap(false, Ordering::SeqCst) {
            break;
        }
        if let Some(err) = monitor.take_stream_error() {
            tracing::error!("stream error: {}", err);
        }

        print!("> ");
        io::stdout().flush()?;

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }

        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let arg = parts.next();

        let result = match command {
            "gain" | "g" => set_param(arg, "gain", |v| monitor.set_gain(v)),
            "volume" | "v" => set_param(arg, "volume", |v| monitor.set_volume(v)),
            "effect" | "e" => select_effect(monitor, arg),
            "record" | "r" => record(monitor, arg.map(PathBuf::from), interrupted),
            "stop" | "s" => stop(monitor),
            "input" | "di" => switch_device(monitor, arg, true),
            "output" | "do" => switch_device(monitor, arg, false),
            "devices" | "d" => list(monitor),
            "help" | "h" => {
                print_help();
                Ok(())
            }
            "quit" | "q" => break,
            other => {
                println!("unknown command: {other} (try 'help')");
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("error: {e}");
        }
    }
    Ok(())
}

fn set_param(
    arg: Option<&str>,
    name: &str,
    apply: impl FnOnce(f32) -> wavecli::Result<()>,
) -> wavecli::Result<()> {
    match arg.and_then(|v| v.parse::<f32>().ok()) {
        Some(value) => {
            apply(value)?;
            println!("{name} = {value}");
            Ok(())
        }
        None => {
            println!("usage: {name} <value>");
            Ok(())
        }
    }
}

fn select_effect(monitor: &AudioMonitor, arg: Option<&str>) -> wavecli::Result<()> {
    match arg.and_then(|v| v.parse::<usize>().ok()) {
        Some(index) => {
            monitor.set_effect(index)?;
            println!("effect: {}", monitor.effects()[index].name);
            Ok(())
        }
        None => {
            println!("effects:");
            for (i, effect) in monitor.effects().iter().enumerate() {
                let marker = if i == monitor.effect_index() { "*" } else { " " };
                println!(" {marker} {i}: {} - {}", effect.name, effect.description);
            }
            Ok(())
        }
    }
}

/// Starts a recording and shows the live meter until Ctrl+C or a fault
fn record(
    monitor: &mut AudioMonitor,
    path: Option<PathBuf>,
    interrupted: &AtomicBool,
) -> wavecli::Result<()> {
    let path = monitor.start_recording(path.as_deref())?;
    println!("recording to {} (ctrl + c to stop)", path.display());

    loop {
        if interrupted.swap(false, Ordering::SeqCst) {
            break;
        }
        if monitor.take_capture_fault() {
            println!();
            tracing::error!("capture write failed, stopping recording");
            break;
        }
        if let Some(err) = monitor.take_stream_error() {
            println!();
            tracing::error!("stream error during recording: {}", err);
            break;
        }

        let peak = monitor.peak();
        print!(
            "\rREC peak={peak:.2} |{}| ctrl + c to stop",
            meter_bar(peak)
        );
        let _ = io::stdout().flush();
        thread::sleep(METER_POLL);
    }
    println!();
    stop(monitor)
}

fn stop(monitor: &mut AudioMonitor) -> wavecli::Result<()> {
    match monitor.stop_recording()? {
        Some(path) => println!("saved {}", path.display()),
        None => println!("not recording"),
    }
    Ok(())
}

fn switch_device(monitor: &mut AudioMonitor, arg: Option<&str>, input: bool) -> wavecli::Result<()> {
    let side = if input { "input" } else { "output" };
    match arg.and_then(|v| v.parse::<usize>().ok()) {
        Some(index) => {
            let channels = monitor.channels();
            if input {
                monitor.set_input_device(index, channels)?;
            } else {
                monitor.set_output_device(index, channels)?;
            }
            println!("{side} device set to {index}");
            Ok(())
        }
        None => {
            println!("usage: {side} <device index>");
            Ok(())
        }
    }
}

fn list(monitor: &AudioMonitor) -> wavecli::Result<()> {
    for device in monitor.list_devices()? {
        let kind = match (device.is_input, device.is_output) {
            (true, true) => "in/out",
            (true, false) => "in",
            (false, true) => "out",
            _ => "?",
        };
        println!("  {}: {} ({})", device.index, device.name, kind);
    }
    Ok(())
}

fn meter_bar(peak: f32) -> String {
    let filled = (peak.clamp(0.0, 1.0) * METER_WIDTH as f32) as usize;
    let mut bar = String::with_capacity(METER_WIDTH);
    for i in 0..METER_WIDTH {
        bar.push(if i < filled { '#' } else { ' ' });
    }
    bar
}

fn parse_args() -> CliArgs {
    let mut gain = DEFAULT_GAIN;
    let mut channels = DEFAULT_CHANNELS;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gain" => match args.next().and_then(|v| v.parse::<f32>().ok()) {
                Some(v) if v.is_finite() => gain = v,
                _ => tracing::warn!("invalid --gain value, using default {}", DEFAULT_GAIN),
            },
            "--channels" => match args.next().and_then(|v| v.parse::<u16>().ok()) {
                Some(v @ 1..=2) => channels = v,
                _ => tracing::warn!(
                    "invalid --channels value (want 1 or 2), using default {}",
                    DEFAULT_CHANNELS
                ),
            },
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => tracing::warn!("ignoring unknown argument {:?}", other),
        }
    }
    CliArgs { gain, channels }
}

fn print_usage() {
    println!("usage: wavecli [--gain <value>] [--channels <1|2>]");
    println!();
    println!("Real-time audio pass-through monitor with effects and WAV capture.");
}

fn print_help() {
    println!("commands:");
    println!("  gain|g <value>     set pre-effect gain");
    println!("  volume|v <value>   set output volume");
    println!("  effect|e [index]   select effect (no index lists them)");
    println!("  record|r [path]    record to path or next free out_<n>.wav");
    println!("  stop|s             stop an active recording");
    println!("  input|di <index>   switch input device");
    println!("  output|do <index>  switch output device");
    println!("  devices|d          list audio devices");
    println!("  help|h             show this help");
    println!("  quit|q             exit");
}
