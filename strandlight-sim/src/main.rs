//! Host simulator for the strandlight pattern engine
//!
//! Usage: cargo run -p strandlight-sim -- --strings 2 --leds 40
//! Type commands (n, p, a, s, l, h, digits) followed by Enter; Ctrl-D quits.

use std::fmt::Write as _;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use strandlight_patterns_lib::{
    ChannelError, Clock, CommandChannel, ControlState, EngineConfig, FrameDriver, LedString,
    Listener, MemoryOutput, Millis, PatternKind, SharedControl, SystemState, TickReport,
};

/// Strandlight pattern simulator
///
/// Runs the same engine as the firmware against strings drawn in the terminal,
/// with operator commands read from stdin.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of strings
    #[arg(short, long, default_value_t = 2)]
    strings: usize,
    /// LEDs per string
    #[arg(short, long, default_value_t = 40)]
    leds: usize,
    /// Enabled patterns in order, comma separated (wave, sparkle, bulbs, test)
    #[arg(short, long, value_delimiter = ',', value_parser = parse_json_name::<PatternKind>)]
    patterns: Vec<PatternKind>,
    /// Frame Driver tick period
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u32>,
    /// Auto rotation period
    #[arg(long, value_name = "SECS")]
    pattern_secs: Option<u32>,
    /// Manual hold timeout
    #[arg(long, value_name = "SECS")]
    manual_secs: Option<u32>,
    /// System state (startup, day, night_on, night_off, test)
    #[arg(long, value_parser = parse_json_name::<SystemState>)]
    state: Option<SystemState>,
    /// Sparkle RNG seed
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Engine configuration JSON file; flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration_secs: Option<u64>,
}

/// Parse a bare name with the same serde names the config files use.
fn parse_json_name<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_owned())).map_err(|e| e.to_string())
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => EngineConfig::default(),
        };

        if !self.patterns.is_empty() {
            config.enabled_patterns.clone_from(&self.patterns);
        }
        if let Some(ms) = self.tick_ms {
            config.tick_period_ms = ms;
        }
        if let Some(secs) = self.pattern_secs {
            config.pattern_duration_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = self.manual_secs {
            config.manual_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(state) = self.state {
            config.system_state = state;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Milliseconds since the simulator started, wrapping like the device timer.
#[derive(Debug, Clone, Copy)]
struct InstantClock {
    start: Instant,
}

impl Clock for InstantClock {
    fn now(&self) -> Millis {
        // Truncation is the intended wrap
        #[allow(clippy::cast_possible_truncation)]
        let ms = self.start.elapsed().as_millis() as u32;
        Millis(ms)
    }
}

/// Terminal input, fed byte by byte from a reader thread.
struct StdinChannel {
    rx: Receiver<u8>,
}

impl StdinChannel {
    fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut byte = [0u8; 1];
            let mut stdin = std::io::stdin().lock();
            loop {
                match stdin.read(&mut byte) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(byte[0]).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read error: {e}");
                        break;
                    }
                }
            }
            debug!("stdin closed");
        });
        Self { rx }
    }
}

impl CommandChannel for StdinChannel {
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, ChannelError> {
        match self.rx.recv_timeout(timeout) {
            Ok(byte) => Ok(Some(byte)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), ChannelError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "\r\x1b[2K{line}").map_err(|e| ChannelError::Io(e.to_string()))
    }
}

/// One terminal line: every string as truecolor dots, strings separated by bars.
fn draw(strings: &[LedString<MemoryOutput>]) -> String {
    let mut line = String::from("\r");
    for (i, string) in strings.iter().enumerate() {
        if i > 0 {
            line.push_str("\x1b[0m | ");
        }
        for p in string.output().shown() {
            let _ = write!(line, "\x1b[38;2;{};{};{}m\u{25cf}", p.r, p.g, p.b);
        }
    }
    line.push_str("\x1b[0m");
    line
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.engine_config()?;
    let clock = InstantClock {
        start: Instant::now(),
    };

    let mut strings: Vec<LedString<MemoryOutput>> = (0..cli.strings)
        .map(|i| LedString::new(i, MemoryOutput::new(cli.leds)))
        .collect();
    let pixel_counts = vec![cli.leds; cli.strings];

    let control = Arc::new(SharedControl::new(ControlState::new(
        config.enabled_patterns.clone(),
        clock.now(),
    )?));
    let mut driver = FrameDriver::new(&config, Arc::clone(&control), &pixel_counts, cli.seed)?;
    info!(
        "Simulating {} string(s) of {} LEDs: {:?}, state {}",
        cli.strings, cli.leds, config.enabled_patterns, config.system_state
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let control = Arc::clone(&control);
        std::thread::Builder::new()
            .name("console".into())
            .spawn(move || {
                let mut listener = Listener::new(StdinChannel::spawn(), clock, control);
                loop {
                    match listener.service() {
                        Ok(_) => {}
                        Err(ChannelError::Closed) => break,
                        Err(e) => warn!("Console error: {e}"),
                    }
                }
                running.store(false, Ordering::Relaxed);
            })?;
    }

    let tick = Duration::from_millis(u64::from(config.tick_period_ms));
    let stop_at = cli
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut deadline = Instant::now();
    let mut last_line = String::new();
    let mut last_report: Option<TickReport> = None;

    while running.load(Ordering::Relaxed) && stop_at.map_or(true, |t| Instant::now() < t) {
        let now = clock.now();
        let report = driver.tick(now, &mut strings)?;
        if last_report != Some(report) {
            debug!("Tick {now}: {report:?}");
            last_report = Some(report);
        }

        let line = draw(&strings);
        if line != last_line {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{line}")?;
            stdout.flush()?;
            last_line = line;
        }

        deadline += tick;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        } else {
            debug!("Frame overran by {:?}", now - deadline);
            deadline = now;
        }
    }

    println!("\x1b[0m");
    info!("Simulator stopped");
    Ok(())
}
