//! ar - actionrec CLI
//!
//! Record when you press Enter, then replay those timings on a loop.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use actionrec::prelude::*;
use actionrec::recorder::storage;

const CONFIG_FILE: &str = "config.json";
const SQLITE_FILE: &str = "actions.sqlite";

#[derive(Parser)]
#[command(name = "ar")]
#[command(about = "actionrec - record action timings and replay them on a loop")]
#[command(version)]
struct Cli {
    /// Storage backend
    #[arg(long, value_enum, default_value = "jsonl", global = true)]
    store: Store,
    /// Storage directory (default: ~/.actionrec)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Recorder slot, selects sequence action_record_data_<slot>
    #[arg(long, default_value = "0", global = true)]
    slot: u64,
    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Store {
    Jsonl,
    Sqlite,
}

#[derive(Subcommand)]
enum Commands {
    /// Record actions: Enter marks one, q or EOF stops
    Record {
        #[arg(short, long)]
        quiet: bool,
    },
    /// Replay the recorded sequence until Ctrl+C
    Play {
        #[arg(short, long)]
        speed: Option<f64>,
        /// Stop after this many full passes
        #[arg(short, long)]
        cycles: Option<u64>,
    },
    /// List stored sequences
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show a stored sequence
    Show {
        name: String,
        #[arg(long)]
        all: bool,
    },
    /// Delete a stored sequence
    Delete { name: String },
}

#[derive(Serialize)]
struct SequenceSummary {
    name: String,
    events: usize,
    total_ms: i64,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        if let Some(err) = e.downcast_ref::<Error>() {
            for s in &err.suggestions {
                eprintln!("  hint: {}", s);
            }
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let dir = match &cli.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => storage::default_dir()?,
    };
    let gateway = open_store(cli.store, &dir)?;

    match cli.command {
        Commands::Record { quiet } => record(cli.slot, &dir, gateway, quiet),
        Commands::Play { speed, cycles } => play(cli.slot, &dir, gateway, speed, cycles),
        Commands::List { json } => list(gateway.as_ref(), json),
        Commands::Show { name, all } => show(gateway.as_ref(), &name, all),
        Commands::Delete { name } => delete(gateway.as_ref(), &name),
    }
}

fn open_store(store: Store, dir: &Path) -> Result<Arc<dyn PersistenceGateway>> {
    let gateway: Arc<dyn PersistenceGateway> = match store {
        Store::Jsonl => Arc::new(JsonlGateway::with_dir(dir)?),
        Store::Sqlite => Arc::new(SqliteGateway::open(dir.join(SQLITE_FILE))?),
    };
    log::debug!("using {:?} store in {}", store, dir.display());
    Ok(gateway)
}

fn load_config(dir: &Path) -> Result<RecorderConfig> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(RecorderConfig::default());
    }
    let text = std::fs::read_to_string(&path)?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("invalid config in {}", path.display()))?;
    log::info!("loaded config from {}", path.display());
    Ok(config)
}

/// Recorder bound to `action_record_data_<slot>`
fn open_recorder(
    slot: u64,
    gateway: Arc<dyn PersistenceGateway>,
    bridge: Arc<dyn NotificationBridge>,
    config: RecorderConfig,
) -> Result<Recorder> {
    let registry = SequenceRegistry::new();
    for _ in 0..slot {
        registry.next_sequence_id();
    }
    Ok(Recorder::with_config(&registry, gateway, bridge, config)?)
}

fn print_notification(n: Notification) {
    match n {
        Notification::RecordingStarted => eprintln!("Recording (Enter = action, q = stop)"),
        Notification::SaveProgress(pct) => eprint!("\rSaving... {:.0}%", pct),
        Notification::RecordingSaved => eprintln!("\rSaved.          "),
        Notification::PrePlayback => eprintln!("Loading sequence..."),
        Notification::PlaybackStarted => eprintln!("Playing (Ctrl+C to stop)"),
        Notification::PlaybackStopped => eprintln!("Playback stopped"),
        Notification::Error(e) => eprintln!("\nError: {}", e),
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

fn record(slot: u64, dir: &Path, gateway: Arc<dyn PersistenceGateway>, quiet: bool) -> Result<()> {
    let config = load_config(dir)?;
    let rec = open_recorder(slot, gateway, Arc::new(print_notification), config)?;

    rec.start_recording(!quiet)?;
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }
        rec.action_performed();
        if !quiet {
            eprint!("{} actions", rec.captured_len());
            io::stderr().flush()?;
        }
    }

    let captured = rec.captured_len();
    rec.stop_recording(!quiet)?;
    rec.wait_for_flush();
    println!("{} actions recorded into {}", captured, rec.sequence_name());
    Ok(())
}

fn play(
    slot: u64,
    dir: &Path,
    gateway: Arc<dyn PersistenceGateway>,
    speed: Option<f64>,
    cycles: Option<u64>,
) -> Result<()> {
    let mut config = load_config(dir)?;
    if let Some(speed) = speed {
        config = config.speed(speed);
    }
    let rec = open_recorder(slot, gateway, Arc::new(print_notification), config)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    // Stop printing once the requested number of passes is done
    let limit = cycles.map(|c| c * rec.persisted_len() as u64);
    let fired = Arc::new(AtomicU64::new(0));
    let counter = fired.clone();
    let done = running.clone();
    let start = Instant::now();
    let listener = move || -> anyhow::Result<()> {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if limit.map(|l| n > l).unwrap_or(false) {
            return Ok(());
        }
        println!("#{} +{}ms", n, start.elapsed().as_millis());
        if limit == Some(n) {
            done.store(false, Ordering::SeqCst);
        }
        Ok(())
    };

    rec.start_playback_default(listener)?;
    while running.load(Ordering::SeqCst) && rec.is_playing() {
        std::thread::sleep(Duration::from_millis(10));
    }
    rec.stop_playback();

    println!(
        "{} triggers in {:.1}s",
        fired.load(Ordering::SeqCst).min(limit.unwrap_or(u64::MAX)),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn summarize(gateway: &dyn PersistenceGateway, name: &str) -> Result<SequenceSummary> {
    let events = gateway.read_all(name)?;
    Ok(SequenceSummary {
        name: name.to_string(),
        events: events.len(),
        total_ms: events.iter().map(|e| e.elapsed_millis).sum(),
    })
}

fn list(gateway: &dyn PersistenceGateway, json: bool) -> Result<()> {
    let names = gateway.list_sequences()?;
    let summaries = names
        .iter()
        .map(|n| summarize(gateway, n))
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else if summaries.is_empty() {
        println!("No sequences saved.");
    } else {
        for s in summaries {
            println!("{}  {} events  {}ms", s.name, s.events, s.total_ms);
        }
    }
    Ok(())
}

fn show(gateway: &dyn PersistenceGateway, name: &str, all: bool) -> Result<()> {
    let summary = summarize(gateway, name)?;
    println!("Name: {}", summary.name);
    println!("Events: {}", summary.events);
    println!("Length: {}ms", summary.total_ms);
    if all {
        let mut offset = 0;
        for (i, e) in gateway.read_all(name)?.iter().enumerate() {
            offset += e.elapsed_millis;
            println!("{}: +{}ms (at {}ms)", i, e.elapsed_millis, offset);
        }
    }
    Ok(())
}

fn delete(gateway: &dyn PersistenceGateway, name: &str) -> Result<()> {
    gateway.drop_sequence(name)?;
    println!("Deleted: {}", name);
    Ok(())
}
