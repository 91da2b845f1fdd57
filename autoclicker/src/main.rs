//! Unattended clicker agent.
//!
//! Opens the game (through WebDriver or the built-in simulation), imports the
//! last save, then clicks, buys, saves and reports income until the game
//! window goes away.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use autoclicker::exit_codes;
use autoclicker::io::config::{ClickerConfig, DEFAULT_CONFIG_FILE, load_config, write_config};
use autoclicker::io::sim::SimulatedGame;
use autoclicker::io::webdriver::{DEFAULT_ENDPOINT, WebDriverSurface};
use autoclicker::logging;
use autoclicker::session::{SessionOutcome, run_session};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "autoclicker",
    version,
    about = "Unattended agent for an incremental clicker game"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `autoclicker.toml` with default settings if missing.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Drive the game in a browser through a WebDriver endpoint.
    Run {
        /// Config file to load.
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// WebDriver endpoint (e.g. a running chromedriver).
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        webdriver: String,
    },
    /// Drive the built-in simulated game until it closes.
    Simulate {
        /// Config file to load.
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Primary clicks before the simulated window closes.
        #[arg(long, default_value_t = 1_000)]
        clicks: u64,
        /// Override `click_interval_ms` from the config.
        #[arg(long)]
        click_interval_ms: Option<u64>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(()) => std::process::exit(exit_codes::OK),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(Path::new(DEFAULT_CONFIG_FILE), force),
        Command::Run { config, webdriver } => cmd_run(&config, &webdriver),
        Command::Simulate {
            config,
            clicks,
            click_interval_ms,
        } => cmd_simulate(&config, clicks, click_interval_ms),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        info!(path = %path.display(), "config already exists, leaving it untouched");
        return Ok(());
    }
    write_config(path, &ClickerConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "config written");
    Ok(())
}

fn cmd_run(config_path: &Path, endpoint: &str) -> Result<()> {
    let cfg = load_config(config_path)?;
    let surface = WebDriverSurface::connect(endpoint, &cfg.game_url)?;
    countdown(cfg.startup_delay_secs);
    let outcome = run_session(Arc::new(surface), &cfg)?;
    report(&outcome);
    Ok(())
}

fn cmd_simulate(config_path: &Path, clicks: u64, click_interval_ms: Option<u64>) -> Result<()> {
    let mut cfg = load_config(config_path)?;
    if let Some(ms) = click_interval_ms {
        cfg.click_interval_ms = ms;
    }
    let game = Arc::new(SimulatedGame::new().with_click_limit(clicks));
    let outcome = run_session(game, &cfg)?;
    report(&outcome);
    Ok(())
}

/// Give the page time to load before the first import and click.
fn countdown(secs: u64) {
    for remaining in (1..=secs).rev() {
        info!(remaining, "starting");
        thread::sleep(Duration::from_secs(1));
    }
}

fn report(outcome: &SessionOutcome) {
    println!("clicks: {}", outcome.clicks);
    println!("stopped: {}", outcome.stop_reason);
}
