//! deskapp entry point
//!
//! # Usage
//!
//! ```bash
//! # Defaults, config from $XDG_CONFIG_HOME/deskapp/deskapp.toml if present
//! deskapp
//!
//! # Explicit config, faster frames, no splash
//! deskapp --config ./deskapp.toml --fps 60 --no-splash
//!
//! # Logs go to a file; the terminal belongs to the UI
//! RUST_LOG=deskapp=debug deskapp --log-file /tmp/deskapp.log
//! ```

use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use clap::Parser;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deskapp_core::{load_config, DeskConfig, DeskError};
use deskapp_tui::modules::{About, Clock, Echo, Fire};
use deskapp_tui::surface::{
    install_panic_hook, install_signal_handlers, CrosstermInput, TerminalGuard,
};
use deskapp_tui::{App, Surface};

/// deskapp - a panel framework for the terminal
#[derive(Parser, Debug)]
#[command(name = "deskapp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Frames per second
    #[arg(long, value_name = "N")]
    fps: Option<u32>,

    /// Title shown in the header
    #[arg(short = 't', long)]
    title: Option<String>,

    /// Skip the startup animation
    #[arg(long)]
    no_splash: bool,

    /// Write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = configure(&args)?;
    init_logging(&config)?;
    for ignored in config.ignored() {
        tracing::warn!(value = %ignored, "ignoring invalid environment override");
    }

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("deskapp requires a terminal (TTY)");
        std::process::exit(1);
    }

    tracing::info!(title = %config.title, fps = config.fps, "deskapp starting");
    install_panic_hook();
    let signals = install_signal_handlers().context("failed to install signal handlers")?;
    run(&config, signals)?;
    Ok(())
}

/// Config file, then environment, then command line, validated last
fn configure(args: &Args) -> anyhow::Result<DeskConfig> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(fps) = args.fps {
        config.fps = fps;
        config.set_cli("fps");
    }
    if let Some(title) = &args.title {
        config.title = title.clone();
        config.set_cli("title");
    }
    if args.no_splash {
        config.splash = false;
        config.set_cli("splash");
    }
    if let Some(path) = &args.log_file {
        config.log_file = Some(path.clone());
        config.set_cli("log_file");
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &DeskConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;

    let file_layer = match config.log_file.as_deref() {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(open_log(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();
    Ok(())
}

fn open_log(path: &Path) -> anyhow::Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn run(config: &DeskConfig, signals: Arc<AtomicBool>) -> Result<(), DeskError> {
    let guard = TerminalGuard::enter(config.mouse).map_err(DeskError::RenderSurfaceInit)?;
    let backend = CrosstermBackend::new(io::stdout());
    let surface = Surface::new(backend, Box::new(CrosstermInput::new()))?;

    let mut app = App::new(surface, config);
    app.attach_guard(guard);
    app.stop_on(signals);
    app.add_module(About);
    app.add_module(Fire::default());
    app.add_module(Echo::default());
    app.add_module(Clock::default());

    if config.splash {
        app.splash()?;
    }
    app.run()
}
