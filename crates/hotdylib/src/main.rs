//! `hotdylib` host binary.
//!
//! ```bash
//! hotdylib --directory /work/plugin/target/debug select
//! hotdylib load
//! RUST_LOG=hotdylib=debug hotdylib watch --debounce-ms 250
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hotdylib::{AutoloadBuilder, AutoloadConfig, ConfigLoader, EventFilter, ModuleReport};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

/// Load the newest native module from a directory and call its `test` entry point.
#[derive(Debug, Parser)]
#[command(name = "hotdylib", version, about)]
struct Cli {
    /// Config file to read instead of ./hotdylib.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Module directory (absolute path)
    #[arg(long, short = 'd', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the module that would be loaded
    Select,

    /// Load the selected module once
    Load,

    /// Reload the module whenever the directory changes; press Enter to stop
    Watch {
        /// Quiet period before a batch of changes triggers a reload
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,

        /// Which directory changes trigger a reload
        #[arg(long, value_enum)]
        events: Option<EventFilter>,
    },
}

fn main() -> hotdylib::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    if let Some(directory) = &cli.directory {
        loader = loader.directory(directory);
    }
    if let Command::Watch {
        debounce_ms,
        events,
    } = &cli.command
    {
        if let Some(millis) = debounce_ms {
            loader = loader.debounce(Duration::from_millis(*millis));
        }
        if let Some(events) = events {
            loader = loader.events(*events);
        }
    }
    let config = loader.load()?;

    match cli.command {
        Command::Select => select(&config),
        Command::Load => load(&config),
        Command::Watch { .. } => watch(&config),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn require_directory(config: &AutoloadConfig) -> hotdylib::Result<()> {
    if config.is_enabled() {
        return Ok(());
    }
    Err(miette::miette!(
        code = "hotdylib::cli::no_directory",
        help = "Pass --directory, set HOTDYLIB_DIRECTORY, or add `directory` to hotdylib.toml",
        "no module directory configured"
    ))
}

fn select(config: &AutoloadConfig) -> hotdylib::Result<()> {
    require_directory(config)?;
    let autoloader = AutoloadBuilder::new().config(config).build();

    match autoloader.select() {
        Some(module) => println!("{}", module.path().display()),
        None => println!("no qualifying module"),
    }
    Ok(())
}

fn load(config: &AutoloadConfig) -> hotdylib::Result<()> {
    require_directory(config)?;
    let autoloader = AutoloadBuilder::new().config(config).build();

    match autoloader.load_once()? {
        Some(module) => println!("loaded {}", module.path().display()),
        None => println!("no qualifying module"),
    }
    Ok(())
}

fn watch(config: &AutoloadConfig) -> hotdylib::Result<()> {
    require_directory(config)?;
    let mut autoloader = AutoloadBuilder::new()
        .config(config)
        .on_result(print_report)
        .build();

    autoloader.set_autoloading(true)?;
    eprintln!("press Enter to stop");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).into_diagnostic()?;

    autoloader.set_autoloading(false)?;
    Ok(())
}

fn print_report(report: ModuleReport) {
    match report.selected_path() {
        Some(path) if report.loaded => println!("[{}] loaded {}", report.trigger, path.display()),
        Some(path) => println!("[{}] unchanged {}", report.trigger, path.display()),
        None => println!("[{}] no qualifying module", report.trigger),
    }
}
