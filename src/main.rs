//! Headless driver: streams a noise world around a moving camera and feeds every
//! dirty section through the build scheduler.
#![forbid(unsafe_code)]

mod config;
mod driver;
mod gpu;
mod grid;
mod world;

use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use tessera_blocks::BlockRegistry;

use crate::config::DriverConfig;
use crate::driver::Driver;

const DEFAULT_CONFIG: &str = "tessera.toml";

#[derive(Parser, Debug)]
#[command(name = "tessera", about = "Run the section build scheduler against a streamed demo world")]
struct Cli {
    /// Driver config file (defaults to ./tessera.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of ticks to simulate
    #[arg(long)]
    ticks: Option<u32>,
    /// Mesh worker threads
    #[arg(long)]
    workers: Option<usize>,
    /// Staging packs in the buffer pool
    #[arg(long)]
    buffers: Option<usize>,
    /// World seed
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<i32>,
    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Log at debug level
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_cfg = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Off)
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_cfg.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = &cli.log_file {
        loggers.push(WriteLogger::new(level, log_cfg, File::create(path)?));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<DriverConfig, Box<dyn Error>> {
    let mut cfg = match &cli.config {
        Some(path) => DriverConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => DriverConfig::load(DEFAULT_CONFIG)?,
        None => DriverConfig::default(),
    };
    if let Some(t) = cli.ticks {
        cfg.ticks = t;
    }
    if let Some(w) = cli.workers {
        cfg.workers = w;
    }
    if let Some(b) = cli.buffers {
        cfg.buffer_packs = b;
    }
    if let Some(s) = cli.seed {
        cfg.seed = s;
    }
    Ok(cfg)
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let cfg = load_config(cli)?;
    let reg = match &cfg.blocks_path {
        Some(path) => BlockRegistry::load_from_path(path)
            .map_err(|e| format!("failed to load {}: {}", path.display(), e))?,
        None => BlockRegistry::builtin(),
    };
    log::info!(
        "driver: ticks={} radius={} height={} seed={} blocks={}",
        cfg.ticks,
        cfg.view_radius,
        cfg.height_sections,
        cfg.seed,
        reg.len()
    );
    let summary = Driver::new(cfg, Arc::new(reg))?.run()?;
    println!("{}", summary);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
