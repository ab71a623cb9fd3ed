use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc::channel;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hiro_system_kit::log::{setup_global_logger, setup_logger_with};
use hiro_system_kit::{format_err, format_note, slog};

use crate::config::generator::generate_config;
use crate::config::Config;
use crate::datastore::{DataStore, MemoryDataStore, TsvArchive};
use crate::observer::start_event_observer;
use crate::types::ChainId;
use crate::utils::Context;

const DEFAULT_CONFIG_FILE: &str = "EventObserver.toml";

/// Receives stacks-node event notifications and normalizes them into
/// datastore updates.
#[derive(Parser, PartialEq, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Start the event observer
    #[clap(name = "start", bin_name = "start")]
    Start(StartCommand),
    /// Generate and inspect configuration files
    #[clap(subcommand, name = "config")]
    Config(ConfigCommand),
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum ConfigCommand {
    /// Write a default configuration file in the current directory
    #[clap(name = "new", bin_name = "new")]
    New(NewConfig),
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct StartCommand {
    /// Load config file path
    #[clap(long = "config", conflicts_with_all = &["mainnet", "testnet"])]
    pub config_path: Option<String>,
    /// Use the mainnet defaults
    #[clap(long = "mainnet", conflicts_with = "testnet")]
    pub mainnet: bool,
    /// Use the testnet defaults
    #[clap(long = "testnet", conflicts_with = "mainnet")]
    pub testnet: bool,
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct NewConfig {
    /// Target mainnet
    #[clap(long = "mainnet", conflicts_with = "testnet")]
    pub mainnet: bool,
    /// Target testnet
    #[clap(long = "testnet", conflicts_with = "mainnet")]
    pub testnet: bool,
}

impl NewConfig {
    fn chain_id(&self) -> ChainId {
        match self.mainnet {
            true => ChainId::Mainnet,
            false => ChainId::Testnet,
        }
    }
}

pub fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    let result = match opts.command {
        Command::Start(cmd) => start(cmd),
        Command::Config(ConfigCommand::New(cmd)) => write_default_config(cmd),
    };
    if let Err(e) = result {
        eprintln!("{}", format_err!("{}", e));
        process::exit(1);
    }
}

fn load_config(cmd: &StartCommand) -> Result<Config, String> {
    let mut config = match (&cmd.config_path, cmd.mainnet) {
        (Some(path), _) => Config::from_file_path(path)?,
        (None, true) => Config::mainnet_default(),
        (None, false) => Config::testnet_default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn start(cmd: StartCommand) -> Result<(), String> {
    let config = load_config(&cmd)?;
    let logger = setup_logger_with(config.logging.format, config.logging.level);
    let _guard = setup_global_logger(logger.clone());
    let ctx = Context::with_logger(logger);

    let mut datastore = MemoryDataStore::new();
    if let Some(ref path) = config.storage.raw_events_tsv_path {
        let archive = TsvArchive::open(path).map_err(|e| e.to_string())?;
        ctx.try_log(|logger| {
            slog::info!(logger, "Archiving raw events to {}", archive.path().display())
        });
        datastore = datastore.with_archive(archive);
    }
    let datastore: Arc<dyn DataStore> = Arc::new(datastore);

    let observer = hiro_system_kit::nestable_block_on(start_event_observer(
        &config,
        datastore,
        ctx.clone(),
    ))?;

    let (termination_tx, termination_rx) = channel();
    ctrlc::set_handler(move || {
        let _ = termination_tx.send(());
    })
    .map_err(|e| format!("unable to set Ctrl-C handler: {}", e))?;

    let _ = termination_rx.recv();
    ctx.try_log(|logger| slog::warn!(logger, "Manual interruption signal received"));
    observer.terminate();
    Ok(())
}

fn write_default_config(cmd: NewConfig) -> Result<(), String> {
    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if path.exists() {
        return Err(format!("file {} already exists", DEFAULT_CONFIG_FILE));
    }
    let mut file = File::create(&path)
        .map_err(|e| format!("unable to create {}: {}", DEFAULT_CONFIG_FILE, e))?;
    file.write_all(generate_config(&cmd.chain_id()).as_bytes())
        .map_err(|e| format!("unable to write {}: {}", DEFAULT_CONFIG_FILE, e))?;
    println!("{}", format_note!("Created file {}", DEFAULT_CONFIG_FILE));
    Ok(())
}
