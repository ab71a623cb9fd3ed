pub mod file;
pub mod generator;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::str::FromStr;

use hiro_system_kit::log::{parse_level, LogFormat};
use hiro_system_kit::slog::Level;

pub use file::ConfigFile;

use crate::indexer::IndexerConfig;
use crate::types::ChainId;

pub const DEFAULT_EVENT_OBSERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_EVENT_OBSERVER_PORT: u16 = 3700;
pub const DEFAULT_BODY_LIMIT_MB: u64 = 500;
pub const DEFAULT_WORKERS: usize = 4;

pub const ENV_EVENT_HOST: &str = "STACKS_CORE_EVENT_HOST";
pub const ENV_EVENT_PORT: &str = "STACKS_CORE_EVENT_PORT";
pub const ENV_IBD_MODE_UNTIL_BLOCK: &str = "IBD_MODE_UNTIL_BLOCK";
pub const ENV_CHAIN_ID: &str = "STACKS_CHAIN_ID";
pub const ENV_BODY_LIMIT_MB: &str = "STACKS_EVENT_OBSERVER_BODY_LIMIT_MB";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub event_observer: EventObserverConfig,
    pub network: NetworkConfig,
    pub ingestion: IngestionConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventObserverConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_mb: u64,
    pub workers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub chain_id: ChainId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Mempool and microblock notifications are only archived while the
    /// chain tip is at or below this height
    pub ibd_mode_until_block: Option<u64>,
    pub event_replay: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub raw_events_tsv_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitoringConfig {
    pub prometheus_port: Option<u16>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
}

impl Config {
    pub fn from_file_path(file_path: &str) -> Result<Config, String> {
        let file = File::open(file_path)
            .map_err(|e| format!("unable to read file {}\n{:?}", file_path, e))?;
        let mut file_reader = BufReader::new(file);
        let mut file_buffer = vec![];
        file_reader
            .read_to_end(&mut file_buffer)
            .map_err(|e| format!("unable to read file {}\n{:?}", file_path, e))?;

        let config_file: ConfigFile = match toml::from_slice(&file_buffer) {
            Ok(s) => s,
            Err(e) => {
                return Err(format!("Config file malformatted {}", e.to_string()));
            }
        };
        Config::from_config_file(config_file)
    }

    pub fn from_config_file(config_file: ConfigFile) -> Result<Config, String> {
        let chain_id = match config_file.network.as_ref().and_then(|n| n.chain_id.as_ref()) {
            Some(chain_id) => ChainId::from_str_id(chain_id)?,
            None => ChainId::Testnet,
        };
        let mut config = match chain_id {
            ChainId::Mainnet => Config::mainnet_default(),
            ChainId::Testnet => Config::testnet_default(),
        };

        if let Some(event_observer) = config_file.event_observer {
            if let Some(host) = event_observer.host {
                config.event_observer.host = host;
            }
            if let Some(port) = event_observer.port {
                config.event_observer.port = port;
            }
            if let Some(body_limit_mb) = event_observer.body_limit_mb {
                config.event_observer.body_limit_mb = body_limit_mb;
            }
            if let Some(workers) = event_observer.workers {
                if workers == 0 {
                    return Err("event_observer.workers must be greater than 0".into());
                }
                config.event_observer.workers = workers;
            }
        }
        if let Some(ingestion) = config_file.ingestion {
            config.ingestion.ibd_mode_until_block = ingestion.ibd_mode_until_block;
            config.ingestion.event_replay = ingestion.event_replay.unwrap_or(false);
        }
        if let Some(storage) = config_file.storage {
            config.storage.raw_events_tsv_path = storage.raw_events_tsv_path.map(PathBuf::from);
        }
        if let Some(monitoring) = config_file.monitoring {
            config.monitoring.prometheus_port = monitoring.prometheus_port;
        }
        if let Some(logging) = config_file.logging {
            if let Some(ref level) = logging.level {
                config.logging.level = parse_log_level(level)?;
            }
            if let Some(ref format) = logging.format {
                config.logging.format = LogFormat::from_str(format)?;
            }
        }
        Ok(config)
    }

    /// Applies the `STACKS_*` / `IBD_MODE_UNTIL_BLOCK` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_EVENT_HOST) {
            self.event_observer.host = host_from_url(&host);
        }
        if let Some(port) = lookup(ENV_EVENT_PORT) {
            self.event_observer.port = parse_env_number(ENV_EVENT_PORT, &port)?;
        }
        if let Some(height) = lookup(ENV_IBD_MODE_UNTIL_BLOCK) {
            self.ingestion.ibd_mode_until_block =
                Some(parse_env_number(ENV_IBD_MODE_UNTIL_BLOCK, &height)?);
        }
        if let Some(chain_id) = lookup(ENV_CHAIN_ID) {
            self.network.chain_id = ChainId::from_str_id(&chain_id)?;
        }
        if let Some(limit) = lookup(ENV_BODY_LIMIT_MB) {
            self.event_observer.body_limit_mb = parse_env_number(ENV_BODY_LIMIT_MB, &limit)?;
        }
        Ok(())
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            chain_id: self.network.chain_id,
            event_replay: self.ingestion.event_replay,
        }
    }

    pub fn testnet_default() -> Config {
        Config {
            event_observer: EventObserverConfig {
                host: DEFAULT_EVENT_OBSERVER_HOST.into(),
                port: DEFAULT_EVENT_OBSERVER_PORT,
                body_limit_mb: DEFAULT_BODY_LIMIT_MB,
                workers: DEFAULT_WORKERS,
            },
            network: NetworkConfig {
                chain_id: ChainId::Testnet,
            },
            ingestion: IngestionConfig {
                ibd_mode_until_block: None,
                event_replay: false,
            },
            storage: StorageConfig {
                raw_events_tsv_path: None,
            },
            monitoring: MonitoringConfig {
                prometheus_port: None,
            },
            logging: LoggingConfig {
                level: Level::Info,
                format: LogFormat::default(),
            },
        }
    }

    pub fn mainnet_default() -> Config {
        let mut config = Config::testnet_default();
        config.network.chain_id = ChainId::Mainnet;
        config.monitoring.prometheus_port = Some(9153);
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::testnet_default()
    }
}

/// `http://host:port/...` becomes `host`, anything else is kept as is
pub fn host_from_url(input: &str) -> String {
    let input = input.trim();
    match input.strip_prefix("http:") {
        Some(rest) => rest
            .trim_start_matches('/')
            .split(|c| c == '/' || c == ':')
            .next()
            .unwrap_or_default()
            .to_string(),
        None => input.to_string(),
    }
}

fn parse_log_level(level: &str) -> Result<Level, String> {
    match level.to_lowercase().as_str() {
        "warning" => Ok(Level::Warning),
        other => parse_level(other),
    }
}

fn parse_env_number<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("{} must be an integer, got '{}'", key, value))
}
