#[derive(Deserialize, Debug, Clone, Default)]
pub struct ConfigFile {
    pub event_observer: Option<EventObserverConfigFile>,
    pub network: Option<NetworkConfigFile>,
    pub ingestion: Option<IngestionConfigFile>,
    pub storage: Option<StorageConfigFile>,
    pub monitoring: Option<MonitoringConfigFile>,
    pub logging: Option<LoggingConfigFile>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct EventObserverConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub body_limit_mb: Option<u64>,
    pub workers: Option<usize>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NetworkConfigFile {
    pub chain_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct IngestionConfigFile {
    pub ibd_mode_until_block: Option<u64>,
    pub event_replay: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct StorageConfigFile {
    pub raw_events_tsv_path: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MonitoringConfigFile {
    pub prometheus_port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoggingConfigFile {
    pub level: Option<String>,
    pub format: Option<String>,
}
