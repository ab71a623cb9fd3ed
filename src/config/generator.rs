use crate::types::ChainId;

use super::{DEFAULT_BODY_LIMIT_MB, DEFAULT_EVENT_OBSERVER_PORT, DEFAULT_WORKERS};

pub fn generate_config(chain_id: &ChainId) -> String {
    let (network, monitoring) = match chain_id {
        ChainId::Mainnet => ("0x00000001", "prometheus_port = 9153"),
        ChainId::Testnet => ("0x80000000", "# prometheus_port = 9153"),
    };
    let conf = format!(
        r#"[event_observer]
# Interface the stacks-node events_observer endpoint points to
host = "0.0.0.0"
port = {port}
# Genesis block replays can reach hundreds of megabytes
body_limit_mb = {body_limit_mb}
workers = {workers}

[network]
chain_id = "{network}"

[ingestion]
# Mempool and microblock notifications are archived without being
# processed until the chain tip passes this height
# ibd_mode_until_block = 150000
# Use the parent burn block timestamp when a block carries no block time
event_replay = false

[storage]
# raw_events_tsv_path = "data/stacks-node-events.tsv"

[monitoring]
{monitoring}

[logging]
# trace, debug, info, warning, error or critical
level = "info"
# json or term
format = "term"
"#,
        port = DEFAULT_EVENT_OBSERVER_PORT,
        body_limit_mb = DEFAULT_BODY_LIMIT_MB,
        workers = DEFAULT_WORKERS,
        network = network,
        monitoring = monitoring,
    );
    conf
}
