use stacks_codec::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("decoding failed: {0}")]
    Decode(String),
    #[error("Unexpected missing tx during event parsing by tx_id {tx_id}")]
    MissingTransaction { tx_id: String },
    #[error("Cycle number must be present if reward set is present")]
    MissingCycleNumber,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<CodecError> for IngestionError {
    fn from(err: CodecError) -> Self {
        IngestionError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for IngestionError {
    fn from(err: serde_json::Error) -> Self {
        IngestionError::MalformedPayload(err.to_string())
    }
}

/// Parses a base-10 amount string as sent by the node
pub fn parse_amount(field: &str, value: &str) -> Result<u128, IngestionError> {
    value.parse::<u128>().map_err(|e| {
        IngestionError::MalformedPayload(format!("invalid {} amount '{}': {}", field, value, e))
    })
}
