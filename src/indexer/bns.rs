use clarity::util::hash::Hash160;
use hiro_system_kit::slog;

use clarity::vm::types::{TupleData, Value};

use crate::error::IngestionError;
use crate::indexer::values::{
    as_ascii_string, as_buffer, as_list, as_optional, as_principal, as_tuple, as_uint,
    decode_clarity_value, tuple_field, unwrap_optional,
};
use crate::indexer::zonefile::{parse_zone_file, UriRecord};
use crate::types::{
    ChainId, DataStoreAttachmentBatch, DataStoreAttachmentData, DbAssetEventType, DbBnsName,
    DbBnsNamespace, DbBnsSubdomain, DbBnsZoneFile, DbEventBase, DbNftEvent, DbTx, DbTxPayload,
    DbTxStatus, NewAttachment,
};
use crate::utils::Context;

pub const BNS_CONTRACT_ID_MAINNET: &str = "SP000000000000000000002Q6VF78.bns";
pub const BNS_CONTRACT_ID_TESTNET: &str = "ST000000000000000000002AMW42H.bns";

pub const NAME_UPDATE_OP: &str = "name-update";
pub const NAME_TRANSFER_OP: &str = "name-transfer";
pub const NAME_RENEWAL_OP: &str = "name-renewal";
pub const NAMESPACE_READY_STATUS: &str = "ready";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneFileTxt {
    pub owner: String,
    pub seqn: String,
    pub parts: String,
    pub zonefile: String,
    pub zonefile_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMetadata {
    pub op: String,
    pub name: String,
    pub namespace: String,
}

/// Reads the `owner=`, `seqn=`, `parts=` and `zf<n>=` entries of a subdomain
/// TXT record. The `zf` parts are concatenated and base64 decoded.
pub fn parse_zone_file_txt(entries: &[String]) -> ZoneFileTxt {
    let mut parsed = ZoneFileTxt::default();
    let mut encoded = String::new();
    for entry in entries.iter() {
        let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
        let value = value.split('=').next().unwrap_or("");
        match key {
            "owner" => parsed.owner = value.to_string(),
            "seqn" => parsed.seqn = value.to_string(),
            "parts" => parsed.parts = value.to_string(),
            key if key.starts_with("zf") => encoded.push_str(value),
            _ => {}
        }
    }
    let decoded = base64::decode_config(&encoded, base64::STANDARD_NO_PAD).unwrap_or_default();
    parsed.zonefile = String::from_utf8_lossy(&decoded).to_string();
    parsed.zonefile_hash = Hash160::from_data(parsed.zonefile.as_bytes()).to_hex();
    parsed
}

/// Target of the last URI record named after a resolver, empty otherwise
pub fn parse_resolver(uri: &[UriRecord]) -> String {
    uri.iter()
        .filter(|record| record.name.contains("resolver"))
        .last()
        .map(|record| record.target.clone())
        .unwrap_or_default()
}

pub fn decode_attachment_metadata(metadata: &str) -> Result<AttachmentMetadata, IngestionError> {
    let value = decode_clarity_value(metadata)?;
    let tuple = as_tuple(&value).ok_or(IngestionError::MalformedPayload(format!(
        "attachment metadata is not a tuple: {}",
        value
    )))?;
    let op = tuple_field(tuple, "op")
        .and_then(as_ascii_string)
        .ok_or(IngestionError::MalformedPayload(
            "attachment metadata misses op".into(),
        ))?;
    let buffer_field = |key: &str| {
        tuple_field(tuple, key)
            .and_then(as_buffer)
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
            .ok_or(IngestionError::MalformedPayload(format!(
                "attachment metadata misses {}",
                key
            )))
    };
    Ok(AttachmentMetadata {
        op,
        name: buffer_field("name")?,
        namespace: buffer_field("namespace")?,
    })
}

pub fn bns_contract_id(chain_id: ChainId) -> &'static str {
    if chain_id.is_mainnet() {
        BNS_CONTRACT_ID_MAINNET
    } else {
        BNS_CONTRACT_ID_TESTNET
    }
}

fn buffer_text(value: &Value) -> Option<String> {
    as_buffer(value).map(|bytes| String::from_utf8_lossy(bytes).to_string())
}

/// Name record of a `{attachment: {hash, metadata: {name, namespace, op,
/// tx-sender}}}` print. The owner is the tx sender, transfers are fixed up
/// with [`name_transfer_recipient`].
pub fn name_from_print_event(raw_value: &str, base: &DbEventBase) -> Option<DbBnsName> {
    let value = decode_clarity_value(raw_value).ok()?;
    let attachment = as_tuple(tuple_field(as_tuple(&value)?, "attachment")?)?;
    let metadata = as_tuple(tuple_field(attachment, "metadata")?)?;
    let name = tuple_field(metadata, "name").and_then(buffer_text)?;
    let namespace = tuple_field(metadata, "namespace").and_then(buffer_text)?;
    let op = tuple_field(metadata, "op").and_then(as_ascii_string)?;
    let owner = tuple_field(metadata, "tx-sender").and_then(as_principal)?;
    let hash = tuple_field(attachment, "hash").and_then(as_buffer)?;
    Some(DbBnsName {
        name: format!("{}.{}", name, namespace),
        namespace_id: namespace,
        address: owner.to_string(),
        registered_at: base.block_height,
        expire_block: 0,
        zonefile_hash: format!("0x{}", hex::encode(hash)),
        zonefile: String::new(),
        tx_id: base.tx_id.clone(),
        tx_index: base.tx_index,
        event_index: Some(base.event_index),
        status: op,
        canonical: true,
    })
}

/// Namespace record of a `{namespace, status: "ready", properties}` print.
/// Other namespace statuses yield nothing.
pub fn namespace_from_print_event(raw_value: &str, base: &DbEventBase) -> Option<DbBnsNamespace> {
    let value = decode_clarity_value(raw_value).ok()?;
    let event = as_tuple(&value)?;
    let status = tuple_field(event, "status").and_then(as_ascii_string)?;
    if status != NAMESPACE_READY_STATUS {
        return None;
    }
    let namespace_id = tuple_field(event, "namespace").and_then(buffer_text)?;
    let properties = as_tuple(tuple_field(event, "properties")?)?;
    let price = as_tuple(tuple_field(properties, "price-function")?)?;
    let uint = |tuple: &TupleData, key: &str| tuple_field(tuple, key).and_then(as_uint);

    let buckets = as_list(tuple_field(price, "buckets")?)?
        .iter()
        .map(|bucket| as_uint(bucket).map(|n| n.to_string()))
        .collect::<Option<Vec<_>>>()?
        .join(";");
    let launched_at = match tuple_field(properties, "launched-at").and_then(unwrap_optional) {
        Some(height) => Some(u64::try_from(as_uint(height)?).ok()?),
        None => None,
    };
    Some(DbBnsNamespace {
        namespace_id,
        address: tuple_field(properties, "namespace-import")
            .and_then(as_principal)?
            .to_string(),
        launched_at,
        reveal_block: u64::try_from(uint(properties, "revealed-at")?).ok()?,
        ready_block: base.block_height,
        buckets,
        base: uint(price, "base")?,
        coeff: uint(price, "coeff")?,
        nonalpha_discount: uint(price, "nonalpha-discount")?,
        no_vowel_discount: uint(price, "no-vowel-discount")?,
        lifetime: uint(properties, "lifetime")?,
        status,
        tx_id: base.tx_id.clone(),
        tx_index: base.tx_index,
        canonical: true,
    })
}

/// A `name-renewal` call without a zone file hash prints nothing, so its
/// name record is rebuilt from the call arguments
/// `(namespace, name, stx-to-burn, new-owner, zonefile-hash)`.
pub fn name_renewal_from_contract_call(tx: &DbTx, chain_id: ChainId) -> Option<DbBnsName> {
    if tx.status != DbTxStatus::Success {
        return None;
    }
    let function_args = match &tx.payload {
        DbTxPayload::ContractCall {
            contract_id,
            function_name,
            function_args,
        } if contract_id == bns_contract_id(chain_id) && function_name == NAME_RENEWAL_OP => {
            function_args
        }
        _ => return None,
    };
    let args = function_args
        .iter()
        .map(|arg| decode_clarity_value(arg).ok())
        .collect::<Option<Vec<_>>>()?;
    let (namespace, name, new_owner, zonefile_hash) = match args.as_slice() {
        [namespace, name, _, new_owner, zonefile_hash] => {
            (namespace, name, new_owner, zonefile_hash)
        }
        _ => return None,
    };
    if as_optional(zonefile_hash)?.is_some() {
        return None;
    }
    let namespace = buffer_text(namespace)?;
    let name = buffer_text(name)?;
    let address = match as_optional(new_owner)? {
        Some(owner) => as_principal(owner)?.to_string(),
        None => tx.sender_address.clone(),
    };
    Some(DbBnsName {
        name: format!("{}.{}", name, namespace),
        namespace_id: namespace,
        address,
        registered_at: tx.block_height,
        expire_block: 0,
        zonefile_hash: String::new(),
        zonefile: String::new(),
        tx_id: tx.tx_id.clone(),
        tx_index: tx.tx_index,
        event_index: None,
        status: NAME_RENEWAL_OP.to_string(),
        canonical: true,
    })
}

/// Recipient of the BNS `names` token moved by a transaction
pub fn name_transfer_recipient(nft_events: &[DbNftEvent], chain_id: ChainId) -> Option<&str> {
    let asset_identifier = format!("{}::names", bns_contract_id(chain_id));
    nft_events
        .iter()
        .find(|event| {
            event.asset_event_type == DbAssetEventType::Transfer
                && event.asset_identifier == asset_identifier
        })
        .and_then(|event| event.recipient.as_deref())
}

pub fn is_bns_attachment(attachment: &NewAttachment) -> bool {
    attachment.contract_id == BNS_CONTRACT_ID_MAINNET
        || attachment.contract_id == BNS_CONTRACT_ID_TESTNET
}

/// Normalizes the BNS attachments of a batch. Items with malformed metadata
/// are logged and skipped without failing the rest of the batch.
pub fn parse_attachments(
    attachments: &[NewAttachment],
    ctx: &Context,
) -> DataStoreAttachmentBatch {
    let mut batch = DataStoreAttachmentBatch::default();
    for attachment in attachments.iter().filter(|a| is_bns_attachment(a)) {
        if let Err(e) = parse_attachment(attachment, &mut batch, ctx) {
            ctx.try_log(|logger| {
                slog::warn!(
                    logger,
                    "Skipping attachment {} of tx {}: {}",
                    attachment.attachment_index,
                    attachment.tx_id,
                    e
                )
            });
        }
    }
    batch
}

fn parse_attachment(
    attachment: &NewAttachment,
    batch: &mut DataStoreAttachmentBatch,
    ctx: &Context,
) -> Result<(), IngestionError> {
    let metadata = decode_attachment_metadata(&attachment.metadata)?;
    let block_height = attachment.block_height.parse::<u64>().map_err(|e| {
        IngestionError::MalformedPayload(format!(
            "invalid attachment block height '{}': {}",
            attachment.block_height, e
        ))
    })?;
    let content = attachment
        .content
        .strip_prefix("0x")
        .unwrap_or(&attachment.content);
    let zonefile = String::from_utf8_lossy(
        &hex::decode(content)
            .map_err(|e| IngestionError::MalformedPayload(format!("invalid content hex: {}", e)))?,
    )
    .to_string();

    let mut subdomains = vec![];
    if metadata.op == NAME_UPDATE_OP {
        match parse_zone_file(&zonefile) {
            Ok(parsed) => {
                let resolver = parse_resolver(&parsed.uri);
                for record in parsed.txt.iter() {
                    let txt = parse_zone_file_txt(&record.txt);
                    if txt.owner.is_empty() {
                        continue;
                    }
                    subdomains.push(DbBnsSubdomain {
                        name: format!("{}.{}", metadata.name, metadata.namespace),
                        namespace_id: metadata.namespace.clone(),
                        fully_qualified_subdomain: format!(
                            "{}.{}.{}",
                            record.name, metadata.name, metadata.namespace
                        ),
                        owner: txt.owner,
                        zonefile_hash: txt.zonefile_hash,
                        zonefile: txt.zonefile,
                        tx_id: attachment.tx_id.clone(),
                        tx_index: -1,
                        canonical: true,
                        parent_zonefile_hash: attachment
                            .content_hash
                            .trim_start_matches("0x")
                            .to_string(),
                        parent_zonefile_index: 0,
                        block_height,
                        zonefile_offset: 1,
                        resolver: resolver.clone(),
                        index_block_hash: attachment.index_block_hash.clone(),
                    });
                }
            }
            Err(e) => {
                ctx.try_log(|logger| {
                    slog::warn!(
                        logger,
                        "Unable to parse zone file of tx {}: {}",
                        attachment.tx_id,
                        e
                    )
                });
            }
        }
    }

    batch.attachments.push(DataStoreAttachmentData {
        op: metadata.op,
        name: metadata.name,
        namespace: metadata.namespace,
        zonefile: content.to_string(),
        zonefile_hash: attachment.content_hash.clone(),
        tx_id: attachment.tx_id.clone(),
        index_block_hash: attachment.index_block_hash.clone(),
        block_height,
    });
    batch.zonefiles.push(DbBnsZoneFile {
        zonefile,
        zonefile_hash: attachment.content_hash.clone(),
        tx_id: attachment.tx_id.clone(),
    });
    batch.subdomains.extend(subdomains);
    Ok(())
}
