//! Decoding of the `print` events emitted by the stacking contracts into
//! typed synthetic events.

use bitcoin::bech32::{self, u5, ToBase32, Variant};
use bitcoin::util::base58;
use clarity::vm::types::{TupleData, Value};
use hiro_system_kit::slog;

use crate::indexer::values::{
    as_ascii_string, as_buffer, as_principal, as_response, as_tuple, as_uint,
    decode_clarity_value, serialize_clarity_value, tuple_field, unwrap_optional,
};
use crate::types::{NewEventPayload, PoxEventData};
use crate::utils::Context;

pub const BOOT_ADDRESS_MAINNET: &str = "SP000000000000000000002Q6VF78";
pub const BOOT_ADDRESS_TESTNET: &str = "ST000000000000000000002AMW42H";

pub const POX_2_CONTRACT_NAME: &str = "pox-2";
pub const POX_3_CONTRACT_NAME: &str = "pox-3";
pub const POX_4_CONTRACT_NAME: &str = "pox-4";

const BTC_P2PKH_VERSION_MAINNET: u8 = 0;
const BTC_P2SH_VERSION_MAINNET: u8 = 5;
const BTC_P2PKH_VERSION_TESTNET: u8 = 111;
const BTC_P2SH_VERSION_TESTNET: u8 = 196;

/// Fields shared by every synthetic event, plus the action specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPoxEvent {
    pub stacker: String,
    pub locked: u128,
    pub balance: u128,
    pub burnchain_unlock_height: u128,
    pub pox_addr: Option<String>,
    pub pox_addr_raw: Option<String>,
    pub end_cycle_id: Option<u128>,
    pub start_cycle_id: Option<u128>,
    pub data: PoxEventData,
}

/// `print` from a boot contract whose name starts with `pox`
pub fn is_pox_print_event(payload: &NewEventPayload) -> bool {
    let contract_event = match payload {
        NewEventPayload::ContractEvent { contract_event } => contract_event,
        _ => return false,
    };
    if contract_event.topic != "print" {
        return false;
    }
    match contract_event.contract_identifier.split_once('.') {
        Some((issuer, name)) => {
            (issuer == BOOT_ADDRESS_MAINNET || issuer == BOOT_ADDRESS_TESTNET)
                && name.starts_with("pox")
        }
        None => false,
    }
}

/// Decodes the hex clarity value of a stacking print event. Shapes that are
/// not recognized are logged and yield `None`.
pub fn decode_pox_synthetic_print_event(
    raw_value: &str,
    mainnet: bool,
    ctx: &Context,
) -> Option<DecodedPoxEvent> {
    let value = match decode_clarity_value(raw_value) {
        Ok(value) => value,
        Err(e) => {
            ctx.try_log(|logger| {
                slog::warn!(logger, "Unable to decode PoX print event {}: {}", raw_value, e)
            });
            return None;
        }
    };
    let (committed, data) = match as_response(&value) {
        Some(response) => response,
        None => {
            ctx.try_log(|logger| {
                slog::warn!(
                    logger,
                    "Unexpected PoX synthetic event value, expected a response: {}",
                    value
                )
            });
            return None;
        }
    };
    if !committed {
        ctx.try_log(|logger| {
            slog::info!(
                logger,
                "Received ResponseError when decoding PoX synthetic print event: {}",
                data
            )
        });
        return None;
    }
    match decode_pox_event_tuple(data, mainnet) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            ctx.try_log(|logger| {
                slog::warn!(logger, "Unable to decode PoX synthetic event {}: {}", value, e)
            });
            None
        }
    }
}

/// Stacker named by a stacking print event, whether or not the rest decodes
pub fn pox_print_stacker(raw_value: &str) -> Option<String> {
    let value = decode_clarity_value(raw_value).ok()?;
    let (_, data) = as_response(&value)?;
    principal_field(as_tuple(data)?, "stacker").ok()
}

fn decode_pox_event_tuple(value: &Value, mainnet: bool) -> Result<DecodedPoxEvent, String> {
    let tuple = as_tuple(value).ok_or(format!("expected a tuple, got {}", value))?;
    let name = as_ascii_string(get_field(tuple, "name")?)
        .ok_or("name must be a string-ascii".to_string())?;
    let stacker = principal_field(tuple, "stacker")?;
    let locked = uint_field(tuple, "locked")?;
    let balance = uint_field(tuple, "balance")?;
    let burnchain_unlock_height = uint_field(tuple, "burnchain-unlock-height")?;
    let fields = as_tuple(get_field(tuple, "data")?).ok_or("data must be a tuple".to_string())?;

    let (pox_addr, pox_addr_raw) = match pox_addr_field(fields)? {
        Some(addr) => (
            pox_addr_to_btc_address(addr, mainnet),
            serialize_clarity_value(&Value::Tuple(addr.clone())).ok(),
        ),
        None => (None, None),
    };
    let end_cycle_id = optional_uint_field(fields, "end-cycle-id")?;
    let start_cycle_id = optional_uint_field(fields, "start-cycle-id")?;

    let data = match name.as_str() {
        "handle-unlock" => PoxEventData::HandleUnlock {
            first_cycle_locked: uint_field(fields, "first-cycle-locked")?,
            first_unlocked_cycle: uint_field(fields, "first-unlocked-cycle")?,
        },
        "stack-stx" => PoxEventData::StackStx {
            lock_amount: uint_field(fields, "lock-amount")?,
            lock_period: uint_field(fields, "lock-period")?,
            start_burn_height: uint_field(fields, "start-burn-height")?,
            unlock_burn_height: uint_field(fields, "unlock-burn-height")?,
            signer_key: optional_buffer_field(fields, "signer-key")?,
        },
        "stack-increase" => PoxEventData::StackIncrease {
            increase_by: uint_field(fields, "increase-by")?,
            total_locked: uint_field(fields, "total-locked")?,
            signer_key: optional_buffer_field(fields, "signer-key")?,
        },
        "stack-extend" => PoxEventData::StackExtend {
            extend_count: uint_field(fields, "extend-count")?,
            unlock_burn_height: uint_field(fields, "unlock-burn-height")?,
            signer_key: optional_buffer_field(fields, "signer-key")?,
        },
        "delegate-stx" => PoxEventData::DelegateStx {
            amount_ustx: uint_field(fields, "amount-ustx")?,
            delegate_to: principal_field(fields, "delegate-to")?,
            unlock_burn_height: optional_uint_field(fields, "unlock-burn-height")?,
        },
        "delegate-stack-stx" => PoxEventData::DelegateStackStx {
            lock_amount: uint_field(fields, "lock-amount")?,
            unlock_burn_height: uint_field(fields, "unlock-burn-height")?,
            start_burn_height: uint_field(fields, "start-burn-height")?,
            lock_period: uint_field(fields, "lock-period")?,
            delegator: principal_field(fields, "delegator")?,
        },
        "delegate-stack-increase" => PoxEventData::DelegateStackIncrease {
            increase_by: uint_field(fields, "increase-by")?,
            total_locked: uint_field(fields, "total-locked")?,
            delegator: principal_field(fields, "delegator")?,
        },
        "delegate-stack-extend" => PoxEventData::DelegateStackExtend {
            unlock_burn_height: uint_field(fields, "unlock-burn-height")?,
            extend_count: uint_field(fields, "extend-count")?,
            delegator: principal_field(fields, "delegator")?,
        },
        "stack-aggregation-commit" => PoxEventData::StackAggregationCommit {
            reward_cycle: uint_field(fields, "reward-cycle")?,
            amount_ustx: uint_field(fields, "amount-ustx")?,
            signer_key: optional_buffer_field(fields, "signer-key")?,
        },
        "stack-aggregation-commit-indexed" => PoxEventData::StackAggregationCommitIndexed {
            reward_cycle: uint_field(fields, "reward-cycle")?,
            amount_ustx: uint_field(fields, "amount-ustx")?,
            signer_key: optional_buffer_field(fields, "signer-key")?,
        },
        "stack-aggregation-increase" => PoxEventData::StackAggregationIncrease {
            reward_cycle: uint_field(fields, "reward-cycle")?,
            amount_ustx: uint_field(fields, "amount-ustx")?,
            reward_cycle_index: optional_uint_field(fields, "reward-cycle-index")?,
        },
        "revoke-delegate-stx" => PoxEventData::RevokeDelegateStx {
            delegate_to: principal_field(fields, "delegate-to")?,
        },
        other => return Err(format!("unexpected PoX synthetic event name: {}", other)),
    };

    Ok(DecodedPoxEvent {
        stacker,
        locked,
        balance,
        burnchain_unlock_height,
        pox_addr,
        pox_addr_raw,
        end_cycle_id,
        start_cycle_id,
        data,
    })
}

fn get_field<'a>(tuple: &'a TupleData, key: &str) -> Result<&'a Value, String> {
    tuple_field(tuple, key).ok_or(format!("missing field {}", key))
}

fn uint_field(tuple: &TupleData, key: &str) -> Result<u128, String> {
    let value = get_field(tuple, key)?;
    as_uint(value).ok_or(format!("{} must be a uint, got {}", key, value))
}

fn principal_field(tuple: &TupleData, key: &str) -> Result<String, String> {
    let value = get_field(tuple, key)?;
    as_principal(value)
        .map(|p| p.to_string())
        .ok_or(format!("{} must be a principal, got {}", key, value))
}

/// Absent, `none`, `(some u1)` and bare `u1` are all accepted
fn optional_uint_field(tuple: &TupleData, key: &str) -> Result<Option<u128>, String> {
    let value = match tuple_field(tuple, key) {
        Some(value) => value,
        None => return Ok(None),
    };
    match unwrap_optional(value) {
        None => Ok(None),
        Some(inner) => as_uint(inner)
            .map(Some)
            .ok_or(format!("{} must be an optional uint, got {}", key, value)),
    }
}

/// Same leniency as `optional_uint_field`, rendered as `0x` hex
fn optional_buffer_field(tuple: &TupleData, key: &str) -> Result<Option<String>, String> {
    let value = match tuple_field(tuple, key) {
        Some(value) => value,
        None => return Ok(None),
    };
    match unwrap_optional(value) {
        None => Ok(None),
        Some(inner) => as_buffer(inner)
            .map(|bytes| Some(format!("0x{}", hex::encode(bytes))))
            .ok_or(format!("{} must be an optional buffer, got {}", key, value)),
    }
}

fn pox_addr_field(tuple: &TupleData) -> Result<Option<&TupleData>, String> {
    let value = match tuple_field(tuple, "pox-addr") {
        Some(value) => value,
        None => return Ok(None),
    };
    match unwrap_optional(value) {
        None => Ok(None),
        Some(inner) => as_tuple(inner)
            .map(Some)
            .ok_or(format!("pox-addr must be a tuple, got {}", value)),
    }
}

/// Bitcoin address of a `{version, hashbytes}` PoX reward address, `None`
/// when the version or hash length is not convertible.
pub fn pox_addr_to_btc_address(addr: &TupleData, mainnet: bool) -> Option<String> {
    let version = *as_buffer(tuple_field(addr, "version")?)?.first()?;
    let hashbytes = as_buffer(tuple_field(addr, "hashbytes")?)?;
    let (p2pkh, p2sh, hrp) = if mainnet {
        (BTC_P2PKH_VERSION_MAINNET, BTC_P2SH_VERSION_MAINNET, "bc")
    } else {
        (BTC_P2PKH_VERSION_TESTNET, BTC_P2SH_VERSION_TESTNET, "tb")
    };
    match (version, hashbytes.len()) {
        (0, 20) => Some(base58_check(p2pkh, hashbytes)),
        (1..=3, 20) => Some(base58_check(p2sh, hashbytes)),
        (4, 20) | (5, 32) => segwit_address(hrp, 0, hashbytes, Variant::Bech32),
        (6, 32) => segwit_address(hrp, 1, hashbytes, Variant::Bech32m),
        _ => None,
    }
}

fn base58_check(version: u8, hashbytes: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + hashbytes.len());
    payload.push(version);
    payload.extend_from_slice(hashbytes);
    base58::check_encode_slice(&payload)
}

fn segwit_address(hrp: &str, witness_version: u8, program: &[u8], variant: Variant) -> Option<String> {
    let mut data = vec![u5::try_from_u8(witness_version).ok()?];
    data.extend(program.to_base32());
    bech32::encode(hrp, data, variant).ok()
}
