use clarity::types::chainstate::StacksAddress;
use clarity::util::hash::Hash160;
use clarity::util::secp256k1::MessageSignature;
use clarity::vm::types::{PrincipalData, StandardPrincipalData, Value};
use clarity::vm::{ClarityName, ClarityVersion, ContractName};
use stacks_codec::codec::{
    SinglesigHashMode, SinglesigSpendingCondition, StacksString, StacksTransaction,
    TokenTransferMemo, TransactionAnchorMode, TransactionAuth, TransactionPayload,
    TransactionContractCall, TransactionPostConditionMode, TransactionPublicKeyEncoding,
    TransactionSmartContract,
    TransactionSpendingCondition, TransactionVersion, Txid,
};
use stacks_codec::StacksMessageCodec;

/// A consensus encoded transaction along with what decoding should yield
#[derive(Debug, Clone)]
pub struct TestTransaction {
    pub txid: String,
    pub raw_tx: String,
    pub sender: String,
}

fn standard_auth(signer: u8, nonce: u64) -> TransactionAuth {
    TransactionAuth::Standard(TransactionSpendingCondition::Singlesig(
        SinglesigSpendingCondition {
            hash_mode: SinglesigHashMode::P2PKH,
            signer: Hash160([signer; 20]),
            nonce,
            tx_fee: 180,
            key_encoding: TransactionPublicKeyEncoding::Compressed,
            signature: MessageSignature::empty(),
        },
    ))
}

fn build(auth: TransactionAuth, payload: TransactionPayload) -> TestTransaction {
    let tx = StacksTransaction {
        version: TransactionVersion::Testnet,
        chain_id: 0x80000000,
        auth,
        anchor_mode: TransactionAnchorMode::Any,
        post_condition_mode: TransactionPostConditionMode::Allow,
        post_conditions: vec![],
        payload,
    };
    let bytes = tx.serialize_to_vec();
    TestTransaction {
        txid: Txid::from_stacks_tx(&bytes).to_prefixed_hex(),
        raw_tx: format!("0x{}", hex::encode(&bytes)),
        sender: tx.origin_address().unwrap().to_string(),
    }
}

pub fn generate_test_token_transfer(signer: u8, nonce: u64, amount: u64) -> TestTransaction {
    build(
        standard_auth(signer, nonce),
        TransactionPayload::TokenTransfer(
            PrincipalData::Standard(StandardPrincipalData::from(
                StacksAddress::new(26, Hash160([0x22; 20])).unwrap(),
            )),
            amount,
            TokenTransferMemo([0u8; 34]),
        ),
    )
}

pub fn generate_test_contract_deploy(signer: u8, name: &str, code: &str) -> TestTransaction {
    build(
        standard_auth(signer, 0),
        TransactionPayload::SmartContract(
            TransactionSmartContract {
                name: ContractName::from(name),
                code_body: StacksString::from_str(code),
            },
            Some(ClarityVersion::Clarity2),
        ),
    )
}

/// Call on a boot contract (`ST000000000000000000002AMW42H.<contract>`)
pub fn generate_test_boot_contract_call(
    signer: u8,
    contract: &str,
    function: &str,
    args: Vec<Value>,
) -> TestTransaction {
    build(
        standard_auth(signer, 0),
        TransactionPayload::ContractCall(TransactionContractCall {
            address: StacksAddress::new(26, Hash160([0; 20])).unwrap(),
            contract_name: ContractName::from(contract),
            function_name: ClarityName::from(function),
            function_args: args,
        }),
    )
}
