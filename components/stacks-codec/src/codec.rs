use std::io::{Read, Write};
use std::{fmt, io};

use clarity::address::{
    C32_ADDRESS_VERSION_MAINNET_MULTISIG, C32_ADDRESS_VERSION_MAINNET_SINGLESIG,
    C32_ADDRESS_VERSION_TESTNET_MULTISIG, C32_ADDRESS_VERSION_TESTNET_SINGLESIG,
};
use clarity::codec::{read_next, read_next_at_most, read_next_exact, write_next};
use clarity::types::chainstate::{BlockHeaderHash, ConsensusHash, StacksAddress, StacksBlockId};
use clarity::util::hash::{Hash160, Sha512Trunc256Sum};
use clarity::util::secp256k1::MessageSignature;
use clarity::util::vrf::VRFProof;
use clarity::vm::types::{OptionalData, PrincipalData, Value};
use clarity::vm::{ClarityName, ClarityVersion, ContractName};
use serde::{Deserialize, Serialize};

pub use clarity::codec::{Error as CodecError, StacksMessageCodec};

pub const MAX_BLOCK_LEN: u32 = 2 * 1024 * 1024;
pub const MAX_TRANSACTION_LEN: u32 = MAX_BLOCK_LEN;

/// Bit vector of at most `MAX_SIZE` entries. Nakamoto blocks carry one to
/// record which signers took part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitVec<const MAX_SIZE: u16> {
    data: Vec<u8>,
    len: u16,
}

impl<const MAX_SIZE: u16> StacksMessageCodec for BitVec<MAX_SIZE> {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.len)?;
        write_next(fd, &self.data)
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<Self, CodecError> {
        let len: u16 = read_next(fd)?;
        if len == 0 {
            return Err(CodecError::DeserializeError(
                "BitVec lengths must be positive".to_string(),
            ));
        }
        if len > MAX_SIZE {
            return Err(CodecError::DeserializeError(format!(
                "BitVec length exceeded maximum. Max size = {MAX_SIZE}, len = {len}"
            )));
        }
        let data = read_next_exact::<_, u8>(fd, Self::data_len(len).into())?;
        Ok(BitVec { data, len })
    }
}

impl<const MAX_SIZE: u16> BitVec<MAX_SIZE> {
    /// Return the number of bytes needed to store `len` bits.
    fn data_len(len: u16) -> u16 {
        len / 8 + if len % 8 == 0 { 0 } else { 1 }
    }

    pub fn len(&self) -> u16 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: u16) -> Option<bool> {
        if i >= self.len {
            return None;
        }
        let byte = self.data.get(usize::from(i / 8))?;
        Some(byte & (1 << (i % 8)) != 0)
    }

    /// Decodes a hex encoded (optionally `0x` prefixed) bit vector
    pub fn from_hex(input: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(input.strip_prefix("0x").unwrap_or(input))
            .map_err(|e| CodecError::DeserializeError(format!("invalid bitvec hex: {}", e)))?;
        let mut cursor = io::Cursor::new(&bytes[..]);
        let bitvec = Self::consensus_deserialize(&mut cursor)?;
        if cursor.position() as usize != bytes.len() {
            return Err(CodecError::DeserializeError(
                "trailing bytes after bitvec".into(),
            ));
        }
        Ok(bitvec)
    }

    /// `'1'`/`'0'` per bit, in index order
    pub fn to_bit_string(&self) -> String {
        (0..self.len)
            .map(|i| match self.get(i) {
                Some(true) => '1',
                _ => '0',
            })
            .collect()
    }
}

/// Signer bitvec of a Nakamoto block header
pub type SignerBitVec = BitVec<4000>;

/// Decodes a consensus serialized Clarity value from (optionally `0x` prefixed) hex
pub fn value_from_hex(input: &str) -> Result<Value, CodecError> {
    let bytes = hex::decode(input.strip_prefix("0x").unwrap_or(input))
        .map_err(|e| CodecError::DeserializeError(format!("invalid clarity value hex: {}", e)))?;
    <Value as StacksMessageCodec>::consensus_deserialize(&mut io::Cursor::new(&bytes))
}

/// `0x` prefixed hex of the consensus serialization of `value`
pub fn value_to_hex(value: &Value) -> Result<String, CodecError> {
    let mut bytes = vec![];
    <Value as StacksMessageCodec>::consensus_serialize(value, &mut bytes)?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Raw bytes of a Stacks string (contract source code): u32 length prefix
#[derive(Clone, PartialEq, Eq)]
pub struct StacksString(pub Vec<u8>);

impl StacksString {
    pub fn from_str(s: &str) -> StacksString {
        StacksString(s.as_bytes().to_vec())
    }
}

impl fmt::Display for StacksString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for StacksString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl StacksMessageCodec for StacksString {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.0)
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<StacksString, CodecError> {
        let bytes: Vec<u8> = read_next_at_most(fd, MAX_TRANSACTION_LEN)?;
        Ok(StacksString(bytes))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StacksPublicKeyBuffer(pub [u8; 33]);
impl_byte_array_newtype!(StacksPublicKeyBuffer, 33);
impl_array_hexstring_fmt!(StacksPublicKeyBuffer);
impl_byte_array_message_codec!(StacksPublicKeyBuffer, 33);

/// A coinbase commits to 32 bytes of control-plane information
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CoinbasePayload(pub [u8; 32]);
impl_byte_array_newtype!(CoinbasePayload, 32);
impl_array_hexstring_fmt!(CoinbasePayload);
impl_byte_array_message_codec!(CoinbasePayload, 32);

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenTransferMemo(pub [u8; 34]); // same length as it is in stacks v1
impl_byte_array_newtype!(TokenTransferMemo, 34);
impl_array_hexstring_fmt!(TokenTransferMemo);
impl_byte_array_message_codec!(TokenTransferMemo, 34);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Txid(pub [u8; 32]);
impl_byte_array_newtype!(Txid, 32);
impl_array_hexstring_fmt!(Txid);

impl Txid {
    /// A Stacks transaction ID is a sha512/256 hash (not a double-sha256 hash)
    pub fn from_stacks_tx(txdata: &[u8]) -> Txid {
        Txid(Sha512Trunc256Sum::from_data(txdata).0)
    }

    /// `0x`-prefixed hex, the form used by the node's event payloads
    pub fn to_prefixed_hex(&self) -> String {
        format!("0x{}", self.to_hex())
    }
}

/// How a transaction may be appended to the Stacks blockchain
#[repr(u8)]
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum TransactionAnchorMode {
    OnChainOnly = 1,  // must be included in a StacksBlock
    OffChainOnly = 2, // must be included in a StacksMicroBlock
    Any = 3,          // either
}

impl TransactionAnchorMode {
    pub fn from_u8(n: u8) -> Option<TransactionAnchorMode> {
        match n {
            1 => Some(TransactionAnchorMode::OnChainOnly),
            2 => Some(TransactionAnchorMode::OffChainOnly),
            3 => Some(TransactionAnchorMode::Any),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum TransactionAuthFlags {
    AuthStandard = 0x04,
    AuthSponsored = 0x05,
}

#[repr(u8)]
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum TransactionAuthFieldID {
    PublicKeyCompressed = 0x00,
    PublicKeyUncompressed = 0x01,
    SignatureCompressed = 0x02,
    SignatureUncompressed = 0x03,
}

#[repr(u8)]
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum TransactionPublicKeyEncoding {
    Compressed = 0x00,
    Uncompressed = 0x01,
}

impl TransactionPublicKeyEncoding {
    pub fn from_u8(n: u8) -> Option<TransactionPublicKeyEncoding> {
        match n {
            0x00 => Some(TransactionPublicKeyEncoding::Compressed),
            0x01 => Some(TransactionPublicKeyEncoding::Uncompressed),
            _ => None,
        }
    }
}

/// An auth field is either a public key or a recoverable signature
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAuthField {
    PublicKey(TransactionPublicKeyEncoding, StacksPublicKeyBuffer),
    Signature(TransactionPublicKeyEncoding, MessageSignature),
}

impl TransactionAuthField {
    pub fn key_encoding(&self) -> TransactionPublicKeyEncoding {
        match self {
            TransactionAuthField::PublicKey(encoding, _)
            | TransactionAuthField::Signature(encoding, _) => *encoding,
        }
    }
}

define_u8_enum!(SinglesigHashMode {
    P2PKH = 0x00,
    P2WPKH = 0x02
});

define_u8_enum!(MultisigHashMode {
    P2SH = 0x01,
    P2WSH = 0x03
});

define_u8_enum!(OrderIndependentMultisigHashMode {
    P2SH = 0x05,
    P2WSH = 0x07
});

#[derive(Debug, Clone, PartialEq)]
pub struct SinglesigSpendingCondition {
    pub hash_mode: SinglesigHashMode,
    pub signer: Hash160,
    pub nonce: u64,  // nth authorization from this account
    pub tx_fee: u64, // microSTX/compute rate offered by this account
    pub key_encoding: TransactionPublicKeyEncoding,
    pub signature: MessageSignature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultisigSpendingCondition {
    pub hash_mode: MultisigHashMode,
    pub signer: Hash160,
    pub nonce: u64,
    pub tx_fee: u64,
    pub fields: Vec<TransactionAuthField>,
    pub signatures_required: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIndependentMultisigSpendingCondition {
    pub hash_mode: OrderIndependentMultisigHashMode,
    pub signer: Hash160,
    pub nonce: u64,
    pub tx_fee: u64,
    pub fields: Vec<TransactionAuthField>,
    pub signatures_required: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionSpendingCondition {
    Singlesig(SinglesigSpendingCondition),
    Multisig(MultisigSpendingCondition),
    OrderIndependentMultisig(OrderIndependentMultisigSpendingCondition),
}

impl TransactionSpendingCondition {
    pub fn signer(&self) -> &Hash160 {
        match self {
            TransactionSpendingCondition::Singlesig(data) => &data.signer,
            TransactionSpendingCondition::Multisig(data) => &data.signer,
            TransactionSpendingCondition::OrderIndependentMultisig(data) => &data.signer,
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            TransactionSpendingCondition::Singlesig(data) => data.nonce,
            TransactionSpendingCondition::Multisig(data) => data.nonce,
            TransactionSpendingCondition::OrderIndependentMultisig(data) => data.nonce,
        }
    }

    pub fn tx_fee(&self) -> u64 {
        match self {
            TransactionSpendingCondition::Singlesig(data) => data.tx_fee,
            TransactionSpendingCondition::Multisig(data) => data.tx_fee,
            TransactionSpendingCondition::OrderIndependentMultisig(data) => data.tx_fee,
        }
    }

    /// The account this condition authorizes, on the network implied by `version`
    pub fn address(&self, version: TransactionVersion) -> Result<StacksAddress, CodecError> {
        let mainnet = version == TransactionVersion::Mainnet;
        let address_version = match self {
            TransactionSpendingCondition::Singlesig(data) => {
                match (data.hash_mode, mainnet) {
                    (SinglesigHashMode::P2PKH, true) => C32_ADDRESS_VERSION_MAINNET_SINGLESIG,
                    (SinglesigHashMode::P2PKH, false) => C32_ADDRESS_VERSION_TESTNET_SINGLESIG,
                    (SinglesigHashMode::P2WPKH, true) => C32_ADDRESS_VERSION_MAINNET_MULTISIG,
                    (SinglesigHashMode::P2WPKH, false) => C32_ADDRESS_VERSION_TESTNET_MULTISIG,
                }
            }
            _ if mainnet => C32_ADDRESS_VERSION_MAINNET_MULTISIG,
            _ => C32_ADDRESS_VERSION_TESTNET_MULTISIG,
        };
        StacksAddress::new(address_version, *self.signer()).map_err(|_| {
            CodecError::DeserializeError(format!("invalid address version {}", address_version))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAuth {
    Standard(TransactionSpendingCondition),
    Sponsored(TransactionSpendingCondition, TransactionSpendingCondition), // the second account pays on behalf of the first account
}

impl TransactionAuth {
    pub fn origin(&self) -> &TransactionSpendingCondition {
        match self {
            TransactionAuth::Standard(origin) => origin,
            TransactionAuth::Sponsored(origin, _) => origin,
        }
    }

    pub fn sponsor(&self) -> Option<&TransactionSpendingCondition> {
        match self {
            TransactionAuth::Standard(_) => None,
            TransactionAuth::Sponsored(_, sponsor) => Some(sponsor),
        }
    }

    pub fn tx_fee(&self) -> u64 {
        match self {
            TransactionAuth::Standard(origin) => origin.tx_fee(),
            TransactionAuth::Sponsored(_, sponsor) => sponsor.tx_fee(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetInfo {
    pub contract_address: StacksAddress,
    pub contract_name: ContractName,
    pub asset_name: ClarityName,
}

#[repr(u8)]
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum AssetInfoID {
    STX = 0,
    FungibleAsset = 1,
    NonfungibleAsset = 2,
}

define_u8_enum!(FungibleConditionCode {
    SentEq = 0x01,
    SentGt = 0x02,
    SentGe = 0x03,
    SentLt = 0x04,
    SentLe = 0x05
});

define_u8_enum!(NonfungibleConditionCode {
    Sent = 0x10,
    NotSent = 0x11
});

#[derive(Debug, Clone, PartialEq)]
pub enum PostConditionPrincipal {
    Origin,
    Standard(StacksAddress),
    Contract(StacksAddress, ContractName),
}

#[repr(u8)]
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum PostConditionPrincipalID {
    Origin = 0x01,
    Standard = 0x02,
    Contract = 0x03,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionPostCondition {
    STX(PostConditionPrincipal, FungibleConditionCode, u64),
    Fungible(PostConditionPrincipal, AssetInfo, FungibleConditionCode, u64),
    Nonfungible(
        PostConditionPrincipal,
        AssetInfo,
        Value,
        NonfungibleConditionCode,
    ),
}

#[repr(u8)]
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum TransactionPostConditionMode {
    Allow = 0x01, // allow any other changes not specified
    Deny = 0x02,  // deny any other changes not specified
}

/// Stacks transaction versions
#[repr(u8)]
#[derive(Debug, Clone, PartialEq, Copy, Serialize, Deserialize)]
pub enum TransactionVersion {
    Mainnet = 0x00,
    Testnet = 0x80,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionContractCall {
    pub address: StacksAddress,
    pub contract_name: ContractName,
    pub function_name: ClarityName,
    pub function_args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionSmartContract {
    pub name: ContractName,
    pub code_body: StacksString,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StacksMicroblockHeader {
    pub version: u8,
    pub sequence: u16,
    pub prev_block: BlockHeaderHash,
    pub tx_merkle_root: Sha512Trunc256Sum,
    pub signature: MessageSignature,
}

/// Cause of change in mining tenure
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TenureChangeCause {
    /// A valid winning block-commit
    BlockFound = 0,
    /// The next burnchain block is taking too long, so extend the runtime budget
    Extended = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenureChangePayload {
    pub tenure_consensus_hash: ConsensusHash,
    pub prev_tenure_consensus_hash: ConsensusHash,
    pub burn_view_consensus_hash: ConsensusHash,
    pub previous_tenure_end: StacksBlockId,
    pub previous_tenure_blocks: u32,
    pub cause: TenureChangeCause,
    pub pubkey_hash: Hash160,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionPayload {
    TokenTransfer(PrincipalData, u64, TokenTransferMemo),
    ContractCall(TransactionContractCall),
    SmartContract(TransactionSmartContract, Option<ClarityVersion>),
    // the previous epoch leader sent two microblocks with the same sequence, and this is proof
    PoisonMicroblock(StacksMicroblockHeader, StacksMicroblockHeader),
    Coinbase(CoinbasePayload, Option<PrincipalData>, Option<VRFProof>),
    TenureChange(TenureChangePayload),
}

define_u8_enum!(TransactionPayloadID {
    TokenTransfer = 0,
    SmartContract = 1,
    ContractCall = 2,
    PoisonMicroblock = 3,
    Coinbase = 4,
    // has an alt principal, but no VRF proof
    CoinbaseToAltRecipient = 5,
    VersionedSmartContract = 6,
    TenureChange = 7,
    // has a VRF proof, and may have an alt principal
    NakamotoCoinbase = 8
});

impl TransactionPayload {
    /// Wire discriminant this payload was (or would be) encoded with
    pub fn payload_id(&self) -> TransactionPayloadID {
        match self {
            TransactionPayload::TokenTransfer(..) => TransactionPayloadID::TokenTransfer,
            TransactionPayload::ContractCall(..) => TransactionPayloadID::ContractCall,
            TransactionPayload::SmartContract(_, None) => TransactionPayloadID::SmartContract,
            TransactionPayload::SmartContract(_, Some(_)) => {
                TransactionPayloadID::VersionedSmartContract
            }
            TransactionPayload::PoisonMicroblock(..) => TransactionPayloadID::PoisonMicroblock,
            TransactionPayload::Coinbase(_, None, None) => TransactionPayloadID::Coinbase,
            TransactionPayload::Coinbase(_, Some(_), None) => {
                TransactionPayloadID::CoinbaseToAltRecipient
            }
            TransactionPayload::Coinbase(_, _, Some(_)) => TransactionPayloadID::NakamotoCoinbase,
            TransactionPayload::TenureChange(..) => TransactionPayloadID::TenureChange,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StacksTransaction {
    pub version: TransactionVersion,
    pub chain_id: u32,
    pub auth: TransactionAuth,
    pub anchor_mode: TransactionAnchorMode,
    pub post_condition_mode: TransactionPostConditionMode,
    pub post_conditions: Vec<TransactionPostCondition>,
    pub payload: TransactionPayload,
}

impl StacksTransaction {
    /// a txid of a stacks transaction is its sha512/256 hash
    pub fn txid(&self) -> Txid {
        Txid::from_stacks_tx(&self.serialize_to_vec())
    }

    pub fn origin_address(&self) -> Result<StacksAddress, CodecError> {
        self.auth.origin().address(self.version)
    }

    pub fn sponsor_address(&self) -> Result<Option<StacksAddress>, CodecError> {
        self.auth
            .sponsor()
            .map(|sponsor| sponsor.address(self.version))
            .transpose()
    }

    /// Decodes a full transaction, refusing trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<(StacksTransaction, Txid), CodecError> {
        if bytes.len() > MAX_TRANSACTION_LEN as usize {
            return Err(CodecError::OverflowError(format!(
                "Transaction too big ({} bytes)",
                bytes.len()
            )));
        }
        let mut cursor = io::Cursor::new(bytes);
        let tx = StacksTransaction::consensus_deserialize(&mut cursor)?;
        if (cursor.position() as usize) != bytes.len() {
            return Err(CodecError::DeserializeError(format!(
                "Failed to parse transaction: {} trailing bytes",
                bytes.len() - cursor.position() as usize
            )));
        }
        Ok((tx, Txid::from_stacks_tx(bytes)))
    }

    /// Same as `from_bytes`, for `0x`-prefixed (or bare) hex input
    pub fn from_hex(input: &str) -> Result<(StacksTransaction, Txid), CodecError> {
        let bytes = hex::decode(input.strip_prefix("0x").unwrap_or(input))
            .map_err(|e| CodecError::DeserializeError(format!("Invalid transaction hex: {}", e)))?;
        StacksTransaction::from_bytes(&bytes)
    }
}

impl StacksMessageCodec for TransactionAuthField {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        match self {
            TransactionAuthField::PublicKey(encoding, pubkey) => {
                let field_id = match encoding {
                    TransactionPublicKeyEncoding::Compressed => {
                        TransactionAuthFieldID::PublicKeyCompressed
                    }
                    TransactionPublicKeyEncoding::Uncompressed => {
                        TransactionAuthFieldID::PublicKeyUncompressed
                    }
                };
                write_next(fd, &(field_id as u8))?;
                write_next(fd, pubkey)?;
            }
            TransactionAuthField::Signature(encoding, sig) => {
                let field_id = match encoding {
                    TransactionPublicKeyEncoding::Compressed => {
                        TransactionAuthFieldID::SignatureCompressed
                    }
                    TransactionPublicKeyEncoding::Uncompressed => {
                        TransactionAuthFieldID::SignatureUncompressed
                    }
                };
                write_next(fd, &(field_id as u8))?;
                write_next(fd, sig)?;
            }
        }
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<TransactionAuthField, CodecError> {
        let field_id: u8 = read_next(fd)?;
        let field = match field_id {
            x if x == TransactionAuthFieldID::PublicKeyCompressed as u8 => {
                TransactionAuthField::PublicKey(
                    TransactionPublicKeyEncoding::Compressed,
                    read_next(fd)?,
                )
            }
            x if x == TransactionAuthFieldID::PublicKeyUncompressed as u8 => {
                TransactionAuthField::PublicKey(
                    TransactionPublicKeyEncoding::Uncompressed,
                    read_next(fd)?,
                )
            }
            x if x == TransactionAuthFieldID::SignatureCompressed as u8 => {
                TransactionAuthField::Signature(
                    TransactionPublicKeyEncoding::Compressed,
                    read_next(fd)?,
                )
            }
            x if x == TransactionAuthFieldID::SignatureUncompressed as u8 => {
                TransactionAuthField::Signature(
                    TransactionPublicKeyEncoding::Uncompressed,
                    read_next(fd)?,
                )
            }
            _ => {
                return Err(CodecError::DeserializeError(format!(
                    "Failed to parse auth field: unknown auth field ID {}",
                    field_id
                )));
            }
        };
        Ok(field)
    }
}

impl StacksMessageCodec for SinglesigSpendingCondition {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.hash_mode.to_u8())?;
        write_next(fd, &self.signer)?;
        write_next(fd, &self.nonce)?;
        write_next(fd, &self.tx_fee)?;
        write_next(fd, &(self.key_encoding as u8))?;
        write_next(fd, &self.signature)?;
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<SinglesigSpendingCondition, CodecError> {
        let hash_mode_u8: u8 = read_next(fd)?;
        let hash_mode = SinglesigHashMode::from_u8(hash_mode_u8).ok_or_else(|| {
            CodecError::DeserializeError(format!(
                "Failed to parse singlesig spending condition: unknown hash mode {}",
                hash_mode_u8
            ))
        })?;

        let signer: Hash160 = read_next(fd)?;
        let nonce: u64 = read_next(fd)?;
        let tx_fee: u64 = read_next(fd)?;

        let key_encoding_u8: u8 = read_next(fd)?;
        let key_encoding =
            TransactionPublicKeyEncoding::from_u8(key_encoding_u8).ok_or_else(|| {
                CodecError::DeserializeError(format!(
                    "Failed to parse singlesig spending condition: unknown key encoding {}",
                    key_encoding_u8
                ))
            })?;

        let signature: MessageSignature = read_next(fd)?;

        // must be compressed if we're using p2wpkh
        if hash_mode == SinglesigHashMode::P2WPKH
            && key_encoding != TransactionPublicKeyEncoding::Compressed
        {
            return Err(CodecError::DeserializeError(
                "Failed to parse singlesig spending condition: incompatible hash mode and key encoding"
                    .to_string(),
            ));
        }

        Ok(SinglesigSpendingCondition {
            hash_mode,
            signer,
            nonce,
            tx_fee,
            key_encoding,
            signature,
        })
    }
}

/// Counts signatures and flags uncompressed keys among multisig auth fields
fn inspect_auth_fields(fields: &[TransactionAuthField]) -> Result<(u16, bool), CodecError> {
    let mut num_sigs_given: u16 = 0;
    let mut have_uncompressed = false;
    for field in fields.iter() {
        if let TransactionAuthField::Signature(..) = field {
            num_sigs_given = num_sigs_given.checked_add(1).ok_or_else(|| {
                CodecError::DeserializeError(
                    "Failed to parse multisig spending condition: too many signatures".to_string(),
                )
            })?;
        }
        if field.key_encoding() == TransactionPublicKeyEncoding::Uncompressed {
            have_uncompressed = true;
        }
    }
    Ok((num_sigs_given, have_uncompressed))
}

impl StacksMessageCodec for MultisigSpendingCondition {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.hash_mode.to_u8())?;
        write_next(fd, &self.signer)?;
        write_next(fd, &self.nonce)?;
        write_next(fd, &self.tx_fee)?;
        write_next(fd, &self.fields)?;
        write_next(fd, &self.signatures_required)?;
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<MultisigSpendingCondition, CodecError> {
        let hash_mode_u8: u8 = read_next(fd)?;
        let hash_mode = MultisigHashMode::from_u8(hash_mode_u8).ok_or_else(|| {
            CodecError::DeserializeError(format!(
                "Failed to parse multisig spending condition: unknown hash mode {}",
                hash_mode_u8
            ))
        })?;

        let signer: Hash160 = read_next(fd)?;
        let nonce: u64 = read_next(fd)?;
        let tx_fee: u64 = read_next(fd)?;
        let fields: Vec<TransactionAuthField> = read_next_at_most(fd, u16::MAX as u32)?;
        let signatures_required: u16 = read_next(fd)?;

        let (num_sigs_given, have_uncompressed) = inspect_auth_fields(&fields)?;
        if num_sigs_given != signatures_required {
            return Err(CodecError::DeserializeError(format!(
                "Failed to parse multisig spending condition: got {} sigs, expected {}",
                num_sigs_given, signatures_required
            )));
        }
        if have_uncompressed && hash_mode == MultisigHashMode::P2WSH {
            return Err(CodecError::DeserializeError(
                "Failed to parse multisig spending condition: expected compressed keys only"
                    .to_string(),
            ));
        }

        Ok(MultisigSpendingCondition {
            hash_mode,
            signer,
            nonce,
            tx_fee,
            fields,
            signatures_required,
        })
    }
}

impl StacksMessageCodec for OrderIndependentMultisigSpendingCondition {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.hash_mode.to_u8())?;
        write_next(fd, &self.signer)?;
        write_next(fd, &self.nonce)?;
        write_next(fd, &self.tx_fee)?;
        write_next(fd, &self.fields)?;
        write_next(fd, &self.signatures_required)?;
        Ok(())
    }

    fn consensus_deserialize<R: Read>(
        fd: &mut R,
    ) -> Result<OrderIndependentMultisigSpendingCondition, CodecError> {
        let hash_mode_u8: u8 = read_next(fd)?;
        let hash_mode = OrderIndependentMultisigHashMode::from_u8(hash_mode_u8).ok_or_else(|| {
            CodecError::DeserializeError(format!(
                "Failed to parse order independent multisig spending condition: unknown hash mode {}",
                hash_mode_u8
            ))
        })?;

        let signer: Hash160 = read_next(fd)?;
        let nonce: u64 = read_next(fd)?;
        let tx_fee: u64 = read_next(fd)?;
        let fields: Vec<TransactionAuthField> = read_next_at_most(fd, u16::MAX as u32)?;
        let signatures_required: u16 = read_next(fd)?;

        let (num_sigs_given, have_uncompressed) = inspect_auth_fields(&fields)?;
        if num_sigs_given < signatures_required {
            return Err(CodecError::DeserializeError(format!(
                "Failed to parse order independent multisig spending condition: got {} sigs, expected at least {}",
                num_sigs_given, signatures_required
            )));
        }
        if have_uncompressed && hash_mode == OrderIndependentMultisigHashMode::P2WSH {
            return Err(CodecError::DeserializeError(
                "Failed to parse order independent multisig spending condition: expected compressed keys only"
                    .to_string(),
            ));
        }

        Ok(OrderIndependentMultisigSpendingCondition {
            hash_mode,
            signer,
            nonce,
            tx_fee,
            fields,
            signatures_required,
        })
    }
}

impl StacksMessageCodec for TransactionSpendingCondition {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        match self {
            TransactionSpendingCondition::Singlesig(data) => data.consensus_serialize(fd),
            TransactionSpendingCondition::Multisig(data) => data.consensus_serialize(fd),
            TransactionSpendingCondition::OrderIndependentMultisig(data) => {
                data.consensus_serialize(fd)
            }
        }
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<TransactionSpendingCondition, CodecError> {
        // peek the hash mode byte
        let hash_mode_u8: u8 = read_next(fd)?;
        let peek_buf = [hash_mode_u8];
        let mut rrd = (&peek_buf[..]).chain(fd);
        let cond = if SinglesigHashMode::from_u8(hash_mode_u8).is_some() {
            TransactionSpendingCondition::Singlesig(
                SinglesigSpendingCondition::consensus_deserialize(&mut rrd)?,
            )
        } else if MultisigHashMode::from_u8(hash_mode_u8).is_some() {
            TransactionSpendingCondition::Multisig(
                MultisigSpendingCondition::consensus_deserialize(&mut rrd)?,
            )
        } else if OrderIndependentMultisigHashMode::from_u8(hash_mode_u8).is_some() {
            TransactionSpendingCondition::OrderIndependentMultisig(
                OrderIndependentMultisigSpendingCondition::consensus_deserialize(&mut rrd)?,
            )
        } else {
            return Err(CodecError::DeserializeError(format!(
                "Failed to parse spending condition: invalid hash mode {}",
                hash_mode_u8
            )));
        };
        Ok(cond)
    }
}

impl StacksMessageCodec for TransactionAuth {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        match self {
            TransactionAuth::Standard(origin_condition) => {
                write_next(fd, &(TransactionAuthFlags::AuthStandard as u8))?;
                write_next(fd, origin_condition)?;
            }
            TransactionAuth::Sponsored(origin_condition, sponsor_condition) => {
                write_next(fd, &(TransactionAuthFlags::AuthSponsored as u8))?;
                write_next(fd, origin_condition)?;
                write_next(fd, sponsor_condition)?;
            }
        }
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<TransactionAuth, CodecError> {
        let type_id: u8 = read_next(fd)?;
        let auth = match type_id {
            x if x == TransactionAuthFlags::AuthStandard as u8 => {
                TransactionAuth::Standard(read_next(fd)?)
            }
            x if x == TransactionAuthFlags::AuthSponsored as u8 => {
                let origin_auth: TransactionSpendingCondition = read_next(fd)?;
                let sponsor_auth: TransactionSpendingCondition = read_next(fd)?;
                TransactionAuth::Sponsored(origin_auth, sponsor_auth)
            }
            _ => {
                return Err(CodecError::DeserializeError(format!(
                    "Failed to parse transaction authorization: unrecognized auth flags {}",
                    type_id
                )));
            }
        };
        Ok(auth)
    }
}

impl StacksMessageCodec for AssetInfo {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.contract_address)?;
        write_next(fd, &self.contract_name)?;
        write_next(fd, &self.asset_name)?;
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<AssetInfo, CodecError> {
        Ok(AssetInfo {
            contract_address: read_next(fd)?,
            contract_name: read_next(fd)?,
            asset_name: read_next(fd)?,
        })
    }
}

impl StacksMessageCodec for PostConditionPrincipal {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        match self {
            PostConditionPrincipal::Origin => {
                write_next(fd, &(PostConditionPrincipalID::Origin as u8))?;
            }
            PostConditionPrincipal::Standard(address) => {
                write_next(fd, &(PostConditionPrincipalID::Standard as u8))?;
                write_next(fd, address)?;
            }
            PostConditionPrincipal::Contract(address, contract_name) => {
                write_next(fd, &(PostConditionPrincipalID::Contract as u8))?;
                write_next(fd, address)?;
                write_next(fd, contract_name)?;
            }
        }
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<PostConditionPrincipal, CodecError> {
        let principal_id: u8 = read_next(fd)?;
        let principal = match principal_id {
            x if x == PostConditionPrincipalID::Origin as u8 => PostConditionPrincipal::Origin,
            x if x == PostConditionPrincipalID::Standard as u8 => {
                PostConditionPrincipal::Standard(read_next(fd)?)
            }
            x if x == PostConditionPrincipalID::Contract as u8 => {
                let addr: StacksAddress = read_next(fd)?;
                let contract_name: ContractName = read_next(fd)?;
                PostConditionPrincipal::Contract(addr, contract_name)
            }
            _ => {
                return Err(CodecError::DeserializeError(format!(
                    "Failed to parse transaction: unknown post condition principal ID {}",
                    principal_id
                )));
            }
        };
        Ok(principal)
    }
}

fn read_fungible_condition_code<R: Read>(fd: &mut R) -> Result<FungibleConditionCode, CodecError> {
    let condition_u8: u8 = read_next(fd)?;
    FungibleConditionCode::from_u8(condition_u8).ok_or_else(|| {
        CodecError::DeserializeError(format!(
            "Failed to parse transaction: Failed to parse fungible condition code {}",
            condition_u8
        ))
    })
}

impl StacksMessageCodec for TransactionPostCondition {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        match self {
            TransactionPostCondition::STX(principal, fungible_condition, amount) => {
                write_next(fd, &(AssetInfoID::STX as u8))?;
                write_next(fd, principal)?;
                write_next(fd, &fungible_condition.to_u8())?;
                write_next(fd, amount)?;
            }
            TransactionPostCondition::Fungible(principal, asset_info, fungible_condition, amount) => {
                write_next(fd, &(AssetInfoID::FungibleAsset as u8))?;
                write_next(fd, principal)?;
                write_next(fd, asset_info)?;
                write_next(fd, &fungible_condition.to_u8())?;
                write_next(fd, amount)?;
            }
            TransactionPostCondition::Nonfungible(
                principal,
                asset_info,
                asset_value,
                nonfungible_condition,
            ) => {
                write_next(fd, &(AssetInfoID::NonfungibleAsset as u8))?;
                write_next(fd, principal)?;
                write_next(fd, asset_info)?;
                write_next(fd, asset_value)?;
                write_next(fd, &nonfungible_condition.to_u8())?;
            }
        };
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<TransactionPostCondition, CodecError> {
        let asset_info_id: u8 = read_next(fd)?;
        let postcond = match asset_info_id {
            x if x == AssetInfoID::STX as u8 => {
                let principal: PostConditionPrincipal = read_next(fd)?;
                let condition_code = read_fungible_condition_code(fd)?;
                let amount: u64 = read_next(fd)?;
                TransactionPostCondition::STX(principal, condition_code, amount)
            }
            x if x == AssetInfoID::FungibleAsset as u8 => {
                let principal: PostConditionPrincipal = read_next(fd)?;
                let asset: AssetInfo = read_next(fd)?;
                let condition_code = read_fungible_condition_code(fd)?;
                let amount: u64 = read_next(fd)?;
                TransactionPostCondition::Fungible(principal, asset, condition_code, amount)
            }
            x if x == AssetInfoID::NonfungibleAsset as u8 => {
                let principal: PostConditionPrincipal = read_next(fd)?;
                let asset: AssetInfo = read_next(fd)?;
                let asset_value: Value = read_next(fd)?;
                let condition_u8: u8 = read_next(fd)?;
                let condition_code =
                    NonfungibleConditionCode::from_u8(condition_u8).ok_or_else(|| {
                        CodecError::DeserializeError(format!(
                            "Failed to parse transaction: Failed to parse NonfungibleAsset condition code {}",
                            condition_u8
                        ))
                    })?;
                TransactionPostCondition::Nonfungible(principal, asset, asset_value, condition_code)
            }
            _ => {
                return Err(CodecError::DeserializeError(format!(
                    "Failed to parse transaction: unknown asset info ID {}",
                    asset_info_id
                )));
            }
        };
        Ok(postcond)
    }
}

impl StacksMessageCodec for TransactionContractCall {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.address)?;
        write_next(fd, &self.contract_name)?;
        write_next(fd, &self.function_name)?;
        write_next(fd, &self.function_args)?;
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<TransactionContractCall, CodecError> {
        let address: StacksAddress = read_next(fd)?;
        let contract_name: ContractName = read_next(fd)?;
        let function_name: ClarityName = read_next(fd)?;
        let function_args: Vec<Value> = read_next_at_most(fd, MAX_TRANSACTION_LEN)?;
        Ok(TransactionContractCall {
            address,
            contract_name,
            function_name,
            function_args,
        })
    }
}

impl StacksMessageCodec for TransactionSmartContract {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.name)?;
        write_next(fd, &self.code_body)?;
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<TransactionSmartContract, CodecError> {
        Ok(TransactionSmartContract {
            name: read_next(fd)?,
            code_body: read_next(fd)?,
        })
    }
}

impl StacksMessageCodec for StacksMicroblockHeader {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.version)?;
        write_next(fd, &self.sequence)?;
        write_next(fd, &self.prev_block)?;
        write_next(fd, &self.tx_merkle_root)?;
        write_next(fd, &self.signature)?;
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<StacksMicroblockHeader, CodecError> {
        Ok(StacksMicroblockHeader {
            version: read_next(fd)?,
            sequence: read_next(fd)?,
            prev_block: read_next(fd)?,
            tx_merkle_root: read_next(fd)?,
            signature: read_next(fd)?,
        })
    }
}

impl StacksMessageCodec for TenureChangePayload {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.tenure_consensus_hash)?;
        write_next(fd, &self.prev_tenure_consensus_hash)?;
        write_next(fd, &self.burn_view_consensus_hash)?;
        write_next(fd, &self.previous_tenure_end)?;
        write_next(fd, &self.previous_tenure_blocks)?;
        write_next(fd, &(self.cause as u8))?;
        write_next(fd, &self.pubkey_hash)
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<Self, CodecError> {
        let tenure_consensus_hash = read_next(fd)?;
        let prev_tenure_consensus_hash = read_next(fd)?;
        let burn_view_consensus_hash = read_next(fd)?;
        let previous_tenure_end = read_next(fd)?;
        let previous_tenure_blocks = read_next(fd)?;
        let cause_u8: u8 = read_next(fd)?;
        let cause = match cause_u8 {
            0 => TenureChangeCause::BlockFound,
            1 => TenureChangeCause::Extended,
            _ => {
                return Err(CodecError::DeserializeError(format!(
                    "Unrecognized TenureChangeCause byte {}",
                    cause_u8
                )))
            }
        };
        Ok(Self {
            tenure_consensus_hash,
            prev_tenure_consensus_hash,
            burn_view_consensus_hash,
            previous_tenure_end,
            previous_tenure_blocks,
            cause,
            pubkey_hash: read_next(fd)?,
        })
    }
}

/// Wire byte of a Clarity version, `None` for versions this codec predates
#[allow(unreachable_patterns)]
pub fn clarity_version_to_u8(version: &ClarityVersion) -> Option<u8> {
    match version {
        ClarityVersion::Clarity1 => Some(1),
        ClarityVersion::Clarity2 => Some(2),
        ClarityVersion::Clarity3 => Some(3),
        _ => None,
    }
}

fn clarity_version_consensus_serialize<W: Write>(
    version: &ClarityVersion,
    fd: &mut W,
) -> Result<(), CodecError> {
    let version_byte = clarity_version_to_u8(version).ok_or_else(|| {
        CodecError::SerializeError(format!("Unsupported ClarityVersion {:?}", version))
    })?;
    write_next(fd, &version_byte)
}

fn clarity_version_consensus_deserialize<R: Read>(
    fd: &mut R,
) -> Result<ClarityVersion, CodecError> {
    let version_byte: u8 = read_next(fd)?;
    match version_byte {
        1u8 => Ok(ClarityVersion::Clarity1),
        2u8 => Ok(ClarityVersion::Clarity2),
        3u8 => Ok(ClarityVersion::Clarity3),
        _ => Err(CodecError::DeserializeError(format!(
            "Unrecognized ClarityVersion byte {}",
            version_byte
        ))),
    }
}

impl StacksMessageCodec for TransactionPayload {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &self.payload_id().to_u8())?;
        match self {
            TransactionPayload::TokenTransfer(address, amount, memo) => {
                write_next(fd, &Value::Principal(address.clone()))?;
                write_next(fd, amount)?;
                write_next(fd, memo)?;
            }
            TransactionPayload::ContractCall(cc) => {
                cc.consensus_serialize(fd)?;
            }
            TransactionPayload::SmartContract(sc, version_opt) => {
                if let Some(version) = version_opt {
                    clarity_version_consensus_serialize(version, fd)?;
                }
                sc.consensus_serialize(fd)?;
            }
            TransactionPayload::PoisonMicroblock(h1, h2) => {
                h1.consensus_serialize(fd)?;
                h2.consensus_serialize(fd)?;
            }
            TransactionPayload::Coinbase(buf, recipient_opt, vrf_opt) => {
                write_next(fd, buf)?;
                match (recipient_opt, vrf_opt) {
                    (None, None) => {}
                    (Some(recipient), None) => {
                        write_next(fd, &Value::Principal(recipient.clone()))?;
                    }
                    (recipient_opt, Some(vrf_proof)) => {
                        let recipient = Value::Optional(OptionalData {
                            data: recipient_opt
                                .as_ref()
                                .map(|recipient| Box::new(Value::Principal(recipient.clone()))),
                        });
                        write_next(fd, &recipient)?;
                        write_next(fd, vrf_proof)?;
                    }
                }
            }
            TransactionPayload::TenureChange(tc) => {
                tc.consensus_serialize(fd)?;
            }
        }
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<TransactionPayload, CodecError> {
        let type_id_u8 = read_next(fd)?;
        let type_id = TransactionPayloadID::from_u8(type_id_u8).ok_or_else(|| {
            CodecError::DeserializeError(format!(
                "Failed to parse transaction -- unknown payload ID {}",
                type_id_u8
            ))
        })?;
        let payload = match type_id {
            TransactionPayloadID::TokenTransfer => {
                let principal = match read_next::<Value, _>(fd)? {
                    Value::Principal(principal) => principal,
                    _ => {
                        return Err(CodecError::DeserializeError(
                            "Failed to parse token transfer -- recipient is not a principal"
                                .to_string(),
                        ))
                    }
                };
                let amount = read_next(fd)?;
                let memo = read_next(fd)?;
                TransactionPayload::TokenTransfer(principal, amount, memo)
            }
            TransactionPayloadID::ContractCall => TransactionPayload::ContractCall(read_next(fd)?),
            TransactionPayloadID::SmartContract => {
                TransactionPayload::SmartContract(read_next(fd)?, None)
            }
            TransactionPayloadID::VersionedSmartContract => {
                let version = clarity_version_consensus_deserialize(fd)?;
                TransactionPayload::SmartContract(read_next(fd)?, Some(version))
            }
            TransactionPayloadID::PoisonMicroblock => {
                let h1: StacksMicroblockHeader = read_next(fd)?;
                let h2: StacksMicroblockHeader = read_next(fd)?;

                // must differ in some field
                if h1 == h2 {
                    return Err(CodecError::DeserializeError(
                        "Failed to parse transaction -- microblock headers match".to_string(),
                    ));
                }

                // must have the same sequence number or same block parent
                if h1.sequence != h2.sequence && h1.prev_block != h2.prev_block {
                    return Err(CodecError::DeserializeError(
                        "Failed to parse transaction -- microblock headers do not identify a fork"
                            .to_string(),
                    ));
                }

                TransactionPayload::PoisonMicroblock(h1, h2)
            }
            TransactionPayloadID::Coinbase => {
                TransactionPayload::Coinbase(read_next(fd)?, None, None)
            }
            TransactionPayloadID::CoinbaseToAltRecipient => {
                let payload: CoinbasePayload = read_next(fd)?;
                let recipient = match read_next::<Value, _>(fd)? {
                    Value::Principal(recipient_principal) => recipient_principal,
                    _ => {
                        return Err(CodecError::DeserializeError("Failed to parse coinbase transaction -- did not receive a recipient principal value".to_string()));
                    }
                };
                TransactionPayload::Coinbase(payload, Some(recipient), None)
            }
            TransactionPayloadID::NakamotoCoinbase => {
                let payload: CoinbasePayload = read_next(fd)?;
                let recipient_opt = match read_next::<Value, _>(fd)? {
                    Value::Optional(OptionalData { data: None }) => None,
                    Value::Optional(OptionalData { data: Some(inner) }) => match *inner {
                        Value::Principal(recipient_principal) => Some(recipient_principal),
                        _ => None,
                    },
                    _ => {
                        return Err(CodecError::DeserializeError("Failed to parse nakamoto coinbase transaction -- did not receive an optional recipient principal value".to_string()));
                    }
                };
                let vrf_proof: VRFProof = read_next(fd)?;
                TransactionPayload::Coinbase(payload, recipient_opt, Some(vrf_proof))
            }
            TransactionPayloadID::TenureChange => TransactionPayload::TenureChange(read_next(fd)?),
        };

        Ok(payload)
    }
}

impl StacksMessageCodec for StacksTransaction {
    fn consensus_serialize<W: Write>(&self, fd: &mut W) -> Result<(), CodecError> {
        write_next(fd, &(self.version as u8))?;
        write_next(fd, &self.chain_id)?;
        write_next(fd, &self.auth)?;
        write_next(fd, &(self.anchor_mode as u8))?;
        write_next(fd, &(self.post_condition_mode as u8))?;
        write_next(fd, &self.post_conditions)?;
        write_next(fd, &self.payload)?;
        Ok(())
    }

    fn consensus_deserialize<R: Read>(fd: &mut R) -> Result<StacksTransaction, CodecError> {
        let version_u8: u8 = read_next(fd)?;
        let chain_id: u32 = read_next(fd)?;
        let auth: TransactionAuth = read_next(fd)?;
        let anchor_mode_u8: u8 = read_next(fd)?;
        let post_condition_mode_u8: u8 = read_next(fd)?;
        let post_conditions: Vec<TransactionPostCondition> =
            read_next_at_most(fd, MAX_TRANSACTION_LEN)?;
        let payload: TransactionPayload = read_next(fd)?;

        let version = if (version_u8 & 0x80) == 0 {
            TransactionVersion::Mainnet
        } else {
            TransactionVersion::Testnet
        };

        let anchor_mode = TransactionAnchorMode::from_u8(anchor_mode_u8).ok_or_else(|| {
            CodecError::DeserializeError(format!(
                "Failed to parse transaction: invalid anchor mode {}",
                anchor_mode_u8
            ))
        })?;

        // if the payload is a proof of a poisoned microblock stream, or is a coinbase, then this
        // _must_ be anchored.
        match payload {
            TransactionPayload::PoisonMicroblock(..) | TransactionPayload::Coinbase(..) => {
                if anchor_mode != TransactionAnchorMode::OnChainOnly {
                    return Err(CodecError::DeserializeError(
                        "Failed to parse transaction: invalid anchor mode for Coinbase or PoisonMicroblock".to_string(),
                    ));
                }
            }
            _ => {}
        }

        let post_condition_mode = match post_condition_mode_u8 {
            x if x == TransactionPostConditionMode::Allow as u8 => {
                TransactionPostConditionMode::Allow
            }
            x if x == TransactionPostConditionMode::Deny as u8 => {
                TransactionPostConditionMode::Deny
            }
            _ => {
                return Err(CodecError::DeserializeError(format!(
                    "Failed to parse transaction: invalid post-condition mode {}",
                    post_condition_mode_u8
                )));
            }
        };

        Ok(StacksTransaction {
            version,
            chain_id,
            auth,
            anchor_mode,
            post_condition_mode,
            post_conditions,
            payload,
        })
    }
}
