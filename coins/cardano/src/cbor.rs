//! Typed CBOR model of the transaction pieces the engine reads and writes
//!
//! Each type implements `minicbor::Encode`/`Decode` by hand so the byte layout
//! is explicit. Encoding is always minimal-length and definite, which keeps
//! sizes measured on encoded bytes stable across a round trip.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use minicbor::data::{Tag, Type};
use minicbor::decode::Error as DecodeError;
use minicbor::encode::{Error as EncodeError, Write};
use minicbor::{Decode, Decoder, Encode, Encoder};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::address::{Credential, KeyHash};
use crate::error::{ConstructionError, Result};

pub type Hash32 = [u8; 32];

/// Coin amounts are plain unsigned lovelace
pub type Coin = u64;

const TAG_RATIONAL: u64 = 30;
const TAG_SET: u64 = 258;
const TAG_ALONZO_AUX: u64 = 259;

/// Blake2b-256, used for transaction ids and auxiliary data hashes
pub fn blake2b_256(data: &[u8]) -> Hash32 {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Bytes taken by the CBOR head of an unsigned integer
pub fn cbor_uint_len(value: u64) -> usize {
    match value {
        0..=23 => 1,
        24..=0xFF => 2,
        0x100..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Encode any value with the unit context
pub fn to_vec<T: Encode<()>>(value: &T) -> Result<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

/// Decode a value that must span the whole input
pub fn from_slice<'b, T: Decode<'b, ()>>(bytes: &'b [u8]) -> Result<T> {
    let mut d = Decoder::new(bytes);
    let value = d.decode()?;
    if d.position() != bytes.len() {
        return Err(ConstructionError::GeneralDeserializationError(format!(
            "trailing bytes at offset {}",
            d.position()
        )));
    }
    Ok(value)
}

fn fixed<const N: usize>(d: &mut Decoder<'_>, what: &str) -> std::result::Result<[u8; N], DecodeError> {
    let pos = d.position();
    d.bytes()?
        .try_into()
        .map_err(|_| DecodeError::message(format!("{} must be {} bytes", what, N)).at(pos))
}

fn definite_array(d: &mut Decoder<'_>) -> std::result::Result<u64, DecodeError> {
    let pos = d.position();
    d.array()?
        .ok_or_else(|| DecodeError::message("indefinite arrays are not supported").at(pos))
}

fn definite_map(d: &mut Decoder<'_>) -> std::result::Result<u64, DecodeError> {
    let pos = d.position();
    d.map()?
        .ok_or_else(|| DecodeError::message("indefinite maps are not supported").at(pos))
}

/// Array that may carry the set tag introduced by later eras
fn set_len(d: &mut Decoder<'_>) -> std::result::Result<u64, DecodeError> {
    if d.datatype()? == Type::Tag {
        let pos = d.position();
        if d.tag()? != Tag::new(TAG_SET) {
            return Err(DecodeError::message("unexpected tag").at(pos));
        }
    }
    definite_array(d)
}

fn decode_vec<'b, C, T: Decode<'b, C>>(
    d: &mut Decoder<'b>,
    ctx: &mut C,
) -> std::result::Result<Vec<T>, DecodeError> {
    let len = set_len(d)?;
    (0..len).map(|_| d.decode_with(ctx)).collect()
}

fn encode_slice<C, T: Encode<C>, W: Write>(
    items: &[T],
    e: &mut Encoder<W>,
    ctx: &mut C,
) -> std::result::Result<(), EncodeError<W::Error>> {
    e.array(items.len() as u64)?;
    for item in items {
        e.encode_with(item, ctx)?;
    }
    Ok(())
}

fn optional_null<'b, T>(
    d: &mut Decoder<'b>,
    f: impl FnOnce(&mut Decoder<'b>) -> std::result::Result<T, DecodeError>,
) -> std::result::Result<Option<T>, DecodeError> {
    if d.datatype()? == Type::Null {
        d.null()?;
        Ok(None)
    } else {
        f(d).map(Some)
    }
}

// ============================================================================
// Inputs, outputs and values
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionInput {
    pub transaction_id: Hash32,
    pub index: u64,
}

impl<C> Encode<C> for TransactionInput {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, _ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        e.array(2)?.bytes(&self.transaction_id)?.u64(self.index)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for TransactionInput {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        definite_array(d)?;
        Ok(Self {
            transaction_id: fixed(d, "transaction id")?,
            index: d.u64()?,
        })
    }
}

/// Asset names sort the way canonical CBOR sorts byte string keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetName(pub Vec<u8>);

impl Ord for AssetName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for AssetName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub type MultiAsset = BTreeMap<KeyHash, BTreeMap<AssetName, u64>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub coin: Coin,
    pub assets: MultiAsset,
}

impl Value {
    pub fn coin(coin: Coin) -> Self {
        Self {
            coin,
            assets: MultiAsset::new(),
        }
    }
}

impl<C> Encode<C> for Value {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, _ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        if self.assets.is_empty() {
            e.u64(self.coin)?;
            return Ok(());
        }
        e.array(2)?.u64(self.coin)?;
        e.map(self.assets.len() as u64)?;
        for (policy, tokens) in &self.assets {
            e.bytes(policy)?.map(tokens.len() as u64)?;
            for (name, quantity) in tokens {
                e.bytes(&name.0)?.u64(*quantity)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for Value {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        if d.datatype()? != Type::Array {
            return Ok(Value::coin(d.u64()?));
        }
        definite_array(d)?;
        let coin = d.u64()?;
        let mut assets = MultiAsset::new();
        for _ in 0..definite_map(d)? {
            let policy: KeyHash = fixed(d, "policy id")?;
            let mut tokens = BTreeMap::new();
            for _ in 0..definite_map(d)? {
                let name = AssetName(d.bytes()?.to_vec());
                tokens.insert(name, d.u64()?);
            }
            assets.insert(policy, tokens);
        }
        Ok(Value { coin, assets })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub address: Vec<u8>,
    pub amount: Value,
}

impl<C> Encode<C> for TransactionOutput {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        e.array(2)?.bytes(&self.address)?;
        e.encode_with(&self.amount, ctx)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for TransactionOutput {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        if d.datatype()? == Type::Map {
            // Post-Alonzo map form, datum and script fields are ignored
            let mut address = None;
            let mut amount = None;
            for _ in 0..definite_map(d)? {
                match d.u64()? {
                    0 => address = Some(d.bytes()?.to_vec()),
                    1 => amount = Some(d.decode_with(ctx)?),
                    _ => d.skip()?,
                }
            }
            let pos = d.position();
            return match (address, amount) {
                (Some(address), Some(amount)) => Ok(Self { address, amount }),
                _ => Err(DecodeError::message("output without address or value").at(pos)),
            };
        }

        let len = definite_array(d)?;
        let address = d.bytes()?.to_vec();
        let amount = d.decode_with(ctx)?;
        for _ in 2..len {
            d.skip()?;
        }
        Ok(Self { address, amount })
    }
}

// ============================================================================
// Certificates
// ============================================================================

impl<C> Encode<C> for Credential {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, _ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        e.array(2)?.u8(self.is_script() as u8)?.bytes(self.hash())?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for Credential {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        definite_array(d)?;
        let pos = d.position();
        match d.u8()? {
            0 => Ok(Credential::KeyHash(fixed(d, "key hash")?)),
            1 => Ok(Credential::ScriptHash(fixed(d, "script hash")?)),
            other => Err(DecodeError::message(format!("unknown credential kind {}", other)).at(pos)),
        }
    }
}

/// Pool margin as a tagged rational
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitInterval {
    pub numerator: u64,
    pub denominator: u64,
}

impl<C> Encode<C> for UnitInterval {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, _ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        e.tag(Tag::new(TAG_RATIONAL))?
            .array(2)?
            .u64(self.numerator)?
            .u64(self.denominator)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for UnitInterval {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        let pos = d.position();
        if d.tag()? != Tag::new(TAG_RATIONAL) {
            return Err(DecodeError::message("expected rational tag 30").at(pos));
        }
        definite_array(d)?;
        Ok(Self {
            numerator: d.u64()?,
            denominator: d.u64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolRelay {
    SingleHostAddr {
        port: Option<u16>,
        ipv4: Option<[u8; 4]>,
        ipv6: Option<[u8; 16]>,
    },
    SingleHostName {
        port: Option<u16>,
        dns_name: String,
    },
    MultiHostName {
        dns_name: String,
    },
}

impl<C> Encode<C> for PoolRelay {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, _ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        match self {
            PoolRelay::SingleHostAddr { port, ipv4, ipv6 } => {
                e.array(4)?.u8(0)?;
                match port {
                    Some(port) => e.u16(*port)?,
                    None => e.null()?,
                };
                match ipv4 {
                    Some(ip) => e.bytes(ip)?,
                    None => e.null()?,
                };
                match ipv6 {
                    Some(ip) => e.bytes(ip)?,
                    None => e.null()?,
                };
            }
            PoolRelay::SingleHostName { port, dns_name } => {
                e.array(3)?.u8(1)?;
                match port {
                    Some(port) => e.u16(*port)?,
                    None => e.null()?,
                };
                e.str(dns_name)?;
            }
            PoolRelay::MultiHostName { dns_name } => {
                e.array(2)?.u8(2)?.str(dns_name)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for PoolRelay {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        definite_array(d)?;
        let pos = d.position();
        match d.u8()? {
            0 => Ok(PoolRelay::SingleHostAddr {
                port: optional_null(d, |d| d.u16())?,
                ipv4: optional_null(d, |d| fixed(d, "ipv4"))?,
                ipv6: optional_null(d, |d| fixed(d, "ipv6"))?,
            }),
            1 => Ok(PoolRelay::SingleHostName {
                port: optional_null(d, |d| d.u16())?,
                dns_name: d.str()?.to_string(),
            }),
            2 => Ok(PoolRelay::MultiHostName {
                dns_name: d.str()?.to_string(),
            }),
            other => Err(DecodeError::message(format!("unknown relay kind {}", other)).at(pos)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetadataRef {
    pub url: String,
    pub hash: Hash32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolParams {
    pub operator: KeyHash,
    pub vrf_key_hash: Hash32,
    pub pledge: Coin,
    pub cost: Coin,
    pub margin: UnitInterval,
    /// Raw reward account, header byte included
    pub reward_account: Vec<u8>,
    pub owners: Vec<KeyHash>,
    pub relays: Vec<PoolRelay>,
    pub metadata: Option<PoolMetadataRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    StakeRegistration(Credential),
    StakeDeregistration(Credential),
    StakeDelegation(Credential, KeyHash),
    PoolRegistration(Box<PoolParams>),
    PoolRetirement(KeyHash, u64),
}

impl<C> Encode<C> for Certificate {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        match self {
            Certificate::StakeRegistration(cred) => {
                e.array(2)?.u8(0)?;
                e.encode_with(cred, ctx)?;
            }
            Certificate::StakeDeregistration(cred) => {
                e.array(2)?.u8(1)?;
                e.encode_with(cred, ctx)?;
            }
            Certificate::StakeDelegation(cred, pool) => {
                e.array(3)?.u8(2)?;
                e.encode_with(cred, ctx)?;
                e.bytes(pool)?;
            }
            Certificate::PoolRegistration(params) => {
                e.array(10)?
                    .u8(3)?
                    .bytes(&params.operator)?
                    .bytes(&params.vrf_key_hash)?
                    .u64(params.pledge)?
                    .u64(params.cost)?;
                e.encode_with(params.margin, ctx)?;
                e.bytes(&params.reward_account)?;
                e.array(params.owners.len() as u64)?;
                for owner in &params.owners {
                    e.bytes(owner)?;
                }
                encode_slice(&params.relays, e, ctx)?;
                match &params.metadata {
                    Some(meta) => {
                        e.array(2)?.str(&meta.url)?.bytes(&meta.hash)?;
                    }
                    None => {
                        e.null()?;
                    }
                }
            }
            Certificate::PoolRetirement(pool, epoch) => {
                e.array(3)?.u8(4)?.bytes(pool)?.u64(*epoch)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for Certificate {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        definite_array(d)?;
        let pos = d.position();
        match d.u8()? {
            0 => Ok(Certificate::StakeRegistration(d.decode_with(ctx)?)),
            1 => Ok(Certificate::StakeDeregistration(d.decode_with(ctx)?)),
            2 => Ok(Certificate::StakeDelegation(
                d.decode_with(ctx)?,
                fixed(d, "pool key hash")?,
            )),
            3 => {
                let operator = fixed(d, "operator")?;
                let vrf_key_hash = fixed(d, "vrf key hash")?;
                let pledge = d.u64()?;
                let cost = d.u64()?;
                let margin = d.decode_with(ctx)?;
                let reward_account = d.bytes()?.to_vec();
                let owners = (0..set_len(d)?)
                    .map(|_| fixed(d, "owner"))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let relays = decode_vec(d, ctx)?;
                let metadata = optional_null(d, |d| {
                    definite_array(d)?;
                    Ok(PoolMetadataRef {
                        url: d.str()?.to_string(),
                        hash: fixed(d, "metadata hash")?,
                    })
                })?;
                Ok(Certificate::PoolRegistration(Box::new(PoolParams {
                    operator,
                    vrf_key_hash,
                    pledge,
                    cost,
                    margin,
                    reward_account,
                    owners,
                    relays,
                    metadata,
                })))
            }
            4 => Ok(Certificate::PoolRetirement(fixed(d, "pool key hash")?, d.u64()?)),
            other => Err(DecodeError::message(format!("unsupported certificate type {}", other)).at(pos)),
        }
    }
}

// ============================================================================
// Transaction body
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBody {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub fee: Coin,
    pub ttl: Option<u64>,
    pub certificates: Vec<Certificate>,
    /// Reward account bytes to amount, in operation order
    pub withdrawals: Vec<(Vec<u8>, Coin)>,
    pub auxiliary_data_hash: Option<Hash32>,
}

impl TransactionBody {
    /// Blake2b-256 of the encoded body, the transaction id
    pub fn hash(&self) -> Result<Hash32> {
        Ok(blake2b_256(&to_vec(self)?))
    }
}

impl<C> Encode<C> for TransactionBody {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        let entries = 3
            + self.ttl.is_some() as u64
            + !self.certificates.is_empty() as u64
            + !self.withdrawals.is_empty() as u64
            + self.auxiliary_data_hash.is_some() as u64;
        e.map(entries)?;

        e.u8(0)?;
        encode_slice(&self.inputs, e, ctx)?;
        e.u8(1)?;
        encode_slice(&self.outputs, e, ctx)?;
        e.u8(2)?.u64(self.fee)?;
        if let Some(ttl) = self.ttl {
            e.u8(3)?.u64(ttl)?;
        }
        if !self.certificates.is_empty() {
            e.u8(4)?;
            encode_slice(&self.certificates, e, ctx)?;
        }
        if !self.withdrawals.is_empty() {
            e.u8(5)?.map(self.withdrawals.len() as u64)?;
            for (account, amount) in &self.withdrawals {
                e.bytes(account)?.u64(*amount)?;
            }
        }
        if let Some(hash) = &self.auxiliary_data_hash {
            e.u8(7)?.bytes(hash)?;
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for TransactionBody {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        let mut body = TransactionBody::default();
        for _ in 0..definite_map(d)? {
            match d.u64()? {
                0 => body.inputs = decode_vec(d, ctx)?,
                1 => body.outputs = decode_vec(d, ctx)?,
                2 => body.fee = d.u64()?,
                3 => body.ttl = Some(d.u64()?),
                4 => body.certificates = decode_vec(d, ctx)?,
                5 => {
                    for _ in 0..definite_map(d)? {
                        let account = d.bytes()?.to_vec();
                        body.withdrawals.push((account, d.u64()?));
                    }
                }
                7 => body.auxiliary_data_hash = Some(fixed(d, "auxiliary data hash")?),
                _ => d.skip()?,
            }
        }
        Ok(body)
    }
}

// ============================================================================
// Witnesses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VkeyWitness {
    pub vkey: [u8; 32],
    pub signature: [u8; 64],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapWitness {
    pub vkey: [u8; 32],
    pub signature: [u8; 64],
    pub chain_code: [u8; 32],
    /// Raw CBOR of the Byron address attributes
    pub attributes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessSet {
    pub vkey_witnesses: Vec<VkeyWitness>,
    pub bootstrap_witnesses: Vec<BootstrapWitness>,
}

impl<C> Encode<C> for WitnessSet {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, _ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        let entries =
            !self.vkey_witnesses.is_empty() as u64 + !self.bootstrap_witnesses.is_empty() as u64;
        e.map(entries)?;
        if !self.vkey_witnesses.is_empty() {
            e.u8(0)?.array(self.vkey_witnesses.len() as u64)?;
            for w in &self.vkey_witnesses {
                e.array(2)?.bytes(&w.vkey)?.bytes(&w.signature)?;
            }
        }
        if !self.bootstrap_witnesses.is_empty() {
            e.u8(2)?.array(self.bootstrap_witnesses.len() as u64)?;
            for w in &self.bootstrap_witnesses {
                e.array(4)?
                    .bytes(&w.vkey)?
                    .bytes(&w.signature)?
                    .bytes(&w.chain_code)?
                    .bytes(&w.attributes)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for WitnessSet {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        let mut set = WitnessSet::default();
        for _ in 0..definite_map(d)? {
            match d.u64()? {
                0 => {
                    for _ in 0..set_len(d)? {
                        definite_array(d)?;
                        set.vkey_witnesses.push(VkeyWitness {
                            vkey: fixed(d, "vkey")?,
                            signature: fixed(d, "signature")?,
                        });
                    }
                }
                2 => {
                    for _ in 0..set_len(d)? {
                        definite_array(d)?;
                        set.bootstrap_witnesses.push(BootstrapWitness {
                            vkey: fixed(d, "vkey")?,
                            signature: fixed(d, "signature")?,
                            chain_code: fixed(d, "chain code")?,
                            attributes: d.bytes()?.to_vec(),
                        });
                    }
                }
                _ => d.skip()?,
            }
        }
        Ok(set)
    }
}

// ============================================================================
// Auxiliary data
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadatum {
    Int(i128),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Metadatum>),
    Map(Vec<(Metadatum, Metadatum)>),
}

impl Metadatum {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Metadatum::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Metadatum::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Look up an integer key in a map metadatum
    pub fn get(&self, key: i128) -> Option<&Metadatum> {
        match self {
            Metadatum::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_int() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl<C> Encode<C> for Metadatum {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        match self {
            Metadatum::Int(i) => {
                let int = minicbor::data::Int::try_from(*i)
                    .map_err(|_| EncodeError::message("metadatum integer out of range"))?;
                e.int(int)?;
            }
            Metadatum::Bytes(b) => {
                e.bytes(b)?;
            }
            Metadatum::Text(t) => {
                e.str(t)?;
            }
            Metadatum::Array(items) => encode_slice(items, e, ctx)?,
            Metadatum::Map(entries) => {
                e.map(entries.len() as u64)?;
                for (k, v) in entries {
                    e.encode_with(k, ctx)?;
                    e.encode_with(v, ctx)?;
                }
            }
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for Metadatum {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        let pos = d.position();
        match d.datatype()? {
            Type::U8 | Type::U16 | Type::U32 | Type::U64 | Type::I8 | Type::I16 | Type::I32
            | Type::I64 | Type::Int => Ok(Metadatum::Int(i128::from(d.int()?))),
            Type::Bytes => Ok(Metadatum::Bytes(d.bytes()?.to_vec())),
            Type::String => Ok(Metadatum::Text(d.str()?.to_string())),
            Type::Array => Ok(Metadatum::Array(decode_vec(d, ctx)?)),
            Type::Map => {
                let mut entries = Vec::new();
                for _ in 0..definite_map(d)? {
                    let k = d.decode_with(ctx)?;
                    entries.push((k, d.decode_with(ctx)?));
                }
                Ok(Metadatum::Map(entries))
            }
            other => Err(DecodeError::message(format!("{} is not a metadatum", other)).at(pos)),
        }
    }
}

/// Transaction metadata keyed by label. Scripts are not carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryData {
    pub metadata: Vec<(u64, Metadatum)>,
}

impl AuxiliaryData {
    pub fn label(&self, label: u64) -> Option<&Metadatum> {
        self.metadata.iter().find(|(l, _)| *l == label).map(|(_, m)| m)
    }
}

fn decode_metadata(d: &mut Decoder<'_>) -> std::result::Result<Vec<(u64, Metadatum)>, DecodeError> {
    let mut metadata = Vec::new();
    for _ in 0..definite_map(d)? {
        let label = d.u64()?;
        metadata.push((label, d.decode()?));
    }
    Ok(metadata)
}

impl<C> Encode<C> for AuxiliaryData {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> std::result::Result<(), EncodeError<W::Error>> {
        // Shelley-MA layout: [metadata, native scripts]
        e.array(2)?.map(self.metadata.len() as u64)?;
        for (label, value) in &self.metadata {
            e.u64(*label)?;
            e.encode_with(value, ctx)?;
        }
        e.array(0)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for AuxiliaryData {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> std::result::Result<Self, DecodeError> {
        let pos = d.position();
        match d.datatype()? {
            Type::Map => Ok(Self {
                metadata: decode_metadata(d)?,
            }),
            Type::Array => {
                let len = definite_array(d)?;
                let metadata = decode_metadata(d)?;
                for _ in 1..len {
                    d.skip()?;
                }
                Ok(Self { metadata })
            }
            Type::Tag => {
                if d.tag()? != Tag::new(TAG_ALONZO_AUX) {
                    return Err(DecodeError::message("unexpected auxiliary data tag").at(pos));
                }
                let mut metadata = Vec::new();
                for _ in 0..definite_map(d)? {
                    match d.u64()? {
                        0 => metadata = decode_metadata(d)?,
                        _ => d.skip()?,
                    }
                }
                Ok(Self { metadata })
            }
            other => Err(DecodeError::message(format!("{} is not auxiliary data", other)).at(pos)),
        }
    }
}

// ============================================================================
// Whole transactions
// ============================================================================

/// A signed transaction split into its raw parts.
///
/// The body and auxiliary data are kept as the exact bytes seen on the wire
/// so their hashes stay valid after a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTransaction<'b> {
    pub body: &'b [u8],
    pub witness_set: &'b [u8],
    pub is_valid: bool,
    pub auxiliary_data: Option<&'b [u8]>,
}

impl<'b> RawTransaction<'b> {
    /// Split `[body, witness_set, is_valid?, auxiliary_data | null]`
    pub fn split(bytes: &'b [u8]) -> Result<Self> {
        let mut d = Decoder::new(bytes);
        let len = definite_array(&mut d)?;
        if !(3..=4).contains(&len) {
            return Err(ConstructionError::GeneralDeserializationError(format!(
                "transaction array of length {}",
                len
            )));
        }
        let body = raw_item(&mut d, bytes)?;
        let witness_set = raw_item(&mut d, bytes)?;
        let is_valid = if len == 4 { d.bool()? } else { true };
        let auxiliary_data = if d.datatype()? == Type::Null {
            d.null()?;
            None
        } else {
            Some(raw_item(&mut d, bytes)?)
        };
        if d.position() != bytes.len() {
            return Err(ConstructionError::GeneralDeserializationError(format!(
                "trailing bytes at offset {}",
                d.position()
            )));
        }
        Ok(Self {
            body,
            witness_set,
            is_valid,
            auxiliary_data,
        })
    }

    /// Assemble a signed transaction around an already encoded body
    pub fn assemble(body: &[u8], witness_set: &WitnessSet, auxiliary_data: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut e = Encoder::new(Vec::with_capacity(body.len() + 256));
        e.array(4)?;
        e.writer_mut().extend_from_slice(body);
        e.encode(witness_set)?;
        e.bool(true)?;
        match auxiliary_data {
            Some(aux) => e.writer_mut().extend_from_slice(aux),
            None => {
                e.null()?;
            }
        }
        Ok(e.into_writer())
    }
}

fn raw_item<'b>(d: &mut Decoder<'b>, bytes: &'b [u8]) -> Result<&'b [u8]> {
    let start = d.position();
    d.skip()?;
    Ok(&bytes[start..d.position()])
}
