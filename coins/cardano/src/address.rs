//! Cardano address codec
//!
//! Byron addresses are Base58 encoded CBOR `[24(bytes), crc32]`. Shelley
//! addresses are Bech32 over a one byte header `(type << 4) | network_id`
//! followed by the credential hashes.

use bech32::{Bech32, Hrp};
use blake2::digest::consts::U28;
use blake2::{Blake2b, Digest};
use minicbor::data::Tag;
use minicbor::decode::Error as DecodeError;
use minicbor::{Decoder, Encoder};
use sha3::Sha3_256;
use std::fmt;

use crate::config::{NetworkConfig, MAINNET_NETWORK_ID};
use crate::error::{ConstructionError, Result};

pub const KEY_HASH_LENGTH: usize = 28;
pub const ED25519_KEY_LENGTH: usize = 32;

/// Blake2b-224 hash of a key or script
pub type KeyHash = [u8; KEY_HASH_LENGTH];

const BYRON_PAYLOAD_TAG: u64 = 24;
const BYRON_MAGIC_ATTRIBUTE: u64 = 2;

/// Address era
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressEra {
    Byron,
    Shelley,
}

/// Address kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    Base,       // Payment + staking credential
    Enterprise, // Payment credential only
    Pointer,    // Payment + pointer to a stake registration
    Reward,     // Staking credential only
    Byron,      // Legacy bootstrap address
}

impl AddressKind {
    /// Parse the address type names accepted by derive
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "Base" => Ok(AddressKind::Base),
            "Enterprise" => Ok(AddressKind::Enterprise),
            "Reward" => Ok(AddressKind::Reward),
            other => Err(ConstructionError::InvalidAddressType(other.to_string())),
        }
    }
}

/// Payment or stake credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Credential {
    KeyHash(KeyHash),
    ScriptHash(KeyHash),
}

impl Credential {
    pub fn hash(&self) -> &KeyHash {
        match self {
            Credential::KeyHash(h) | Credential::ScriptHash(h) => h,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::ScriptHash(_))
    }

    /// Key hash credential of an Ed25519 public key
    pub fn from_public_key(pubkey: &[u8]) -> Self {
        Credential::KeyHash(CardanoAddress::hash_key(pubkey))
    }

    fn from_slice(bytes: &[u8], script: bool) -> Result<Self> {
        let hash: KeyHash = bytes
            .try_into()
            .map_err(|_| ConstructionError::InvalidAddress("truncated credential".to_string()))?;
        Ok(if script {
            Credential::ScriptHash(hash)
        } else {
            Credential::KeyHash(hash)
        })
    }
}

/// On-chain pointer to a stake registration certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub slot: u64,
    pub tx_index: u64,
    pub cert_index: u64,
}

/// Shelley address contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShelleyPayload {
    Base { payment: Credential, stake: Credential },
    Pointer { payment: Credential, pointer: Pointer },
    Enterprise { payment: Credential },
    Reward { stake: Credential },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShelleyAddress {
    pub network_id: u8,
    pub payload: ShelleyPayload,
}

/// Byron bootstrap address, kept with its raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByronAddress {
    pub root: KeyHash,
    /// Raw CBOR of the attribute map, as required by bootstrap witnesses
    pub attributes: Vec<u8>,
    pub address_type: u64,
    /// Present on testnets only
    pub protocol_magic: Option<u32>,
    bytes: Vec<u8>,
}

/// Cardano address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CardanoAddress {
    Byron(ByronAddress),
    Shelley(ShelleyAddress),
}

impl CardanoAddress {
    /// Create a new enterprise address (no staking)
    pub fn enterprise(payment_pubkey: &[u8], network_id: u8) -> Result<Self> {
        Ok(Self::shelley(
            network_id,
            ShelleyPayload::Enterprise {
                payment: Credential::from_public_key(check_key(payment_pubkey)?),
            },
        ))
    }

    /// Create a new base address (payment + staking)
    pub fn base(payment_pubkey: &[u8], staking_pubkey: &[u8], network_id: u8) -> Result<Self> {
        Ok(Self::shelley(
            network_id,
            ShelleyPayload::Base {
                payment: Credential::from_public_key(check_key(payment_pubkey)?),
                stake: Credential::from_public_key(check_staking_key(staking_pubkey)?),
            },
        ))
    }

    /// Create a new reward (stake) address
    pub fn reward(staking_pubkey: &[u8], network_id: u8) -> Result<Self> {
        Ok(Self::shelley(
            network_id,
            ShelleyPayload::Reward {
                stake: Credential::from_public_key(check_staking_key(staking_pubkey)?),
            },
        ))
    }

    /// Encode an address of the given kind from public keys
    pub fn encode(
        network_id: u8,
        kind: AddressKind,
        payment_pubkey: &[u8],
        staking_pubkey: Option<&[u8]>,
    ) -> Result<Self> {
        match kind {
            AddressKind::Enterprise => Self::enterprise(payment_pubkey, network_id),
            AddressKind::Base => {
                let staking = staking_pubkey.ok_or(ConstructionError::MissingStakingKey)?;
                Self::base(payment_pubkey, staking, network_id)
            }
            AddressKind::Reward => Self::reward(staking_pubkey.unwrap_or(payment_pubkey), network_id),
            AddressKind::Pointer | AddressKind::Byron => Err(
                ConstructionError::InvalidAddressType(format!("{:?} addresses are not constructed", kind)),
            ),
        }
    }

    pub fn shelley(network_id: u8, payload: ShelleyPayload) -> Self {
        CardanoAddress::Shelley(ShelleyAddress {
            network_id: network_id & 0x0F,
            payload,
        })
    }

    /// Hash a public key using Blake2b-224
    pub fn hash_key(pubkey: &[u8]) -> KeyHash {
        let mut hasher = Blake2b::<U28>::new();
        hasher.update(pubkey);
        hasher.finalize().into()
    }

    /// Decode a Bech32 or Base58 address string
    pub fn decode(address: &str) -> Result<Self> {
        let lower = address.to_ascii_lowercase();
        if lower.starts_with("addr") || lower.starts_with("stake") {
            if address != lower && address != address.to_ascii_uppercase() {
                return Err(ConstructionError::InvalidAddressCasing(address.to_string()));
            }
            let (hrp, data) = bech32::decode(address)
                .map_err(|e| ConstructionError::InvalidAddress(format!("{}: {}", address, e)))?;
            let decoded = Self::from_bytes(&data)?;
            if hrp.as_str().to_ascii_lowercase() != decoded.hrp() {
                return Err(ConstructionError::InvalidAddress(format!(
                    "{}: prefix does not match address type",
                    address
                )));
            }
            return Ok(decoded);
        }

        let raw = bs58::decode(address)
            .into_vec()
            .map_err(|e| ConstructionError::InvalidAddress(format!("{}: {}", address, e)))?;
        match Self::from_bytes(&raw)? {
            byron @ CardanoAddress::Byron(_) => Ok(byron),
            CardanoAddress::Shelley(_) => Err(ConstructionError::InvalidAddress(format!(
                "{}: shelley address in base58",
                address
            ))),
        }
    }

    /// Decode and check the address belongs to `network`
    pub fn decode_for_network(address: &str, network: &NetworkConfig) -> Result<Self> {
        let decoded = Self::decode(address)?;
        let matches = match &decoded {
            CardanoAddress::Shelley(shelley) => shelley.network_id == network.network_id,
            CardanoAddress::Byron(byron) => match byron.protocol_magic {
                Some(magic) => magic == network.protocol_magic,
                None => network.is_mainnet(),
            },
        };
        if !matches {
            return Err(ConstructionError::InvalidNetwork(format!(
                "address {} does not belong to {}",
                address, network.name
            )));
        }
        Ok(decoded)
    }

    /// Parse raw address bytes as they appear in transaction outputs
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = *bytes
            .first()
            .ok_or_else(|| ConstructionError::InvalidAddress("empty address".to_string()))?;
        let network_id = header & 0x0F;
        let addr_type = header >> 4;
        let body = &bytes[1..];
        let truncated = || ConstructionError::InvalidAddress("truncated address".to_string());

        let payload = match addr_type {
            0..=3 => {
                if body.len() != 2 * KEY_HASH_LENGTH {
                    return Err(truncated());
                }
                ShelleyPayload::Base {
                    payment: Credential::from_slice(&body[..KEY_HASH_LENGTH], addr_type & 0b01 != 0)?,
                    stake: Credential::from_slice(&body[KEY_HASH_LENGTH..], addr_type & 0b10 != 0)?,
                }
            }
            4 | 5 => {
                if body.len() <= KEY_HASH_LENGTH {
                    return Err(truncated());
                }
                let payment = Credential::from_slice(&body[..KEY_HASH_LENGTH], addr_type == 5)?;
                let rest = &body[KEY_HASH_LENGTH..];
                let (slot, pos) = read_natural(rest, 0).ok_or_else(truncated)?;
                let (tx_index, pos) = read_natural(rest, pos).ok_or_else(truncated)?;
                let (cert_index, pos) = read_natural(rest, pos).ok_or_else(truncated)?;
                if pos != rest.len() {
                    return Err(truncated());
                }
                ShelleyPayload::Pointer {
                    payment,
                    pointer: Pointer {
                        slot,
                        tx_index,
                        cert_index,
                    },
                }
            }
            6 | 7 => {
                if body.len() != KEY_HASH_LENGTH {
                    return Err(truncated());
                }
                ShelleyPayload::Enterprise {
                    payment: Credential::from_slice(body, addr_type == 7)?,
                }
            }
            8 => return ByronAddress::from_bytes(bytes).map(CardanoAddress::Byron),
            14 | 15 => {
                if body.len() != KEY_HASH_LENGTH {
                    return Err(truncated());
                }
                ShelleyPayload::Reward {
                    stake: Credential::from_slice(body, addr_type == 15)?,
                }
            }
            other => {
                return Err(ConstructionError::InvalidAddress(format!(
                    "unknown address header type {}",
                    other
                )))
            }
        };
        Ok(CardanoAddress::Shelley(ShelleyAddress {
            network_id,
            payload,
        }))
    }

    /// Raw address bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            CardanoAddress::Byron(byron) => byron.bytes.clone(),
            CardanoAddress::Shelley(shelley) => shelley.to_bytes(),
        }
    }

    pub fn era(&self) -> AddressEra {
        match self {
            CardanoAddress::Byron(_) => AddressEra::Byron,
            CardanoAddress::Shelley(_) => AddressEra::Shelley,
        }
    }

    pub fn kind(&self) -> AddressKind {
        match self {
            CardanoAddress::Byron(_) => AddressKind::Byron,
            CardanoAddress::Shelley(shelley) => match shelley.payload {
                ShelleyPayload::Base { .. } => AddressKind::Base,
                ShelleyPayload::Pointer { .. } => AddressKind::Pointer,
                ShelleyPayload::Enterprise { .. } => AddressKind::Enterprise,
                ShelleyPayload::Reward { .. } => AddressKind::Reward,
            },
        }
    }

    /// Shelley network id; Byron addresses carry a protocol magic instead
    pub fn network_id(&self) -> Option<u8> {
        match self {
            CardanoAddress::Byron(_) => None,
            CardanoAddress::Shelley(shelley) => Some(shelley.network_id),
        }
    }

    pub fn payment_credential(&self) -> Option<&Credential> {
        match self {
            CardanoAddress::Shelley(ShelleyAddress {
                payload:
                    ShelleyPayload::Base { payment, .. }
                    | ShelleyPayload::Pointer { payment, .. }
                    | ShelleyPayload::Enterprise { payment },
                ..
            }) => Some(payment),
            _ => None,
        }
    }

    pub fn stake_credential(&self) -> Option<&Credential> {
        match self {
            CardanoAddress::Shelley(ShelleyAddress {
                payload: ShelleyPayload::Base { stake, .. } | ShelleyPayload::Reward { stake },
                ..
            }) => Some(stake),
            _ => None,
        }
    }

    /// Reward addresses are told apart by their header type alone
    pub fn is_stake_address(&self) -> bool {
        self.kind() == AddressKind::Reward
    }

    /// Check if this is a mainnet address
    pub fn is_mainnet(&self) -> bool {
        match self {
            CardanoAddress::Byron(byron) => byron.protocol_magic.is_none(),
            CardanoAddress::Shelley(shelley) => shelley.network_id == MAINNET_NETWORK_ID,
        }
    }

    fn hrp(&self) -> &'static str {
        match (self.is_stake_address(), self.is_mainnet()) {
            (true, true) => "stake",
            (true, false) => "stake_test",
            (false, true) => "addr",
            (false, false) => "addr_test",
        }
    }

    /// Human readable form: Bech32 for Shelley, Base58 for Byron
    pub fn to_address_string(&self) -> Result<String> {
        match self {
            CardanoAddress::Byron(byron) => Ok(bs58::encode(&byron.bytes).into_string()),
            CardanoAddress::Shelley(shelley) => {
                let hrp = Hrp::parse(self.hrp())
                    .map_err(|e| ConstructionError::GeneralSerializationError(e.to_string()))?;
                bech32::encode::<Bech32>(hrp, &shelley.to_bytes())
                    .map_err(|e| ConstructionError::GeneralSerializationError(e.to_string()))
            }
        }
    }
}

impl fmt::Display for CardanoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_address_string().map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl ShelleyAddress {
    fn header_type(&self) -> u8 {
        match self.payload {
            ShelleyPayload::Base { payment, stake } => {
                (payment.is_script() as u8) | ((stake.is_script() as u8) << 1)
            }
            ShelleyPayload::Pointer { payment, .. } => 4 | payment.is_script() as u8,
            ShelleyPayload::Enterprise { payment } => 6 | payment.is_script() as u8,
            ShelleyPayload::Reward { stake } => 14 | stake.is_script() as u8,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + 2 * KEY_HASH_LENGTH);
        data.push((self.header_type() << 4) | (self.network_id & 0x0F));
        match &self.payload {
            ShelleyPayload::Base { payment, stake } => {
                data.extend_from_slice(payment.hash());
                data.extend_from_slice(stake.hash());
            }
            ShelleyPayload::Pointer { payment, pointer } => {
                data.extend_from_slice(payment.hash());
                write_natural(&mut data, pointer.slot);
                write_natural(&mut data, pointer.tx_index);
                write_natural(&mut data, pointer.cert_index);
            }
            ShelleyPayload::Enterprise { payment } => data.extend_from_slice(payment.hash()),
            ShelleyPayload::Reward { stake } => data.extend_from_slice(stake.hash()),
        }
        data
    }
}

impl ByronAddress {
    /// Build a Byron address from its root and raw attribute map
    pub fn new(root: KeyHash, attributes: Vec<u8>, address_type: u64) -> Result<Self> {
        let mut payload = Encoder::new(Vec::new());
        payload.array(3)?.bytes(&root)?;
        payload.writer_mut().extend_from_slice(&attributes);
        payload.u64(address_type)?;
        let payload = payload.into_writer();

        let mut outer = Encoder::new(Vec::new());
        outer
            .array(2)?
            .tag(Tag::new(BYRON_PAYLOAD_TAG))?
            .bytes(&payload)?
            .u32(crc32fast::hash(&payload))?;

        Self::from_bytes(&outer.into_writer())
    }

    /// Root committed to by an address spendable with `vkey` and
    /// `chain_code`: blake2b-224 of sha3-256 of
    /// `[address_type, [0, vkey || chain_code], attributes]`
    pub fn spending_root(
        vkey: &[u8; ED25519_KEY_LENGTH],
        chain_code: &[u8; ED25519_KEY_LENGTH],
        attributes: &[u8],
        address_type: u64,
    ) -> Result<KeyHash> {
        let mut xpub = Vec::with_capacity(2 * ED25519_KEY_LENGTH);
        xpub.extend_from_slice(vkey);
        xpub.extend_from_slice(chain_code);

        let mut e = Encoder::new(Vec::new());
        e.array(3)?.u64(address_type)?.array(2)?.u64(0)?.bytes(&xpub)?;
        e.writer_mut().extend_from_slice(attributes);
        Ok(CardanoAddress::hash_key(&Sha3_256::digest(e.writer())))
    }

    /// Whether a bootstrap key with this chain code owns the address
    pub fn is_spent_by(&self, vkey: &[u8; ED25519_KEY_LENGTH], chain_code: &[u8; ED25519_KEY_LENGTH]) -> bool {
        Self::spending_root(vkey, chain_code, &self.attributes, self.address_type)
            .map(|root| root == self.root)
            .unwrap_or(false)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode_cbor(bytes)
            .map_err(|e| ConstructionError::InvalidAddress(format!("byron: {}", e)))
    }

    fn decode_cbor(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        let mut outer = Decoder::new(bytes);
        if outer.array()? != Some(2) {
            return Err(DecodeError::message("expected two element array"));
        }
        if outer.tag()? != Tag::new(BYRON_PAYLOAD_TAG) {
            return Err(DecodeError::message("expected tag 24"));
        }
        let payload = outer.bytes()?;
        let crc = outer.u32()?;
        if crc32fast::hash(payload) != crc {
            return Err(DecodeError::message("crc mismatch"));
        }
        if outer.position() != bytes.len() {
            return Err(DecodeError::message("trailing bytes"));
        }

        let mut inner = Decoder::new(payload);
        if inner.array()? != Some(3) {
            return Err(DecodeError::message("expected three element payload"));
        }
        let root: KeyHash = inner
            .bytes()?
            .try_into()
            .map_err(|_| DecodeError::message("root must be 28 bytes"))?;
        let start = inner.position();
        inner.skip()?;
        let attributes = payload[start..inner.position()].to_vec();
        let address_type = inner.u64()?;

        let protocol_magic = byron_protocol_magic(&attributes)?;
        Ok(Self {
            root,
            attributes,
            address_type,
            protocol_magic,
            bytes: bytes.to_vec(),
        })
    }
}

fn byron_protocol_magic(attributes: &[u8]) -> std::result::Result<Option<u32>, DecodeError> {
    let mut d = Decoder::new(attributes);
    let entries = d
        .map()?
        .ok_or_else(|| DecodeError::message("indefinite attributes"))?;
    let mut magic = None;
    for _ in 0..entries {
        let key = d.u64()?;
        if key == BYRON_MAGIC_ATTRIBUTE {
            magic = Some(Decoder::new(d.bytes()?).u32()?);
        } else {
            d.skip()?;
        }
    }
    Ok(magic)
}

/// Variable length natural used by pointer addresses, 7 bits per byte
fn read_natural(bytes: &[u8], mut pos: usize) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    loop {
        let byte = *bytes.get(pos)?;
        value = value.checked_mul(128)? | u64::from(byte & 0x7F);
        pos += 1;
        if byte & 0x80 == 0 {
            return Some((value, pos));
        }
    }
}

fn write_natural(out: &mut Vec<u8>, mut value: u64) {
    let mut chunks = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        chunks.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    out.extend(chunks.iter().rev());
}

fn check_key(pubkey: &[u8]) -> Result<&[u8]> {
    if pubkey.len() != ED25519_KEY_LENGTH {
        return Err(ConstructionError::InvalidPublicKeyFormat(format!(
            "expected {} bytes, got {}",
            ED25519_KEY_LENGTH,
            pubkey.len()
        )));
    }
    Ok(pubkey)
}

fn check_staking_key(pubkey: &[u8]) -> Result<&[u8]> {
    check_key(pubkey).map_err(|_| {
        ConstructionError::InvalidStakingKeyFormat(format!("expected 32 bytes, got {}", pubkey.len()))
    })
}

/// Whether `address` decodes to a reward address
pub fn is_stake_address(address: &str) -> bool {
    CardanoAddress::decode(address)
        .map(|a| a.is_stake_address())
        .unwrap_or(false)
}

/// Reward address of a staking key on the given network, as a string
pub fn reward_address_from_key(staking_pubkey: &[u8], network_id: u8) -> Result<String> {
    CardanoAddress::reward(staking_pubkey, network_id)?.to_address_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TESTNET_NETWORK_ID;

    const PAYMENT_KEY: &str = "1B400D60AAF34EAF6DCBAB9BBA46001A23497886CF11066F7846933D30E5AD3F";
    const BASE_PAYMENT_KEY: &str = "159abeeecdf167ccc0ea60b30f9522154a0d74161aeb159fb43b6b0695f057b3";
    const BASE_STAKING_KEY: &str = "964774728c8306a42252adbfb07ccd6ef42399f427ade25a5933ce190c5a8760";
    const BYRON_MAINNET: &str = "Ae2tdPwUPEZC6WJfVQxTNN2tWw4skGrN6zRVukvxJmTFy1nYkVGQBuURU3L";

    fn key(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str).unwrap()
    }

    // ============================================================================
    // Encoding
    // ============================================================================

    #[test]
    fn test_hash_key() {
        let hash = CardanoAddress::hash_key(&key(PAYMENT_KEY));
        assert_eq!(hash.len(), 28);
    }

    #[test]
    fn test_enterprise_address_mainnet() {
        let addr = CardanoAddress::enterprise(&key(PAYMENT_KEY), MAINNET_NETWORK_ID).unwrap();
        assert_eq!(
            addr.to_string(),
            "addr1vxa5pudxg77g3sdaddecmw8tvc6hmynywn49lltt4fmvn7cpnkcpx"
        );
        assert_eq!(addr.kind(), AddressKind::Enterprise);
        assert!(addr.is_mainnet());
        assert!(addr.stake_credential().is_none());
    }

    #[test]
    fn test_base_address_mainnet() {
        let addr = CardanoAddress::base(
            &key(BASE_PAYMENT_KEY),
            &key(BASE_STAKING_KEY),
            MAINNET_NETWORK_ID,
        )
        .unwrap();
        assert_eq!(
            addr.to_string(),
            "addr1q9dhy809valxaer3nlvg2h5nudd62pxp6lu0cs36zczhfr98y6pah6lvppk8xft57nef6yexqh6rr204yemcmm3emhzsgg4fg0"
        );
        assert_eq!(addr.kind(), AddressKind::Base);
    }

    #[test]
    fn test_reward_addresses() {
        let mainnet = CardanoAddress::reward(&key(BASE_STAKING_KEY), MAINNET_NETWORK_ID).unwrap();
        assert_eq!(
            mainnet.to_string(),
            "stake1uxnjdq7ma0kqsmrny460fu5azvnqtap3486jvaudacuam3g3yc4nu"
        );

        let testnet = reward_address_from_key(&key(PAYMENT_KEY), TESTNET_NETWORK_ID).unwrap();
        assert_eq!(
            testnet,
            "stake_test1uza5pudxg77g3sdaddecmw8tvc6hmynywn49lltt4fmvn7c6nuuef"
        );
        assert!(is_stake_address(&testnet));
    }

    #[test]
    fn test_encode_requires_staking_key_for_base() {
        let err = CardanoAddress::encode(MAINNET_NETWORK_ID, AddressKind::Base, &key(PAYMENT_KEY), None)
            .unwrap_err();
        assert_eq!(err, ConstructionError::MissingStakingKey);

        let err = CardanoAddress::encode(
            MAINNET_NETWORK_ID,
            AddressKind::Pointer,
            &key(PAYMENT_KEY),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidAddressType(_)));
    }

    #[test]
    fn test_invalid_key_lengths() {
        assert!(matches!(
            CardanoAddress::enterprise(&[1u8; 31], MAINNET_NETWORK_ID),
            Err(ConstructionError::InvalidPublicKeyFormat(_))
        ));
        assert!(matches!(
            CardanoAddress::base(&key(PAYMENT_KEY), &[1u8; 33], MAINNET_NETWORK_ID),
            Err(ConstructionError::InvalidStakingKeyFormat(_))
        ));
    }

    // ============================================================================
    // Decoding
    // ============================================================================

    #[test]
    fn test_decode_round_trip_all_kinds() {
        let payment = key(BASE_PAYMENT_KEY);
        let staking = key(BASE_STAKING_KEY);
        for network_id in [MAINNET_NETWORK_ID, TESTNET_NETWORK_ID] {
            for kind in [AddressKind::Base, AddressKind::Enterprise, AddressKind::Reward] {
                let addr = CardanoAddress::encode(network_id, kind, &payment, Some(&staking)).unwrap();
                let decoded = CardanoAddress::decode(&addr.to_string()).unwrap();
                assert_eq!(decoded, addr);
                assert_eq!(decoded.kind(), kind);
                assert_eq!(decoded.era(), AddressEra::Shelley);
                assert_eq!(decoded.network_id(), Some(network_id));
            }
        }
    }

    #[test]
    fn test_decode_credentials() {
        let addr = CardanoAddress::decode(
            "addr1q9dhy809valxaer3nlvg2h5nudd62pxp6lu0cs36zczhfr98y6pah6lvppk8xft57nef6yexqh6rr204yemcmm3emhzsgg4fg0",
        )
        .unwrap();
        assert_eq!(
            addr.payment_credential(),
            Some(&Credential::KeyHash(CardanoAddress::hash_key(&key(BASE_PAYMENT_KEY))))
        );
        assert_eq!(
            addr.stake_credential(),
            Some(&Credential::KeyHash(CardanoAddress::hash_key(&key(BASE_STAKING_KEY))))
        );
        assert!(!addr.is_stake_address());
    }

    #[test]
    fn test_pointer_round_trip() {
        let addr = CardanoAddress::shelley(
            MAINNET_NETWORK_ID,
            ShelleyPayload::Pointer {
                payment: Credential::from_public_key(&key(PAYMENT_KEY)),
                pointer: Pointer {
                    slot: 2_498_243,
                    tx_index: 27,
                    cert_index: 3,
                },
            },
        );
        let encoded = addr.to_string();
        assert!(encoded.starts_with("addr1g"));
        let decoded = CardanoAddress::decode(&encoded).unwrap();
        assert_eq!(decoded, addr);
        assert_eq!(decoded.kind(), AddressKind::Pointer);
    }

    #[test]
    fn test_natural_encoding() {
        for value in [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64] {
            let mut out = Vec::new();
            write_natural(&mut out, value);
            assert_eq!(read_natural(&out, 0), Some((value, out.len())));
        }
    }

    #[test]
    fn test_byron_mainnet_decode() {
        let addr = CardanoAddress::decode(BYRON_MAINNET).unwrap();
        assert_eq!(addr.era(), AddressEra::Byron);
        assert_eq!(addr.kind(), AddressKind::Byron);
        assert!(addr.is_mainnet());
        assert!(addr.payment_credential().is_none());
        assert_eq!(addr.to_string(), BYRON_MAINNET);

        match addr {
            CardanoAddress::Byron(byron) => assert_eq!(byron.attributes, vec![0xa0]),
            _ => panic!("expected byron"),
        }
    }

    #[test]
    fn test_byron_with_protocol_magic() {
        // {2: bytes(cbor(1))}
        let attributes = vec![0xa1, 0x02, 0x41, 0x01];
        let byron = ByronAddress::new([7u8; 28], attributes.clone(), 0).unwrap();
        assert_eq!(byron.protocol_magic, Some(1));

        let addr = CardanoAddress::Byron(byron);
        let decoded = CardanoAddress::decode(&addr.to_string()).unwrap();
        assert_eq!(decoded, addr);
        assert!(CardanoAddress::decode_for_network(&addr.to_string(), &NetworkConfig::preprod()).is_ok());
        assert!(matches!(
            CardanoAddress::decode_for_network(&addr.to_string(), &NetworkConfig::mainnet()),
            Err(ConstructionError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_byron_crc_mismatch() {
        let mut raw = bs58::decode(BYRON_MAINNET).into_vec().unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = bs58::encode(raw).into_string();
        assert!(matches!(
            CardanoAddress::decode(&tampered),
            Err(ConstructionError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_byron_spending_root() {
        let vkey = [3u8; 32];
        let chain_code = [4u8; 32];
        let root = ByronAddress::spending_root(&vkey, &chain_code, &[0xa0], 0).unwrap();
        let byron = ByronAddress::new(root, vec![0xa0], 0).unwrap();

        assert!(byron.is_spent_by(&vkey, &chain_code));
        assert!(!byron.is_spent_by(&vkey, &[5u8; 32]));
        assert!(!byron.is_spent_by(&[6u8; 32], &chain_code));

        let decoded = CardanoAddress::decode(&CardanoAddress::Byron(byron.clone()).to_string()).unwrap();
        assert_eq!(decoded, CardanoAddress::Byron(byron));
    }

    #[test]
    fn test_byron_truncated() {
        let raw = bs58::decode(BYRON_MAINNET).into_vec().unwrap();
        for keep in [raw.len() - 3, 10, 2] {
            let truncated = bs58::encode(&raw[..keep]).into_string();
            assert!(
                matches!(CardanoAddress::decode(&truncated), Err(ConstructionError::InvalidAddress(_))),
                "kept {} bytes",
                keep
            );
        }
    }

    #[test]
    fn test_network_mismatch() {
        let err = CardanoAddress::decode_for_network(
            "addr1vxa5pudxg77g3sdaddecmw8tvc6hmynywn49lltt4fmvn7cpnkcpx",
            &NetworkConfig::preprod(),
        )
        .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidNetwork(_)));
    }

    #[test]
    fn test_mixed_casing() {
        let err = CardanoAddress::decode("addr1VXA5pudxg77g3sdaddecmw8tvc6hmynywn49lltt4fmvn7cpnkcpx")
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidAddressCasing(_)));
    }

    #[test]
    fn test_validate_invalid_address() {
        for bad in ["invalid", "addr1qxyz", "0x1234567890", ""] {
            assert!(CardanoAddress::decode(bad).is_err(), "{} should not decode", bad);
        }
        // Flip the last checksum character
        assert!(matches!(
            CardanoAddress::decode("addr1vxa5pudxg77g3sdaddecmw8tvc6hmynywn49lltt4fmvn7cpnkcpq"),
            Err(ConstructionError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_address_kind_names() {
        assert_eq!(AddressKind::from_name("Base").unwrap(), AddressKind::Base);
        assert!(matches!(
            AddressKind::from_name("Invalid"),
            Err(ConstructionError::InvalidAddressType(_))
        ));
    }
}
