//! Extra data envelope
//!
//! Rosetta-only information (coin identifiers, staking credentials, pool
//! parameters) has no slot in the Cardano transaction, so every transaction
//! handed to a client travels wrapped as
//!
//! ```text
//! { "transaction": bytes, "extra": { "operations": [op...], "metadata"?: bytes } }
//! ```
//!
//! Operations are stored as CBOR maps with text keys mirroring their JSON
//! form, which keeps the envelope readable by any CBOR tool.

use minicbor::data::Type;
use minicbor::{Decoder, Encoder};
use serde_json::{Map, Number, Value};

use crate::error::{ConstructionError, Result};
use crate::types::{Operation, OperationType};

const TRANSACTION_KEY: &str = "transaction";
const EXTRA_KEY: &str = "extra";
const OPERATIONS_KEY: &str = "operations";
const METADATA_KEY: &str = "metadata";

/// Rosetta data travelling beside the transaction bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionExtraData {
    pub operations: Vec<Operation>,
    /// Hex of the auxiliary data, when the transaction carries any
    pub transaction_metadata_hex: Option<String>,
}

impl TransactionExtraData {
    pub fn new(operations: Vec<Operation>, transaction_metadata_hex: Option<String>) -> Self {
        Self {
            operations,
            transaction_metadata_hex,
        }
    }
}

/// Whether an operation is kept in the envelope. Outputs are rebuilt from
/// the body, everything else carries fields the body cannot hold.
pub fn is_stored(operation: &Operation) -> bool {
    operation.operation_type != OperationType::Output
}

/// Encode the envelope and return it as hex
pub fn encode(transaction: &[u8], extra: &TransactionExtraData) -> Result<String> {
    let operations = extra
        .operations
        .iter()
        .filter(|op| is_stored(op))
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ConstructionError::CantEncodeExtraData(e.to_string()))?;

    let metadata = extra
        .transaction_metadata_hex
        .as_deref()
        .map(hex::decode)
        .transpose()
        .map_err(|e| ConstructionError::CantEncodeExtraData(format!("metadata hex: {}", e)))?;

    write_envelope(transaction, &operations, metadata.as_deref())
        .map(hex::encode)
        .map_err(|e| ConstructionError::CantEncodeExtraData(e.to_string()))
}

fn write_envelope(
    transaction: &[u8],
    operations: &[Value],
    metadata: Option<&[u8]>,
) -> std::result::Result<Vec<u8>, minicbor::encode::Error<std::convert::Infallible>> {
    let mut e = Encoder::new(Vec::new());
    e.map(2)?.str(TRANSACTION_KEY)?.bytes(transaction)?;
    e.str(EXTRA_KEY)?.map(1 + metadata.is_some() as u64)?;
    e.str(OPERATIONS_KEY)?.array(operations.len() as u64)?;
    for op in operations {
        write_json(&mut e, op)?;
    }
    if let Some(metadata) = metadata {
        e.str(METADATA_KEY)?.bytes(metadata)?;
    }
    Ok(e.into_writer())
}

fn write_json(
    e: &mut Encoder<Vec<u8>>,
    value: &Value,
) -> std::result::Result<(), minicbor::encode::Error<std::convert::Infallible>> {
    match value {
        Value::Null => {
            e.null()?;
        }
        Value::Bool(b) => {
            e.bool(*b)?;
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                e.u64(u)?;
            } else if let Some(i) = n.as_i64() {
                e.i64(i)?;
            } else if let Some(f) = n.as_f64() {
                e.f64(f)?;
            }
        }
        Value::String(s) => {
            e.str(s)?;
        }
        Value::Array(items) => {
            e.array(items.len() as u64)?;
            for item in items {
                write_json(e, item)?;
            }
        }
        Value::Object(fields) => {
            e.map(fields.len() as u64)?;
            for (key, field) in fields {
                e.str(key)?;
                write_json(e, field)?;
            }
        }
    }
    Ok(())
}

/// Decode an envelope from hex into the transaction bytes and extra data
pub fn decode(envelope_hex: &str) -> Result<(Vec<u8>, TransactionExtraData)> {
    let bytes = hex::decode(envelope_hex)?;
    let mut d = Decoder::new(&bytes);
    let parsed = read_envelope(&mut d);
    let (transaction, operations, metadata) = parsed.map_err(|e| {
        ConstructionError::GeneralDeserializationError(format!(
            "extra data at byte {}: {}",
            d.position(),
            e
        ))
    })?;
    if d.position() != bytes.len() {
        return Err(ConstructionError::GeneralDeserializationError(format!(
            "extra data has trailing bytes at byte {}",
            d.position()
        )));
    }

    let operations = operations
        .into_iter()
        .map(serde_json::from_value::<Operation>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ConstructionError::GeneralDeserializationError(format!("operation: {}", e)))?;

    Ok((
        transaction,
        TransactionExtraData {
            operations,
            transaction_metadata_hex: metadata.map(hex::encode),
        },
    ))
}

type Envelope = (Vec<u8>, Vec<Value>, Option<Vec<u8>>);

fn read_envelope(d: &mut Decoder<'_>) -> std::result::Result<Envelope, minicbor::decode::Error> {
    let mut transaction = None;
    let mut operations = Vec::new();
    let mut metadata = None;

    for _ in 0..definite(d.map()?)? {
        match d.str()? {
            TRANSACTION_KEY => transaction = Some(d.bytes()?.to_vec()),
            EXTRA_KEY => {
                for _ in 0..definite(d.map()?)? {
                    match d.str()? {
                        OPERATIONS_KEY => {
                            for _ in 0..definite(d.array()?)? {
                                operations.push(read_json(d)?);
                            }
                        }
                        METADATA_KEY => metadata = Some(d.bytes()?.to_vec()),
                        _ => d.skip()?,
                    }
                }
            }
            _ => d.skip()?,
        }
    }

    let transaction = transaction
        .ok_or_else(|| minicbor::decode::Error::message("missing transaction field"))?;
    Ok((transaction, operations, metadata))
}

fn definite(len: Option<u64>) -> std::result::Result<u64, minicbor::decode::Error> {
    len.ok_or_else(|| minicbor::decode::Error::message("indefinite length container"))
}

fn read_json(d: &mut Decoder<'_>) -> std::result::Result<Value, minicbor::decode::Error> {
    let value = match d.datatype()? {
        Type::Null => {
            d.null()?;
            Value::Null
        }
        Type::Bool => Value::Bool(d.bool()?),
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => Value::Number(d.u64()?.into()),
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => Value::Number(d.i64()?.into()),
        Type::F16 | Type::F32 | Type::F64 => {
            let f = d.f64()?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| minicbor::decode::Error::message("non finite float"))?
        }
        Type::String => Value::String(d.str()?.to_string()),
        Type::Array => {
            let len = definite(d.array()?)?;
            Value::Array((0..len).map(|_| read_json(d)).collect::<std::result::Result<_, _>>()?)
        }
        Type::Map => {
            let mut fields = Map::new();
            for _ in 0..definite(d.map()?)? {
                let key = d.str()?.to_string();
                fields.insert(key, read_json(d)?);
            }
            Value::Object(fields)
        }
        other => {
            return Err(minicbor::decode::Error::message(format!(
                "unexpected {} in operation",
                other
            )))
        }
    };
    Ok(value)
}
