use anyhow::{anyhow, ensure, Context};
use cx_primitives::{Block, Height};
use serde::Deserialize;
use serde_json::value::RawValue;
use std::fmt::{Debug, Formatter};


/// A block as delivered by the source.
///
/// Header fields needed for routing and naming are extracted eagerly,
/// the payload itself is kept verbatim.
#[derive(Clone)]
pub struct RawBlock {
    height: Height,
    hash: String,
    parent_hash: String,
    timestamp: Option<i64>,
    payload: Box<RawValue>
}


impl Debug for RawBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBlock")
            .field("height", &self.height)
            .field("hash", &self.hash)
            .field("parent_hash", &self.parent_hash)
            .field("payload_len", &self.payload.get().len())
            .finish()
    }
}


#[derive(Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(i64),
    Text(String)
}


impl Quantity {
    fn value(&self) -> anyhow::Result<i64> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) => parse_quantity(s)
        }
    }
}


#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    number: Option<Quantity>,
    hash: Option<String>,
    parent_hash: Option<String>,
    timestamp: Option<Quantity>
}


impl RawBlock {
    pub fn new(
        height: Height,
        hash: impl Into<String>,
        parent_hash: impl Into<String>,
        timestamp: Option<i64>,
        payload: Box<RawValue>
    ) -> Self
    {
        Self {
            height,
            hash: hash.into(),
            parent_hash: parent_hash.into(),
            timestamp,
            payload
        }
    }

    /// Builds a block from a JSON object, picking up `number`, `hash`,
    /// `parentHash` and `timestamp` when they are present.
    pub fn from_json(height: Height, payload: Box<RawValue>) -> anyhow::Result<Self> {
        let header: Header = serde_json::from_str(payload.get())
            .context("block payload is not a JSON object")?;

        if let Some(number) = header.number.as_ref() {
            let number = number.value().context("invalid block number")?;
            ensure!(
                number == height,
                "source returned block {} when block {} was requested",
                number,
                height
            );
        }

        let timestamp = header.timestamp
            .as_ref()
            .map(|ts| ts.value())
            .transpose()
            .context("invalid block timestamp")?;

        Ok(Self {
            height,
            hash: header.hash.unwrap_or_default(),
            parent_hash: header.parent_hash.unwrap_or_default(),
            timestamp,
            payload
        })
    }

    pub fn payload(&self) -> &RawValue {
        &self.payload
    }
}


impl Block for RawBlock {
    fn height(&self) -> Height {
        self.height
    }

    fn hash(&self) -> &str {
        &self.hash
    }

    fn parent_hash(&self) -> &str {
        &self.parent_hash
    }

    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}


/// Parses a JSON-RPC quantity, either `0x`-prefixed hex or plain decimal.
pub fn parse_quantity(s: &str) -> anyhow::Result<i64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        ensure!(!hex.is_empty(), "empty hex quantity");
        i64::from_str_radix(hex, 16).map_err(|err| anyhow!("invalid hex quantity '{}': {}", s, err))
    } else {
        s.parse().map_err(|err| anyhow!("invalid quantity '{}': {}", s, err))
    }
}
