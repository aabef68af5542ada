//! # Transaction Arguments
//!
//! Caller-supplied description of a transfer, contract call or contract
//! creation. Unset fields are filled in by the pipeline.

use qc_01_sign_requests::SignError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shared_types::{Address, U256};
use std::fmt;

/// Arbitrary byte payload, serialized as `0x`-prefixed hex.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Bytes(pub Vec<u8>);

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Arguments of `eth_sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTxArgs {
    pub from: Address,
    /// Set by [`Transactor::hash_transaction`](crate::Transactor::hash_transaction)
    /// for externally signed transactions. Ignored by the approval flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// `None` creates a contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Legacy name of `input`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Bytes>,
}

impl SendTxArgs {
    /// Plain value transfer.
    #[must_use]
    pub fn transfer(from: Address, to: Address, value: U256) -> Self {
        Self {
            from,
            to: Some(to),
            value: Some(value),
            ..Self::default()
        }
    }

    /// Contract creation with the given init code.
    #[must_use]
    pub fn deploy(from: Address, code: Vec<u8>) -> Self {
        Self {
            from,
            input: Some(Bytes(code)),
            ..Self::default()
        }
    }

    /// Resolve the call payload from `input` and its legacy alias `data`.
    ///
    /// Both may be set only if they are equal.
    pub fn payload(&self) -> Result<Vec<u8>, SignError> {
        match (&self.data, &self.input) {
            (Some(data), Some(input)) if data != input => Err(SignError::InvalidArgs(
                "both \"data\" and \"input\" are set and not equal; use \"input\" for call data"
                    .to_string(),
            )),
            (_, Some(input)) => Ok(input.0.clone()),
            (Some(data), None) => Ok(data.0.clone()),
            (None, None) => Ok(Vec::new()),
        }
    }

    /// JSON form attached to the sign request for display.
    #[must_use]
    pub fn to_meta(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Parameters of an `eth_estimateGas` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMsg {
    pub from: Address,
    pub to: Option<Address>,
    pub gas_price: U256,
    pub value: U256,
    pub data: Vec<u8>,
}
