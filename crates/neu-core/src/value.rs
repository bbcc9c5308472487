//! The tagged value union produced by a poll cycle: `DValue`.
//!
//! Mirrors the original `dvalue` encoding — a typed value, or an `error` carrying
//! an errno-like code when the device read failed for that tag.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// A single data point's value, exactly one of the supported scalar/array kinds,
/// or an error recorded in place of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum DValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<DValue>),
    Error(i32),
}

impl DValue {
    pub fn error(code: ErrorCode) -> Self {
        DValue::Error(code.code())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DValue::Error(_))
    }

    /// Base64-encode `Bytes` values for the opaque JSON DTO boundary; other
    /// variants pass through `serde_json` untouched.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DValue::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
            other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn bytes_from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded).map(DValue::Bytes)
    }
}

/// A single poll-cycle result for one tag: `{tag_id, timestamp_ms, value}`.
/// Short-lived by design — created per tick, consumed by subscribers, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReading {
    pub tag_id: crate::ids::TagId,
    pub tag_name: String,
    pub timestamp_ms: i64,
    pub value: DValue,
}

impl TagReading {
    pub fn ok(tag_id: crate::ids::TagId, tag_name: impl Into<String>, timestamp_ms: i64, value: DValue) -> Self {
        Self {
            tag_id,
            tag_name: tag_name.into(),
            timestamp_ms,
            value,
        }
    }

    pub fn error(
        tag_id: crate::ids::TagId,
        tag_name: impl Into<String>,
        timestamp_ms: i64,
        code: ErrorCode,
    ) -> Self {
        Self {
            tag_id,
            tag_name: tag_name.into(),
            timestamp_ms,
            value: DValue::error(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip_through_base64() {
        let original = DValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = original.to_json();
        let encoded = json.as_str().unwrap();
        let decoded = DValue::bytes_from_base64(encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn error_reading_is_flagged() {
        let r = TagReading::error(crate::ids::TagId(1), "t1", 0, ErrorCode::ETimedOut);
        assert!(r.value.is_error());
    }
}
