//! Record identifiers.
//!
//! Every stored entity is keyed by a 24-character lowercase hex string. The
//! same value is used as the Sled key and as the `_id` field of the JSON
//! document, and as the foreign key wherever one record points at another.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::openapi::schema::{ObjectBuilder, Schema, SchemaType};
use utoipa::openapi::RefOr;

use crate::error::AppError;

pub const RECORD_ID_LEN: usize = 24;

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RecordId(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRecordId;

impl fmt::Display for InvalidRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected a {RECORD_ID_LEN}-character hex identifier")
    }
}

impl std::error::Error for InvalidRecordId {}

impl RecordId {
    /// Fresh id from the first 12 bytes of a v4 UUID.
    pub fn generate() -> Self {
        let bytes = uuid::Uuid::new_v4().into_bytes();
        let hex: String = bytes[..RECORD_ID_LEN / 2]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for RecordId {
    type Err = InvalidRecordId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == RECORD_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(InvalidRecordId)
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl<'s> utoipa::ToSchema<'s> for RecordId {
    fn schema() -> (&'s str, RefOr<Schema>) {
        (
            "RecordId",
            ObjectBuilder::new()
                .schema_type(SchemaType::String)
                .min_length(Some(RECORD_ID_LEN))
                .max_length(Some(RECORD_ID_LEN))
                .description(Some("24-character hex record identifier"))
                .into(),
        )
    }
}

/// Parses an id that is about to be looked up. A malformed id can never
/// match a stored record, so it is reported as missing rather than invalid.
pub fn existing_id(raw: &str, not_found: &str) -> Result<RecordId, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::NotFound(not_found.to_string()))
}
