//! Serializable snapshot of a recorder's logs.

use crate::error::Result;
use crate::types::{Snapshot, Timestamp, VersionedEdit};
use serde::{Deserialize, Serialize};

/// Both logs plus the time they were exported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryExport {
    pub edits: Vec<VersionedEdit>,
    pub snapshots: Vec<Snapshot>,
    pub export_time: Timestamp,
}

impl HistoryExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compact binary encoding. Field names are kept so the format stays
    /// readable by other MessagePack consumers.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
