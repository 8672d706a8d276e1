//! Domain DTOs for the config API.
//!
//! # Design
//! These types mirror the service's JSON payloads but stay deliberately
//! tolerant: `value` is arbitrary JSON, unknown fields are ignored, and
//! `metadata` is optional. The client passes these payloads through without
//! interpreting them; validation is the service's responsibility.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One configuration entry as returned by get/set/list/rollback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigEntry {
    pub namespace: String,
    pub key: String,
    /// Arbitrary JSON value.
    pub value: Value,
    pub version: u64,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConfigMetadata>,
}

/// Change metadata attached to an entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub updated_by: String,
    pub updated_at: String,
    #[serde(default)]
    pub secret: bool,
}

/// One historical revision, newest first as supplied by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigVersion {
    pub version: u64,
    pub value: Value,
    pub created_by: String,
    pub created_at: String,
}

/// Service health report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: String,
}
