//! Configuration consumed from the embedding application.

use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    1433
}

fn default_schema() -> String {
    "dbo".to_string()
}

fn default_true() -> bool {
    true
}

/// Connection descriptor for the relational target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target host name or address.
    pub host: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database to load into.
    pub database: String,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Schema applied to unqualified table names.
    #[serde(default = "default_schema")]
    pub default_schema: String,
}

/// Capability flags gating DDL and merge behavior against the target.
///
/// A disabled capability that a batch requires surfaces as
/// [`SinkError::Unsupported`](crate::error::SinkError::Unsupported) rather
/// than being worked around.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SinkPolicy {
    /// Whether ADD COLUMN is supported.
    #[serde(default = "default_true")]
    pub allow_column_add: bool,
    /// Whether altering column types is supported.
    #[serde(default = "default_true")]
    pub allow_column_alter: bool,
    /// Whether staging (temp) tables may be created.
    #[serde(default = "default_true")]
    pub allow_temp_tables: bool,
    /// Whether merge upsert is used when key properties are declared; when
    /// disabled every batch is applied append-only.
    #[serde(default = "default_true")]
    pub allow_merge_upsert: bool,
}

impl Default for SinkPolicy {
    fn default() -> Self {
        SinkPolicy {
            allow_column_add: true,
            allow_column_alter: true,
            allow_temp_tables: true,
            allow_merge_upsert: true,
        }
    }
}
