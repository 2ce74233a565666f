//! batchsink-core
//!
//! Dialect-independent core of the batch load pipeline: schema-to-SQL type
//! mapping, schema conformance, the connector/executor seams, and the
//! per-batch load orchestrator.

#![warn(missing_docs)]

mod conform;
mod config;
mod error;
mod pipeline;
mod typemap;
mod types;

/// Abstractions implemented by target dialects and wire drivers.
pub mod traits;

/// In-memory test doubles.
pub mod mocks;

pub use config::{SinkPolicy, TargetConfig};
pub use conform::conform;
pub use error::{DriverError, SinkError, SinkResult};
pub use pipeline::{LoadOrchestrator, LoadPhase};
pub use typemap::{
    map_type, merge_sql_types, SqlType, DECIMAL_PRECISION, DECIMAL_SCALE, KEY_TEXT_CHARS,
    WIDE_TEXT_CHARS,
};
pub use types::{
    Batch, BatchStats, ColumnSpec, NullKind, PropertySchema, Record, ScalarValue, SchemaSpec,
    StagingTable, TableName, TableSpec, TypeTag,
};
