//! Abstractions between the orchestrator, the dialect, and the wire driver.
//!
//! Two seams keep the pipeline testable and the dialect swappable: the
//! orchestrator drives a [`SinkConnector`] (the capability set one dialect
//! implements once), and a dialect implementation drives a [`SqlExecutor`]
//! (raw statement execution, implemented by the driver and by test doubles).

use async_trait::async_trait;

use crate::error::{DriverError, SinkResult};
use crate::types::{ColumnSpec, Record, ScalarValue, StagingTable, TableName, TableSpec};

/// Raw SQL execution against the target connection.
///
/// Implementations own one live connection; callers hold it exclusively for
/// the duration of a batch. Errors are reduced to driver messages here and
/// re-wrapped with operation context by the caller.
#[async_trait]
pub trait SqlExecutor: Send {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[ScalarValue]) -> Result<u64, DriverError>;

    /// Run a query, returning every row as a tuple of scalars in select-list
    /// order.
    async fn query_rows(
        &mut self,
        sql: &str,
        params: &[ScalarValue],
    ) -> Result<Vec<Vec<ScalarValue>>, DriverError>;
}

/// The capability set a target dialect implements for batch loading.
///
/// One implementation per dialect; the orchestrator composes these calls into
/// the provision, stage, merge sequence and owns all cross-cutting control
/// flow.
#[async_trait]
pub trait SinkConnector: Send {
    /// Ensure the destination table exists with columns matching `spec`,
    /// creating it or reconciling column/type drift as needed.
    async fn ensure_table(&mut self, spec: &TableSpec) -> SinkResult<()>;

    /// Ensure a single column exists with a type compatible with `column`,
    /// adding or widening it as needed. Never narrows an existing column.
    async fn ensure_column(&mut self, table: &TableName, column: &ColumnSpec) -> SinkResult<()>;

    /// Write a batch of records into a fresh staging table shaped like the
    /// target. No partial staging: any rejected row fails the whole call and
    /// leaves no staging table behind.
    async fn stage(&mut self, spec: &TableSpec, records: &[Record]) -> SinkResult<StagingTable>;

    /// Apply staged rows to the target with one atomic merge keyed on
    /// `join_keys` (append-only when empty), then drop the staging table.
    /// On merge failure the staging table is left in place for inspection.
    async fn merge_and_close(
        &mut self,
        staging: &StagingTable,
        target: &TableSpec,
        join_keys: &[String],
    ) -> SinkResult<u64>;
}
